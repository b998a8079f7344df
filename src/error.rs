//! Unified error type for hid-relay.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

/// Top-level error type used across the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An inbound frame could not be decoded into an envelope.
    Decode(DecodeError),

    /// An envelope could not be encoded into the transmit buffer.
    Encode(EncodeError),

    /// The outbound scheduler is full; the newest request was rejected.
    QueueFull,

    /// A report is larger than a scheduler entry can hold.
    PayloadTooLarge { len: usize, max: usize },
}

/// Reasons an inbound frame is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Zero-length frame (no discriminant).
    Empty,
    /// Discriminant does not name a known variant.
    UnknownCommand(u8),
    /// Frame is shorter than the variant's fixed header.
    Truncated { command: u8, len: usize },
    /// Variable-length payload exceeds `MAX_PAYLOAD_SIZE`.
    PayloadTooLarge { command: u8, len: usize },
}

/// Reasons an envelope cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Variable-length payload exceeds `MAX_PAYLOAD_SIZE`.
    PayloadTooLarge { len: usize },
    /// Destination buffer cannot hold the encoded envelope.
    BufferTooSmall { needed: usize, available: usize },
}

// Convenience conversions

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self {
        Error::Encode(e)
    }
}
