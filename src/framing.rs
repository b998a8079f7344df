//! Byte-stream framing for the inter-core UART link.
//!
//! Each envelope travels as one COBS frame with a CRC-32 trailer:
//!
//! ```text
//! 0x00 | cobs(envelope ++ crc32_le(envelope)) | 0x00
//! ```
//!
//! COBS leaves no zero byte inside the body, so `0x00` is a pure
//! delimiter. The leading delimiter flushes any line noise the receiver
//! accumulated before the frame.

use embedded_io::Write;
use heapless::Vec;

use crate::error::EncodeError;
use crate::protocol::MAX_ENVELOPE_SIZE;

/// Frame delimiter.
pub const DELIMITER: u8 = 0x00;

/// CRC trailer length.
pub const CRC_LEN: usize = 4;

/// Largest decoded frame body (envelope plus CRC).
pub const MAX_FRAME_SIZE: usize = MAX_ENVELOPE_SIZE + CRC_LEN;

/// Largest COBS-encoded body: one overhead byte per started 254-byte run.
pub const MAX_ENCODED_SIZE: usize = MAX_FRAME_SIZE + MAX_FRAME_SIZE / 254 + 1;

/// Worst-case bytes one frame occupies on the wire, delimiters included.
pub const MAX_WIRE_FRAME_SIZE: usize = MAX_ENCODED_SIZE + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError<E> {
    /// The envelope cannot be framed; nothing was written.
    Encode(EncodeError),
    /// The underlying stream failed mid-frame.
    Io(E),
}

/// Write one framed envelope to `w`.
pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> Result<(), WriteError<W::Error>> {
    if payload.len() > MAX_ENVELOPE_SIZE {
        return Err(WriteError::Encode(EncodeError::PayloadTooLarge {
            len: payload.len(),
        }));
    }

    let mut raw = [0u8; MAX_FRAME_SIZE];
    let body_len = payload.len() + CRC_LEN;
    raw[..payload.len()].copy_from_slice(payload);
    raw[payload.len()..body_len].copy_from_slice(&crc32fast::hash(payload).to_le_bytes());

    let mut wire = [DELIMITER; MAX_WIRE_FRAME_SIZE];
    // try_encode writes no sentinel; wire[0] and wire[n + 1] stay 0x00.
    let n = cobs::try_encode(&raw[..body_len], &mut wire[1..=MAX_ENCODED_SIZE]).map_err(|_| {
        WriteError::Encode(EncodeError::BufferTooSmall {
            needed: cobs::max_encoding_length(body_len),
            available: MAX_ENCODED_SIZE,
        })
    })?;
    w.write_all(&wire[..n + 2]).map_err(WriteError::Io)
}

/// Incremental COBS decoder with CRC check.
///
/// Storage is fixed; a frame that outgrows it, fails to decode, or fails
/// the CRC is dropped and the decoder resynchronises on the next
/// delimiter.
pub struct FrameDecoder {
    buf: Vec<u8, MAX_ENCODED_SIZE>,
    discarding: bool,
    complete: bool,
    dropped: u32,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            discarding: false,
            complete: false,
            dropped: 0,
        }
    }

    /// Frames discarded so far (overflow, bad encoding, CRC mismatch).
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Feed one byte. Returns the envelope bytes (CRC stripped) when a
    /// valid frame ends with this byte.
    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        if self.complete {
            self.reset();
        }

        if byte == DELIMITER {
            return self.finish();
        }
        if self.discarding {
            return None;
        }
        if self.buf.push(byte).is_err() {
            warn!("framing: frame exceeds {} bytes, dropping", MAX_ENCODED_SIZE);
            self.dropped += 1;
            self.buf.clear();
            self.discarding = true;
        }
        None
    }

    fn finish(&mut self) -> Option<&[u8]> {
        if self.discarding {
            self.reset();
            return None;
        }
        // Back-to-back delimiters frame nothing.
        if self.buf.is_empty() {
            return None;
        }

        let decoded = match cobs::decode_in_place(&mut self.buf) {
            Ok(n) => n,
            Err(_) => {
                debug!("framing: malformed COBS frame of {} bytes", self.buf.len());
                return self.reject();
            }
        };
        if decoded <= CRC_LEN {
            return self.reject();
        }

        let body_len = decoded - CRC_LEN;
        let (body, trailer) = self.buf[..decoded].split_at(body_len);
        let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if crc32fast::hash(body) != expected {
            warn!("framing: CRC mismatch on {}-byte frame", body_len);
            return self.reject();
        }

        self.complete = true;
        Some(&self.buf[..body_len])
    }

    fn reject(&mut self) -> Option<&[u8]> {
        self.dropped += 1;
        self.reset();
        None
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
        self.complete = false;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct Sink(std::vec::Vec<u8>);

    impl embedded_io::ErrorType for Sink {
        type Error = Infallible;
    }

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn frame(payload: &[u8]) -> std::vec::Vec<u8> {
        let mut sink = Sink(std::vec::Vec::new());
        write_frame(&mut sink, payload).unwrap();
        sink.0
    }

    fn decode_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> std::vec::Vec<std::vec::Vec<u8>> {
        let mut out = std::vec::Vec::new();
        for &b in bytes {
            if let Some(f) = decoder.push(b) {
                out.push(f.to_vec());
            }
        }
        out
    }

    #[test]
    fn zero_bytes_only_delimit() {
        let bytes = frame(&[0x01, 0x00, 0x00, 0x02]);
        assert_eq!(bytes[0], DELIMITER);
        assert_eq!(*bytes.last().unwrap(), DELIMITER);
        assert!(!bytes[1..bytes.len() - 1].contains(&DELIMITER));
        // Overhead byte, then 0x01, then an empty run for the second zero.
        assert_eq!(&bytes[1..4], &[0x02, 0x01, 0x01]);
    }

    #[test]
    fn decoder_recovers_frames_in_order() {
        let mut stream = frame(&[4, 1, 0, 0x00, 0xC0]);
        stream.extend(frame(&[6]));
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &stream);
        assert_eq!(frames, vec![vec![4, 1, 0, 0x00, 0xC0], vec![6]]);
        assert_eq!(decoder.dropped(), 0);
    }

    #[test]
    fn longest_envelope_fits_one_frame() {
        let big = vec![0xA5u8; MAX_ENVELOPE_SIZE];
        let bytes = frame(&big);
        assert!(bytes.len() <= MAX_WIRE_FRAME_SIZE);
        assert!(cobs::max_encoding_length(MAX_FRAME_SIZE) <= MAX_ENCODED_SIZE);

        let mut decoder = FrameDecoder::new();
        assert_eq!(decode_all(&mut decoder, &bytes), vec![big]);
    }

    #[test]
    fn oversized_envelope_is_refused_before_writing() {
        let mut sink = Sink(std::vec::Vec::new());
        let err = write_frame(&mut sink, &[0u8; MAX_ENVELOPE_SIZE + 1]).unwrap_err();
        assert_eq!(
            err,
            WriteError::Encode(EncodeError::PayloadTooLarge {
                len: MAX_ENVELOPE_SIZE + 1
            })
        );
        assert!(sink.0.is_empty());
    }

    #[test]
    fn decoder_drops_corrupted_frame_and_resyncs() {
        let mut stream = frame(&[7, 1, 0, 3, 0x01]);
        // [delimiter, overhead, 7, 1, ...]: corrupt the 7.
        stream[2] ^= 0x40;
        stream.extend(frame(&[5]));
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &stream);
        assert_eq!(frames, vec![vec![5]]);
        assert_eq!(decoder.dropped(), 1);
    }

    #[test]
    fn decoder_drops_oversized_frame() {
        let mut stream = vec![0x11u8; MAX_ENCODED_SIZE + 10];
        stream.push(DELIMITER);
        stream.extend(frame(&[0]));
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &stream);
        assert_eq!(frames, vec![vec![0]]);
        assert_eq!(decoder.dropped(), 1);
    }

    #[test]
    fn decoder_drops_truncated_run() {
        let mut decoder = FrameDecoder::new();
        // Overhead byte promises four data bytes, only one arrives.
        let mut stream = vec![DELIMITER, 0x05, 0x01, DELIMITER];
        stream.extend(frame(&[6]));
        let frames = decode_all(&mut decoder, &stream);
        assert_eq!(frames, vec![vec![6]]);
        assert_eq!(decoder.dropped(), 1);
    }

    #[test]
    fn decoder_ignores_noise_shorter_than_crc() {
        let mut decoder = FrameDecoder::new();
        let mut stream = vec![0x03, 0x01, 0x02, DELIMITER, DELIMITER];
        stream.extend(frame(&[0]));
        let frames = decode_all(&mut decoder, &stream);
        assert_eq!(frames, vec![vec![0]]);
        assert_eq!(decoder.dropped(), 1);
    }
}
