//! Inter-core wire message catalog.
//!
//! Every message is an *envelope*: one discriminant byte, a fixed
//! variant-specific header, and (for some variants) a raw payload that
//! runs to the end of the frame. Layout is packed and little-endian and
//! must be identical on both cores.
//!
//! ```text
//! tag  variant              header after tag                     payload
//!  0   InitRequest          -                                    -
//!  1   InitResponse         interval_override:u8                 -
//!  2   DeviceConnected      vid:u16 pid:u16 dev_addr:u8 iface:u8 descriptor
//!  3   DeviceDisconnected   dev_addr:u8 iface:u8                 -
//!  4   ReportReceived       dev_addr:u8 iface:u8                 report
//!  5   Restart              -                                    -
//!  6   StartOfFrame         -                                    -
//!  7   SendOutputReport     dev_addr:u8 iface:u8 report_id:u8    report
//!  8   GetFeatureReport     dev_addr:u8 iface:u8 report_id:u8 len:u16
//!  9   GetFeatureResponse   dev_addr:u8 iface:u8 report_id:u8    report
//! 10   SetFeatureReport     dev_addr:u8 iface:u8 report_id:u8    report
//! 11   SetFeatureComplete   dev_addr:u8 iface:u8 report_id:u8    -
//! ```
//!
//! Decoding never reinterprets memory: the frame length is checked
//! against the variant's fixed header before any field is read, and the
//! payload is borrowed from the frame.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{DecodeError, EncodeError};

/// Largest fixed header (tag included), that of `DeviceConnected`.
pub const MAX_HEADER_SIZE: usize = 7;

/// Largest encoded envelope.
pub const MAX_ENVELOPE_SIZE: usize = MAX_PAYLOAD_SIZE + MAX_HEADER_SIZE;

/// Envelope discriminant.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageKind {
    InitRequest = 0,
    InitResponse = 1,
    DeviceConnected = 2,
    DeviceDisconnected = 3,
    ReportReceived = 4,
    Restart = 5,
    StartOfFrame = 6,
    SendOutputReport = 7,
    GetFeatureReport = 8,
    GetFeatureResponse = 9,
    SetFeatureReport = 10,
    SetFeatureComplete = 11,
}

impl MessageKind {
    /// Size of the fixed part of the envelope, discriminant included.
    pub const fn header_len(self) -> usize {
        match self {
            MessageKind::InitRequest | MessageKind::Restart | MessageKind::StartOfFrame => 1,
            MessageKind::InitResponse => 2,
            MessageKind::DeviceDisconnected | MessageKind::ReportReceived => 3,
            MessageKind::SendOutputReport
            | MessageKind::GetFeatureResponse
            | MessageKind::SetFeatureReport
            | MessageKind::SetFeatureComplete => 4,
            MessageKind::GetFeatureReport => 6,
            MessageKind::DeviceConnected => 7,
        }
    }

    /// Whether a raw payload follows the fixed header.
    pub const fn has_payload(self) -> bool {
        matches!(
            self,
            MessageKind::DeviceConnected
                | MessageKind::ReportReceived
                | MessageKind::SendOutputReport
                | MessageKind::GetFeatureResponse
                | MessageKind::SetFeatureReport
        )
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = DecodeError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => MessageKind::InitRequest,
            1 => MessageKind::InitResponse,
            2 => MessageKind::DeviceConnected,
            3 => MessageKind::DeviceDisconnected,
            4 => MessageKind::ReportReceived,
            5 => MessageKind::Restart,
            6 => MessageKind::StartOfFrame,
            7 => MessageKind::SendOutputReport,
            8 => MessageKind::GetFeatureReport,
            9 => MessageKind::GetFeatureResponse,
            10 => MessageKind::SetFeatureReport,
            11 => MessageKind::SetFeatureComplete,
            other => return Err(DecodeError::UnknownCommand(other)),
        })
    }
}

/// A physical device's logical endpoint: USB address plus HID interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId {
    pub dev_addr: u8,
    pub interface: u8,
}

impl DeviceId {
    pub const fn new(dev_addr: u8, interface: u8) -> Self {
        Self {
            dev_addr,
            interface,
        }
    }
}

/// HID polling interval override handed down by the peer, in
/// milliseconds. Zero means "use the interval from the endpoint
/// descriptor".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IntervalOverride(u8);

impl IntervalOverride {
    pub const NONE: Self = Self(0);

    pub const fn from_millis(ms: u8) -> Self {
        Self(ms)
    }

    pub const fn as_millis(self) -> u8 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// One wire message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Envelope<'a> {
    /// Device asks the peer for its init parameters.
    InitRequest,
    /// Peer releases the device from the handshake.
    InitResponse { interval_override: IntervalOverride },
    /// Peer demands an immediate reboot.
    Restart,
    SendOutputReport {
        device: DeviceId,
        report_id: u8,
        report: &'a [u8],
    },
    SetFeatureReport {
        device: DeviceId,
        report_id: u8,
        report: &'a [u8],
    },
    GetFeatureReport {
        device: DeviceId,
        report_id: u8,
        len: u16,
    },
    ReportReceived { device: DeviceId, report: &'a [u8] },
    DeviceConnected {
        vid: u16,
        pid: u16,
        device: DeviceId,
        descriptor: &'a [u8],
    },
    DeviceDisconnected { device: DeviceId },
    StartOfFrame,
    GetFeatureResponse {
        device: DeviceId,
        report_id: u8,
        report: &'a [u8],
    },
    SetFeatureComplete { device: DeviceId, report_id: u8 },
}

impl<'a> Envelope<'a> {
    pub const fn kind(&self) -> MessageKind {
        match self {
            Envelope::InitRequest => MessageKind::InitRequest,
            Envelope::InitResponse { .. } => MessageKind::InitResponse,
            Envelope::Restart => MessageKind::Restart,
            Envelope::SendOutputReport { .. } => MessageKind::SendOutputReport,
            Envelope::SetFeatureReport { .. } => MessageKind::SetFeatureReport,
            Envelope::GetFeatureReport { .. } => MessageKind::GetFeatureReport,
            Envelope::ReportReceived { .. } => MessageKind::ReportReceived,
            Envelope::DeviceConnected { .. } => MessageKind::DeviceConnected,
            Envelope::DeviceDisconnected { .. } => MessageKind::DeviceDisconnected,
            Envelope::StartOfFrame => MessageKind::StartOfFrame,
            Envelope::GetFeatureResponse { .. } => MessageKind::GetFeatureResponse,
            Envelope::SetFeatureComplete { .. } => MessageKind::SetFeatureComplete,
        }
    }

    /// Raw payload bytes (empty for fixed-size variants).
    pub const fn payload(&self) -> &'a [u8] {
        match *self {
            Envelope::SendOutputReport { report, .. }
            | Envelope::SetFeatureReport { report, .. }
            | Envelope::ReportReceived { report, .. }
            | Envelope::GetFeatureResponse { report, .. } => report,
            Envelope::DeviceConnected { descriptor, .. } => descriptor,
            _ => &[],
        }
    }

    /// Number of bytes `encode` will write.
    pub const fn encoded_len(&self) -> usize {
        self.kind().header_len() + self.payload().len()
    }

    /// Serialise into `buf`. Returns the number of bytes written.
    ///
    /// Payload size and destination capacity are both checked before
    /// anything is written, so no length can write outside `buf`.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        let payload = self.payload();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(EncodeError::PayloadTooLarge { len: payload.len() });
        }
        let needed = self.encoded_len();
        if buf.len() < needed {
            return Err(EncodeError::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }

        let kind = self.kind();
        buf[0] = kind as u8;
        let header = &mut buf[1..kind.header_len()];
        match *self {
            Envelope::InitRequest | Envelope::Restart | Envelope::StartOfFrame => {}
            Envelope::InitResponse { interval_override } => {
                header[0] = interval_override.as_millis();
            }
            Envelope::DeviceConnected {
                vid, pid, device, ..
            } => {
                header[0..2].copy_from_slice(&vid.to_le_bytes());
                header[2..4].copy_from_slice(&pid.to_le_bytes());
                put_device(&mut header[4..6], device);
            }
            Envelope::DeviceDisconnected { device } | Envelope::ReportReceived { device, .. } => {
                put_device(header, device);
            }
            Envelope::SendOutputReport {
                device, report_id, ..
            }
            | Envelope::SetFeatureReport {
                device, report_id, ..
            }
            | Envelope::GetFeatureResponse {
                device, report_id, ..
            }
            | Envelope::SetFeatureComplete { device, report_id } => {
                put_device(header, device);
                header[2] = report_id;
            }
            Envelope::GetFeatureReport {
                device,
                report_id,
                len,
            } => {
                put_device(header, device);
                header[2] = report_id;
                header[3..5].copy_from_slice(&len.to_le_bytes());
            }
        }
        buf[kind.header_len()..needed].copy_from_slice(payload);
        Ok(needed)
    }

    /// Parse one frame. The returned envelope borrows its payload from
    /// `data`.
    ///
    /// Trailing bytes after a fixed-size variant are ignored.
    pub fn decode(data: &'a [u8]) -> Result<Self, DecodeError> {
        let (&tag, _) = data.split_first().ok_or(DecodeError::Empty)?;
        let kind = MessageKind::try_from(tag)?;
        let header_len = kind.header_len();
        if data.len() < header_len {
            return Err(DecodeError::Truncated {
                command: tag,
                len: data.len(),
            });
        }

        let header = &data[1..header_len];
        let payload = &data[header_len..];
        if kind.has_payload() && payload.len() > MAX_PAYLOAD_SIZE {
            return Err(DecodeError::PayloadTooLarge {
                command: tag,
                len: payload.len(),
            });
        }

        Ok(match kind {
            MessageKind::InitRequest => Envelope::InitRequest,
            MessageKind::InitResponse => Envelope::InitResponse {
                interval_override: IntervalOverride::from_millis(header[0]),
            },
            MessageKind::Restart => Envelope::Restart,
            MessageKind::StartOfFrame => Envelope::StartOfFrame,
            MessageKind::DeviceConnected => Envelope::DeviceConnected {
                vid: u16::from_le_bytes([header[0], header[1]]),
                pid: u16::from_le_bytes([header[2], header[3]]),
                device: get_device(&header[4..6]),
                descriptor: payload,
            },
            MessageKind::DeviceDisconnected => Envelope::DeviceDisconnected {
                device: get_device(header),
            },
            MessageKind::ReportReceived => Envelope::ReportReceived {
                device: get_device(header),
                report: payload,
            },
            MessageKind::SendOutputReport => Envelope::SendOutputReport {
                device: get_device(header),
                report_id: header[2],
                report: payload,
            },
            MessageKind::SetFeatureReport => Envelope::SetFeatureReport {
                device: get_device(header),
                report_id: header[2],
                report: payload,
            },
            MessageKind::GetFeatureResponse => Envelope::GetFeatureResponse {
                device: get_device(header),
                report_id: header[2],
                report: payload,
            },
            MessageKind::SetFeatureComplete => Envelope::SetFeatureComplete {
                device: get_device(header),
                report_id: header[2],
            },
            MessageKind::GetFeatureReport => Envelope::GetFeatureReport {
                device: get_device(header),
                report_id: header[2],
                len: u16::from_le_bytes([header[3], header[4]]),
            },
        })
    }
}

fn put_device(out: &mut [u8], device: DeviceId) {
    out[0] = device.dev_addr;
    out[1] = device.interface;
}

fn get_device(bytes: &[u8]) -> DeviceId {
    DeviceId::new(bytes[0], bytes[1])
}
