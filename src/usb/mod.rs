//! USB host subsystem contract.
//!
//! The host protocol stack (enumeration, transfer scheduling, descriptor
//! parsing) is an external collaborator. On target it is TinyUSB, bound
//! in `hw::tinyusb`; in tests it is a scripted mock. The relay only
//! needs the operations in [`UsbHost`] and the callbacks surfaced as
//! [`HostEvent`]s.
//!
//! Events are copied out of the stack's buffers when its callbacks fire
//! and handed to the poll loop through an [`EventQueue`].

mod event_queue;

pub use event_queue::EventQueue;

use heapless::Vec;

use crate::config::MAX_PAYLOAD_SIZE;
use crate::protocol::{DeviceId, IntervalOverride};

/// HID report type, as used by SET_REPORT / GET_REPORT requests.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportType {
    Input = 1,
    Output = 2,
    Feature = 3,
}

impl ReportType {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(ReportType::Input),
            2 => Some(ReportType::Output),
            3 => Some(ReportType::Feature),
            _ => None,
        }
    }
}

/// Report or descriptor bytes captured from a host-stack callback.
///
/// Capture is all-or-nothing: bytes that do not fit
/// `MAX_PAYLOAD_SIZE` are not copied, only their length is kept so the
/// relay can reject the event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    bytes: Vec<u8, MAX_PAYLOAD_SIZE>,
    len: usize,
}

impl Payload {
    pub fn capture(data: &[u8]) -> Self {
        Self {
            bytes: Vec::from_slice(data).unwrap_or_default(),
            len: data.len(),
        }
    }

    pub const fn empty() -> Self {
        Self {
            bytes: Vec::new(),
            len: 0,
        }
    }

    /// The captured bytes, or `None` if the source was too large.
    pub fn as_slice(&self) -> Option<&[u8]> {
        (self.bytes.len() == self.len).then_some(self.bytes.as_slice())
    }

    /// Length reported by the host stack.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One USB host callback, in the order the stack fired it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostEvent {
    /// A HID interface was mounted; `descriptor` is its report descriptor.
    Mounted {
        device: DeviceId,
        descriptor: Payload,
    },
    /// A HID interface went away.
    Unmounted { device: DeviceId },
    /// An interrupt IN report arrived. Reception must be re-armed.
    ReportReceived { device: DeviceId, report: Payload },
    /// USB start-of-frame tick.
    StartOfFrame,
    /// A GET_REPORT control transfer completed.
    GetReportComplete {
        device: DeviceId,
        report_id: u8,
        report: Payload,
    },
    /// A SET_REPORT control transfer completed.
    SetReportComplete {
        device: DeviceId,
        report_id: u8,
        report_type: ReportType,
    },
}

/// Operations the relay consumes from the USB host stack.
///
/// Submission methods return `false` when the stack cannot accept the
/// transfer right now (typically because the device's control pipe is
/// busy); the caller keeps the request and retries later.
pub trait UsbHost {
    /// Start the host stack. Called once, after the init handshake.
    fn init(&mut self, interval_override: IntervalOverride);

    /// Advance the stack's state machine one step.
    fn task(&mut self);

    /// Next event produced by the last `task()` call, oldest first.
    fn take_event(&mut self) -> Option<HostEvent>;

    /// Vendor and product id of the device at `dev_addr`.
    fn vendor_product_id(&self, dev_addr: u8) -> Option<(u16, u16)>;

    /// Re-arm interrupt IN reception for one interface.
    fn receive_report(&mut self, device: DeviceId) -> bool;

    fn send_output_report(&mut self, device: DeviceId, report_id: u8, report: &[u8]) -> bool;

    fn set_feature_report(&mut self, device: DeviceId, report_id: u8, report: &[u8]) -> bool;

    fn get_feature_report(&mut self, device: DeviceId, report_id: u8, len: u16) -> bool;
}
