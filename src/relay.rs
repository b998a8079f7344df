//! Event relay - turns USB host callbacks into envelopes for the peer.
//!
//! Every envelope is built into one transmit buffer owned by the
//! [`EventRelay`] and lent out by `&mut` for the duration of a single
//! build-and-write, so two builds can never overlap.

use crate::activity::{ActivityIndicator, ActivityLed};
use crate::config::TX_BUFFER_SIZE;
use crate::error::EncodeError;
use crate::protocol::{DeviceId, Envelope};
use crate::scheduler::{OperationKind, Scheduler, Transfer};
use crate::serial::SerialTransport;
use crate::usb::{HostEvent, Payload, ReportType, UsbHost};

/// Scratch region sized to the largest envelope.
pub struct TxBuffer {
    bytes: [u8; TX_BUFFER_SIZE],
}

impl TxBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; TX_BUFFER_SIZE],
        }
    }

    /// Encode `envelope` and return the bytes to transmit.
    pub fn build(&mut self, envelope: &Envelope<'_>) -> Result<&[u8], EncodeError> {
        let n = envelope.encode(&mut self.bytes)?;
        Ok(&self.bytes[..n])
    }
}

impl Default for TxBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters kept by the relay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RelayStats {
    /// Envelopes written to the serial link.
    pub sent: u32,
    /// Events dropped because their payload did not fit.
    pub rejected: u32,
    /// Re-arm requests refused by the host stack.
    pub rearm_failures: u32,
}

pub struct EventRelay<L> {
    tx: TxBuffer,
    activity: ActivityIndicator<L>,
    stats: RelayStats,
}

impl<L: ActivityLed> EventRelay<L> {
    pub fn new(activity: ActivityIndicator<L>) -> Self {
        Self {
            tx: TxBuffer::new(),
            activity,
            stats: RelayStats::default(),
        }
    }

    /// Build `envelope` in the transmit buffer and write it. Returns
    /// `false` if it could not be encoded; that is logged and counted in
    /// [`RelayStats::rejected`].
    pub fn send<S: SerialTransport + ?Sized>(
        &mut self,
        serial: &mut S,
        envelope: &Envelope<'_>,
    ) -> bool {
        match self.tx.build(envelope) {
            Ok(frame) => {
                serial.write(frame);
                self.stats.sent = self.stats.sent.wrapping_add(1);
                true
            }
            Err(e) => {
                self.stats.rejected = self.stats.rejected.wrapping_add(1);
                warn!("relay: cannot encode {}: {}", envelope.kind(), e);
                false
            }
        }
    }

    /// Forward one host event to the peer and apply its side effects.
    pub fn relay<S, H>(
        &mut self,
        event: &HostEvent,
        serial: &mut S,
        host: &mut H,
        scheduler: &mut Scheduler,
        now_ms: u64,
    ) where
        S: SerialTransport + ?Sized,
        H: UsbHost + ?Sized,
    {
        match event {
            HostEvent::ReportReceived { device, report } => {
                self.activity.pulse(now_ms);
                if let Some(report) = self.payload(report, "report") {
                    self.send(
                        serial,
                        &Envelope::ReportReceived {
                            device: *device,
                            report,
                        },
                    );
                }
                self.rearm(host, *device);
            }
            HostEvent::Mounted { device, descriptor } => {
                let (vid, pid) = host.vendor_product_id(device.dev_addr).unwrap_or((0, 0));
                info!(
                    "relay: mounted {} vid={=u16:#x} pid={=u16:#x}",
                    device, vid, pid
                );
                if let Some(descriptor) = self.payload(descriptor, "descriptor") {
                    self.send(
                        serial,
                        &Envelope::DeviceConnected {
                            vid,
                            pid,
                            device: *device,
                            descriptor,
                        },
                    );
                }
                self.rearm(host, *device);
            }
            HostEvent::Unmounted { device } => {
                info!("relay: unmounted {}", device);
                scheduler.purge(*device);
                self.send(serial, &Envelope::DeviceDisconnected { device: *device });
            }
            HostEvent::StartOfFrame => {
                self.send(serial, &Envelope::StartOfFrame);
            }
            HostEvent::GetReportComplete {
                device,
                report_id,
                report,
            } => {
                scheduler.complete(Transfer::new(*device, *report_id, OperationKind::GetFeature));
                if let Some(report) = self.payload(report, "feature report") {
                    self.send(
                        serial,
                        &Envelope::GetFeatureResponse {
                            device: *device,
                            report_id: *report_id,
                            report,
                        },
                    );
                }
            }
            HostEvent::SetReportComplete {
                device,
                report_id,
                report_type,
            } => {
                let kind = match report_type {
                    ReportType::Feature => Some(OperationKind::SetFeature),
                    ReportType::Output => Some(OperationKind::Output),
                    ReportType::Input => None,
                };
                if let Some(kind) = kind {
                    scheduler.complete(Transfer::new(*device, *report_id, kind));
                }
                if *report_type == ReportType::Feature {
                    self.send(
                        serial,
                        &Envelope::SetFeatureComplete {
                            device: *device,
                            report_id: *report_id,
                        },
                    );
                }
            }
        }
    }

    fn payload<'p>(&mut self, payload: &'p Payload, what: &str) -> Option<&'p [u8]> {
        let bytes = payload.as_slice();
        if bytes.is_none() {
            self.stats.rejected = self.stats.rejected.wrapping_add(1);
            warn!("relay: {=str} of {} bytes exceeds buffer", what, payload.len());
        }
        bytes
    }

    fn rearm<H: UsbHost + ?Sized>(&mut self, host: &mut H, device: DeviceId) {
        if !host.receive_report(device) {
            self.stats.rearm_failures = self.stats.rearm_failures.wrapping_add(1);
            warn!("relay: re-arm failed for {}", device);
        }
    }

    pub fn activity_mut(&mut self) -> &mut ActivityIndicator<L> {
        &mut self.activity
    }

    pub fn activity(&self) -> &ActivityIndicator<L> {
        &self.activity
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }
}
