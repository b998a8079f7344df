//! Outbound report scheduler.
//!
//! Commands from the peer arrive whenever the serial link delivers them,
//! but the USB host stack accepts at most one control transaction per
//! device at a time. The scheduler queues them and the poll loop calls
//! [`Scheduler::drain_one`] once per iteration:
//!
//! - operations for one device leave in arrival order;
//! - a device with a transaction in flight is skipped until the
//!   completion for that same transaction arrives (or it expires);
//! - a completion that turns up after its transaction expired is absorbed
//!   and never releases the transaction that replaced it;
//! - under [`DrainPolicy::PerDevice`] a blocked device does not hold up
//!   the others, under [`DrainPolicy::HeadOfLine`] only the queue head is
//!   ever tried;
//! - when the queue is full the newest request is rejected.

use heapless::Vec;

use crate::config::{MAX_DEVICES, MAX_PAYLOAD_SIZE, OUT_QUEUE_CAPACITY};
use crate::error::Error;
use crate::protocol::DeviceId;
use crate::usb::UsbHost;

/// Owned copy of a report waiting to be written.
pub type Report = Vec<u8, MAX_PAYLOAD_SIZE>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrainPolicy {
    /// Only the oldest entry is ever attempted.
    HeadOfLine,
    /// The oldest entry whose device is idle is attempted.
    PerDevice,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperationKind {
    Output,
    SetFeature,
    GetFeature,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Output(Report),
    SetFeature(Report),
    GetFeature { len: u16 },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Output(_) => OperationKind::Output,
            Operation::SetFeature(_) => OperationKind::SetFeature,
            Operation::GetFeature { .. } => OperationKind::GetFeature,
        }
    }
}

/// One queued outbound operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pending {
    pub device: DeviceId,
    pub report_id: u8,
    pub op: Operation,
}

impl Pending {
    pub fn output(device: DeviceId, report_id: u8, report: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            device,
            report_id,
            op: Operation::Output(copy_report(report)?),
        })
    }

    pub fn set_feature(device: DeviceId, report_id: u8, report: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            device,
            report_id,
            op: Operation::SetFeature(copy_report(report)?),
        })
    }

    /// Requests longer than [`MAX_PAYLOAD_SIZE`] are refused: the answer
    /// could not be relayed back in one envelope.
    pub fn get_feature(device: DeviceId, report_id: u8, len: u16) -> Result<Self, Error> {
        if usize::from(len) > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                len: usize::from(len),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self {
            device,
            report_id,
            op: Operation::GetFeature { len },
        })
    }
}

fn copy_report(report: &[u8]) -> Result<Report, Error> {
    Report::from_slice(report).map_err(|_| Error::PayloadTooLarge {
        len: report.len(),
        max: MAX_PAYLOAD_SIZE,
    })
}

/// Result of one drain step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Drained {
    /// Nothing queued.
    Idle,
    /// One operation was accepted by the host stack.
    Dispatched {
        device: DeviceId,
        kind: OperationKind,
    },
    /// Work is queued but no eligible device accepted it.
    Blocked,
}

/// Identity of a submitted transfer, as echoed back by its completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transfer {
    pub device: DeviceId,
    pub report_id: u8,
    pub kind: OperationKind,
}

impl Transfer {
    pub const fn new(device: DeviceId, report_id: u8, kind: OperationKind) -> Self {
        Self {
            device,
            report_id,
            kind,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    transfer: Transfer,
    since_ms: u64,
}

pub struct Scheduler {
    queue: Vec<Pending, OUT_QUEUE_CAPACITY>,
    in_flight: Vec<InFlight, MAX_DEVICES>,
    // Expired transfers whose completion may still arrive, stamped with
    // the expiry time.
    stale: Vec<InFlight, MAX_DEVICES>,
    policy: DrainPolicy,
    timeout_ms: u64,
    dropped: u32,
    expired: u32,
}

impl Scheduler {
    pub const fn new(policy: DrainPolicy, timeout_ms: u64) -> Self {
        Self {
            queue: Vec::new(),
            in_flight: Vec::new(),
            stale: Vec::new(),
            policy,
            timeout_ms,
            dropped: 0,
            expired: 0,
        }
    }

    /// Append an operation. Rejects it if the queue is full.
    pub fn enqueue(&mut self, pending: Pending) -> Result<(), Error> {
        let device = pending.device;
        if self.queue.push(pending).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            warn!(
                "scheduler: queue full, dropping request for {} ({} dropped)",
                device, self.dropped
            );
            return Err(Error::QueueFull);
        }
        Ok(())
    }

    /// Try to hand one queued operation to the host stack.
    pub fn drain_one<H: UsbHost + ?Sized>(&mut self, host: &mut H, now_ms: u64) -> Drained {
        self.expire(now_ms);
        if self.queue.is_empty() {
            return Drained::Idle;
        }

        // Addresses that refused a submission during this pass; their later
        // entries must wait too or per-device order would break.
        let mut refused: Vec<u8, OUT_QUEUE_CAPACITY> = Vec::new();

        for i in 0..self.queue.len() {
            let dev_addr = self.queue[i].device.dev_addr;
            let eligible = !self.is_busy(dev_addr)
                && !refused.contains(&dev_addr)
                && !self.in_flight.is_full();

            if eligible {
                if submit(host, &self.queue[i]) {
                    let entry = self.queue.remove(i);
                    let kind = entry.op.kind();
                    // Cannot fail: `eligible` checked for a free slot.
                    let _ = self.in_flight.push(InFlight {
                        transfer: Transfer::new(entry.device, entry.report_id, kind),
                        since_ms: now_ms,
                    });
                    trace!("scheduler: dispatched {} to {}", kind, entry.device);
                    return Drained::Dispatched {
                        device: entry.device,
                        kind,
                    };
                }
                let _ = refused.push(dev_addr);
            }

            if self.policy == DrainPolicy::HeadOfLine {
                break;
            }
        }

        Drained::Blocked
    }

    /// A transfer completed. Releases its device only if `done` is the
    /// transfer currently in flight there; a late completion of an expired
    /// transfer is absorbed instead.
    pub fn complete(&mut self, done: Transfer) -> bool {
        if let Some(i) = self.stale.iter().position(|f| f.transfer == done) {
            self.stale.swap_remove(i);
            debug!(
                "scheduler: late {} completion for {} after expiry",
                done.kind, done.device
            );
            return false;
        }
        match self.in_flight.iter().position(|f| f.transfer == done) {
            Some(i) => {
                self.in_flight.swap_remove(i);
                true
            }
            None => {
                debug!(
                    "scheduler: unmatched {} completion for {} (report {})",
                    done.kind, done.device, done.report_id
                );
                false
            }
        }
    }

    /// Drop everything queued or in flight for a detached interface.
    pub fn purge(&mut self, device: DeviceId) {
        let before = self.queue.len();
        self.queue.retain(|p| p.device != device);
        self.in_flight.retain(|f| f.transfer.device != device);
        self.stale.retain(|f| f.transfer.device != device);
        let purged = before - self.queue.len();
        if purged > 0 {
            info!("scheduler: purged {} pending for detached {}", purged, device);
        }
    }

    fn expire(&mut self, now_ms: u64) {
        let timeout_ms = self.timeout_ms;
        let timed_out = |f: &InFlight| now_ms.saturating_sub(f.since_ms) >= timeout_ms;

        // A completion this late is not coming.
        self.stale.retain(|f| !timed_out(f));

        let mut i = 0;
        while i < self.in_flight.len() {
            if !timed_out(&self.in_flight[i]) {
                i += 1;
                continue;
            }
            let transfer = self.in_flight.swap_remove(i).transfer;
            warn!("scheduler: {} transfer to {} timed out", transfer.kind, transfer.device);
            self.expired = self.expired.wrapping_add(1);
            self.bury(InFlight {
                transfer,
                since_ms: now_ms,
            });
        }
    }

    fn bury(&mut self, entry: InFlight) {
        if self.stale.is_full() {
            let oldest = self
                .stale
                .iter()
                .enumerate()
                .min_by_key(|(_, f)| f.since_ms)
                .map(|(i, _)| i);
            if let Some(i) = oldest {
                self.stale.swap_remove(i);
            }
        }
        let _ = self.stale.push(entry);
    }

    /// Whether a transaction to `dev_addr` is outstanding.
    pub fn is_busy(&self, dev_addr: u8) -> bool {
        self.in_flight
            .iter()
            .any(|f| f.transfer.device.dev_addr == dev_addr)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Pending> {
        self.queue.iter()
    }

    /// Requests rejected because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// In-flight transactions released by timeout.
    pub fn expired(&self) -> u32 {
        self.expired
    }

    pub fn policy(&self) -> DrainPolicy {
        self.policy
    }
}

fn submit<H: UsbHost + ?Sized>(host: &mut H, pending: &Pending) -> bool {
    match &pending.op {
        Operation::Output(report) => {
            host.send_output_report(pending.device, pending.report_id, report)
        }
        Operation::SetFeature(report) => {
            host.set_feature_report(pending.device, pending.report_id, report)
        }
        Operation::GetFeature { len } => {
            host.get_feature_report(pending.device, pending.report_id, *len)
        }
    }
}
