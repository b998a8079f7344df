//! Main poll loop and command dispatch.
//!
//! [`Bridge`] owns every collaborator and runs the two-phase state
//! machine. Each call to [`Bridge::poll`] is one non-blocking iteration:
//!
//! - while uninitialized: send InitRequest, then one read pass;
//! - once running, in fixed order:
//!   1. USB host tick, relaying every event it produced;
//!   2. one read pass over the serial link, dispatching each command;
//!   3. one scheduler drain step;
//!   4. activity LED idle check.

use crate::activity::{ActivityIndicator, ActivityLed};
use crate::config::{ACTIVITY_LED_IDLE_MS, DEFAULT_DRAIN_POLICY, TRANSFER_TIMEOUT_MS};
use crate::error::Error;
use crate::handshake::{Handshake, LinkState};
use crate::protocol::{Envelope, IntervalOverride};
use crate::relay::{EventRelay, RelayStats};
use crate::scheduler::{DrainPolicy, Pending, Scheduler};
use crate::serial::SerialTransport;
use crate::usb::UsbHost;

/// Hardware reset line.
pub trait Watchdog {
    /// Reboot the chip. On target this does not return.
    fn reboot_now(&mut self);
}

/// Runtime knobs; defaults come from [`crate::config`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeConfig {
    pub drain_policy: DrainPolicy,
    pub transfer_timeout_ms: u64,
    pub activity_idle_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            drain_policy: DEFAULT_DRAIN_POLICY,
            transfer_timeout_ms: TRANSFER_TIMEOUT_MS,
            activity_idle_ms: ACTIVITY_LED_IDLE_MS,
        }
    }
}

pub struct Bridge<H, S, W, L> {
    host: H,
    serial: S,
    watchdog: W,
    relay: EventRelay<L>,
    handshake: Handshake,
    scheduler: Scheduler,
    ignored_frames: u32,
}

impl<H, S, W, L> Bridge<H, S, W, L>
where
    H: UsbHost,
    S: SerialTransport,
    W: Watchdog,
    L: ActivityLed,
{
    pub fn new(host: H, serial: S, watchdog: W, led: L, config: BridgeConfig) -> Self {
        Self {
            host,
            serial,
            watchdog,
            relay: EventRelay::new(ActivityIndicator::new(led, config.activity_idle_ms)),
            handshake: Handshake::new(),
            scheduler: Scheduler::new(config.drain_policy, config.transfer_timeout_ms),
            ignored_frames: 0,
        }
    }

    /// Run one loop iteration at time `now_ms`.
    pub fn poll(&mut self, now_ms: u64) {
        if !self.handshake.is_running() {
            self.handshake_step(now_ms);
            return;
        }

        self.host.task();
        while let Some(event) = self.host.take_event() {
            self.relay.relay(
                &event,
                &mut self.serial,
                &mut self.host,
                &mut self.scheduler,
                now_ms,
            );
        }

        self.service_serial(now_ms);
        self.scheduler.drain_one(&mut self.host, now_ms);
        self.relay.activity_mut().off_if_idle(now_ms);
    }

    /// One handshake iteration: request init, then read once. Starts the
    /// USB host stack on the transition to `Running`.
    pub fn handshake_step(&mut self, now_ms: u64) -> LinkState {
        if let LinkState::Running { .. } = self.handshake.state() {
            return self.handshake.state();
        }

        if self.relay.send(&mut self.serial, &Envelope::InitRequest) {
            self.handshake.note_request_sent();
        }
        self.service_serial(now_ms);

        let state = self.handshake.state();
        if let LinkState::Running { interval_override } = state {
            self.host.init(interval_override);
        }
        state
    }

    /// Block until the peer answers the handshake. No backoff, no
    /// timeout: nothing else is valid before initialization.
    pub fn run_handshake(&mut self, mut clock: impl FnMut() -> u64) -> IntervalOverride {
        loop {
            if let LinkState::Running { interval_override } = self.handshake_step(clock()) {
                return interval_override;
            }
        }
    }

    fn service_serial(&mut self, now_ms: u64) {
        let Self {
            serial,
            watchdog,
            handshake,
            scheduler,
            ignored_frames,
            ..
        } = self;
        serial.read_available(&mut |frame| {
            if !dispatch(frame, handshake, scheduler, watchdog, now_ms) {
                *ignored_frames = ignored_frames.wrapping_add(1);
            }
        });
    }

    pub fn state(&self) -> LinkState {
        self.handshake.state()
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn relay_stats(&self) -> RelayStats {
        self.relay.stats()
    }

    pub fn activity_lit(&self) -> bool {
        self.relay.activity().is_lit()
    }

    /// Inbound frames that were malformed or had no handler in the
    /// current state.
    pub fn ignored_frames(&self) -> u32 {
        self.ignored_frames
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    pub fn watchdog(&self) -> &W {
        &self.watchdog
    }
}

/// Act on one inbound frame. Returns `false` if it was dropped.
fn dispatch<W: Watchdog + ?Sized>(
    frame: &[u8],
    handshake: &mut Handshake,
    scheduler: &mut Scheduler,
    watchdog: &mut W,
    now_ms: u64,
) -> bool {
    let envelope = match Envelope::decode(frame) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("dispatch: dropping frame: {}", e);
            return false;
        }
    };

    match envelope {
        Envelope::Restart => {
            info!("dispatch: restart requested at {=u64} ms", now_ms);
            watchdog.reboot_now();
            true
        }
        Envelope::InitResponse { interval_override } => {
            handshake.on_init_response(interval_override)
        }
        _ if !handshake.is_running() => {
            debug!("dispatch: {} before init, ignored", envelope.kind());
            false
        }
        Envelope::SendOutputReport {
            device,
            report_id,
            report,
        } => queue(scheduler, Pending::output(device, report_id, report)),
        Envelope::SetFeatureReport {
            device,
            report_id,
            report,
        } => queue(scheduler, Pending::set_feature(device, report_id, report)),
        Envelope::GetFeatureReport {
            device,
            report_id,
            len,
        } => queue(scheduler, Pending::get_feature(device, report_id, len)),
        other => {
            debug!("dispatch: unexpected {} from peer", other.kind());
            false
        }
    }
}

fn queue(scheduler: &mut Scheduler, pending: Result<Pending, Error>) -> bool {
    match pending.and_then(|p| scheduler.enqueue(p)) {
        Ok(()) => true,
        Err(e) => {
            warn!("dispatch: request rejected: {}", e);
            false
        }
    }
}
