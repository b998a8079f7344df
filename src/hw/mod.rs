//! RP2040 implementations of the bridge's hardware traits.

pub mod tinyusb;

use embassy_rp::watchdog::Watchdog as RpWatchdog;
use embedded_hal::digital::OutputPin;
use hid_relay::activity::ActivityLed;
use hid_relay::Watchdog;

/// On-board LED used as the activity indicator.
pub struct StatusLed<P> {
    pin: P,
}

impl<P: OutputPin> StatusLed<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: OutputPin> ActivityLed for StatusLed<P> {
    fn set(&mut self, on: bool) {
        // GPIO writes on the RP2040 are infallible.
        let _ = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }
}

/// Immediate chip reset through the watchdog block.
pub struct Reboot {
    watchdog: RpWatchdog,
}

impl Reboot {
    pub fn new(watchdog: RpWatchdog) -> Self {
        Self { watchdog }
    }
}

impl Watchdog for Reboot {
    fn reboot_now(&mut self) {
        defmt::warn!("Restart requested by peer, rebooting");
        self.watchdog.trigger_reset();
        loop {
            cortex_m::asm::nop();
        }
    }
}
