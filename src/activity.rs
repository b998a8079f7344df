//! Activity indicator - blinks the LED on report traffic.

/// Output side of the activity LED.
pub trait ActivityLed {
    fn set(&mut self, on: bool);
}

/// Decide whether a lit LED has been idle long enough to switch off.
pub fn led_should_turn_off(lit_at_ms: Option<u64>, now_ms: u64, idle_ms: u64) -> bool {
    match lit_at_ms {
        Some(lit_at) => now_ms.saturating_sub(lit_at) >= idle_ms,
        None => false,
    }
}

/// LED that is pulsed on each received report and turned off by the
/// poll loop once no report has arrived for `idle_ms`.
pub struct ActivityIndicator<L> {
    led: L,
    lit_at_ms: Option<u64>,
    idle_ms: u64,
}

impl<L: ActivityLed> ActivityIndicator<L> {
    pub fn new(mut led: L, idle_ms: u64) -> Self {
        led.set(false);
        Self {
            led,
            lit_at_ms: None,
            idle_ms,
        }
    }

    /// Record activity at `now_ms`.
    pub fn pulse(&mut self, now_ms: u64) {
        if self.lit_at_ms.is_none() {
            self.led.set(true);
        }
        self.lit_at_ms = Some(now_ms);
    }

    /// Switch the LED off if the idle window elapsed. Returns `true` when
    /// it was switched off by this call.
    pub fn off_if_idle(&mut self, now_ms: u64) -> bool {
        if !led_should_turn_off(self.lit_at_ms, now_ms, self.idle_ms) {
            return false;
        }
        self.led.set(false);
        self.lit_at_ms = None;
        true
    }

    pub fn is_lit(&self) -> bool {
        self.lit_at_ms.is_some()
    }

    pub fn led(&self) -> &L {
        &self.led
    }
}
