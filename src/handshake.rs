//! Initialization handshake state machine.
//!
//! ```text
//!   Uninitialized --InitResponse--> Running { interval_override }
//!        ^    |
//!        +----+ every step: send InitRequest, one read pass
//! ```
//!
//! `Running` is terminal; only a reboot returns to `Uninitialized`.
//! While uninitialized the only meaningful inbound commands are
//! InitResponse and Restart (the latter is handled by the dispatcher in
//! any state).

use crate::protocol::IntervalOverride;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Uninitialized,
    Running { interval_override: IntervalOverride },
}

/// Tracks the handshake and how many init requests it took.
pub struct Handshake {
    state: LinkState,
    requests_sent: u32,
}

impl Handshake {
    pub const fn new() -> Self {
        Self {
            state: LinkState::Uninitialized,
            requests_sent: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, LinkState::Running { .. })
    }

    pub fn interval_override(&self) -> Option<IntervalOverride> {
        match self.state {
            LinkState::Running { interval_override } => Some(interval_override),
            LinkState::Uninitialized => None,
        }
    }

    /// Count one transmitted InitRequest.
    pub fn note_request_sent(&mut self) {
        self.requests_sent = self.requests_sent.wrapping_add(1);
    }

    pub fn requests_sent(&self) -> u32 {
        self.requests_sent
    }

    /// Apply an InitResponse. Returns `true` if this moved the link to
    /// `Running`; responses arriving after that are ignored.
    pub fn on_init_response(&mut self, interval_override: IntervalOverride) -> bool {
        match self.state {
            LinkState::Uninitialized => {
                self.state = LinkState::Running { interval_override };
                info!(
                    "handshake: running after {} requests, interval override {} ms",
                    self.requests_sent,
                    interval_override.as_millis()
                );
                true
            }
            LinkState::Running { .. } => {
                debug!("handshake: duplicate InitResponse ignored");
                false
            }
        }
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninitialized() {
        let hs = Handshake::new();
        assert_eq!(hs.state(), LinkState::Uninitialized);
        assert!(!hs.is_running());
        assert_eq!(hs.interval_override(), None);
    }

    #[test]
    fn init_response_transitions_once() {
        let mut hs = Handshake::new();
        assert!(hs.on_init_response(IntervalOverride::from_millis(10)));
        assert_eq!(
            hs.state(),
            LinkState::Running {
                interval_override: IntervalOverride::from_millis(10)
            }
        );
        assert!(!hs.on_init_response(IntervalOverride::from_millis(1)));
        assert_eq!(
            hs.interval_override(),
            Some(IntervalOverride::from_millis(10))
        );
    }

    #[test]
    fn counts_requests() {
        let mut hs = Handshake::new();
        for _ in 0..3 {
            hs.note_request_sent();
        }
        assert_eq!(hs.requests_sent(), 3);
    }
}
