//! Hand-off between host stack callbacks and the poll loop.
//!
//! Callbacks fire inside `UsbHost::task` and may not relay anything
//! themselves, so every event they see is parked here until the loop
//! drains it. Nothing but start-of-frame ticks may be lost:
//!
//! - SOF ticks coalesce into one pending flag and never take a slot;
//! - control transfer completions get a slot of their own (the host glue
//!   runs at most one control transfer at a time);
//! - mounts, detaches and reports share the ring, which is sized so a
//!   worst-case burst fits (see [`HOST_EVENT_QUEUE_DEPTH`]).
//!
//! [`HOST_EVENT_QUEUE_DEPTH`]: crate::config::HOST_EVENT_QUEUE_DEPTH

use heapless::Deque;

use super::HostEvent;

pub struct EventQueue<const N: usize> {
    events: Deque<HostEvent, N>,
    completion: Option<HostEvent>,
    start_of_frame: bool,
}

impl<const N: usize> EventQueue<N> {
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            completion: None,
            start_of_frame: false,
        }
    }

    /// Park one event. Hands it back if there is no room for it.
    pub fn post(&mut self, event: HostEvent) -> Result<(), HostEvent> {
        match event {
            HostEvent::StartOfFrame => {
                self.start_of_frame = true;
                Ok(())
            }
            HostEvent::GetReportComplete { .. } | HostEvent::SetReportComplete { .. }
                if self.completion.is_none() =>
            {
                self.completion = Some(event);
                Ok(())
            }
            event => self.events.push_back(event),
        }
    }

    /// Next event for the poll loop. A pending SOF tick comes first, then
    /// the transfer completion, then the ring in arrival order.
    pub fn pop(&mut self) -> Option<HostEvent> {
        if core::mem::take(&mut self.start_of_frame) {
            return Some(HostEvent::StartOfFrame);
        }
        self.completion
            .take()
            .or_else(|| self.events.pop_front())
    }

    /// Events waiting in the ring.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.completion.is_none() && !self.start_of_frame
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
