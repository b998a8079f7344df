//! USB-host half of a dual-core HID relay.
//!
//! This core enumerates HID devices on its USB host port and forwards
//! everything it sees (attach, detach, input reports, start-of-frame
//! ticks, feature report answers) to a peer core over a framed serial
//! link. In the other direction it accepts output and feature report
//! requests from the peer and queues them onto the host stack.
//!
//! Everything in this crate is hardware independent and runs on the host
//! with `cargo test`. The embedded binary in `main.rs` (feature
//! `embedded`) plugs the RP2040 UART, watchdog, LED and TinyUSB host into
//! the traits defined here.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module below.
mod fmt;

// ═══════════════════════════════════════════════════════════════════════════
// Wire Layer
// ═══════════════════════════════════════════════════════════════════════════

pub mod config;
pub mod error;
pub mod framing;
pub mod protocol;
pub mod serial;

// ═══════════════════════════════════════════════════════════════════════════
// Host Side
// ═══════════════════════════════════════════════════════════════════════════

pub mod activity;
pub mod bridge;
pub mod handshake;
pub mod relay;
pub mod scheduler;
pub mod usb;

pub use bridge::{Bridge, BridgeConfig, Watchdog};
pub use error::Error;
pub use protocol::{DeviceId, Envelope, IntervalOverride, MessageKind};

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests;
