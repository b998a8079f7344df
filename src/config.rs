//! Application-wide constants and compile-time configuration.
//!
//! Wire bounds, queue depths, timing parameters, and pin assignments
//! live here so they can be tuned in one place. Both cores must agree
//! on [`MAX_PAYLOAD_SIZE`].

use crate::protocol::MAX_HEADER_SIZE;
use crate::scheduler::DrainPolicy;

// Wire protocol

/// Largest raw payload (report or descriptor) one envelope may carry.
pub const MAX_PAYLOAD_SIZE: usize = 512;

/// Size of the shared transmit buffer: largest payload plus the largest
/// fixed header (`DeviceConnected`).
pub const TX_BUFFER_SIZE: usize = MAX_PAYLOAD_SIZE + MAX_HEADER_SIZE;

// Outbound report scheduler

/// Number of pending outbound operations the scheduler can hold.
pub const OUT_QUEUE_CAPACITY: usize = 16;

/// Maximum number of attached USB devices tracked for in-flight transfers.
pub const MAX_DEVICES: usize = 8;

/// How long an in-flight control transfer may go without a completion
/// callback before the device's transfer channel is released (ms).
pub const TRANSFER_TIMEOUT_MS: u64 = 1_000;

/// Queue drain discipline used unless overridden in `BridgeConfig`.
pub const DEFAULT_DRAIN_POLICY: DrainPolicy = DrainPolicy::PerDevice;

// Activity indicator

/// The activity LED is switched off after this long without a report (ms).
pub const ACTIVITY_LED_IDLE_MS: u64 = 50;

// USB host glue

/// HID interfaces the host stack can have mounted at once (`CFG_TUH_HID`
/// in the TinyUSB build).
pub const HID_INTERFACE_SLOTS: usize = 8;

/// Ring depth between TinyUSB callbacks and the poll loop. Reception is
/// only re-armed after a report was relayed, so each slot has at most one
/// report or mount waiting, plus a detach and a re-plug into the freed
/// slot. SOF ticks and transfer completions are stored outside the ring.
pub const HOST_EVENT_QUEUE_DEPTH: usize = 3 * HID_INTERFACE_SLOTS;

// Inter-core serial link

/// UART baud rate shared with the peer core.
pub const SERIAL_BAUD_RATE: u32 = 921_600;

/// Ring buffer sizes for the buffered UART driver.
pub const SERIAL_RX_BUFFER_SIZE: usize = 2048;
pub const SERIAL_TX_BUFFER_SIZE: usize = 2048;

/// Upper bound on byte chunks consumed in one non-blocking read pass.
pub const SERIAL_READ_CHUNKS_PER_PASS: usize = 8;

// GPIO pin assignments (RP2040)
//
// Logical names only; the `embassy_rp::peripherals::*` types are
// selected in `main.rs`.
//
//   UART1 TX (to peer RX)   → GPIO20
//   UART1 RX (from peer TX) → GPIO21
//   Activity LED            → GPIO25
