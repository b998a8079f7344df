//! Firmware entry point for the RP2040 USB-host core.
//!
//! Wires the hardware into a [`Bridge`] and spins its poll loop forever.
//! The loop never sleeps: it yields to the executor once per iteration
//! so the UART interrupt-driven buffers keep filling.

#![no_std]
#![no_main]

mod hw;

use defmt::info;
use embassy_executor::Spawner;
use embassy_futures::yield_now;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::UART1;
use embassy_rp::uart::{self, BufferedInterruptHandler, BufferedUart};
use embassy_rp::watchdog::Watchdog as RpWatchdog;
use embassy_time::Instant;
use hid_relay::config::{SERIAL_BAUD_RATE, SERIAL_RX_BUFFER_SIZE, SERIAL_TX_BUFFER_SIZE};
use hid_relay::serial::FramedSerial;
use hid_relay::{Bridge, BridgeConfig};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(struct Irqs {
    UART1_IRQ => BufferedInterruptHandler<UART1>;
});

static UART_TX_BUF: StaticCell<[u8; SERIAL_TX_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUF: StaticCell<[u8; SERIAL_RX_BUFFER_SIZE]> = StaticCell::new();

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    info!("hid-relay v{} starting", env!("CARGO_PKG_VERSION"));

    // ── Inter-core link ─────────────────────────────────────────────────
    let mut uart_config = uart::Config::default();
    uart_config.baudrate = SERIAL_BAUD_RATE;
    let uart = BufferedUart::new(
        p.UART1,
        Irqs,
        p.PIN_20,
        p.PIN_21,
        UART_TX_BUF.init([0; SERIAL_TX_BUFFER_SIZE]),
        UART_RX_BUF.init([0; SERIAL_RX_BUFFER_SIZE]),
        uart_config,
    );

    // ── Board peripherals ───────────────────────────────────────────────
    let led = hw::StatusLed::new(Output::new(p.PIN_25, Level::Low));
    let watchdog = hw::Reboot::new(RpWatchdog::new(p.WATCHDOG));
    let host = hw::tinyusb::TinyUsbHost::new(p.USB);

    let mut bridge = Bridge::new(
        host,
        FramedSerial::new(uart),
        watchdog,
        led,
        BridgeConfig::default(),
    );

    info!("Waiting for peer InitResponse");
    loop {
        bridge.poll(Instant::now().as_millis());
        yield_now().await;
    }
}
