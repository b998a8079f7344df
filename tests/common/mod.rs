//! Scripted collaborators for driving a `Bridge` on the host.

#![allow(dead_code)]

use std::collections::VecDeque;

use hid_relay::activity::ActivityLed;
use hid_relay::protocol::MAX_ENVELOPE_SIZE;
use hid_relay::serial::SerialTransport;
use hid_relay::usb::{HostEvent, UsbHost};
use hid_relay::{Bridge, BridgeConfig, DeviceId, Envelope, IntervalOverride, Watchdog};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    Output(DeviceId, u8, Vec<u8>),
    SetFeature(DeviceId, u8, Vec<u8>),
    GetFeature(DeviceId, u8, u16),
}

/// Host stack whose callbacks are scripted by the test.
#[derive(Default)]
pub struct MockHost {
    pub inits: Vec<IntervalOverride>,
    pub tasks: u32,
    /// Events released on the next `task()` call.
    pub script: VecDeque<HostEvent>,
    ready: VecDeque<HostEvent>,
    pub ids: Vec<(u8, (u16, u16))>,
    pub rearms: Vec<DeviceId>,
    pub submitted: Vec<Submitted>,
    /// When set, every submission is refused as if the pipe were busy.
    pub refuse: bool,
}

impl MockHost {
    pub fn fire(&mut self, event: HostEvent) {
        self.script.push_back(event);
    }

    fn accept(&mut self, submission: Submitted) -> bool {
        if self.refuse {
            return false;
        }
        self.submitted.push(submission);
        true
    }
}

impl UsbHost for MockHost {
    fn init(&mut self, interval_override: IntervalOverride) {
        self.inits.push(interval_override);
    }

    fn task(&mut self) {
        self.tasks += 1;
        self.ready.extend(self.script.drain(..));
    }

    fn take_event(&mut self) -> Option<HostEvent> {
        self.ready.pop_front()
    }

    fn vendor_product_id(&self, dev_addr: u8) -> Option<(u16, u16)> {
        self.ids
            .iter()
            .find(|(addr, _)| *addr == dev_addr)
            .map(|(_, id)| *id)
    }

    fn receive_report(&mut self, device: DeviceId) -> bool {
        self.rearms.push(device);
        true
    }

    fn send_output_report(&mut self, device: DeviceId, report_id: u8, report: &[u8]) -> bool {
        self.accept(Submitted::Output(device, report_id, report.to_vec()))
    }

    fn set_feature_report(&mut self, device: DeviceId, report_id: u8, report: &[u8]) -> bool {
        self.accept(Submitted::SetFeature(device, report_id, report.to_vec()))
    }

    fn get_feature_report(&mut self, device: DeviceId, report_id: u8, len: u16) -> bool {
        self.accept(Submitted::GetFeature(device, report_id, len))
    }
}

/// Frame-level serial link: frames queued by the test are delivered on
/// the next read pass, frames written by the bridge are recorded.
#[derive(Default)]
pub struct MockSerial {
    pub inbound: VecDeque<Vec<u8>>,
    pub outbound: Vec<Vec<u8>>,
}

impl MockSerial {
    pub fn push_raw(&mut self, frame: &[u8]) {
        self.inbound.push_back(frame.to_vec());
    }

    pub fn push(&mut self, envelope: &Envelope<'_>) {
        self.inbound.push_back(encode(envelope));
    }

    /// Tags of every frame written so far.
    pub fn sent_tags(&self) -> Vec<u8> {
        self.outbound.iter().map(|f| f[0]).collect()
    }

    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbound)
    }
}

impl SerialTransport for MockSerial {
    fn write(&mut self, frame: &[u8]) {
        self.outbound.push(frame.to_vec());
    }

    fn read_available(&mut self, on_frame: &mut dyn FnMut(&[u8])) -> bool {
        while let Some(frame) = self.inbound.pop_front() {
            on_frame(&frame);
        }
        false
    }
}

#[derive(Default)]
pub struct MockWatchdog {
    pub reboots: u32,
}

impl Watchdog for MockWatchdog {
    fn reboot_now(&mut self) {
        self.reboots += 1;
    }
}

#[derive(Default)]
pub struct MockLed {
    pub on: bool,
    pub writes: u32,
}

impl ActivityLed for MockLed {
    fn set(&mut self, on: bool) {
        self.on = on;
        self.writes += 1;
    }
}

pub type TestBridge = Bridge<MockHost, MockSerial, MockWatchdog, MockLed>;

pub fn encode(envelope: &Envelope<'_>) -> Vec<u8> {
    let mut buf = [0u8; MAX_ENVELOPE_SIZE];
    let n = envelope.encode(&mut buf).expect("encodable envelope");
    buf[..n].to_vec()
}

pub fn bridge() -> TestBridge {
    Bridge::new(
        MockHost::default(),
        MockSerial::default(),
        MockWatchdog::default(),
        MockLed::default(),
        BridgeConfig::default(),
    )
}

/// A bridge that already completed the handshake with no interval
/// override, with the handshake traffic cleared.
pub fn running_bridge() -> TestBridge {
    let mut bridge = bridge();
    bridge.serial_mut().push(&Envelope::InitResponse {
        interval_override: IntervalOverride::NONE,
    });
    bridge.poll(0);
    assert!(bridge.handshake().is_running());
    bridge.serial_mut().take_sent();
    bridge
}
