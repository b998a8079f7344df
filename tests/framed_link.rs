//! Bridge over a real framed byte stream instead of a frame-level mock.

mod common;

use std::collections::VecDeque;
use std::convert::Infallible;

use common::{MockHost, MockLed, MockWatchdog};
use embedded_io::{ErrorType, Read, ReadReady, Write};
use hid_relay::framing::{write_frame, FrameDecoder};
use hid_relay::handshake::LinkState;
use hid_relay::serial::FramedSerial;
use hid_relay::usb::{HostEvent, Payload};
use hid_relay::{Bridge, BridgeConfig, DeviceId, Envelope, IntervalOverride};

/// One UART as seen from this core: bytes the peer sent, bytes we sent.
#[derive(Default)]
struct Wire {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

impl ErrorType for Wire {
    type Error = Infallible;
}

impl Read for Wire {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl ReadReady for Wire {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.rx.is_empty())
    }
}

impl Write for Wire {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Wire {
    fn peer_sends(&mut self, envelope: &Envelope<'_>) {
        let mut staged = Vec::new();
        write_frame(&mut VecWriter(&mut staged), &common::encode(envelope)).unwrap();
        self.rx.extend(staged);
    }

    /// Decode everything this core transmitted so far.
    fn peer_receives(&mut self) -> Vec<Vec<u8>> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in self.tx.drain(..) {
            if let Some(frame) = decoder.push(byte) {
                frames.push(frame.to_vec());
            }
        }
        frames
    }
}

struct VecWriter<'a>(&'a mut Vec<u8>);

impl ErrorType for VecWriter<'_> {
    type Error = Infallible;
}

impl Write for VecWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

type WireBridge = Bridge<MockHost, FramedSerial<Wire>, MockWatchdog, MockLed>;

fn wire_bridge() -> WireBridge {
    Bridge::new(
        MockHost::default(),
        FramedSerial::new(Wire::default()),
        MockWatchdog::default(),
        MockLed::default(),
        BridgeConfig::default(),
    )
}

#[test]
fn handshake_and_report_over_the_wire() {
    let mut bridge = wire_bridge();
    bridge.poll(0);
    assert_eq!(bridge.serial_mut().inner_mut().peer_receives(), vec![vec![0]]);

    bridge
        .serial_mut()
        .inner_mut()
        .peer_sends(&Envelope::InitResponse {
            interval_override: IntervalOverride::from_millis(2),
        });
    bridge.poll(1);
    assert_eq!(
        bridge.state(),
        LinkState::Running {
            interval_override: IntervalOverride::from_millis(2)
        }
    );
    bridge.serial_mut().inner_mut().peer_receives();

    let dev = DeviceId::new(2, 0);
    bridge.host_mut().fire(HostEvent::ReportReceived {
        device: dev,
        // Zero bytes collide with the frame delimiter.
        report: Payload::capture(&[0x00, 0xC0, 0x00]),
    });
    bridge.poll(2);

    assert_eq!(
        bridge.serial_mut().inner_mut().peer_receives(),
        vec![vec![4, 2, 0, 0x00, 0xC0, 0x00]]
    );
    assert_eq!(bridge.host().rearms, vec![dev]);
}

#[test]
fn corrupted_frame_is_discarded_and_link_recovers() {
    let mut bridge = wire_bridge();
    bridge
        .serial_mut()
        .inner_mut()
        .peer_sends(&Envelope::InitResponse {
            interval_override: IntervalOverride::NONE,
        });
    bridge.poll(0);
    assert!(bridge.handshake().is_running());

    let wire = bridge.serial_mut().inner_mut();
    let start = wire.rx.len();
    wire.peer_sends(&Envelope::SendOutputReport {
        device: DeviceId::new(1, 0),
        report_id: 0,
        report: &[0x01],
    });
    // Delimiter, COBS overhead byte, tag, then dev_addr: corrupt the
    // address so the checksum no longer matches.
    wire.rx[start + 3] ^= 0x40;
    wire.peer_sends(&Envelope::SendOutputReport {
        device: DeviceId::new(1, 0),
        report_id: 0,
        report: &[0x02],
    });
    bridge.poll(1);

    assert_eq!(bridge.serial().frames_dropped(), 1);
    assert_eq!(
        bridge.host().submitted,
        vec![common::Submitted::Output(DeviceId::new(1, 0), 0, vec![0x02])]
    );
}
