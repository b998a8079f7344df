//! Cross-module invariants: buffer sizing and wire compatibility.

use crate::config::*;
use crate::error::{DecodeError, EncodeError, Error};
use crate::framing::MAX_WIRE_FRAME_SIZE;
use crate::protocol::{DeviceId, Envelope, MessageKind, MAX_ENVELOPE_SIZE, MAX_HEADER_SIZE};
use crate::BridgeConfig;

const ALL_KINDS: [MessageKind; 12] = [
    MessageKind::InitRequest,
    MessageKind::InitResponse,
    MessageKind::DeviceConnected,
    MessageKind::DeviceDisconnected,
    MessageKind::ReportReceived,
    MessageKind::Restart,
    MessageKind::StartOfFrame,
    MessageKind::SendOutputReport,
    MessageKind::GetFeatureReport,
    MessageKind::GetFeatureResponse,
    MessageKind::SetFeatureReport,
    MessageKind::SetFeatureComplete,
];

#[test]
fn tx_buffer_matches_largest_envelope() {
    assert_eq!(TX_BUFFER_SIZE, MAX_ENVELOPE_SIZE);
    let largest = ALL_KINDS.iter().map(|k| k.header_len()).max().unwrap();
    assert_eq!(largest, MAX_HEADER_SIZE);
    assert_eq!(MessageKind::DeviceConnected.header_len(), MAX_HEADER_SIZE);
}

#[test]
fn discriminants_are_dense_and_stable() {
    for (tag, kind) in ALL_KINDS.iter().enumerate() {
        let tag = tag as u8;
        let decoded = MessageKind::try_from(tag).unwrap();
        assert_eq!(decoded as u8, tag);
        assert_eq!(ALL_KINDS[usize::from(tag)] as u8, *kind as u8);
    }
    assert_eq!(
        MessageKind::try_from(12),
        Err(DecodeError::UnknownCommand(12))
    );
}

#[test]
fn uart_rings_hold_a_worst_case_frame() {
    assert!(SERIAL_RX_BUFFER_SIZE >= MAX_WIRE_FRAME_SIZE);
    assert!(SERIAL_TX_BUFFER_SIZE >= MAX_WIRE_FRAME_SIZE);
}

#[test]
fn bridge_config_defaults_come_from_constants() {
    let cfg = BridgeConfig::default();
    assert_eq!(cfg.drain_policy, DEFAULT_DRAIN_POLICY);
    assert_eq!(cfg.transfer_timeout_ms, TRANSFER_TIMEOUT_MS);
    assert_eq!(cfg.activity_idle_ms, ACTIVITY_LED_IDLE_MS);
}

#[test]
fn sub_errors_convert_into_error() {
    let e: Error = DecodeError::Empty.into();
    assert_eq!(e, Error::Decode(DecodeError::Empty));

    let e: Error = EncodeError::PayloadTooLarge { len: 600 }.into();
    assert_eq!(e, Error::Encode(EncodeError::PayloadTooLarge { len: 600 }));
}

#[test]
fn encode_reports_needed_space() {
    let mut small = [0u8; 3];
    let err = Envelope::DeviceConnected {
        vid: 1,
        pid: 2,
        device: DeviceId::new(1, 0),
        descriptor: &[0; 4],
    }
    .encode(&mut small)
    .unwrap_err();
    assert_eq!(
        err,
        EncodeError::BufferTooSmall {
            needed: 11,
            available: 3
        }
    );
    assert_eq!(small, [0; 3]);
}
