//! End-to-end session tests against a scripted transport

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;

use kwlog_core::protocol::tables::FILLER_BAND;
use kwlog_core::protocol::testing::MockTransport;
use kwlog_core::protocol::{
    ProtocolError, Session, SessionConfig, SessionState, SlowInitTiming, DIAGNOSTIC_BAUD,
};

fn test_config() -> SessionConfig {
    SessionConfig {
        timing: SlowInitTiming {
            idle: Duration::from_millis(1),
            bit: Duration::from_millis(1),
            ack_delay: Duration::from_millis(1),
        },
        wait_timeout: Duration::from_millis(200),
        ..SessionConfig::default()
    }
}

/// A plausible 11-byte poll reply carrying the given raw value bytes
fn poll_reply(low: u8, high: u8) -> [u8; 11] {
    [0x02, 0x21, 0xF0, 0x13, 0x04, 0x61, 0xF0, 0x00, low, high, 0x00]
}

fn synchronized_transport() -> MockTransport {
    let mut mock = MockTransport::new();
    // Some bus noise before the sync byte, then the address complement
    mock.queue_response(&[0x00, 0x55, 0x8F]);
    mock.queue_response(&[0xEE]);
    mock
}

#[test]
fn test_connect_exchanges_sync_and_ack() {
    let mut mock = synchronized_transport();
    mock.queue_response(&[0u8; 10]); // keep queue aligned for later stages

    let mut session = Session::new(mock, test_config());
    session.connect().unwrap();
    assert_eq!(session.state(), SessionState::LineSynchronized);
}

#[test]
fn test_full_session_to_first_value() {
    let mut mock = synchronized_transport();
    mock.queue_response(&[0x11; 10]); // start session response
    mock.queue_response(&[0x22; 21]); // DDLI write response
    mock.queue_response(&[0x33; 111]); // data table write response
    mock.queue_response(&poll_reply(0x34, 0x01));

    let mut session = Session::new(mock, test_config());
    session.connect().unwrap();
    session.configure().unwrap();
    assert_eq!(session.state(), SessionState::TablesConfigured);

    let value = session.read_value().unwrap();
    assert_eq!(value, 77); // (0x01 * 256 + 0x34) / 4
    assert_eq!(session.state(), SessionState::Polling);
}

#[test]
fn test_wire_traffic_is_byte_exact() {
    let mut mock = synchronized_transport();
    mock.queue_response(&[0u8; 10]);
    mock.queue_response(&[0u8; 21]);
    mock.queue_response(&[0u8; 111]);
    mock.queue_response(&poll_reply(0x00, 0x00));

    let mut session = Session::new(mock, test_config());
    session.connect().unwrap();
    session.configure().unwrap();
    session.read_value().unwrap();

    let mock = session.into_transport();

    // Diagnostic rate applied after the slow init
    assert_eq!(mock.baud_changes, vec![DIAGNOSTIC_BAUD]);
    assert!(mock.configured_8n1);

    // Host acknowledgment after the sync byte
    assert_eq!(mock.writes[0], vec![0x70]);

    // startDiagnosticSession, framed
    assert_eq!(mock.writes[1], vec![0x03, 0x10, 0x86, 0x14, 0xAD]);

    // DDLI table write, framed (13-byte payload, checksum wraps to 0x00)
    assert_eq!(
        mock.writes[2],
        vec![0x0D, 0x3D, 0x38, 0x07, 0x92, 0x08, 0x41, 0x52, 0x01, 0x00, 0xA4, 0x6D, 0x38, 0x00, 0x00]
    );

    // Data table write: 0x00 pad + length 0x66 + 102-byte payload + checksum
    let data = &mock.writes[3];
    assert_eq!(data.len(), 105);
    assert_eq!(&data[..7], &[0x00, 0x66, 0x3D, 0x38, 0x6D, 0xA4, 0x61]);
    assert_eq!(&data[7..13], &[0x02, 0x41, 0x78, 0xF8, 0x00, 0x00]);
    assert!(data[13..data.len() - 1].iter().all(|b| FILLER_BAND.contains(b)));

    // Poll request, framed
    assert_eq!(mock.writes[4], vec![0x00, 0x02, 0x21, 0xF0, 0x13]);
}

#[test]
fn test_slow_init_waveform_for_default_address() {
    let mut mock = synchronized_transport();
    mock.queue_response(&[0u8; 10]);

    let mut session = Session::new(mock, test_config());
    session.connect().unwrap();

    let mock = session.into_transport();
    // idle, start condition, 0x11 LSB-first, release
    assert_eq!(
        mock.break_states,
        vec![false, true, false, true, true, true, false, true, true, true, false]
    );
}

#[test]
fn test_poll_retries_on_validation_mismatch() {
    let mut mock = synchronized_transport();
    mock.queue_response(&[0u8; 10]);
    mock.queue_response(&[0u8; 21]);
    mock.queue_response(&[0u8; 111]);
    let mut bad = poll_reply(0x34, 0x01);
    bad[5] = 0x7F; // negative response on the first attempt
    mock.queue_response(&bad);
    mock.queue_response(&poll_reply(0x34, 0x01));

    let mut session = Session::new(mock, test_config());
    session.connect().unwrap();
    session.configure().unwrap();

    assert_eq!(session.read_value().unwrap(), 77);
    // One retry: two poll frames on the wire after the three setup writes
    assert_eq!(session.into_transport().writes.len(), 6);
}

#[test]
fn test_poll_aborts_after_retry_budget() {
    let mut mock = synchronized_transport();
    mock.queue_response(&[0u8; 10]);
    mock.queue_response(&[0u8; 21]);
    mock.queue_response(&[0u8; 111]);
    let mut bad = poll_reply(0x00, 0x00);
    bad[6] = 0xAB;
    for _ in 0..4 {
        mock.queue_response(&bad);
    }

    let mut session = Session::new(mock, test_config());
    session.connect().unwrap();
    session.configure().unwrap();

    let err = session.read_value().unwrap_err();
    assert!(matches!(err, ProtocolError::ResponseMismatch { .. }));
    assert_eq!(session.state(), SessionState::Failed);
}

#[test]
fn test_poll_loop_honors_cancellation() {
    let mut mock = synchronized_transport();
    mock.queue_response(&[0u8; 10]);
    mock.queue_response(&[0u8; 21]);
    mock.queue_response(&[0u8; 111]);
    mock.queue_response(&poll_reply(0x10, 0x00));

    let mut session = Session::new(mock, test_config());
    session.connect().unwrap();
    session.configure().unwrap();

    let running = AtomicBool::new(true);
    let mut values = Vec::new();
    session
        .poll(&running, |v| {
            values.push(v);
            running.store(false, Ordering::SeqCst);
        })
        .unwrap();

    assert_eq!(values, vec![4]); // 0x10 / 4
}

#[test]
fn test_transport_fault_is_fatal() {
    let mut mock = MockTransport::new();
    mock.fail = true;

    let mut session = Session::new(mock, test_config());
    assert!(matches!(
        session.connect(),
        Err(ProtocolError::SerialError(_))
    ));
    assert_eq!(session.state(), SessionState::Failed);
}

#[test]
fn test_sync_timeout_surfaces_as_error() {
    // No sync byte ever arrives
    let mock = MockTransport::new();
    let mut session = Session::new(mock, test_config());

    let err = session.connect().unwrap_err();
    assert!(matches!(err, ProtocolError::Timeout(_)));
    assert_eq!(session.state(), SessionState::Failed);
}
