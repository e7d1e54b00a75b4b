//! Unit tests for the public connection and error types.

use stomp_engine::body::{BodyCodec, BodyError, JsonCodec};
use stomp_engine::{CodecError, ConnError, ConnectionState, ReconnectKind, TransportError};

// =============================================================================
// ConnectionState Tests
// =============================================================================

#[test]
fn connection_state_defaults_to_closed() {
    assert_eq!(ConnectionState::default(), ConnectionState::Closed);
    assert_ne!(ConnectionState::Open, ConnectionState::Reconnecting);
}

#[test]
fn reconnect_kind_initial() {
    assert!(ReconnectKind::Initial.is_initial());
    assert!(!ReconnectKind::Lost.is_initial());
    assert!(!ReconnectKind::ByServer.is_initial());
}

// =============================================================================
// ConnError Tests
// =============================================================================

#[test]
fn conn_error_transport_from() {
    let err: ConnError = TransportError::Start("refused".into()).into();
    let display = format!("{}", err);
    assert!(display.contains("transport error"));
    assert!(display.contains("refused"));
}

#[test]
fn conn_error_codec_from() {
    let err: ConnError = CodecError::LengthMismatch {
        declared: 5,
        actual: 3,
    }
    .into();
    match err {
        ConnError::Codec(CodecError::LengthMismatch { declared, actual }) => {
            assert_eq!((declared, actual), (5, 3));
        }
        other => panic!("expected Codec variant, got {:?}", other),
    }
}

#[test]
fn conn_error_body_from() {
    let body_err = JsonCodec
        .decode::<u32>("not json")
        .expect_err("decode must fail");
    assert!(matches!(body_err, BodyError::Json(_)));
    let err: ConnError = body_err.into();
    assert!(format!("{}", err).contains("body codec error"));
}

#[test]
fn conn_error_not_running_display() {
    let display = format!("{}", ConnError::NotRunning);
    assert!(display.contains("not open"));
}

#[test]
fn conn_error_protocol_display() {
    let display = format!("{}", ConnError::Protocol("invalid frame".to_string()));
    assert!(display.contains("protocol error"));
    assert!(display.contains("invalid frame"));
}

#[test]
fn error_types_implement_error_trait() {
    fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
    assert_error::<ConnError>();
    assert_error::<CodecError>();
    assert_error::<TransportError>();
    assert_error::<BodyError>();
}

// =============================================================================
// Body codec
// =============================================================================

#[test]
fn json_codec_content_type() {
    assert_eq!(JsonCodec.content_type(), "application/json;charset=UTF-8");
}

#[test]
fn json_codec_encodes_unsized_values() {
    let encoded = JsonCodec.encode("quoted").expect("encode");
    assert_eq!(encoded, "\"quoted\"");
    let slice: &[u8] = &[1, 2];
    assert_eq!(JsonCodec.encode(slice).expect("encode"), "[1,2]");
}
