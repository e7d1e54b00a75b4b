//! Tests for the text frame encoding.

use bytes::Bytes;
use stomp_engine::{Body, CodecError, Command, Frame, TextCodec};

// =============================================================================
// Serialize
// =============================================================================

#[test]
fn serialize_layout() {
    let frame = Frame::new(Command::Send)
        .header("destination", "/queue/a")
        .header("content-type", "text/plain")
        .text_body("hi");
    let text = TextCodec::serialize(&frame).expect("serialize");
    assert_eq!(
        text,
        "SEND\ndestination:/queue/a\ncontent-type:text/plain\n\nhi\0"
    );
}

#[test]
fn serialize_without_headers_or_body() {
    let text = TextCodec::serialize(&Frame::new(Command::Disconnect)).expect("serialize");
    assert_eq!(text, "DISCONNECT\n\n\0");
}

#[test]
fn serialize_heartbeat_is_single_eol() {
    assert_eq!(
        TextCodec::serialize(&Frame::heartbeat()).expect("serialize"),
        "\n"
    );
}

#[test]
fn serialize_utf8_binary_body_as_text() {
    let frame = Frame::new(Command::Send).binary_body(Bytes::from_static(b"ok"));
    assert_eq!(
        TextCodec::serialize(&frame).expect("serialize"),
        "SEND\n\nok\0"
    );
}

#[test]
fn serialize_rejects_non_utf8_body() {
    let frame = Frame::new(Command::Send).binary_body(vec![0xffu8, 0x00]);
    assert!(matches!(
        TextCodec::serialize(&frame),
        Err(CodecError::NonTextBody)
    ));
}

// =============================================================================
// Deserialize
// =============================================================================

#[test]
fn deserialize_connected_frame() {
    let frame = TextCodec::deserialize("CONNECTED\nversion:1.2\n\n\0").expect("deserialize");
    assert_eq!(frame.command, Command::Connected);
    assert_eq!(frame.get_header("version"), Some("1.2"));
    assert_eq!(frame.body, Body::Empty);
}

#[test]
fn deserialize_message_with_body() {
    let frame = TextCodec::deserialize(
        "MESSAGE\ndestination:/queue/a\nmessage-id:7\nsubscription:sub-0\n\n{\"n\":1}\0",
    )
    .expect("deserialize");
    assert_eq!(frame.command, Command::Message);
    assert_eq!(frame.destination(), Some("/queue/a"));
    assert_eq!(frame.get_header("message-id"), Some("7"));
    assert_eq!(frame.body.as_text(), Some("{\"n\":1}"));
}

#[test]
fn deserialize_header_value_keeps_extra_colons() {
    let frame = TextCodec::deserialize("MESSAGE\nurl:http://host:8080/x\n\n\0").expect("deserialize");
    assert_eq!(frame.get_header("url"), Some("http://host:8080/x"));
}

#[test]
fn deserialize_skips_lines_without_colon() {
    let frame = TextCodec::deserialize("MESSAGE\ngarbage\nk:v\n\n\0").expect("deserialize");
    assert_eq!(frame.headers, vec![("k".to_string(), "v".to_string())]);
}

#[test]
fn deserialize_repeated_header_last_wins() {
    let frame = TextCodec::deserialize("MESSAGE\nk:1\nk:2\n\n\0").expect("deserialize");
    assert_eq!(frame.headers.len(), 1);
    assert_eq!(frame.get_header("k"), Some("2"));
}

#[test]
fn deserialize_crlf_line_endings() {
    let frame =
        TextCodec::deserialize("MESSAGE\r\ndestination:/queue/a\r\n\r\nbody\0").expect("deserialize");
    assert_eq!(frame.destination(), Some("/queue/a"));
    assert_eq!(frame.body.as_text(), Some("body"));
}

#[test]
fn deserialize_skips_leading_eols() {
    let frame = TextCodec::deserialize("\n\r\nRECEIPT\nreceipt-id:9\n\n\0").expect("deserialize");
    assert_eq!(frame.command, Command::Receipt);
    assert_eq!(frame.get_header("receipt-id"), Some("9"));
}

#[test]
fn deserialize_strips_trailing_nul_and_eols() {
    let frame = TextCodec::deserialize("MESSAGE\n\nhello\0\n\n").expect("deserialize");
    assert_eq!(frame.body.as_text(), Some("hello"));
}

#[test]
fn deserialize_without_terminator() {
    let frame = TextCodec::deserialize("ERROR\nmessage:bad\n\noops").expect("deserialize");
    assert_eq!(frame.command, Command::Error);
    assert_eq!(frame.body.as_text(), Some("oops"));
}

#[test]
fn deserialize_does_not_check_content_length() {
    let frame = TextCodec::deserialize("MESSAGE\ncontent-length:99\n\nabc\0").expect("deserialize");
    assert_eq!(frame.body.as_text(), Some("abc"));
}

#[test]
fn deserialize_unknown_command() {
    match TextCodec::deserialize("BOGUS\n\n\0") {
        Err(CodecError::UnknownCommand(cmd)) => assert_eq!(cmd, "BOGUS"),
        other => panic!("expected UnknownCommand, got {:?}", other),
    }
}

#[test]
fn round_trip_preserves_frame() {
    let frame = Frame::new(Command::Send)
        .header("destination", "/topic/x")
        .header("transaction", "tx-1")
        .text_body("line one\nline two");
    let text = TextCodec::serialize(&frame).expect("serialize");
    assert_eq!(TextCodec::deserialize(&text).expect("deserialize"), frame);
}
