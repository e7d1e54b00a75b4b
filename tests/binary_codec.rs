//! Tests for the binary frame encoding and its tokio-util codec impls.

use bytes::{Bytes, BytesMut};
use stomp_engine::{BinaryCodec, Body, CodecError, Command, Frame, WireMessage};
use tokio_util::codec::{Decoder, Encoder};

#[test]
fn serialize_layout_keeps_raw_body() {
    let frame = Frame::new(Command::Send)
        .header("destination", "/queue/bin")
        .binary_body(vec![0x00u8, 0xff, 0x10]);
    let bytes = BinaryCodec::serialize(&frame);
    let mut expected = b"SEND\ndestination:/queue/bin\n\n".to_vec();
    expected.extend_from_slice(&[0x00, 0xff, 0x10, 0x00]);
    assert_eq!(&bytes[..], &expected[..]);
}

#[test]
fn deserialize_binary_body_with_nuls() {
    let mut raw = b"MESSAGE\ndestination:/queue/bin\ncontent-length:4\n\n".to_vec();
    raw.extend_from_slice(&[0x01, 0x00, 0x02, 0xfe, 0x00]);
    let frame = BinaryCodec::deserialize(&raw).expect("deserialize");
    assert_eq!(frame.command, Command::Message);
    assert_eq!(frame.body, Body::Binary(Bytes::from_static(&[0x01, 0x00, 0x02, 0xfe])));
}

#[test]
fn deserialize_strips_only_one_nul() {
    let raw = b"MESSAGE\n\nab\0\0\n";
    let frame = BinaryCodec::deserialize(raw).expect("deserialize");
    assert_eq!(frame.body.as_bytes(), b"ab\0");
}

#[test]
fn deserialize_content_length_mismatch() {
    let raw = b"SEND\ncontent-length:5\n\nabc\0";
    match BinaryCodec::deserialize(raw) {
        Err(CodecError::LengthMismatch { declared, actual }) => {
            assert_eq!(declared, 5);
            assert_eq!(actual, 3);
        }
        other => panic!("expected LengthMismatch, got {:?}", other),
    }
}

#[test]
fn deserialize_ignores_unparseable_content_length() {
    let raw = b"SEND\ncontent-length:xyz\n\nhello\0";
    let frame = BinaryCodec::deserialize(raw).expect("deserialize");
    assert_eq!(frame.body.as_bytes(), b"hello");
}

#[test]
fn deserialize_without_body_separator() {
    let frame = BinaryCodec::deserialize(b"CONNECTED\nversion:1.1").expect("deserialize");
    assert_eq!(frame.command, Command::Connected);
    assert_eq!(frame.get_header("version"), Some("1.1"));
    assert!(frame.body.is_empty());
}

#[test]
fn deserialize_rejects_non_utf8_headers() {
    let raw = b"SEND\nkey:\xff\xfe\n\n\0";
    assert!(matches!(
        BinaryCodec::deserialize(raw),
        Err(CodecError::InvalidUtf8(_))
    ));
}

#[test]
fn deserialize_unknown_command() {
    assert!(matches!(
        BinaryCodec::deserialize(b"HELLO\n\n\0"),
        Err(CodecError::UnknownCommand(_))
    ));
}

#[test]
fn round_trip_with_content_length() {
    let body: Vec<u8> = (0u8..=255).collect();
    let frame = Frame::new(Command::Send)
        .header("destination", "/queue/bin")
        .header("content-length", body.len().to_string())
        .binary_body(body);
    let bytes = BinaryCodec::serialize(&frame);
    assert_eq!(BinaryCodec::deserialize(&bytes).expect("deserialize"), frame);
}

// =============================================================================
// tokio-util codec
// =============================================================================

#[test]
fn encoder_appends_to_buffer() {
    let mut codec = BinaryCodec;
    let mut buf = BytesMut::new();
    codec
        .encode(Frame::new(Command::Begin).header("transaction", "tx1"), &mut buf)
        .expect("encode");
    assert_eq!(&buf[..], b"BEGIN\ntransaction:tx1\n\n\0");
}

#[test]
fn decoder_consumes_whole_buffer() {
    let mut codec = BinaryCodec;
    let mut buf = BytesMut::from(&b"COMMIT\ntransaction:tx2\n\n\0"[..]);
    let frame = codec.decode(&mut buf).expect("decode").expect("frame");
    assert_eq!(frame.command, Command::Commit);
    assert_eq!(frame.get_header("transaction"), Some("tx2"));
    assert!(buf.is_empty());
    assert!(codec.decode(&mut buf).expect("decode").is_none());
}

#[test]
fn transaction_frames_through_codec() {
    let mut codec = BinaryCodec;
    for (command, tx) in [
        (Command::Begin, "tx-a"),
        (Command::Commit, "tx-a"),
        (Command::Abort, "tx-b"),
    ] {
        let mut buf = BytesMut::new();
        codec
            .encode(Frame::new(command).header("transaction", tx), &mut buf)
            .expect("encode");
        let frame = codec.decode(&mut buf).expect("decode").expect("frame");
        assert_eq!(frame.command, command);
        assert_eq!(frame.get_header("transaction"), Some(tx));
    }
}

// =============================================================================
// WireMessage
// =============================================================================

#[test]
fn wire_message_picks_encoding_from_body() {
    let text = Frame::new(Command::Send).text_body("hi");
    assert!(matches!(
        WireMessage::from_frame(&text).expect("encode"),
        WireMessage::Text(_)
    ));

    let binary = Frame::new(Command::Send).binary_body(vec![1u8, 2]);
    assert!(matches!(
        WireMessage::from_frame(&binary).expect("encode"),
        WireMessage::Binary(_)
    ));

    let empty = Frame::new(Command::Disconnect);
    assert_eq!(
        WireMessage::from_frame(&empty).expect("encode"),
        WireMessage::Text("DISCONNECT\n\n\0".to_string())
    );
}

#[test]
fn wire_message_decodes_with_matching_codec() {
    let msg = WireMessage::Binary(Bytes::from_static(b"MESSAGE\ncontent-length:2\n\nhi\0"));
    let frame = msg.to_frame().expect("decode");
    assert_eq!(frame.body, Body::Binary(Bytes::from_static(b"hi")));

    let msg = WireMessage::Text("MESSAGE\ncontent-length:9\n\nhi\0".to_string());
    let frame = msg.to_frame().expect("decode");
    assert_eq!(frame.body, Body::Text("hi".to_string()));
}
