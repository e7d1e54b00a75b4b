use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{Body, Command, Frame, UnknownCommand, headers, set_header};

/// Errors raised while converting between frames and wire payloads.
#[derive(Error, Debug)]
pub enum CodecError {
    /// `content-length` header disagrees with the decoded body.
    #[error("content-length mismatch: header declares {declared} bytes, body has {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),
    #[error("invalid utf8 in header block: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// A binary body that is not UTF-8 was handed to the text encoding.
    #[error("binary body is not valid utf8 and cannot be sent as a text frame")]
    NonTextBody,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<UnknownCommand> for CodecError {
    fn from(e: UnknownCommand) -> Self {
        CodecError::UnknownCommand(e.0)
    }
}

/// A single transport message in one of the two STOMP encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Text(String),
    Binary(Bytes),
}

impl WireMessage {
    /// Encode `frame` with the encoding its body calls for: binary bodies go
    /// through [`BinaryCodec`], everything else through [`TextCodec`].
    pub fn from_frame(frame: &Frame) -> Result<Self, CodecError> {
        match frame.body {
            Body::Binary(_) => Ok(WireMessage::Binary(BinaryCodec::serialize(frame))),
            _ => Ok(WireMessage::Text(TextCodec::serialize(frame)?)),
        }
    }

    /// Decode this message with the codec matching its kind.
    pub fn to_frame(&self) -> Result<Frame, CodecError> {
        match self {
            WireMessage::Text(s) => TextCodec::deserialize(s),
            WireMessage::Binary(b) => BinaryCodec::deserialize(b),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            WireMessage::Text(s) => s.len(),
            WireMessage::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Text encoding: the whole frame is a UTF-8 string.
///
/// Bodies are not binary-safe here; `content-length` is carried but never
/// checked on decode.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl TextCodec {
    /// `COMMAND\n` + `key:value\n`* + `\n` + body + NUL.
    ///
    /// A heartbeat serializes to a single EOL.
    pub fn serialize(frame: &Frame) -> Result<String, CodecError> {
        if frame.is_heartbeat() {
            return Ok("\n".to_string());
        }
        let body = frame.body.as_text().ok_or(CodecError::NonTextBody)?;
        let mut out = header_block(frame);
        out.push_str(body);
        out.push('\0');
        Ok(out)
    }

    /// Unframed payloads (no blank line) whose first line is not a command
    /// decode as heartbeats.
    pub fn deserialize(input: &str) -> Result<Frame, CodecError> {
        if is_keepalive(input.as_bytes()) {
            return Ok(Frame::heartbeat());
        }
        let input = input.trim_start_matches(['\r', '\n']);
        let (head, body) = split_text_head(input);
        let (command, hdrs) = match parse_head(head) {
            Ok(parsed) => parsed,
            Err(CodecError::UnknownCommand(_)) if body.is_none() => return Ok(Frame::heartbeat()),
            Err(e) => return Err(e),
        };
        let body = body.unwrap_or_default().trim_end_matches(['\r', '\n', '\0']);

        Ok(Frame {
            command,
            headers: hdrs,
            body: Body::Empty,
        }
        .text_body(body))
    }
}

/// Binary encoding: UTF-8 header block followed by raw body bytes.
///
/// Also usable as a `tokio_util` codec over whole transport messages: each
/// buffer handed to [`Decoder::decode`] is treated as one complete frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryCodec;

impl BinaryCodec {
    pub fn serialize(frame: &Frame) -> Bytes {
        let mut dst = BytesMut::with_capacity(frame.body.len() + 64);
        write_binary(frame, &mut dst);
        dst.freeze()
    }

    /// Split at the first `\n\n`, strip trailing EOLs then at most one NUL
    /// from the body, and check `content-length` when it parses.
    ///
    /// Unframed payloads (no blank line) whose first line is not a command
    /// decode as heartbeats.
    pub fn deserialize(input: &[u8]) -> Result<Frame, CodecError> {
        if is_keepalive(input) {
            return Ok(Frame::heartbeat());
        }
        let start = input
            .iter()
            .position(|b| !matches!(b, b'\r' | b'\n'))
            .unwrap_or(input.len());
        let input = &input[start..];

        let (head, body) = match input.windows(2).position(|w| w == b"\n\n") {
            Some(i) => (&input[..i], Some(&input[i + 2..])),
            None => (input, None),
        };
        let (command, hdrs) = match parse_head(std::str::from_utf8(head)?) {
            Ok(parsed) => parsed,
            Err(CodecError::UnknownCommand(_)) if body.is_none() => return Ok(Frame::heartbeat()),
            Err(e) => return Err(e),
        };
        let body = body.unwrap_or_default();

        let mut end = body.len();
        while end > 0 && matches!(body[end - 1], b'\r' | b'\n') {
            end -= 1;
        }
        if end > 0 && body[end - 1] == 0 {
            end -= 1;
        }
        let body = &body[..end];

        let declared = hdrs
            .iter()
            .find(|(k, _)| k == headers::CONTENT_LENGTH)
            .and_then(|(_, v)| v.trim().parse::<usize>().ok());
        if let Some(declared) = declared {
            if declared != body.len() {
                return Err(CodecError::LengthMismatch {
                    declared,
                    actual: body.len(),
                });
            }
        }

        Ok(Frame {
            command,
            headers: hdrs,
            body: Body::Empty,
        }
        .binary_body(Bytes::copy_from_slice(body)))
    }
}

impl Encoder<Frame> for BinaryCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        write_binary(&frame, dst);
        Ok(())
    }
}

impl Decoder for BinaryCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let message = src.split();
        Self::deserialize(&message).map(Some)
    }
}

fn write_binary(frame: &Frame, dst: &mut BytesMut) {
    if frame.is_heartbeat() {
        dst.put_u8(b'\n');
        return;
    }
    dst.extend_from_slice(header_block(frame).as_bytes());
    dst.extend_from_slice(frame.body.as_bytes());
    dst.put_u8(0);
}

/// Command line, header lines, and the blank separator line.
fn header_block(frame: &Frame) -> String {
    let mut out = String::with_capacity(64 + frame.body.len());
    out.push_str(frame.command.as_str());
    out.push('\n');
    for (k, v) in &frame.headers {
        out.push_str(k);
        out.push(':');
        out.push_str(v);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Payloads made only of EOLs and NULs (including empty ones) are heartbeats.
fn is_keepalive(input: &[u8]) -> bool {
    input.iter().all(|b| matches!(b, b'\r' | b'\n' | 0))
}

/// Returns the header block (command line included) and the remaining text
/// after the first blank line, or `None` when there is no blank line.
fn split_text_head(input: &str) -> (&str, Option<&str>) {
    let mut pos = 0usize;
    loop {
        let rest = &input[pos..];
        let Some(nl) = rest.find('\n') else {
            return (input, None);
        };
        let line = rest[..nl].trim_end_matches('\r');
        if line.is_empty() && pos > 0 {
            return (&input[..pos], Some(&rest[nl + 1..]));
        }
        pos += nl + 1;
    }
}

/// Parse the command line and `key:value` lines. Lines without a `:` are
/// skipped; parsing stops at the first empty line.
fn parse_head(head: &str) -> Result<(Command, Vec<(String, String)>), CodecError> {
    let head = head.trim_end_matches(['\0', '\r', '\n']);
    let mut lines = head.lines();
    let command: Command = lines.next().unwrap_or_default().parse()?;

    let mut hdrs: Vec<(String, String)> = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            set_header(&mut hdrs, k, v);
        }
    }
    Ok((command, hdrs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_text_head_finds_blank_line() {
        let (head, body) = split_text_head("SEND\na:b\n\nhello\0");
        assert_eq!(head, "SEND\na:b\n");
        assert_eq!(body, Some("hello\0"));
    }

    #[test]
    fn split_text_head_without_blank_line() {
        let (head, body) = split_text_head("CONNECTED\nversion:1.2");
        assert_eq!(head, "CONNECTED\nversion:1.2");
        assert_eq!(body, None);
    }

    #[test]
    fn parse_head_skips_malformed_lines() {
        let (cmd, hdrs) = parse_head("MESSAGE\nnocolon\nk:v:w\n").expect("parse");
        assert_eq!(cmd, Command::Message);
        assert_eq!(hdrs, vec![("k".to_string(), "v:w".to_string())]);
    }
}
