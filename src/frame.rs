use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

/// Header names understood by the client.
pub mod headers {
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const ACCEPT_VERSION: &str = "accept-version";
    pub const VERSION: &str = "version";
    pub const HOST: &str = "host";
    pub const LOGIN: &str = "login";
    pub const PASSCODE: &str = "passcode";
    pub const HEART_BEAT: &str = "heart-beat";
    pub const ID: &str = "id";
    pub const ACK: &str = "ack";
    pub const TRANSACTION: &str = "transaction";
    pub const MESSAGE_ID: &str = "message-id";
    pub const RECEIPT_ID: &str = "receipt-id";
    pub const RECEIPT: &str = "receipt";
    pub const DESTINATION: &str = "destination";
    pub const SUBSCRIPTION: &str = "subscription";
    pub const MESSAGE: &str = "message";
}

/// STOMP commands.
///
/// `Heartbeat` never appears on the wire as text: it stands for an empty
/// keep-alive payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // client
    Connect,
    Stomp,
    Disconnect,
    Subscribe,
    Unsubscribe,
    Send,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    // server
    Connected,
    Message,
    Receipt,
    Error,
    Heartbeat,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Disconnect => "DISCONNECT",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Send => "SEND",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Heartbeat => "HEARTBEAT",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a command line does not name a known STOMP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cmd = match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "DISCONNECT" => Command::Disconnect,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "SEND" => Command::Send,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "CONNECTED" => Command::Connected,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "HEARTBEAT" => Command::Heartbeat,
            other => return Err(UnknownCommand(other.to_string())),
        };
        Ok(cmd)
    }
}

/// Frame body. A frame carries exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Binary(Bytes),
}

impl Body {
    /// Raw bytes of the body (empty slice for `Empty`).
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Text(s) => s.as_bytes(),
            Body::Binary(b) => b,
        }
    }

    /// Body as text, if it is text or UTF-8 binary.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Empty => Some(""),
            Body::Text(s) => Some(s),
            Body::Binary(b) => std::str::from_utf8(b).ok(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A STOMP frame: command, ordered headers with unique keys, and a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// STOMP command
    pub command: Command,
    /// Ordered headers as (key, value) pairs; keys are unique
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Frame {
    /// Create a new frame with the given command and empty headers/body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// The synthetic keep-alive frame.
    pub fn heartbeat() -> Self {
        Self::new(Command::Heartbeat)
    }

    /// Set a header (builder style).
    ///
    /// If the key is already present its value is replaced in place, so the
    /// original position is kept and the last write wins.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, key, value);
        self
    }

    /// Set every header from `headers` in order (builder style).
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in headers {
            set_header(&mut self.headers, k, v);
        }
        self
    }

    /// Set a text body. An empty string yields `Body::Empty`.
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.body = if body.is_empty() {
            Body::Empty
        } else {
            Body::Text(body)
        };
        self
    }

    /// Set a binary body. An empty buffer yields `Body::Empty`.
    pub fn binary_body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.body = if body.is_empty() {
            Body::Empty
        } else {
            Body::Binary(body)
        };
        self
    }

    /// Get the value of a header by name (case-sensitive).
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn destination(&self) -> Option<&str> {
        self.get_header(headers::DESTINATION)
    }

    pub fn is_heartbeat(&self) -> bool {
        self.command == Command::Heartbeat
    }
}

/// Insert or replace `key` in an ordered header list.
pub fn set_header(
    headers: &mut Vec<(String, String)>,
    key: impl Into<String>,
    value: impl Into<String>,
) {
    let key = key.into();
    let value = value.into();
    match headers.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => headers.push((key, value)),
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command: {}", self.command)?;
        for (k, v) in &self.headers {
            writeln!(f, "{}: {}", k, v)?;
        }
        match &self.body {
            Body::Binary(b) => writeln!(f, "Body ({} bytes, binary)", b.len()),
            body => writeln!(f, "Body ({} bytes)", body.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_round_trip() {
        for cmd in [
            Command::Connect,
            Command::Disconnect,
            Command::Subscribe,
            Command::Unsubscribe,
            Command::Send,
            Command::Ack,
            Command::Nack,
            Command::Connected,
            Command::Message,
            Command::Error,
            Command::Heartbeat,
        ] {
            assert_eq!(cmd.as_str().parse::<Command>(), Ok(cmd));
        }
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert_eq!(
            "send".parse::<Command>(),
            Err(UnknownCommand("send".to_string()))
        );
    }
}
