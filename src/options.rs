use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::frame::{headers, set_header};

/// Protocol versions offered when the caller does not choose.
pub const DEFAULT_ACCEPT_VERSION: &str = "1.0,1.1,1.2";

/// Heart-beat intervals advertised in CONNECT (`"send,receive"` in ms).
///
/// The default offers no outgoing heartbeats and asks for one from the
/// server every second (`0,1000`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub send_ms: u64,
    pub receive_ms: u64,
}

impl Heartbeat {
    pub fn new(send_ms: u64, receive_ms: u64) -> Self {
        Self {
            send_ms,
            receive_ms,
        }
    }

    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// Same interval in both directions.
    pub fn from_duration(interval: Duration) -> Self {
        let ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        Self::new(ms, ms)
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(0, 1000)
    }
}

impl fmt::Display for Heartbeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.send_ms, self.receive_ms)
    }
}

impl FromStr for Heartbeat {
    type Err = std::convert::Infallible;

    /// Lenient: missing or invalid fields become `0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (send_ms, receive_ms) = parse_heartbeat_header(s);
        Ok(Self::new(send_ms, receive_ms))
    }
}

/// Parse the STOMP `heart-beat` header value (format: "cx,cy").
///
/// Returns `(cx, cy)` in milliseconds. Missing or invalid fields default to
/// `0`.
pub fn parse_heartbeat_header(header: &str) -> (u64, u64) {
    let mut parts = header.split(',');
    let cx = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let cy = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    (cx, cy)
}

/// Negotiate heartbeat intervals between client and server.
///
/// Returns `(outgoing, incoming)`; each side is the maximum of the matching
/// client and server values, or `None` when either side disables it.
pub fn negotiate_heartbeats(
    client_out: u64,
    client_in: u64,
    server_out: u64,
    server_in: u64,
) -> (Option<Duration>, Option<Duration>) {
    let outgoing = if client_out == 0 || server_in == 0 {
        None
    } else {
        Some(Duration::from_millis(client_out.max(server_in)))
    };
    let incoming = if client_in == 0 || server_out == 0 {
        None
    } else {
        Some(Duration::from_millis(client_in.max(server_out)))
    };
    (outgoing, incoming)
}

/// Settings that make up the CONNECT handshake.
///
/// ```
/// use stomp_engine::{ClientOptions, Heartbeat};
///
/// let opts = ClientOptions::default()
///     .login("guest")
///     .passcode("guest")
///     .heartbeat(Heartbeat::new(0, 5000));
/// let headers = opts.connect_headers();
/// assert_eq!(headers[0], ("accept-version".to_string(), "1.0,1.1,1.2".to_string()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub accept_version: Option<String>,
    pub heartbeat: Heartbeat,
    pub host: Option<String>,
    pub login: Option<String>,
    pub passcode: Option<String>,
    /// Extra CONNECT headers, applied last.
    pub headers: Vec<(String, String)>,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_version(mut self, versions: impl Into<String>) -> Self {
        self.accept_version = Some(versions.into());
        self
    }

    pub fn heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    pub fn passcode(mut self, passcode: impl Into<String>) -> Self {
        self.passcode = Some(passcode.into());
        self
    }

    /// Add an extra CONNECT header; a repeated key overwrites.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, key, value);
        self
    }

    /// Initial connecting-header snapshot.
    pub fn connect_headers(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::new();
        set_header(
            &mut out,
            headers::ACCEPT_VERSION,
            self.accept_version
                .as_deref()
                .unwrap_or(DEFAULT_ACCEPT_VERSION),
        );
        set_header(&mut out, headers::HEART_BEAT, self.heartbeat.to_string());
        if let Some(host) = &self.host {
            set_header(&mut out, headers::HOST, host.as_str());
        }
        if let Some(login) = &self.login {
            set_header(&mut out, headers::LOGIN, login.as_str());
        }
        if let Some(passcode) = &self.passcode {
            set_header(&mut out, headers::PASSCODE, passcode.as_str());
        }
        for (k, v) in &self.headers {
            set_header(&mut out, k.as_str(), v.as_str());
        }
        out
    }
}
