use std::time::Duration;
use thiserror::Error;

use crate::body::BodyError;
use crate::codec::CodecError;
use crate::frame::{Command, Frame, headers, set_header};
use crate::options::{ClientOptions, negotiate_heartbeats, parse_heartbeat_header};
use crate::transport::TransportError;

/// Errors returned by client operations.
#[derive(Error, Debug)]
pub enum ConnError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Inbound or outbound framing error
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("body codec error: {0}")]
    Body(#[from] BodyError),
    /// `start` returned but the transport still reports not running
    #[error("connection is not open: transport not running after start")]
    NotRunning,
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Protocol-level connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    Open,
    Reconnecting,
}

/// Owns the connection state and the CONNECT header snapshot.
///
/// The machine never performs I/O. Callers ask it for the CONNECT frame to
/// send (`None` means the call is a no-op in the current state), send it, and
/// then report success with [`StateMachine::mark_open`].
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: ConnectionState,
    connect_headers: Vec<(String, String)>,
    version: Option<String>,
    heartbeat: (Option<Duration>, Option<Duration>),
    established: bool,
}

impl StateMachine {
    pub fn new(options: &ClientOptions) -> Self {
        Self {
            state: ConnectionState::Closed,
            connect_headers: options.connect_headers(),
            version: None,
            heartbeat: (None, None),
            established: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Protocol version from the last CONNECTED frame.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Negotiated `(outgoing, incoming)` heartbeat intervals.
    pub fn heartbeat(&self) -> (Option<Duration>, Option<Duration>) {
        self.heartbeat
    }

    /// True once a CONNECTED frame arrived for the current session.
    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Headers replayed on every CONNECT.
    pub fn connect_headers(&self) -> &[(String, String)] {
        &self.connect_headers
    }

    /// CONNECT frame for an explicit connect, or `None` unless `Closed`.
    ///
    /// Caller headers are merged into the snapshot first; a repeated key
    /// overwrites the stored value.
    pub fn connect_frame(&mut self, extra: &[(String, String)]) -> Option<Frame> {
        if self.state != ConnectionState::Closed {
            return None;
        }
        for (k, v) in extra {
            set_header(&mut self.connect_headers, k.as_str(), v.as_str());
        }
        Some(self.build_connect())
    }

    /// CONNECT frame replaying the stored snapshot, or `None` when `Open`.
    pub fn reconnect_frame(&self) -> Option<Frame> {
        if self.state == ConnectionState::Open {
            return None;
        }
        Some(self.build_connect())
    }

    /// CONNECT has been written to the transport.
    pub fn mark_open(&mut self) {
        self.state = ConnectionState::Open;
    }

    /// The transport came back after a drop.
    pub fn mark_reconnecting(&mut self) {
        self.state = ConnectionState::Reconnecting;
        self.established = false;
    }

    /// Record a CONNECTED frame; returns the negotiated version.
    ///
    /// The state is left alone: it only changes when CONNECT is written or
    /// the session is closed, so a late CONNECTED cannot reopen it.
    pub fn on_connected(&mut self, frame: &Frame) -> Option<String> {
        self.established = self.state != ConnectionState::Closed;
        self.version = frame.get_header(headers::VERSION).map(str::to_string);

        let client_hb = self
            .connect_headers
            .iter()
            .find(|(k, _)| k == headers::HEART_BEAT)
            .map(|(_, v)| v.as_str())
            .unwrap_or("0,0");
        let (cx, cy) = parse_heartbeat_header(client_hb);
        let (sx, sy) = parse_heartbeat_header(frame.get_header(headers::HEART_BEAT).unwrap_or("0,0"));
        self.heartbeat = negotiate_heartbeats(cx, cy, sx, sy);

        self.version.clone()
    }

    /// Disconnect, dispose, or transport close.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        self.version = None;
        self.heartbeat = (None, None);
        self.established = false;
    }

    fn build_connect(&self) -> Frame {
        Frame::new(Command::Connect).headers(self.connect_headers.iter().cloned())
    }
}
