//! The duplex transport the engine runs on.
//!
//! A transport moves whole messages (text or binary) and reports what happens
//! to the underlying connection. Socket management, TLS, and any reconnection
//! policy live behind this trait; the engine only reacts to the events.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

use crate::codec::WireMessage;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to start transport: {0}")]
    Start(String),
    #[error("failed to send: {0}")]
    Send(String),
    #[error("transport is not running")]
    NotRunning,
    #[error("transport closed")]
    Closed,
}

/// Why a transport connection was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectKind {
    /// First connection after `start`.
    Initial,
    /// Recovered after the connection was lost.
    Lost,
    /// Recovered after a transport error.
    Error,
    /// Recovered after no message arrived for too long.
    NoMessageReceived,
    /// Reconnect requested by the server.
    ByServer,
    /// Reconnect requested by the application.
    ByUser,
}

impl ReconnectKind {
    pub fn is_initial(&self) -> bool {
        matches!(self, ReconnectKind::Initial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    /// Peer closed the connection.
    ByServer,
    /// Local side stopped the transport.
    ByUser,
    /// Socket or protocol error.
    Error,
    Lost,
}

/// Details of a transport-level disconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectInfo {
    pub kind: DisconnectKind,
    pub reason: Option<String>,
}

impl DisconnectInfo {
    pub fn new(kind: DisconnectKind, reason: Option<String>) -> Self {
        Self { kind, reason }
    }
}

impl fmt::Display for DisconnectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{:?}: {}", self.kind, reason),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

/// Notifications a transport delivers to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(WireMessage),
    Disconnected(DisconnectInfo),
    Reconnected(ReconnectKind),
}

/// Message-oriented duplex transport.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open the underlying connection. Calling it on a running transport is a
    /// no-op.
    async fn start(&self) -> Result<(), TransportError>;

    async fn stop(&self) -> Result<(), TransportError>;

    async fn send_text(&self, text: String) -> Result<(), TransportError>;

    async fn send_bytes(&self, bytes: Bytes) -> Result<(), TransportError>;

    fn is_running(&self) -> bool;

    /// Send one message in whichever encoding it carries.
    async fn send_message(&self, message: WireMessage) -> Result<(), TransportError> {
        match message {
            WireMessage::Text(text) => self.send_text(text).await,
            WireMessage::Binary(bytes) => self.send_bytes(bytes).await,
        }
    }
}
