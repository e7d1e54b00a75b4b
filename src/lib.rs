//! STOMP client engine for message-oriented transports.
//!
//! The engine speaks STOMP over any [`Transport`] that moves whole text or
//! binary messages (typically a WebSocket). It builds and parses frames,
//! tracks the connection state, replays CONNECT after transport-level
//! reconnects, and routes inbound frames to per-destination handlers.
//!
//! ```ignore
//! let (transport, events) = WebSocketTransport::new("ws://localhost:15674/ws");
//! let client = StompClient::new(transport, ClientOptions::default().login("guest").passcode("guest"));
//! client.attach(events);
//! client.connect(Vec::new()).await?;
//! client.subscribe("/queue/test", Vec::new(), |frame| println!("{}", frame)).await?;
//! client.send_text("/queue/test", "hello", Vec::new()).await?;
//! ```

pub mod body;
pub mod client;
pub mod codec;
pub mod connection;
pub mod frame;
pub mod options;
pub mod subscription;
pub mod transport;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use body::{BodyCodec, BodyError, JsonCodec};
pub use client::{ClientEvent, StompClient};
pub use codec::{BinaryCodec, CodecError, TextCodec, WireMessage};
pub use connection::{ConnError, ConnectionState};
pub use frame::{Body, Command, Frame};
pub use options::{ClientOptions, Heartbeat, negotiate_heartbeats, parse_heartbeat_header};
pub use subscription::{Subscription, SubscriptionRegistry};
pub use transport::{
    DisconnectInfo, DisconnectKind, ReconnectKind, Transport, TransportError, TransportEvent,
};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;
