//! [`Transport`] over a WebSocket connection (tokio-tungstenite).
//!
//! `start` connects and spawns a reader task that forwards every text or
//! binary message as a [`TransportEvent`]. When the peer closes or the socket
//! fails the transport reports `Disconnected` and stops; it never reconnects
//! by itself.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use crate::codec::WireMessage;
use crate::transport::{
    DisconnectInfo, DisconnectKind, ReconnectKind, Transport, TransportError, TransportEvent,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketTransport {
    url: String,
    writer: Mutex<Option<SplitSink<WsStream, Message>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl WebSocketTransport {
    /// Create a transport for `url` (`ws://` or `wss://`) and the receiver
    /// its events are delivered on. Nothing connects until `start`.
    pub fn new(url: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let transport = Self {
            url: url.into(),
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            events,
        };
        (transport, rx)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_ws(&self, message: Message) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(TransportError::NotRunning)?;
        sink.send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn start(&self) -> Result<(), TransportError> {
        if self.is_running() {
            return Ok(());
        }
        debug!(url = %self.url, "connecting websocket");
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Start(e.to_string()))?;
        let (sink, stream) = stream.split();

        *self.writer.lock().await = Some(sink);
        self.running.store(true, Ordering::SeqCst);

        let reader = tokio::spawn(read_loop(
            stream,
            self.running.clone(),
            self.events.clone(),
        ));
        if let Some(old) = self.reader.lock().await.replace(reader) {
            old.abort();
        }

        info!(url = %self.url, "websocket connected");
        let _ = self
            .events
            .send(TransportEvent::Reconnected(ReconnectKind::Initial));
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        if let Some(mut sink) = self.writer.lock().await.take() {
            if let Err(e) = sink.close().await {
                debug!(error = %e, "websocket close handshake failed");
            }
        }
        Ok(())
    }

    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.send_ws(Message::Text(text)).await
    }

    async fn send_bytes(&self, bytes: Bytes) -> Result<(), TransportError> {
        self.send_ws(Message::Binary(bytes.to_vec())).await
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    running: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let info = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let _ = events.send(TransportEvent::Message(WireMessage::Text(text)));
            }
            Some(Ok(Message::Binary(data))) => {
                let _ = events.send(TransportEvent::Message(WireMessage::Binary(Bytes::from(
                    data,
                ))));
            }
            Some(Ok(Message::Close(frame))) => {
                break DisconnectInfo::new(
                    DisconnectKind::ByServer,
                    frame.map(|f| f.reason.to_string()),
                );
            }
            // ping/pong are answered by tungstenite
            Some(Ok(_)) => {}
            Some(Err(e)) => break DisconnectInfo::new(DisconnectKind::Error, Some(e.to_string())),
            None => break DisconnectInfo::new(DisconnectKind::Lost, None),
        }
    };
    running.store(false, Ordering::SeqCst);
    info!(%info, "websocket disconnected");
    let _ = events.send(TransportEvent::Disconnected(info));
}
