//! The STOMP engine: public operations, lazy reconnection, and inbound
//! dispatch.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::body::{BodyCodec, JsonCodec};
use crate::codec::WireMessage;
use crate::connection::{ConnError, ConnectionState, StateMachine};
use crate::frame::{Command, Frame, headers, set_header};
use crate::options::ClientOptions;
use crate::subscription::{FrameHandler, Subscription, SubscriptionRegistry, typed_handler};
use crate::transport::{DisconnectInfo, ReconnectKind, Transport, TransportEvent};

const EVENT_CAPACITY: usize = 256;
const SUBSCRIPTION_CAPACITY: usize = 64;

const TEXT_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";
const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Notifications published to every receiver from [`StompClient::events`].
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// CONNECTED received; carries the negotiated protocol version.
    Connected { version: Option<String> },
    Closed(DisconnectInfo),
    /// Every inbound payload, verbatim, before any decoding.
    MessageObserved(WireMessage),
    Reconnecting(ReconnectKind),
    /// ERROR frame from the broker.
    Error(Frame),
    Receipt(String),
    /// Frame with a destination nobody subscribed to.
    Unrouted(Frame),
    FrameError(String),
}

struct Inner<C> {
    transport: Arc<dyn Transport>,
    codec: Arc<C>,
    machine: Mutex<StateMachine>,
    registry: Mutex<SubscriptionRegistry>,
    /// Serializes connect/reconnect/disconnect so only one CONNECT is in
    /// flight at a time.
    handshake: Mutex<()>,
    events: broadcast::Sender<ClientEvent>,
}

/// STOMP client bound to one transport.
///
/// Cheap to clone; clones share the same connection. Outbound operations
/// other than `connect` re-establish the session first when it is not open.
pub struct StompClient<C: BodyCodec = JsonCodec> {
    inner: Arc<Inner<C>>,
}

impl<C: BodyCodec> Clone for StompClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl StompClient<JsonCodec> {
    /// Client with JSON bodies.
    pub fn new(transport: impl Transport, options: ClientOptions) -> Self {
        Self::with_body_codec(transport, options, JsonCodec)
    }
}

impl<C: BodyCodec> StompClient<C> {
    pub fn with_body_codec(transport: impl Transport, options: ClientOptions, codec: C) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                transport: Arc::new(transport),
                codec: Arc::new(codec),
                machine: Mutex::new(StateMachine::new(&options)),
                registry: Mutex::new(SubscriptionRegistry::new()),
                handshake: Mutex::new(()),
                events,
            }),
        }
    }

    /// A new independent receiver of client events.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.machine.lock().await.state()
    }

    /// Version from the last CONNECTED frame of the current session.
    pub async fn negotiated_version(&self) -> Option<String> {
        self.inner.machine.lock().await.version().map(str::to_string)
    }

    /// Negotiated `(outgoing, incoming)` heartbeat intervals.
    pub async fn negotiated_heartbeat(&self) -> (Option<Duration>, Option<Duration>) {
        self.inner.machine.lock().await.heartbeat()
    }

    pub async fn subscription_count(&self) -> usize {
        self.inner.registry.lock().await.len()
    }

    pub fn body_codec(&self) -> &C {
        &self.inner.codec
    }

    /// Start the transport if needed and send CONNECT.
    ///
    /// A no-op unless the client is `Closed`. `headers` are merged into the
    /// stored CONNECT headers (a repeated key overwrites) and replayed on
    /// every reconnect. The state becomes `Open` once CONNECT is written;
    /// [`ClientEvent::Connected`] follows when the broker answers.
    pub async fn connect(&self, headers: Vec<(String, String)>) -> Result<(), ConnError> {
        let _handshake = self.inner.handshake.lock().await;
        self.start_transport().await?;

        let frame = match self.inner.machine.lock().await.connect_frame(&headers) {
            Some(frame) => frame,
            None => {
                debug!("connect ignored: connection is not closed");
                return Ok(());
            }
        };
        self.send_frame(frame).await?;
        self.inner.machine.lock().await.mark_open();
        debug!("connection open");
        Ok(())
    }

    /// Re-send CONNECT with the stored headers unless already `Open`.
    pub async fn reconnect(&self) -> Result<(), ConnError> {
        let _handshake = self.inner.handshake.lock().await;
        self.start_transport().await?;

        let frame = match self.inner.machine.lock().await.reconnect_frame() {
            Some(frame) => frame,
            None => return Ok(()),
        };
        debug!("re-establishing session");
        self.send_frame(frame).await?;
        self.inner.machine.lock().await.mark_open();
        Ok(())
    }

    /// Send DISCONNECT, close, stop the transport, and drop all
    /// subscriptions.
    pub async fn disconnect(&self) -> Result<(), ConnError> {
        let _handshake = self.inner.handshake.lock().await;
        let sent = if self.inner.transport.is_running() {
            self.send_frame(Frame::new(Command::Disconnect)).await
        } else {
            Ok(())
        };
        self.shutdown().await?;
        sent
    }

    /// Close without sending DISCONNECT.
    pub async fn dispose(&self) -> Result<(), ConnError> {
        let _handshake = self.inner.handshake.lock().await;
        self.shutdown().await
    }

    async fn shutdown(&self) -> Result<(), ConnError> {
        self.inner.machine.lock().await.close();
        self.inner.registry.lock().await.clear();
        self.inner.transport.stop().await?;
        debug!("connection closed");
        Ok(())
    }

    /// Send a text body as-is.
    pub async fn send_text(
        &self,
        destination: &str,
        body: impl Into<String>,
        headers: Vec<(String, String)>,
    ) -> Result<(), ConnError> {
        let body = body.into();
        self.send_body(destination, headers, TEXT_CONTENT_TYPE, body.len(), |f| f.text_body(body))
            .await
    }

    /// Encode `payload` with the body codec and send it.
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        destination: &str,
        payload: &T,
        headers: Vec<(String, String)>,
    ) -> Result<(), ConnError> {
        let body = self.inner.codec.encode(payload)?;
        let content_type = self.inner.codec.content_type().to_string();
        self.send_body(destination, headers, &content_type, body.len(), |f| f.text_body(body))
            .await
    }

    /// Send a binary body using the binary wire encoding.
    pub async fn send_bytes(
        &self,
        destination: &str,
        body: impl Into<Bytes>,
        headers: Vec<(String, String)>,
    ) -> Result<(), ConnError> {
        let body = body.into();
        self.send_body(destination, headers, BINARY_CONTENT_TYPE, body.len(), |f| f.binary_body(body))
            .await
    }

    /// Shared SEND path: caller headers first, then `destination`,
    /// `content-type` (unless the caller set one) and `content-length`.
    async fn send_body(
        &self,
        destination: &str,
        mut hdrs: Vec<(String, String)>,
        content_type: &str,
        content_length: usize,
        with_body: impl FnOnce(Frame) -> Frame,
    ) -> Result<(), ConnError> {
        self.ensure_open().await?;

        set_header(&mut hdrs, headers::DESTINATION, destination);
        if !hdrs.iter().any(|(k, _)| k == headers::CONTENT_TYPE) {
            set_header(&mut hdrs, headers::CONTENT_TYPE, content_type);
        }
        set_header(&mut hdrs, headers::CONTENT_LENGTH, content_length.to_string());

        let frame = with_body(Frame::new(Command::Send).headers(hdrs));
        self.send_frame(frame).await
    }

    /// Route frames for `destination` to `handler`; returns the subscription
    /// id. Subscribing again to the same destination replaces the handler and
    /// unsubscribes the old id.
    pub async fn subscribe<F>(
        &self,
        destination: &str,
        headers: Vec<(String, String)>,
        handler: F,
    ) -> Result<String, ConnError>
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        self.subscribe_handler(destination, headers, Arc::new(handler))
            .await
    }

    /// Like [`subscribe`](Self::subscribe), decoding each body into `T` with
    /// the body codec first.
    pub async fn subscribe_typed<T, F>(
        &self,
        destination: &str,
        headers: Vec<(String, String)>,
        handler: F,
    ) -> Result<String, ConnError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T, &Frame) + Send + Sync + 'static,
    {
        let handler = typed_handler(self.inner.codec.clone(), handler);
        self.subscribe_handler(destination, headers, handler).await
    }

    /// Subscribe and receive frames through a [`Subscription`] stream.
    pub async fn subscribe_channel(
        &self,
        destination: &str,
        headers: Vec<(String, String)>,
    ) -> Result<Subscription<C>, ConnError> {
        let (tx, rx) = mpsc::channel::<Frame>(SUBSCRIPTION_CAPACITY);
        let dest = destination.to_string();
        let handler = move |frame: &Frame| {
            if tx.try_send(frame.clone()).is_err() {
                warn!(destination = %dest, "subscription channel full or closed, dropping frame");
            }
        };
        let id = self.subscribe(destination, headers, handler).await?;
        Ok(Subscription::new(
            id,
            destination.to_string(),
            rx,
            self.clone(),
        ))
    }

    async fn subscribe_handler(
        &self,
        destination: &str,
        hdrs: Vec<(String, String)>,
        handler: FrameHandler,
    ) -> Result<String, ConnError> {
        self.ensure_open().await?;

        // Register before SUBSCRIBE goes out so early MESSAGEs are routed.
        let (id, replaced) = self.inner.registry.lock().await.insert(destination, handler);

        let frame = Frame::new(Command::Subscribe)
            .headers(hdrs)
            .header(headers::DESTINATION, destination)
            .header(headers::ID, id.as_str());
        if let Err(e) = self.send_frame(frame).await {
            // the replaced subscription is still live on the broker
            self.inner
                .registry
                .lock()
                .await
                .rollback(destination, &id, replaced);
            return Err(e);
        }

        if let Some(old) = replaced {
            self.send_frame(Frame::new(Command::Unsubscribe).header(headers::ID, old.id()))
                .await?;
        }
        debug!(destination, id = %id, "subscribed");
        Ok(id)
    }

    /// Stop routing `destination` and send UNSUBSCRIBE for its id.
    pub async fn unsubscribe(&self, destination: &str) -> Result<(), ConnError> {
        self.ensure_open().await?;
        let id = self
            .inner
            .registry
            .lock()
            .await
            .remove(destination)
            .ok_or_else(|| {
                ConnError::Protocol(format!("no subscription for destination '{}'", destination))
            })?;
        self.send_frame(Frame::new(Command::Unsubscribe).header(headers::ID, id))
            .await
    }

    /// Unsubscribe `destination` only while it is still registered under `id`.
    pub(crate) async fn unsubscribe_id(&self, destination: &str, id: &str) -> Result<(), ConnError> {
        self.ensure_open().await?;
        if !self.inner.registry.lock().await.remove_if_id(destination, id) {
            debug!(destination, id, "subscription already replaced");
            return Ok(());
        }
        self.send_frame(Frame::new(Command::Unsubscribe).header(headers::ID, id))
            .await
    }

    /// Acknowledge a message by id, optionally inside a transaction.
    pub async fn ack(&self, id: &str, transaction: Option<&str>) -> Result<(), ConnError> {
        self.acknowledge(Command::Ack, id, transaction).await
    }

    pub async fn nack(&self, id: &str, transaction: Option<&str>) -> Result<(), ConnError> {
        self.acknowledge(Command::Nack, id, transaction).await
    }

    async fn acknowledge(
        &self,
        command: Command,
        id: &str,
        transaction: Option<&str>,
    ) -> Result<(), ConnError> {
        self.ensure_open().await?;
        let mut frame = Frame::new(command).header(headers::ID, id);
        if let Some(tx) = transaction {
            frame = frame.header(headers::TRANSACTION, tx);
        }
        self.send_frame(frame).await
    }

    /// Send BEGIN for `transaction_id`. SEND/ACK/NACK frames carrying the
    /// same `transaction` header belong to it until COMMIT or ABORT.
    pub async fn begin(&self, transaction_id: &str) -> Result<(), ConnError> {
        self.send_transaction_frame(Command::Begin, transaction_id)
            .await
    }

    pub async fn commit(&self, transaction_id: &str) -> Result<(), ConnError> {
        self.send_transaction_frame(Command::Commit, transaction_id)
            .await
    }

    pub async fn abort(&self, transaction_id: &str) -> Result<(), ConnError> {
        self.send_transaction_frame(Command::Abort, transaction_id)
            .await
    }

    async fn send_transaction_frame(
        &self,
        command: Command,
        transaction_id: &str,
    ) -> Result<(), ConnError> {
        self.ensure_open().await?;
        self.send_frame(Frame::new(command).header(headers::TRANSACTION, transaction_id))
            .await
    }

    /// Feed one transport notification into the engine.
    ///
    /// Subscription handlers run inside this call. Framing errors are
    /// returned and also published as [`ClientEvent::FrameError`].
    pub async fn handle_event(&self, event: TransportEvent) -> Result<(), ConnError> {
        match event {
            TransportEvent::Message(message) => self.handle_message(message).await,
            TransportEvent::Disconnected(info) => {
                debug!(%info, "transport disconnected");
                self.inner.machine.lock().await.close();
                self.inner.registry.lock().await.clear();
                self.publish(ClientEvent::Closed(info));
                Ok(())
            }
            TransportEvent::Reconnected(kind) => {
                if kind.is_initial() {
                    return Ok(());
                }
                debug!(?kind, "transport reconnected");
                self.publish(ClientEvent::Reconnecting(kind));
                self.inner.machine.lock().await.mark_reconnecting();
                self.reconnect().await
            }
        }
    }

    /// Spawn a task feeding `events` into [`handle_event`](Self::handle_event).
    pub fn attach(&self, mut events: mpsc::UnboundedReceiver<TransportEvent>) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = client.handle_event(event).await {
                    warn!(error = %e, "failed to handle transport event");
                }
            }
            debug!("transport event stream ended");
        })
    }

    async fn handle_message(&self, message: WireMessage) -> Result<(), ConnError> {
        self.publish(ClientEvent::MessageObserved(message.clone()));

        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                self.publish(ClientEvent::FrameError(e.to_string()));
                return Err(e.into());
            }
        };

        match frame.command {
            Command::Heartbeat => {
                trace!("heartbeat received");
                return Ok(());
            }
            Command::Connected => {
                let version = self.inner.machine.lock().await.on_connected(&frame);
                debug!(?version, "session established");
                self.publish(ClientEvent::Connected { version });
            }
            Command::Error => {
                warn!(
                    reason = frame.get_header(headers::MESSAGE).unwrap_or_default(),
                    "broker reported an error"
                );
                self.publish(ClientEvent::Error(frame.clone()));
            }
            Command::Receipt => {
                if let Some(id) = frame.get_header(headers::RECEIPT_ID) {
                    self.publish(ClientEvent::Receipt(id.to_string()));
                }
            }
            _ => {}
        }

        if let Some(destination) = frame.destination() {
            let handler = self.inner.registry.lock().await.resolve(destination);
            match handler {
                Some(handler) => handler(&frame),
                None => {
                    debug!(destination, "no subscription for destination, dropping frame");
                    self.publish(ClientEvent::Unrouted(frame.clone()));
                }
            }
        }
        Ok(())
    }

    async fn ensure_open(&self) -> Result<(), ConnError> {
        if self.state().await != ConnectionState::Open {
            debug!("connection not open, reconnecting");
            self.reconnect().await?;
        }
        Ok(())
    }

    async fn start_transport(&self) -> Result<(), ConnError> {
        if !self.inner.transport.is_running() {
            self.inner.transport.start().await?;
            if !self.inner.transport.is_running() {
                return Err(ConnError::NotRunning);
            }
        }
        Ok(())
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), ConnError> {
        let message = WireMessage::from_frame(&frame)?;
        debug!(command = %frame.command, "sending frame");
        self.inner.transport.send_message(message).await?;
        Ok(())
    }

    fn publish(&self, event: ClientEvent) {
        // no receivers is fine
        let _ = self.inner.events.send(event);
    }
}
