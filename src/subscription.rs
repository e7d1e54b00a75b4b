use futures::Stream;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::warn;

use crate::body::{BodyCodec, JsonCodec};
use crate::client::StompClient;
use crate::connection::ConnError;
use crate::frame::{Frame, headers};

/// Callback invoked with every frame routed to a destination.
pub type FrameHandler = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Prefix some brokers put in front of queue destinations they report back.
pub const AMQ_PREFIX: &str = "/amq";

/// A handler registered under a subscription id.
pub struct Registration {
    id: String,
    handler: FrameHandler,
}

impl Registration {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Destination -> handler map used to route inbound frames.
///
/// Ids are `sub-{N}` with `N` counting registrations since the registry was
/// last cleared, so an id is never handed out twice on one connection.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<String, Registration>,
    next_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `destination`.
    ///
    /// Returns the new subscription id and, when the destination was already
    /// registered, the entry it replaced.
    pub fn insert(
        &mut self,
        destination: impl Into<String>,
        handler: FrameHandler,
    ) -> (String, Option<Registration>) {
        let id = format!("sub-{}", self.next_id);
        self.next_id += 1;
        let replaced = self.entries.insert(
            destination.into(),
            Registration {
                id: id.clone(),
                handler,
            },
        );
        (id, replaced)
    }

    /// Undo an [`insert`](Self::insert) that still holds `id`, putting back
    /// the entry it replaced. Returns false if `id` was already superseded.
    pub fn rollback(
        &mut self,
        destination: &str,
        id: &str,
        previous: Option<Registration>,
    ) -> bool {
        if !self.remove_if_id(destination, id) {
            return false;
        }
        if let Some(previous) = previous {
            self.entries.insert(destination.to_string(), previous);
        }
        true
    }

    /// Remove the entry for `destination`, returning its id.
    pub fn remove(&mut self, destination: &str) -> Option<String> {
        self.entries.remove(destination).map(|e| e.id)
    }

    /// Remove the entry for `destination` only if it still carries `id`.
    pub fn remove_if_id(&mut self, destination: &str, id: &str) -> bool {
        if self.entries.get(destination).is_some_and(|e| e.id == id) {
            self.entries.remove(destination);
            true
        } else {
            false
        }
    }

    pub fn id_of(&self, destination: &str) -> Option<&str> {
        self.entries.get(destination).map(|e| e.id.as_str())
    }

    /// Look up the handler for an inbound destination.
    ///
    /// Exact match first, then the `/amq` variant: the prefix is stripped
    /// from destinations that carry it and prepended to those that don't.
    pub fn resolve(&self, destination: &str) -> Option<FrameHandler> {
        if let Some(entry) = self.entries.get(destination) {
            return Some(entry.handler.clone());
        }
        self.entries
            .get(&amq_fallback(destination))
            .map(|e| e.handler.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_id = 0;
    }
}

fn amq_fallback(destination: &str) -> String {
    match destination.strip_prefix(AMQ_PREFIX) {
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => format!("{AMQ_PREFIX}{destination}"),
    }
}

/// Wrap a typed callback into a raw frame handler that decodes the body
/// with `codec` first. Frames whose body does not decode are logged and
/// skipped.
pub fn typed_handler<T, C, F>(codec: Arc<C>, handler: F) -> FrameHandler
where
    T: DeserializeOwned + 'static,
    C: BodyCodec,
    F: Fn(T, &Frame) + Send + Sync + 'static,
{
    Arc::new(move |frame: &Frame| {
        let Some(text) = frame.body.as_text() else {
            warn!(destination = ?frame.destination(), "typed subscription got a non-text body");
            return;
        };
        match codec.decode::<T>(text) {
            Ok(value) => handler(value, frame),
            Err(e) => warn!(destination = ?frame.destination(), error = %e, "failed to decode message body"),
        }
    })
}

/// Handle returned by [`StompClient::subscribe_channel`].
///
/// Routed frames are buffered in a bounded channel; the handle is a
/// `Stream<Item = Frame>` and offers ack/nack helpers that delegate to the
/// client.
pub struct Subscription<C: BodyCodec = JsonCodec> {
    id: String,
    destination: String,
    receiver: mpsc::Receiver<Frame>,
    client: StompClient<C>,
}

impl<C: BodyCodec> Subscription<C> {
    pub(crate) fn new(
        id: String,
        destination: String,
        receiver: mpsc::Receiver<Frame>,
        client: StompClient<C>,
    ) -> Self {
        Self {
            id,
            destination,
            receiver,
            client,
        }
    }

    /// Returns the subscription id sent in SUBSCRIBE.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Consume the handle and return the underlying receiver.
    pub fn into_receiver(self) -> mpsc::Receiver<Frame> {
        self.receiver
    }

    /// Acknowledge `frame`, using its `ack` header (STOMP 1.2) or else its
    /// `message-id`.
    pub async fn ack(&self, frame: &Frame, transaction: Option<&str>) -> Result<(), ConnError> {
        let id = ack_id(frame)?;
        self.client.ack(id, transaction).await
    }

    pub async fn nack(&self, frame: &Frame, transaction: Option<&str>) -> Result<(), ConnError> {
        let id = ack_id(frame)?;
        self.client.nack(id, transaction).await
    }

    /// Stop routing this destination and send UNSUBSCRIBE for this id.
    ///
    /// A no-op if a later subscription has replaced this one.
    pub async fn unsubscribe(self) -> Result<(), ConnError> {
        self.client
            .unsubscribe_id(&self.destination, &self.id)
            .await
    }
}

fn ack_id(frame: &Frame) -> Result<&str, ConnError> {
    frame
        .get_header(headers::ACK)
        .or_else(|| frame.get_header(headers::MESSAGE_ID))
        .ok_or_else(|| ConnError::Protocol("frame has neither ack nor message-id header".into()))
}

impl<C: BodyCodec> Stream for Subscription<C> {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}
