//! In-memory transport and frame helpers shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stomp_engine::{
    ClientEvent, ClientOptions, Command, Frame, StompClient, Transport, TransportError,
    TransportEvent, WireMessage,
};
use tokio::sync::broadcast;

#[derive(Default)]
struct MockInner {
    sent: Mutex<Vec<WireMessage>>,
    running: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_start: AtomicBool,
    stay_stopped: AtomicBool,
}

/// Records every outbound message. Clones share state, so a test keeps one
/// clone for inspection and hands the other to the client.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `start` calls fail.
    pub fn fail_start(&self, fail: bool) {
        self.inner.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Make `start` succeed without the transport becoming running.
    pub fn stay_stopped(&self, stay: bool) {
        self.inner.stay_stopped.store(stay, Ordering::SeqCst);
    }

    /// Simulate the socket going away underneath the client.
    pub fn drop_connection(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
    }

    pub fn starts(&self) -> usize {
        self.inner.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.inner.stops.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<WireMessage> {
        self.inner.sent.lock().unwrap().clone()
    }

    pub fn clear_sent(&self) {
        self.inner.sent.lock().unwrap().clear();
    }

    pub fn sent_frames(&self) -> Vec<Frame> {
        self.sent()
            .iter()
            .map(|m| m.to_frame().expect("client sent an undecodable frame"))
            .collect()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.sent_frames().iter().map(|f| f.command).collect()
    }

    pub fn last_frame(&self) -> Frame {
        self.sent_frames().pop().expect("nothing was sent")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn start(&self) -> Result<(), TransportError> {
        self.inner.starts.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_start.load(Ordering::SeqCst) {
            return Err(TransportError::Start("connection refused".into()));
        }
        if !self.inner.stay_stopped.load(Ordering::SeqCst) {
            self.inner.running.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.inner.stops.fetch_add(1, Ordering::SeqCst);
        self.inner.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        if !self.is_running() {
            return Err(TransportError::NotRunning);
        }
        self.inner.sent.lock().unwrap().push(WireMessage::Text(text));
        Ok(())
    }

    async fn send_bytes(&self, bytes: Bytes) -> Result<(), TransportError> {
        if !self.is_running() {
            return Err(TransportError::NotRunning);
        }
        self.inner
            .sent
            .lock()
            .unwrap()
            .push(WireMessage::Binary(bytes));
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}

pub fn client() -> (StompClient, MockTransport) {
    client_with(ClientOptions::default())
}

pub fn client_with(options: ClientOptions) -> (StompClient, MockTransport) {
    let mock = MockTransport::new();
    (StompClient::new(mock.clone(), options), mock)
}

pub fn inbound(text: &str) -> TransportEvent {
    TransportEvent::Message(WireMessage::Text(text.to_string()))
}

pub fn connected(version: &str) -> TransportEvent {
    inbound(&format!("CONNECTED\nversion:{}\nheart-beat:0,0\n\n\0", version))
}

pub fn message(destination: &str, body: &str) -> TransportEvent {
    inbound(&format!(
        "MESSAGE\ndestination:{}\nmessage-id:m-1\nsubscription:sub-0\n\n{}\0",
        destination, body
    ))
}

/// Everything published so far, without waiting.
pub fn drain(events: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
