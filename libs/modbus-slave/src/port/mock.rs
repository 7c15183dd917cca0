//! In-memory ports for tests
//!
//! Both mocks are split into the port itself (handed to a framer or host)
//! and a cloneable handle the test keeps to feed input and inspect output.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use super::{ByteStream, DatagramSocket, TransportError};

#[derive(Debug)]
enum Inbound {
    Burst(Vec<u8>),
    Fault(TransportError),
}

#[derive(Debug, Default)]
struct MockStreamState {
    /// Bursts not yet touched by a read
    inbound: VecDeque<Inbound>,
    /// Remainder of the burst currently being read
    pending: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    discards: usize,
    closed: bool,
}

/// Scripted byte stream
///
/// Reads consume queued bursts in order and may span several bursts. An
/// exhausted queue reads as a timeout, or as `Closed` once the handle has
/// been closed. Closing never fails writes, so a script can queue its input,
/// close, and still collect every response. Discarding the input buffer drops
/// the unread remainder of the current burst only.
#[derive(Debug)]
pub struct MockStream {
    name: String,
    state: Arc<Mutex<MockStreamState>>,
}

/// Test side of a [`MockStream`]
#[derive(Debug, Clone)]
pub struct MockStreamHandle {
    state: Arc<Mutex<MockStreamState>>,
}

impl MockStream {
    pub fn new(name: impl Into<String>) -> (Self, MockStreamHandle) {
        let state = Arc::new(Mutex::new(MockStreamState::default()));
        (
            Self {
                name: name.into(),
                state: Arc::clone(&state),
            },
            MockStreamHandle { state },
        )
    }
}

impl MockStreamHandle {
    /// Queue bytes as they would arrive in one burst
    pub async fn push_bytes(&self, data: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .await
            .inbound
            .push_back(Inbound::Burst(data.into()));
    }

    /// Queue a read failure
    pub async fn push_fault(&self, fault: TransportError) {
        self.state
            .lock()
            .await
            .inbound
            .push_back(Inbound::Fault(fault));
    }

    /// Reads fail with `Closed` once queued input is consumed
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
    }

    /// Every `write_all` call, in order
    pub async fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().await.written.clone()
    }

    pub async fn discard_count(&self) -> usize {
        self.state.lock().await.discards
    }
}

#[async_trait]
impl ByteStream for MockStream {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_exact(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        let mut filled = 0;

        while filled < buf.len() {
            if let Some(byte) = state.pending.pop_front() {
                buf[filled] = byte;
                filled += 1;
                continue;
            }

            match state.inbound.pop_front() {
                Some(Inbound::Burst(bytes)) => state.pending.extend(bytes),
                Some(Inbound::Fault(fault)) => return Err(fault),
                None if state.closed => return Err(TransportError::Closed),
                None => return Err(TransportError::Timeout(timeout.unwrap_or_default())),
            }
        }
        Ok(())
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.state.lock().await.written.push(data.to_vec());
        Ok(())
    }

    async fn discard_input_buffer(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        let dropped = state.pending.len();
        state.pending.clear();
        state.discards += 1;
        debug!("{}: discarded {dropped} buffered bytes", self.name);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockDatagramState {
    inbound: VecDeque<(Vec<u8>, SocketAddr)>,
    sent: Vec<(Vec<u8>, SocketAddr)>,
    closed: bool,
}

/// Scripted datagram socket
///
/// `recv_from` waits for a queued datagram; once the handle is closed and
/// the queue drained it fails with `Closed`.
#[derive(Debug)]
pub struct MockDatagramSocket {
    state: Arc<Mutex<MockDatagramState>>,
    notify: Arc<Notify>,
}

/// Test side of a [`MockDatagramSocket`]
#[derive(Debug, Clone)]
pub struct MockDatagramHandle {
    state: Arc<Mutex<MockDatagramState>>,
    notify: Arc<Notify>,
}

impl MockDatagramSocket {
    pub fn new() -> (Self, MockDatagramHandle) {
        let state = Arc::new(Mutex::new(MockDatagramState::default()));
        let notify = Arc::new(Notify::new());
        (
            Self {
                state: Arc::clone(&state),
                notify: Arc::clone(&notify),
            },
            MockDatagramHandle { state, notify },
        )
    }
}

impl MockDatagramHandle {
    pub async fn push_datagram(&self, data: impl Into<Vec<u8>>, peer: SocketAddr) {
        self.state
            .lock()
            .await
            .inbound
            .push_back((data.into(), peer));
        self.notify.notify_one();
    }

    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_one();
    }

    /// Every datagram sent, with its destination
    pub async fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.state.lock().await.sent.clone()
    }
}

#[async_trait]
impl DatagramSocket for MockDatagramSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some((data, peer)) = state.inbound.pop_front() {
                    // Oversized datagrams are truncated like a real socket
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    return Ok((len, peer));
                }
                if state.closed {
                    return Err(TransportError::Closed);
                }
            }
            self.notify.notified().await;
        }
    }

    async fn send_to(&self, data: &[u8], peer: SocketAddr) -> Result<usize, TransportError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.sent.push((data.to_vec(), peer));
        Ok(data.len())
    }
}
