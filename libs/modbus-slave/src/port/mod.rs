//! Byte-stream and datagram ports under the framers
//!
//! A port moves raw bytes and nothing else. Framers own a [`ByteStream`];
//! the UDP host owns a [`DatagramSocket`]. Every real port is tied to a
//! [`CloseHandle`]; closing it turns the pending or next read into
//! [`TransportError::Closed`], which is the only stop signal a slave loop
//! honours.

mod mock;
#[cfg(feature = "serial")]
mod serial;
mod tcp;
mod udp;

pub use mock::{MockDatagramHandle, MockDatagramSocket, MockStream, MockStreamHandle};
#[cfg(feature = "serial")]
pub use serial::SerialLine;
pub use tcp::TcpPort;
pub use udp::UdpPort;

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
pub use errors::TransportError;
use tokio_util::sync::CancellationToken;

/// Ordered byte stream (serial line or TCP connection)
#[async_trait]
pub trait ByteStream: Send + fmt::Debug {
    /// Human-readable port name for logs
    fn name(&self) -> &str;

    /// Fill `buf` completely or fail
    ///
    /// `None` waits indefinitely.
    async fn read_exact(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<(), TransportError>;

    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Drop any bytes received but not yet read
    async fn discard_input_buffer(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait]
impl<S: ByteStream + ?Sized> ByteStream for Box<S> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    async fn read_exact(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<(), TransportError> {
        self.as_mut().read_exact(buf, timeout).await
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.as_mut().write_all(data).await
    }

    async fn discard_input_buffer(&mut self) -> Result<(), TransportError> {
        self.as_mut().discard_input_buffer().await
    }
}

/// Message-oriented socket; one receive yields one whole datagram
#[async_trait]
pub trait DatagramSocket: Send + Sync + fmt::Debug {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError>;

    async fn send_to(&self, data: &[u8], peer: SocketAddr) -> Result<usize, TransportError>;
}

/// Shared "close the underlying handle" signal
#[derive(Debug, Clone, Default)]
pub struct CloseHandle {
    token: CancellationToken,
}

impl CloseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the handle; idempotent
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the handle is closed
    pub async fn closed(&self) {
        self.token.cancelled().await;
    }

    /// Handle closed together with this one, but closable on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }
}

/// Run an I/O operation bounded by an optional timeout and the close handle
pub(crate) async fn guarded<T, F>(
    close: &CloseHandle,
    timeout: Option<Duration>,
    op: F,
) -> Result<T, TransportError>
where
    F: Future<Output = std::io::Result<T>>,
{
    if close.is_closed() {
        return Err(TransportError::Closed);
    }

    let bounded = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .map_err(|_| TransportError::Timeout(limit))?
                .map_err(TransportError::from),
            None => op.await.map_err(TransportError::from),
        }
    };

    tokio::select! {
        biased;
        () = close.closed() => Err(TransportError::Closed),
        result = bounded => result,
    }
}
