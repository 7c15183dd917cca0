use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::{guarded, ByteStream, CloseHandle, TransportError};

/// One accepted TCP connection
#[derive(Debug)]
pub struct TcpPort {
    stream: TcpStream,
    name: String,
    close: CloseHandle,
}

impl TcpPort {
    pub fn new(stream: TcpStream, close: CloseHandle) -> Self {
        let name = stream
            .peer_addr()
            .map(|addr| format!("tcp://{addr}"))
            .unwrap_or_else(|_| "tcp://<unknown>".to_string());
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY on {name}: {e}");
        }

        Self {
            stream,
            name,
            close,
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    pub fn close_handle(&self) -> &CloseHandle {
        &self.close
    }
}

#[async_trait]
impl ByteStream for TcpPort {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_exact(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<(), TransportError> {
        guarded(&self.close, timeout, self.stream.read_exact(buf))
            .await
            .map(|_| ())
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        guarded(&self.close, None, self.stream.write_all(data)).await
    }
}
