use std::net::SocketAddr;

use async_trait::async_trait;
use errors::{ModbusError, ModbusResult};
use tokio::net::UdpSocket;
use tracing::info;

use super::{guarded, CloseHandle, DatagramSocket, TransportError};

/// Bound UDP socket
#[derive(Debug)]
pub struct UdpPort {
    socket: UdpSocket,
    close: CloseHandle,
}

impl UdpPort {
    pub async fn bind(addr: &str, close: CloseHandle) -> ModbusResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| ModbusError::Io(format!("Failed to bind UDP socket {addr}: {e}")))?;
        info!("UDP socket bound to {addr}");
        Ok(Self::from_socket(socket, close))
    }

    pub fn from_socket(socket: UdpSocket, close: CloseHandle) -> Self {
        Self { socket, close }
    }

    pub fn local_addr(&self) -> ModbusResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl DatagramSocket for UdpPort {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        guarded(&self.close, None, self.socket.recv_from(buf)).await
    }

    async fn send_to(&self, data: &[u8], peer: SocketAddr) -> Result<usize, TransportError> {
        guarded(&self.close, None, self.socket.send_to(data, peer)).await
    }
}
