use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use errors::{ModbusError, ModbusResult};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::{ModbusSlave, NoopObserver, RequestHandler, SlaveObserver};
use crate::port::{CloseHandle, TcpPort};

/// Pause after a failed accept so a persistent error does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept loop running one [`ModbusSlave`] per connection
///
/// All connections share the handler and observer. Each connection gets a
/// child of the slave's close handle, so closing the slave closes them all.
pub struct TcpSlave {
    listener: TcpListener,
    unit_id: u8,
    handler: Arc<dyn RequestHandler>,
    observer: Arc<dyn SlaveObserver>,
    close: CloseHandle,
}

impl TcpSlave {
    pub async fn bind(
        addr: &str,
        unit_id: u8,
        handler: Arc<dyn RequestHandler>,
        close: CloseHandle,
    ) -> ModbusResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ModbusError::Io(format!("Failed to bind TCP listener {addr}: {e}")))?;
        Ok(Self::from_listener(listener, unit_id, handler, close))
    }

    pub fn from_listener(
        listener: TcpListener,
        unit_id: u8,
        handler: Arc<dyn RequestHandler>,
        close: CloseHandle,
    ) -> Self {
        Self {
            listener,
            unit_id,
            handler,
            observer: Arc::new(NoopObserver),
            close,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SlaveObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn local_addr(&self) -> ModbusResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the close handle fires, then wait for them to end
    pub async fn listen(self) -> ModbusResult<()> {
        let local = self.local_addr()?;
        info!("Modbus TCP slave {} listening on {local}", self.unit_id);

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                () = self.close.closed() => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {},
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!("Accepted Modbus TCP connection from {peer}");
                        let port = TcpPort::new(stream, self.close.child());
                        let mut slave =
                            ModbusSlave::tcp(self.unit_id, port, Arc::clone(&self.handler))
                                .with_observer(Arc::clone(&self.observer));
                        connections.spawn(async move {
                            if let Err(e) = slave.listen().await {
                                warn!("Modbus TCP connection {peer} ended with error: {e}");
                            }
                            info!("Modbus TCP connection {peer} closed");
                        });
                    },
                    Err(e) => {
                        error!("Failed to accept TCP connection: {e}");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    },
                },
            }
        }

        while connections.join_next().await.is_some() {}
        info!("Modbus TCP slave {} on {local} stopped", self.unit_id);
        Ok(())
    }
}
