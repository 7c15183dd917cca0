use std::net::SocketAddr;
use std::sync::Arc;

use errors::{ModbusError, ModbusResult, TransportError};
use tracing::{debug, info};

use super::{
    decode_inbound, execute, log_cycle_error, Inbound, NoopObserver, RequestHandler,
    SlaveObserver, SlaveState,
};
use crate::framer::{build_datagram, parse_datagram};
use crate::message::Response;
use crate::port::DatagramSocket;

/// Largest datagram accepted: MBAP header + unit id + 253-byte PDU
pub const MAX_DATAGRAM_SIZE: usize = 260;

/// Where the single request/response exchange currently is
enum Exchange {
    Receiving,
    Sending {
        frame: Vec<u8>,
        peer: SocketAddr,
        response: Response,
    },
}

/// Datagram slave
///
/// One exchange is in flight at a time: the next receive is armed only after
/// the previous response has been sent. Responses carry the transaction id
/// of their own request, so masters can match them whatever order the
/// datagrams arrived in.
pub struct UdpSlave<D> {
    unit_id: u8,
    socket: D,
    handler: Arc<dyn RequestHandler>,
    observer: Arc<dyn SlaveObserver>,
    state: SlaveState,
}

impl<D: DatagramSocket> UdpSlave<D> {
    pub fn new(unit_id: u8, socket: D, handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            unit_id,
            socket,
            handler,
            observer: Arc::new(NoopObserver),
            state: SlaveState::Listening,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SlaveObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> SlaveState {
        self.state
    }

    /// Exchange datagrams until the socket is closed
    pub async fn listen(&mut self) -> ModbusResult<()> {
        info!("Modbus UDP slave {} listening", self.unit_id);

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut exchange = Exchange::Receiving;

        while self.state == SlaveState::Listening {
            exchange = match exchange {
                Exchange::Receiving => match self.socket.recv_from(&mut buf).await {
                    Ok((len, peer)) => self.on_received(&buf[..len], peer).await,
                    Err(e) => self.on_socket_error(e),
                },
                Exchange::Sending {
                    frame,
                    peer,
                    response,
                } => match self.socket.send_to(&frame, peer).await {
                    Ok(_) => {
                        self.observer.response_sent(&response);
                        Exchange::Receiving
                    },
                    Err(e) => self.on_socket_error(e),
                },
            };
        }
        Ok(())
    }

    async fn on_received(&self, datagram: &[u8], peer: SocketAddr) -> Exchange {
        match self.handle_datagram(datagram, peer).await {
            Ok(Some(response)) => Exchange::Sending {
                frame: build_datagram(&response),
                peer,
                response,
            },
            Ok(None) => Exchange::Receiving,
            Err(e) => {
                self.observer.cycle_failed(&e);
                log_cycle_error(&peer.to_string(), &e);
                Exchange::Receiving
            },
        }
    }

    async fn handle_datagram(
        &self,
        datagram: &[u8],
        peer: SocketAddr,
    ) -> ModbusResult<Option<Response>> {
        let raw = parse_datagram(datagram)?;
        self.observer.frame_received(&raw);

        match decode_inbound(&raw, self.unit_id)? {
            Inbound::Reject(response) => Ok(Some(response)),
            Inbound::Request(request) if request.slave_address != self.unit_id => {
                debug!(
                    "Unit {}: ignoring request for unit {} from {peer}",
                    self.unit_id, request.slave_address
                );
                self.observer.request_ignored(&request);
                Ok(None)
            },
            Inbound::Request(request) => {
                Ok(Some(execute(self.handler.as_ref(), &request).await))
            },
        }
    }

    /// Closure ends the loop; other socket faults drop the exchange and re-arm
    fn on_socket_error(&mut self, error: TransportError) -> Exchange {
        let error = ModbusError::from(error);
        self.observer.cycle_failed(&error);

        if error.is_closed() {
            info!("Modbus UDP slave {} terminated: socket closed", self.unit_id);
            self.state = SlaveState::Terminated;
            self.observer.terminated();
        } else {
            log_cycle_error("udp", &error);
        }
        Exchange::Receiving
    }
}
