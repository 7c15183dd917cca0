//! Slave dispatch
//!
//! [`ModbusSlave`] drives one stream framer through
//! receive → decode → verify → filter → execute → respond, one request per
//! cycle. It has two states: `Listening` while cycles run and `Terminated`
//! once the port reports closure. Any other fault ends only the current
//! cycle; the input buffer is discarded and the slave listens again.
//!
//! [`UdpSlave`] is the datagram counterpart and [`TcpSlave`] the accept loop
//! that runs one [`ModbusSlave`] per TCP connection.

mod observer;
mod tcp;
mod udp;

pub use observer::{NoopObserver, SlaveObserver, SlaveStats, StatsSnapshot};
pub use tcp::TcpSlave;
pub use udp::{UdpSlave, MAX_DATAGRAM_SIZE};

use std::sync::Arc;

use async_trait::async_trait;
use errors::{ExceptionCode, ModbusError, ModbusResult, Recovery};
use tracing::{debug, error, info, warn, Level};

use crate::config::{SlaveConfig, TransportConfig};
use crate::framer::{AsciiFramer, Framer, RawFrame, RtuFramer, TcpFramer};
use crate::message::{create_request, ModbusMessage, Request, Response};
use crate::port::{ByteStream, CloseHandle, UdpPort};

/// Executes decoded requests on behalf of a slave
///
/// An `Err` is sent back to the master as an exception response.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn execute(&self, request: &Request) -> Result<Response, ExceptionCode>;
}

#[async_trait]
impl<F> RequestHandler for F
where
    F: Fn(&Request) -> Result<Response, ExceptionCode> + Send + Sync,
{
    async fn execute(&self, request: &Request) -> Result<Response, ExceptionCode> {
        self(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveState {
    Listening,
    Terminated,
}

/// What one successful cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Responded(Response),
    /// Addressed to another unit
    Ignored,
}

/// A decoded frame, or the exception answer for one that cannot be decoded
pub(crate) enum Inbound {
    Request(Request),
    Reject(Response),
}

/// Decode the message frame
///
/// For a frame addressed to `unit_id`, an unsupported function becomes an
/// IllegalFunction answer and an out-of-range value an IllegalDataValue
/// answer instead of an error.
pub(crate) fn decode_inbound(raw: &RawFrame, unit_id: u8) -> ModbusResult<Inbound> {
    let error = match create_request(&raw.message) {
        Ok(request) => {
            return Ok(Inbound::Request(
                request.with_transaction_id(raw.transaction_id),
            ))
        },
        Err(e) => e,
    };

    let rejection = match &error {
        ModbusError::UnsupportedFunction(_) => Some(ExceptionCode::IllegalFunction),
        ModbusError::Exception(code) => Some(*code),
        _ => None,
    };
    match (rejection, raw.function_code()) {
        (Some(code), Some(function_code)) if raw.slave_address() == Some(unit_id) => {
            warn!("Unit {unit_id}: function 0x{function_code:02X} rejected ({error}), answering {code}");
            Ok(Inbound::Reject(Response::exception_for(
                unit_id,
                raw.transaction_id,
                function_code,
                code,
            )))
        },
        _ => Err(error),
    }
}

/// Run the handler; the response always carries the request's transaction id
pub(crate) async fn execute(handler: &dyn RequestHandler, request: &Request) -> Response {
    let mut response = match handler.execute(request).await {
        Ok(response) => response,
        Err(code) => {
            debug!(
                "Unit {}: function 0x{:02X} failed with {code}",
                request.slave_address,
                request.function_code()
            );
            Response::exception(request, code)
        },
    };
    if let Err(e) = response.pdu.validate() {
        warn!(
            "Unit {}: response to function 0x{:02X} does not fit the wire: {e}",
            request.slave_address,
            request.function_code()
        );
        response = Response::exception(request, ExceptionCode::SlaveDeviceFailure);
    }
    response.transaction_id = request.transaction_id;
    response
}

pub(crate) fn log_cycle_error(port: &str, error: &ModbusError) {
    let code = error.error_code();
    match error.log_level() {
        Level::ERROR => error!("{port}: {error} [{code}]"),
        Level::WARN => warn!("{port}: {error} [{code}]"),
        Level::INFO => info!("{port}: {error} [{code}]"),
        _ => debug!("{port}: {error} [{code}]"),
    }
}

/// Blocking-loop slave over a stream framer
pub struct ModbusSlave<F> {
    unit_id: u8,
    framer: F,
    handler: Arc<dyn RequestHandler>,
    observer: Arc<dyn SlaveObserver>,
    state: SlaveState,
}

impl<F: Framer> ModbusSlave<F> {
    pub fn new(unit_id: u8, framer: F, handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            unit_id,
            framer,
            handler,
            observer: Arc::new(NoopObserver),
            state: SlaveState::Listening,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SlaveObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn state(&self) -> SlaveState {
        self.state
    }

    pub fn framer(&self) -> &F {
        &self.framer
    }

    /// Run cycles until the port is closed
    ///
    /// Returns `Ok` on closure and the fault itself for anything else that
    /// cannot be recovered from.
    pub async fn listen(&mut self) -> ModbusResult<()> {
        info!(
            "Modbus slave {} listening on {}",
            self.unit_id,
            self.framer.name()
        );

        while self.state == SlaveState::Listening {
            if let Err(e) = self.run_cycle().await {
                if let Some(fatal) = self.recover(e).await {
                    return Err(fatal);
                }
            }
        }
        Ok(())
    }

    /// One receive → respond cycle
    pub async fn run_cycle(&mut self) -> ModbusResult<CycleOutcome> {
        let raw = self.framer.read_request().await?;
        self.observer.frame_received(&raw);

        let inbound = decode_inbound(&raw, self.unit_id)?;
        self.framer.verify(&raw)?;

        let response = match inbound {
            Inbound::Reject(response) => response,
            Inbound::Request(request) => {
                if request.slave_address != self.unit_id {
                    debug!(
                        "Unit {}: ignoring request for unit {}",
                        self.unit_id, request.slave_address
                    );
                    self.observer.request_ignored(&request);
                    return Ok(CycleOutcome::Ignored);
                }
                execute(self.handler.as_ref(), &request).await
            },
        };

        self.framer.write(&response).await?;
        self.observer.response_sent(&response);
        Ok(CycleOutcome::Responded(response))
    }

    /// Apply the recovery policy; returns the error if it ended the loop abnormally
    async fn recover(&mut self, error: ModbusError) -> Option<ModbusError> {
        self.observer.cycle_failed(&error);

        if error.recovery() == Recovery::Terminate {
            return self.terminate(error);
        }

        log_cycle_error(self.framer.name(), &error);
        match self.framer.discard_input_buffer().await {
            Ok(()) => None,
            Err(e) if e.is_closed() => self.terminate(e),
            Err(e) => {
                warn!("{}: failed to discard input buffer: {e}", self.framer.name());
                None
            },
        }
    }

    fn terminate(&mut self, error: ModbusError) -> Option<ModbusError> {
        self.state = SlaveState::Terminated;
        self.observer.terminated();

        if error.is_closed() {
            info!(
                "Modbus slave {} on {} terminated: port closed",
                self.unit_id,
                self.framer.name()
            );
            None
        } else {
            error!(
                "Modbus slave {} on {} terminated: {error}",
                self.unit_id,
                self.framer.name()
            );
            Some(error)
        }
    }
}

impl<S: ByteStream> ModbusSlave<RtuFramer<S>> {
    /// RTU slave with checksum enforcement on
    pub fn rtu(unit_id: u8, stream: S, handler: Arc<dyn RequestHandler>) -> Self {
        Self::new(unit_id, RtuFramer::new(stream), handler)
    }
}

impl<S: ByteStream> ModbusSlave<AsciiFramer<S>> {
    /// ASCII slave with checksum enforcement on
    pub fn ascii(unit_id: u8, stream: S, handler: Arc<dyn RequestHandler>) -> Self {
        Self::new(unit_id, AsciiFramer::new(stream), handler)
    }
}

impl<S: ByteStream> ModbusSlave<TcpFramer<S>> {
    pub fn tcp(unit_id: u8, stream: S, handler: Arc<dyn RequestHandler>) -> Self {
        Self::new(unit_id, TcpFramer::new(stream), handler)
    }
}

/// Open the configured transport and run the matching host until `close` fires
pub async fn build_and_listen(
    config: &SlaveConfig,
    handler: Arc<dyn RequestHandler>,
    close: CloseHandle,
) -> ModbusResult<()> {
    config.validate()?;
    info!(
        "Starting Modbus {} slave, unit {}",
        config.transport.kind(),
        config.unit_id
    );

    match &config.transport {
        TransportConfig::Tcp { bind } => {
            TcpSlave::bind(bind, config.unit_id, handler, close)
                .await?
                .listen()
                .await
        },
        TransportConfig::Udp { bind } => {
            let socket = UdpPort::bind(bind, close).await?;
            UdpSlave::new(config.unit_id, socket, handler).listen().await
        },
        #[cfg(feature = "serial")]
        TransportConfig::Rtu(serial) => {
            let line = crate::port::SerialLine::open(serial, close)?;
            let framer = RtuFramer::new(line)
                .with_check_frame(config.check_frame)
                .with_timeout(config.timeout());
            ModbusSlave::new(config.unit_id, framer, handler)
                .listen()
                .await
        },
        #[cfg(feature = "serial")]
        TransportConfig::Ascii(serial) => {
            let line = crate::port::SerialLine::open(serial, close)?;
            let framer = AsciiFramer::new(line)
                .with_check_frame(config.check_frame)
                .with_timeout(config.timeout());
            ModbusSlave::new(config.unit_id, framer, handler)
                .listen()
                .await
        },
        #[cfg(not(feature = "serial"))]
        TransportConfig::Rtu(_) | TransportConfig::Ascii(_) => Err(errors::config_error!(
            "{} transport requires the `serial` feature",
            config.transport.kind()
        )),
    }
}
