//! Modbus slave stack
//!
//! Layers, bottom up:
//! - [`checksum`]: LRC (ASCII) and CRC-16 (RTU)
//! - [`message`]: typed requests/responses keyed by function code
//! - [`port`]: byte-stream and datagram I/O (TCP, UDP, serial, in-memory mocks)
//! - [`framer`]: ASCII, RTU, TCP and UDP framing
//! - [`slave`]: the dispatch loops that answer a master through an injected
//!   [`RequestHandler`]
//!
//! ```no_run
//! use std::sync::Arc;
//! use modbus_slave::{build_and_listen, CloseHandle, ExceptionCode, Request, Response, SlaveConfig};
//!
//! # async fn run() -> modbus_slave::ModbusResult<()> {
//! let config = SlaveConfig::load(None)?;
//! let handler = Arc::new(|_request: &Request| -> Result<Response, ExceptionCode> {
//!     Err(ExceptionCode::IllegalFunction)
//! });
//! build_and_listen(&config, handler, CloseHandle::new()).await
//! # }
//! ```

pub mod bits;
pub mod checksum;
pub mod config;
pub mod framer;
pub mod logging;
pub mod message;
pub mod port;
pub mod slave;

pub use errors::{ExceptionCode, ModbusError, ModbusResult, Recovery, TransportError};

pub use checksum::{calculate_crc, calculate_lrc, ChecksumKind};
pub use config::{Parity, SerialConfig, SlaveConfig, TransportConfig};
pub use framer::{AsciiFramer, Framer, RawFrame, RtuFramer, TcpFramer};
pub use message::{
    create_request, create_response, FunctionCode, ModbusMessage, Request, RequestPdu, Response,
    ResponsePdu,
};
pub use port::{ByteStream, CloseHandle, DatagramSocket, TcpPort, UdpPort};
#[cfg(feature = "serial")]
pub use port::SerialLine;
pub use slave::{
    build_and_listen, CycleOutcome, ModbusSlave, NoopObserver, RequestHandler, SlaveObserver,
    SlaveState, SlaveStats, StatsSnapshot, TcpSlave, UdpSlave,
};
