//! Message codec
//!
//! A message is a slave address plus a protocol data unit (function code +
//! payload). The "message frame" is `[slave address][pdu]`, which is what the
//! per-function decoders consume and what every minimum size counts.
//!
//! Decoding is keyed by function code: [`create_request`] and
//! [`create_response`] read `frame[1]` and hand the frame to the matching
//! body decoder, after rejecting frames below that body's minimum size.
//! Decoded requests are also checked against the per-function quantity
//! limits; a violation is reported as an IllegalDataValue exception.
//!
//! Body decoders index without bounds checks, so they are not reachable from
//! outside the crate:
//!
//! ```compile_fail
//! use modbus_slave::message::{PduCodec, ReadRequest};
//! let _ = ReadRequest::decode(&[0x01]);
//! ```

mod diagnostics;
mod exception;
mod read;
mod read_write;
mod write;

pub use diagnostics::{Diagnostics, RETURN_QUERY_DATA};
pub use exception::{ExceptionResponse, EXCEPTION_FLAG};
pub use read::{ReadBitsResponse, ReadRequest, ReadRegistersResponse};
pub use read_write::ReadWriteMultipleRegistersRequest;
pub use write::{
    WriteMultipleCoilsRequest, WriteMultipleRegistersRequest, WriteMultipleResponse,
    WriteSingleCoil, WriteSingleRegister, COIL_OFF, COIL_ON,
};

use bytes::{BufMut, BytesMut};
use errors::{ExceptionCode, ModbusError, ModbusResult};

/// Smallest frame that still carries a slave address and a function code
pub const HEADER_SIZE: usize = 2;

/// Coils or discrete inputs in one read (FC01/02)
pub const MAX_READ_BITS: usize = 2000;
/// Registers in one read (FC03/04, and the read half of FC23)
pub const MAX_READ_REGISTERS: usize = 125;
/// Coils in one FC15 request
pub const MAX_WRITE_COILS: usize = 1968;
/// Registers in one FC16 request
pub const MAX_WRITE_REGISTERS: usize = 123;
/// Registers in the write half of FC23
pub const MAX_READ_WRITE_REGISTERS: usize = 121;

/// Request quantities must be `1..=max`
fn check_quantity(quantity: usize, max: usize) -> ModbusResult<()> {
    if quantity == 0 || quantity > max {
        return Err(ModbusError::Exception(ExceptionCode::IllegalDataValue));
    }
    Ok(())
}

fn check_response_size(len: usize, max: usize) -> ModbusResult<()> {
    if len > max {
        return Err(ModbusError::format(
            "Response exceeds the PDU quantity limit",
            max,
            len,
        ));
    }
    Ok(())
}

/// Supported Modbus function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionCode {
    ReadCoils = 0x01,
    ReadDiscreteInputs = 0x02,
    ReadHoldingRegisters = 0x03,
    ReadInputRegisters = 0x04,
    WriteSingleCoil = 0x05,
    WriteSingleRegister = 0x06,
    Diagnostics = 0x08,
    WriteMultipleCoils = 0x0F,
    WriteMultipleRegisters = 0x10,
    ReadWriteMultipleRegisters = 0x17,
}

impl FunctionCode {
    pub fn from_u8(code: u8) -> ModbusResult<Self> {
        match code {
            0x01 => Ok(Self::ReadCoils),
            0x02 => Ok(Self::ReadDiscreteInputs),
            0x03 => Ok(Self::ReadHoldingRegisters),
            0x04 => Ok(Self::ReadInputRegisters),
            0x05 => Ok(Self::WriteSingleCoil),
            0x06 => Ok(Self::WriteSingleRegister),
            0x08 => Ok(Self::Diagnostics),
            0x0F => Ok(Self::WriteMultipleCoils),
            0x10 => Ok(Self::WriteMultipleRegisters),
            0x17 => Ok(Self::ReadWriteMultipleRegisters),
            other => Err(ModbusError::UnsupportedFunction(other)),
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Typed body of one function-code variant
///
/// `decode` receives the whole message frame (slave address first) and may
/// index up to `MINIMUM_FRAME_SIZE - 1` without checking, so it is only
/// reached through [`create_message`]; variable-length bodies check their own
/// byte count. `encode` writes the payload only, the function code is written
/// by the enclosing PDU. Byte counts are narrowed to one byte, so bodies are
/// validated against the quantity limits before they are encoded for the wire.
pub(crate) trait PduCodec: Sized {
    const MINIMUM_FRAME_SIZE: usize;

    fn decode(frame: &[u8]) -> ModbusResult<Self>;

    fn encode(&self, buf: &mut BytesMut);
}

/// Decode a message frame into `T` after the minimum size check
pub(crate) fn create_message<T: PduCodec>(frame: &[u8]) -> ModbusResult<T> {
    if frame.len() < T::MINIMUM_FRAME_SIZE {
        return Err(ModbusError::too_short(T::MINIMUM_FRAME_SIZE, frame.len()));
    }
    T::decode(frame)
}

/// Request bodies keyed by function code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPdu {
    ReadCoils(ReadRequest),
    ReadDiscreteInputs(ReadRequest),
    ReadHoldingRegisters(ReadRequest),
    ReadInputRegisters(ReadRequest),
    WriteSingleCoil(WriteSingleCoil),
    WriteSingleRegister(WriteSingleRegister),
    Diagnostics(Diagnostics),
    WriteMultipleCoils(WriteMultipleCoilsRequest),
    WriteMultipleRegisters(WriteMultipleRegistersRequest),
    ReadWriteMultipleRegisters(ReadWriteMultipleRegistersRequest),
}

impl RequestPdu {
    fn decode(function_code: FunctionCode, frame: &[u8]) -> ModbusResult<Self> {
        Ok(match function_code {
            FunctionCode::ReadCoils => Self::ReadCoils(create_message(frame)?),
            FunctionCode::ReadDiscreteInputs => Self::ReadDiscreteInputs(create_message(frame)?),
            FunctionCode::ReadHoldingRegisters => {
                Self::ReadHoldingRegisters(create_message(frame)?)
            },
            FunctionCode::ReadInputRegisters => Self::ReadInputRegisters(create_message(frame)?),
            FunctionCode::WriteSingleCoil => Self::WriteSingleCoil(create_message(frame)?),
            FunctionCode::WriteSingleRegister => Self::WriteSingleRegister(create_message(frame)?),
            FunctionCode::Diagnostics => Self::Diagnostics(create_message(frame)?),
            FunctionCode::WriteMultipleCoils => Self::WriteMultipleCoils(create_message(frame)?),
            FunctionCode::WriteMultipleRegisters => {
                Self::WriteMultipleRegisters(create_message(frame)?)
            },
            FunctionCode::ReadWriteMultipleRegisters => {
                Self::ReadWriteMultipleRegisters(create_message(frame)?)
            },
        })
    }

    pub fn function_code(&self) -> FunctionCode {
        match self {
            Self::ReadCoils(_) => FunctionCode::ReadCoils,
            Self::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            Self::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            Self::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            Self::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil,
            Self::WriteSingleRegister(_) => FunctionCode::WriteSingleRegister,
            Self::Diagnostics(_) => FunctionCode::Diagnostics,
            Self::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils,
            Self::WriteMultipleRegisters(_) => FunctionCode::WriteMultipleRegisters,
            Self::ReadWriteMultipleRegisters(_) => FunctionCode::ReadWriteMultipleRegisters,
        }
    }

    /// Check quantities against the function's limits
    pub fn validate(&self) -> ModbusResult<()> {
        match self {
            Self::ReadCoils(read) | Self::ReadDiscreteInputs(read) => {
                check_quantity(read.number_of_points as usize, MAX_READ_BITS)
            },
            Self::ReadHoldingRegisters(read) | Self::ReadInputRegisters(read) => {
                check_quantity(read.number_of_points as usize, MAX_READ_REGISTERS)
            },
            Self::WriteMultipleCoils(write) => {
                check_quantity(write.number_of_points() as usize, MAX_WRITE_COILS)
            },
            Self::WriteMultipleRegisters(write) => {
                check_quantity(write.registers.len(), MAX_WRITE_REGISTERS)
            },
            Self::ReadWriteMultipleRegisters(composite) => {
                check_quantity(composite.read.number_of_points as usize, MAX_READ_REGISTERS)?;
                check_quantity(composite.write.registers.len(), MAX_READ_WRITE_REGISTERS)
            },
            Self::WriteSingleCoil(_) | Self::WriteSingleRegister(_) | Self::Diagnostics(_) => {
                Ok(())
            },
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.function_code().code());
        match self {
            Self::ReadCoils(body)
            | Self::ReadDiscreteInputs(body)
            | Self::ReadHoldingRegisters(body)
            | Self::ReadInputRegisters(body) => body.encode(buf),
            Self::WriteSingleCoil(body) => body.encode(buf),
            Self::WriteSingleRegister(body) => body.encode(buf),
            Self::Diagnostics(body) => body.encode(buf),
            Self::WriteMultipleCoils(body) => body.encode(buf),
            Self::WriteMultipleRegisters(body) => body.encode(buf),
            Self::ReadWriteMultipleRegisters(body) => body.encode(buf),
        }
    }
}

/// Response bodies keyed by function code, plus exception responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePdu {
    ReadCoils(ReadBitsResponse),
    ReadDiscreteInputs(ReadBitsResponse),
    ReadHoldingRegisters(ReadRegistersResponse),
    ReadInputRegisters(ReadRegistersResponse),
    WriteSingleCoil(WriteSingleCoil),
    WriteSingleRegister(WriteSingleRegister),
    Diagnostics(Diagnostics),
    WriteMultipleCoils(WriteMultipleResponse),
    WriteMultipleRegisters(WriteMultipleResponse),
    ReadWriteMultipleRegisters(ReadRegistersResponse),
    Exception(ExceptionResponse),
}

impl ResponsePdu {
    fn decode(code: u8, frame: &[u8]) -> ModbusResult<Self> {
        if code & EXCEPTION_FLAG != 0 {
            return Ok(Self::Exception(create_message(frame)?));
        }

        Ok(match FunctionCode::from_u8(code)? {
            FunctionCode::ReadCoils => Self::ReadCoils(create_message(frame)?),
            FunctionCode::ReadDiscreteInputs => Self::ReadDiscreteInputs(create_message(frame)?),
            FunctionCode::ReadHoldingRegisters => {
                Self::ReadHoldingRegisters(create_message(frame)?)
            },
            FunctionCode::ReadInputRegisters => Self::ReadInputRegisters(create_message(frame)?),
            FunctionCode::WriteSingleCoil => Self::WriteSingleCoil(create_message(frame)?),
            FunctionCode::WriteSingleRegister => Self::WriteSingleRegister(create_message(frame)?),
            FunctionCode::Diagnostics => Self::Diagnostics(create_message(frame)?),
            FunctionCode::WriteMultipleCoils => Self::WriteMultipleCoils(create_message(frame)?),
            FunctionCode::WriteMultipleRegisters => {
                Self::WriteMultipleRegisters(create_message(frame)?)
            },
            FunctionCode::ReadWriteMultipleRegisters => {
                Self::ReadWriteMultipleRegisters(create_message(frame)?)
            },
        })
    }

    /// Function code byte as sent on the wire (flagged for exceptions)
    pub fn function_code(&self) -> u8 {
        match self {
            Self::ReadCoils(_) => FunctionCode::ReadCoils.code(),
            Self::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs.code(),
            Self::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters.code(),
            Self::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters.code(),
            Self::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil.code(),
            Self::WriteSingleRegister(_) => FunctionCode::WriteSingleRegister.code(),
            Self::Diagnostics(_) => FunctionCode::Diagnostics.code(),
            Self::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils.code(),
            Self::WriteMultipleRegisters(_) => FunctionCode::WriteMultipleRegisters.code(),
            Self::ReadWriteMultipleRegisters(_) => FunctionCode::ReadWriteMultipleRegisters.code(),
            Self::Exception(body) => body.wire_function_code(),
        }
    }

    /// Check that the body fits its byte-count field
    pub fn validate(&self) -> ModbusResult<()> {
        match self {
            Self::ReadCoils(body) | Self::ReadDiscreteInputs(body) => {
                check_response_size(body.data().len(), crate::bits::bytes_needed(MAX_READ_BITS))
            },
            Self::ReadHoldingRegisters(body)
            | Self::ReadInputRegisters(body)
            | Self::ReadWriteMultipleRegisters(body) => {
                check_response_size(body.registers.len(), MAX_READ_REGISTERS)
            },
            _ => Ok(()),
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.function_code());
        match self {
            Self::ReadCoils(body) | Self::ReadDiscreteInputs(body) => body.encode(buf),
            Self::ReadHoldingRegisters(body)
            | Self::ReadInputRegisters(body)
            | Self::ReadWriteMultipleRegisters(body) => body.encode(buf),
            Self::WriteSingleCoil(body) => body.encode(buf),
            Self::WriteSingleRegister(body) => body.encode(buf),
            Self::Diagnostics(body) => body.encode(buf),
            Self::WriteMultipleCoils(body) | Self::WriteMultipleRegisters(body) => body.encode(buf),
            Self::Exception(body) => body.encode(buf),
        }
    }
}

/// Common view of requests and responses used by the framers
pub trait ModbusMessage: Send + Sync {
    fn slave_address(&self) -> u8;

    fn function_code(&self) -> u8;

    /// Correlation id carried by the MBAP header; 0 on serial links
    fn transaction_id(&self) -> u16;

    /// Function code + payload
    fn protocol_data_unit(&self) -> Vec<u8>;

    /// Whether the message fits the wire limits of its function
    fn validate(&self) -> ModbusResult<()>;

    /// Slave address + protocol data unit
    fn message_frame(&self) -> Vec<u8> {
        let pdu = self.protocol_data_unit();
        let mut frame = Vec::with_capacity(pdu.len() + 1);
        frame.push(self.slave_address());
        frame.extend_from_slice(&pdu);
        frame
    }
}

/// A decoded or constructed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub slave_address: u8,
    pub transaction_id: u16,
    pub pdu: RequestPdu,
}

impl Request {
    pub fn new(slave_address: u8, pdu: RequestPdu) -> Self {
        Self {
            slave_address,
            transaction_id: 0,
            pdu,
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: u16) -> Self {
        self.transaction_id = transaction_id;
        self
    }
}

impl ModbusMessage for Request {
    fn slave_address(&self) -> u8 {
        self.slave_address
    }

    fn function_code(&self) -> u8 {
        self.pdu.function_code().code()
    }

    fn transaction_id(&self) -> u16 {
        self.transaction_id
    }

    fn protocol_data_unit(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.pdu.encode(&mut buf);
        buf.to_vec()
    }

    fn validate(&self) -> ModbusResult<()> {
        self.pdu.validate()
    }
}

/// A decoded or constructed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub slave_address: u8,
    pub transaction_id: u16,
    pub pdu: ResponsePdu,
}

impl Response {
    pub fn new(slave_address: u8, pdu: ResponsePdu) -> Self {
        Self {
            slave_address,
            transaction_id: 0,
            pdu,
        }
    }

    /// Response addressed back to the request's slave, same transaction id
    pub fn for_request(request: &Request, pdu: ResponsePdu) -> Self {
        Self {
            slave_address: request.slave_address,
            transaction_id: request.transaction_id,
            pdu,
        }
    }

    /// Exception response for a request
    pub fn exception(request: &Request, code: ExceptionCode) -> Self {
        Self::for_request(
            request,
            ResponsePdu::Exception(ExceptionResponse::new(request.function_code(), code)),
        )
    }

    /// Exception response for a frame whose body could not be decoded
    pub(crate) fn exception_for(
        slave_address: u8,
        transaction_id: u16,
        function_code: u8,
        code: ExceptionCode,
    ) -> Self {
        Self {
            slave_address,
            transaction_id,
            pdu: ResponsePdu::Exception(ExceptionResponse::new(function_code, code)),
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self.pdu, ResponsePdu::Exception(_))
    }
}

impl ModbusMessage for Response {
    fn slave_address(&self) -> u8 {
        self.slave_address
    }

    fn function_code(&self) -> u8 {
        self.pdu.function_code()
    }

    fn transaction_id(&self) -> u16 {
        self.transaction_id
    }

    fn protocol_data_unit(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.pdu.encode(&mut buf);
        buf.to_vec()
    }

    fn validate(&self) -> ModbusResult<()> {
        self.pdu.validate()
    }
}

/// Decode a request message frame (`[slave][fc][payload]`)
///
/// A well-formed frame with an out-of-range quantity or coil value fails with
/// [`ModbusError::Exception`] carrying IllegalDataValue.
pub fn create_request(frame: &[u8]) -> ModbusResult<Request> {
    if frame.len() < HEADER_SIZE {
        return Err(ModbusError::too_short(HEADER_SIZE, frame.len()));
    }
    let function_code = FunctionCode::from_u8(frame[1])?;
    let pdu = RequestPdu::decode(function_code, frame)?;
    pdu.validate()?;
    Ok(Request::new(frame[0], pdu))
}

/// Decode a response message frame; a flagged function code yields an exception
pub fn create_response(frame: &[u8]) -> ModbusResult<Response> {
    if frame.len() < HEADER_SIZE {
        return Err(ModbusError::too_short(HEADER_SIZE, frame.len()));
    }
    Ok(Response::new(frame[0], ResponsePdu::decode(frame[1], frame)?))
}
