//! Write families: single coil/register and multiple coils/registers

use bytes::{BufMut, BytesMut};
use errors::{ExceptionCode, ModbusError, ModbusResult};

use super::PduCodec;
use crate::bits;

/// Wire value of an energized coil
pub const COIL_ON: u16 = 0xFF00;
/// Wire value of a de-energized coil
pub const COIL_OFF: u16 = 0x0000;

/// Write single coil (FC05); the response echoes the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleCoil {
    pub address: u16,
    pub value: bool,
}

impl WriteSingleCoil {
    pub fn new(address: u16, value: bool) -> Self {
        Self { address, value }
    }
}

impl PduCodec for WriteSingleCoil {
    const MINIMUM_FRAME_SIZE: usize = 6;

    /// Any value other than [`COIL_ON`]/[`COIL_OFF`] is an IllegalDataValue
    fn decode(frame: &[u8]) -> ModbusResult<Self> {
        let value = match u16::from_be_bytes([frame[4], frame[5]]) {
            COIL_ON => true,
            COIL_OFF => false,
            _ => return Err(ModbusError::Exception(ExceptionCode::IllegalDataValue)),
        };

        Ok(Self {
            address: u16::from_be_bytes([frame[2], frame[3]]),
            value,
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.address);
        buf.put_u16(if self.value { COIL_ON } else { COIL_OFF });
    }
}

/// Write single register (FC06); the response echoes the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleRegister {
    pub address: u16,
    pub value: u16,
}

impl WriteSingleRegister {
    pub fn new(address: u16, value: u16) -> Self {
        Self { address, value }
    }
}

impl PduCodec for WriteSingleRegister {
    const MINIMUM_FRAME_SIZE: usize = 6;

    fn decode(frame: &[u8]) -> ModbusResult<Self> {
        Ok(Self {
            address: u16::from_be_bytes([frame[2], frame[3]]),
            value: u16::from_be_bytes([frame[4], frame[5]]),
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.address);
        buf.put_u16(self.value);
    }
}

/// Checks the byte count at offset 6 against the frame and returns the data slice
fn multiple_write_data(frame: &[u8], minimum: usize, expected_count: usize) -> ModbusResult<&[u8]> {
    let byte_count = frame[6] as usize;
    let expected = minimum + byte_count;
    if frame.len() < expected {
        return Err(ModbusError::too_short(expected, frame.len()));
    }
    if byte_count != expected_count {
        return Err(ModbusError::format(
            "Byte count does not match quantity",
            expected_count,
            byte_count,
        ));
    }
    Ok(&frame[minimum..expected])
}

/// Write multiple coils request (FC15)
///
/// Like [`ReadBitsResponse`](super::ReadBitsResponse), keeps the packed bytes
/// so that padding bits in the last byte survive a decode/encode round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteMultipleCoilsRequest {
    pub start_address: u16,
    quantity: u16,
    data: Vec<u8>,
}

impl WriteMultipleCoilsRequest {
    /// Pack the given coil states, padding the last byte with zeros
    pub fn new(start_address: u16, values: &[bool]) -> Self {
        Self {
            start_address,
            quantity: values.len() as u16,
            data: bits::pack_bits(values),
        }
    }

    pub fn number_of_points(&self) -> u16 {
        self.quantity
    }

    /// Raw packed bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn values(&self) -> Vec<bool> {
        bits::unpack_bits(&self.data, self.quantity as usize)
    }
}

impl PduCodec for WriteMultipleCoilsRequest {
    const MINIMUM_FRAME_SIZE: usize = 7;

    fn decode(frame: &[u8]) -> ModbusResult<Self> {
        let quantity = u16::from_be_bytes([frame[4], frame[5]]);
        let data = multiple_write_data(
            frame,
            Self::MINIMUM_FRAME_SIZE,
            bits::bytes_needed(quantity as usize),
        )?;

        Ok(Self {
            start_address: u16::from_be_bytes([frame[2], frame[3]]),
            quantity,
            data: data.to_vec(),
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.start_address);
        buf.put_u16(self.quantity);
        buf.put_u8(self.data.len() as u8);
        buf.put_slice(&self.data);
    }
}

/// Write multiple registers request (FC16)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteMultipleRegistersRequest {
    pub start_address: u16,
    pub registers: Vec<u16>,
}

impl WriteMultipleRegistersRequest {
    pub fn new(start_address: u16, registers: Vec<u16>) -> Self {
        Self {
            start_address,
            registers,
        }
    }

    pub fn number_of_points(&self) -> u16 {
        self.registers.len() as u16
    }
}

impl PduCodec for WriteMultipleRegistersRequest {
    const MINIMUM_FRAME_SIZE: usize = 7;

    fn decode(frame: &[u8]) -> ModbusResult<Self> {
        let quantity = u16::from_be_bytes([frame[4], frame[5]]) as usize;
        let data = multiple_write_data(frame, Self::MINIMUM_FRAME_SIZE, quantity * 2)?;

        Ok(Self {
            start_address: u16::from_be_bytes([frame[2], frame[3]]),
            registers: data
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect(),
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.start_address);
        buf.put_u16(self.number_of_points());
        buf.put_u8((self.registers.len() * 2) as u8);
        for register in &self.registers {
            buf.put_u16(*register);
        }
    }
}

/// Write multiple coils/registers response (FC15/16): start address + quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteMultipleResponse {
    pub start_address: u16,
    pub number_of_points: u16,
}

impl WriteMultipleResponse {
    pub fn new(start_address: u16, number_of_points: u16) -> Self {
        Self {
            start_address,
            number_of_points,
        }
    }
}

impl PduCodec for WriteMultipleResponse {
    const MINIMUM_FRAME_SIZE: usize = 6;

    fn decode(frame: &[u8]) -> ModbusResult<Self> {
        Ok(Self {
            start_address: u16::from_be_bytes([frame[2], frame[3]]),
            number_of_points: u16::from_be_bytes([frame[4], frame[5]]),
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.start_address);
        buf.put_u16(self.number_of_points);
    }
}
