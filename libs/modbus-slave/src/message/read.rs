//! Read families: coils, discrete inputs, holding and input registers

use bytes::{BufMut, BytesMut};
use errors::{ModbusError, ModbusResult};

use super::PduCodec;
use crate::bits;

/// Read request shared by FC01-04: start address + quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub start_address: u16,
    pub number_of_points: u16,
}

impl ReadRequest {
    pub fn new(start_address: u16, number_of_points: u16) -> Self {
        Self {
            start_address,
            number_of_points,
        }
    }
}

impl PduCodec for ReadRequest {
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

/// Coil / discrete input response: byte count + packed bits
///
/// Keeps the packed bytes so that padding bits in the last byte survive a
/// decode/encode round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBitsResponse {
    data: Vec<u8>,
}

impl ReadBitsResponse {
    /// Pack the given bits, padding the last byte with zeros
    pub fn from_bits(bits: &[bool]) -> Self {
        Self {
            data: bits::pack_bits(bits),
        }
    }

    /// Raw packed bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// First `count` bits
    pub fn bits(&self, count: usize) -> Vec<bool> {
        bits::unpack_bits(&self.data, count)
    }
}

impl PduCodec for ReadBitsResponse {
    const MINIMUM_FRAME_SIZE: usize = 3;

    fn decode(frame: &[u8]) -> ModbusResult<Self> {
        let byte_count = frame[2] as usize;
        let expected = Self::MINIMUM_FRAME_SIZE + byte_count;
        if frame.len() < expected {
            return Err(ModbusError::too_short(expected, frame.len()));
        }

        Ok(Self {
            data: frame[3..expected].to_vec(),
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.data.len() as u8);
        buf.put_slice(&self.data);
    }
}

/// Register response (FC03/04/23): byte count + big-endian registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRegistersResponse {
    pub registers: Vec<u16>,
}

impl ReadRegistersResponse {
    pub fn new(registers: Vec<u16>) -> Self {
        Self { registers }
    }
}

impl PduCodec for ReadRegistersResponse {
    const MINIMUM_FRAME_SIZE: usize = 3;

    fn decode(frame: &[u8]) -> ModbusResult<Self> {
        let byte_count = frame[2] as usize;
        let expected = Self::MINIMUM_FRAME_SIZE + byte_count;
        if frame.len() < expected {
            return Err(ModbusError::too_short(expected, frame.len()));
        }
        if byte_count % 2 != 0 {
            return Err(ModbusError::format(
                "Register byte count must be even",
                byte_count + 1,
                byte_count,
            ));
        }

        let registers = frame[3..expected]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self { registers })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8((self.registers.len() * 2) as u8);
        for register in &self.registers {
            buf.put_u16(*register);
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::message::create_message;

    #[test]
    fn test_read_request_fields() {
        let request: ReadRequest = create_message(&[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]).unwrap();
        assert_eq!(request.start_address, 0x006B);
        assert_eq!(request.number_of_points, 3);
    }

    #[test]
    fn test_read_request_too_short() {
        let err = create_message::<ReadRequest>(&[0x11, 0x03, 0x00, 0x6B, 0x00]).unwrap_err();
        assert_eq!(err, ModbusError::too_short(6, 5));
    }

    #[test]
    fn test_bits_response_keeps_padding() {
        let response: ReadBitsResponse =
            create_message(&[0x01, 0x01, 0x02, 0xCD, 0xFB]).unwrap();
        assert_eq!(response.data(), &[0xCD, 0xFB]);
        assert_eq!(response.bits(3), vec![true, false, true]);

        let mut buf = BytesMut::new();
        response.encode(&mut buf);
        assert_eq!(&buf[..], &[0x02, 0xCD, 0xFB]);
    }

    #[test]
    fn test_bits_response_byte_count_exceeds_frame() {
        let err = create_message::<ReadBitsResponse>(&[0x01, 0x01, 0x03, 0xCD]).unwrap_err();
        assert_eq!(err, ModbusError::too_short(6, 4));
    }

    #[test]
    fn test_registers_response() {
        let response: ReadRegistersResponse =
            create_message(&[0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x0B]).unwrap();
        assert_eq!(response.registers, vec![0x000A, 0x000B]);
    }

    #[test]
    fn test_registers_response_odd_byte_count() {
        let err =
            create_message::<ReadRegistersResponse>(&[0x01, 0x03, 0x03, 0x00, 0x0A, 0x00])
                .unwrap_err();
        assert!(err.is_decode_failure());
    }
}
