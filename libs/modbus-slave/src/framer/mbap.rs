use bytes::{BufMut, BytesMut};
use errors::{ModbusError, ModbusResult};

use crate::message::ModbusMessage;

/// Transaction id + protocol id + length; the unit id follows at offset 6
pub const MBAP_HEADER_LENGTH: usize = 6;

pub const MODBUS_PROTOCOL_ID: u16 = 0;

/// Largest length field value: unit id + 253-byte PDU
pub const MAX_MBAP_LENGTH: u16 = 254;

/// MBAP (Modbus Application Protocol) header shared by TCP and UDP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    /// Byte count of the unit id and PDU
    pub length: u16,
}

impl MbapHeader {
    pub fn for_message(message: &dyn ModbusMessage, message_frame_length: usize) -> Self {
        Self {
            transaction_id: message.transaction_id(),
            protocol_id: MODBUS_PROTOCOL_ID,
            length: message_frame_length as u16,
        }
    }

    pub fn parse(data: &[u8]) -> ModbusResult<Self> {
        if data.len() < MBAP_HEADER_LENGTH {
            return Err(ModbusError::format(
                "Invalid MBAP header length",
                MBAP_HEADER_LENGTH,
                data.len(),
            ));
        }

        Ok(Self {
            transaction_id: u16::from_be_bytes([data[0], data[1]]),
            protocol_id: u16::from_be_bytes([data[2], data[3]]),
            length: u16::from_be_bytes([data[4], data[5]]),
        })
    }

    pub fn validate_protocol(&self) -> ModbusResult<()> {
        if self.protocol_id != MODBUS_PROTOCOL_ID {
            return Err(ModbusError::format(
                format!("Invalid protocol ID: {}", self.protocol_id),
                MBAP_HEADER_LENGTH,
                MBAP_HEADER_LENGTH,
            ));
        }
        Ok(())
    }

    /// Length must cover at least unit id + function code
    pub fn validate_length(&self) -> ModbusResult<()> {
        if !(2..=MAX_MBAP_LENGTH).contains(&self.length) {
            return Err(ModbusError::format(
                format!("Invalid MBAP length field: {}", self.length),
                2,
                self.length as usize,
            ));
        }
        Ok(())
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.transaction_id);
        buf.put_u16(self.protocol_id);
        buf.put_u16(self.length);
    }
}

/// MBAP header followed by the message frame
pub(crate) fn build_mbap_frame(message: &dyn ModbusMessage) -> Vec<u8> {
    let message_frame = message.message_frame();
    let mut buf = BytesMut::with_capacity(MBAP_HEADER_LENGTH + message_frame.len());
    MbapHeader::for_message(message, message_frame.len()).encode(&mut buf);
    buf.put_slice(&message_frame);
    buf.to_vec()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let header = MbapHeader::parse(&[0x12, 0x34, 0x00, 0x00, 0x00, 0x06]).unwrap();
        assert_eq!(header.transaction_id, 0x1234);
        assert_eq!(header.length, 6);
        assert!(header.validate_protocol().is_ok());
        assert!(header.validate_length().is_ok());
    }

    #[test]
    fn test_invalid_fields() {
        let header = MbapHeader::parse(&[0x00, 0x01, 0x00, 0x01, 0x00, 0x06]).unwrap();
        assert!(header
            .validate_protocol()
            .unwrap_err()
            .to_string()
            .contains("Invalid protocol ID: 1"));

        let header = MbapHeader::parse(&[0x00, 0x01, 0x00, 0x00, 0x01, 0x00]).unwrap();
        assert!(header.validate_length().is_err());

        assert!(MbapHeader::parse(&[0x00, 0x01]).is_err());
    }
}
