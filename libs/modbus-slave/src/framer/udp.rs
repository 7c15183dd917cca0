//! Modbus over UDP: one MBAP frame per datagram
//!
//! The datagram boundary delimits the frame, so the length field is not
//! used to find the end; the message frame is everything after the header.

use errors::{ModbusError, ModbusResult};

use super::mbap::{build_mbap_frame, MbapHeader, MBAP_HEADER_LENGTH};
use super::RawFrame;
use crate::message::ModbusMessage;

/// Header + unit id + function code
pub const MIN_DATAGRAM_LENGTH: usize = MBAP_HEADER_LENGTH + 2;

/// Split a received datagram into transaction id and message frame
pub fn parse_datagram(datagram: &[u8]) -> ModbusResult<RawFrame> {
    if datagram.len() < MIN_DATAGRAM_LENGTH {
        return Err(ModbusError::too_short(MIN_DATAGRAM_LENGTH, datagram.len()));
    }

    let header = MbapHeader::parse(datagram)?;
    header.validate_protocol()?;

    Ok(RawFrame {
        transaction_id: header.transaction_id,
        message: datagram[MBAP_HEADER_LENGTH..].to_vec(),
        checksum: Vec::new(),
    })
}

/// Datagram payload for a message, transaction id taken from the message
pub fn build_datagram(message: &dyn ModbusMessage) -> Vec<u8> {
    build_mbap_frame(message)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::message::{create_request, Diagnostics, Response, ResponsePdu};

    #[test]
    fn test_parse_datagram() {
        let frame = parse_datagram(&[
            0x00, 0x07, 0x00, 0x00, 0x00, 0x06, 0x01, 0x08, 0x00, 0x00, 0xA5, 0x37,
        ])
        .unwrap();
        assert_eq!(frame.transaction_id, 7);
        let request = create_request(&frame.message).unwrap();
        assert_eq!(request.slave_address, 1);
        assert_eq!(request.function_code(), 0x08);
    }

    #[test]
    fn test_parse_datagram_rejects() {
        assert_eq!(
            parse_datagram(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x01]).unwrap_err(),
            ModbusError::too_short(MIN_DATAGRAM_LENGTH, 7)
        );
        assert!(
            parse_datagram(&[0x00, 0x01, 0xAB, 0xCD, 0x00, 0x02, 0x01, 0x03])
                .unwrap_err()
                .is_decode_failure()
        );
    }

    #[test]
    fn test_build_datagram_carries_transaction_id() {
        let mut response = Response::new(1, ResponsePdu::Diagnostics(Diagnostics::new(0, 0xA537)));
        response.transaction_id = 0xBEEF;
        assert_eq!(
            build_datagram(&response),
            vec![0xBE, 0xEF, 0x00, 0x00, 0x00, 0x06, 0x01, 0x08, 0x00, 0x00, 0xA5, 0x37]
        );
    }
}
