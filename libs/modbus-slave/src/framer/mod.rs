//! Transport framers
//!
//! A framer turns a message into its on-wire frame and reads one complete
//! frame off a byte stream. What comes back from a read is a [`RawFrame`]:
//! the message frame (`[slave][pdu]`) plus whatever the transport wrapped
//! around it (transaction id, checksum). Decoding into a typed message is
//! left to the caller so that a slave can still address an exception
//! response to a frame whose body it does not understand.

mod ascii;
mod mbap;
mod rtu;
mod tcp;
mod udp;

pub use ascii::{AsciiFramer, ASCII_END, ASCII_START};
pub use mbap::{MbapHeader, MBAP_HEADER_LENGTH, MODBUS_PROTOCOL_ID};
pub use rtu::{expected_request_length, expected_response_length, RtuFramer};
pub use tcp::TcpFramer;
pub use udp::{build_datagram, parse_datagram, MIN_DATAGRAM_LENGTH};

use async_trait::async_trait;
use errors::{ModbusError, ModbusResult};

use crate::checksum::ChecksumKind;
use crate::message::ModbusMessage;

/// One frame as read off the wire
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFrame {
    /// MBAP transaction id; 0 on serial links
    pub transaction_id: u16,
    /// Slave address followed by the protocol data unit
    pub message: Vec<u8>,
    /// Trailing checksum bytes; empty on TCP/UDP
    pub checksum: Vec<u8>,
}

impl RawFrame {
    pub fn slave_address(&self) -> Option<u8> {
        self.message.first().copied()
    }

    pub fn function_code(&self) -> Option<u8> {
        self.message.get(1).copied()
    }

    /// Compare the received checksum against the one computed over the message
    pub fn verify(&self, kind: ChecksumKind) -> ModbusResult<()> {
        let expected = kind.compute(&self.message);
        if expected != self.checksum {
            return Err(ModbusError::Checksum {
                expected,
                actual: self.checksum.clone(),
            });
        }
        Ok(())
    }
}

/// Stream-oriented framer (ASCII, RTU, TCP)
#[async_trait]
pub trait Framer: Send {
    /// Port name for logs
    fn name(&self) -> &str;

    /// Read one request frame
    async fn read_request(&mut self) -> ModbusResult<RawFrame>;

    /// Read one response frame
    async fn read_response(&mut self) -> ModbusResult<RawFrame>;

    /// Wrap a message in this transport's framing
    fn build_frame(&self, message: &dyn ModbusMessage) -> Vec<u8>;

    async fn write_frame(&mut self, frame: &[u8]) -> ModbusResult<()>;

    /// Validate, frame and send a message
    async fn write(&mut self, message: &dyn ModbusMessage) -> ModbusResult<()> {
        message.validate()?;
        let frame = self.build_frame(message);
        self.write_frame(&frame).await
    }

    /// Checksum policy; transports without a checksum accept everything
    fn verify(&self, _frame: &RawFrame) -> ModbusResult<()> {
        Ok(())
    }

    async fn discard_input_buffer(&mut self) -> ModbusResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_verify_reports_both_checksums() {
        let frame = RawFrame {
            transaction_id: 0,
            message: vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x02],
            checksum: vec![0xC4, 0x0C],
        };
        assert_eq!(
            frame.verify(ChecksumKind::Crc16).unwrap_err(),
            ModbusError::Checksum {
                expected: vec![0xC4, 0x0B],
                actual: vec![0xC4, 0x0C],
            }
        );
        assert_eq!(frame.slave_address(), Some(1));
        assert_eq!(frame.function_code(), Some(3));
        assert_eq!(RawFrame::default().function_code(), None);
    }
}
