//! Modbus TCP: MBAP header + unit id + PDU, no checksum

use std::time::Duration;

use async_trait::async_trait;
use errors::ModbusResult;
use tracing::debug;

use super::mbap::{build_mbap_frame, MbapHeader, MBAP_HEADER_LENGTH};
use super::{Framer, RawFrame};
use crate::logging::format_hex;
use crate::message::ModbusMessage;
use crate::port::ByteStream;

#[derive(Debug)]
pub struct TcpFramer<S> {
    stream: S,
    timeout: Option<Duration>,
}

impl<S: ByteStream> TcpFramer<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn read_frame(&mut self) -> ModbusResult<RawFrame> {
        let mut header_bytes = [0u8; MBAP_HEADER_LENGTH];
        self.stream
            .read_exact(&mut header_bytes, self.timeout)
            .await?;

        let header = MbapHeader::parse(&header_bytes)?;

        // The length field is at most 64 KiB, so the body is always consumed
        // before validation and a bad header costs only its own frame.
        let mut message = vec![0u8; header.length as usize];
        self.stream.read_exact(&mut message, self.timeout).await?;

        debug!(
            "{} RX: {} {}",
            self.stream.name(),
            format_hex(&header_bytes),
            format_hex(&message)
        );

        header.validate_length()?;
        header.validate_protocol()?;

        Ok(RawFrame {
            transaction_id: header.transaction_id,
            message,
            checksum: Vec::new(),
        })
    }
}

#[async_trait]
impl<S: ByteStream> Framer for TcpFramer<S> {
    fn name(&self) -> &str {
        self.stream.name()
    }

    async fn read_request(&mut self) -> ModbusResult<RawFrame> {
        self.read_frame().await
    }

    async fn read_response(&mut self) -> ModbusResult<RawFrame> {
        self.read_frame().await
    }

    fn build_frame(&self, message: &dyn ModbusMessage) -> Vec<u8> {
        build_mbap_frame(message)
    }

    async fn write_frame(&mut self, frame: &[u8]) -> ModbusResult<()> {
        debug!("{} TX: {}", self.stream.name(), format_hex(frame));
        Ok(self.stream.write_all(frame).await?)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::message::{
        ReadRegistersResponse, Response, ResponsePdu, WriteSingleRegister,
    };
    use crate::port::MockStream;
    use errors::ModbusError;

    #[tokio::test]
    async fn test_read_request_and_build_response() {
        let (stream, handle) = MockStream::new("tcp");
        handle
            .push_bytes(vec![
                0x00, 0x2A, 0x00, 0x00, 0x00, 0x06, 0x11, 0x03, 0x00, 0x6B, 0x00, 0x02,
            ])
            .await;
        let mut framer = TcpFramer::new(stream);

        let frame = framer.read_request().await.unwrap();
        assert_eq!(frame.transaction_id, 0x2A);
        assert_eq!(frame.message, vec![0x11, 0x03, 0x00, 0x6B, 0x00, 0x02]);
        assert!(frame.checksum.is_empty());

        let mut response = Response::new(
            0x11,
            ResponsePdu::ReadHoldingRegisters(ReadRegistersResponse::new(vec![0x022B, 0x0000])),
        );
        response.transaction_id = frame.transaction_id;
        assert_eq!(
            framer.build_frame(&response),
            vec![
                0x00, 0x2A, 0x00, 0x00, 0x00, 0x07, 0x11, 0x03, 0x04, 0x02, 0x2B, 0x00, 0x00
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_protocol_id_keeps_stream_aligned() {
        let (stream, handle) = MockStream::new("tcp");
        handle
            .push_bytes(vec![0x00, 0x01, 0x00, 0x05, 0x00, 0x02, 0x01, 0x03])
            .await;
        handle
            .push_bytes(vec![0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x01, 0x00, 0x03])
            .await;
        let mut framer = TcpFramer::new(stream);

        let err = framer.read_request().await.unwrap_err();
        assert!(err.is_decode_failure());

        let frame = framer.read_request().await.unwrap();
        assert_eq!(frame.transaction_id, 2);
        let request = crate::message::create_request(&frame.message).unwrap();
        assert_eq!(
            request.pdu,
            crate::message::RequestPdu::WriteSingleRegister(WriteSingleRegister::new(1, 3))
        );
    }

    #[tokio::test]
    async fn test_bad_length_keeps_stream_aligned() {
        let (stream, handle) = MockStream::new("tcp");
        // Length 1 cannot hold a unit id and a function code
        handle
            .push_bytes(vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x01])
            .await;
        handle
            .push_bytes(vec![0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01])
            .await;
        let mut framer = TcpFramer::new(stream);

        let err = framer.read_request().await.unwrap_err();
        assert!(matches!(err, ModbusError::Format { .. }));

        let frame = framer.read_request().await.unwrap();
        assert_eq!(frame.transaction_id, 2);
        assert_eq!(frame.message, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
    }

    #[tokio::test]
    async fn test_zero_length_rejected() {
        let (stream, handle) = MockStream::new("tcp");
        handle.push_bytes(vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x00]).await;
        let mut framer = TcpFramer::new(stream);
        let err = framer.read_request().await.unwrap_err();
        assert!(matches!(err, ModbusError::Format { .. }));
    }
}
