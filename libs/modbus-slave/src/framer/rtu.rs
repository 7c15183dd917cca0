//! Modbus RTU: address + PDU + CRC16 (low byte first)
//!
//! RTU has no delimiters. A read takes a fixed-size start, then keeps
//! reading however many bytes the function code's length rules say are
//! still missing. Function 0x17 needs two rounds: its byte count sits at
//! offset 10, past the initial read.

use std::time::Duration;

use async_trait::async_trait;
use errors::{ModbusError, ModbusResult};
use tracing::debug;

use super::{Framer, RawFrame};
use crate::checksum::ChecksumKind;
use crate::logging::format_hex;
use crate::message::{ModbusMessage, EXCEPTION_FLAG};
use crate::port::ByteStream;

const CRC_LENGTH: usize = 2;

/// Bytes read before the request length is known
pub const REQUEST_FRAME_START_LENGTH: usize = 7;

/// Bytes read before the response length is known
pub const RESPONSE_FRAME_START_LENGTH: usize = 4;

/// Total request length (CRC included) implied by the bytes read so far
///
/// `frame` must hold at least [`REQUEST_FRAME_START_LENGTH`] bytes. The
/// result may grow once more bytes are read.
pub fn expected_request_length(frame: &[u8]) -> ModbusResult<usize> {
    match frame[1] {
        0x01..=0x06 | 0x08 => Ok(6 + CRC_LENGTH),
        0x0F | 0x10 => Ok(7 + frame[6] as usize + CRC_LENGTH),
        0x17 if frame.len() < 11 => Ok(11),
        0x17 => Ok(11 + frame[10] as usize + CRC_LENGTH),
        other => Err(ModbusError::UnsupportedFunction(other)),
    }
}

/// Total response length (CRC included) implied by the bytes read so far
///
/// `frame` must hold at least [`RESPONSE_FRAME_START_LENGTH`] bytes.
pub fn expected_response_length(frame: &[u8]) -> ModbusResult<usize> {
    match frame[1] {
        code if code & EXCEPTION_FLAG != 0 => Ok(3 + CRC_LENGTH),
        0x01..=0x04 | 0x17 => Ok(3 + frame[2] as usize + CRC_LENGTH),
        0x05 | 0x06 | 0x08 | 0x0F | 0x10 => Ok(6 + CRC_LENGTH),
        other => Err(ModbusError::UnsupportedFunction(other)),
    }
}

#[derive(Debug)]
pub struct RtuFramer<S> {
    stream: S,
    check_frame: bool,
    timeout: Option<Duration>,
}

impl<S: ByteStream> RtuFramer<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            check_frame: true,
            timeout: None,
        }
    }

    pub fn with_check_frame(mut self, check_frame: bool) -> Self {
        self.check_frame = check_frame;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn check_frame(&self) -> bool {
        self.check_frame
    }

    async fn read_more(&mut self, frame: &mut Vec<u8>, count: usize) -> ModbusResult<()> {
        let start = frame.len();
        frame.resize(start + count, 0);
        self.stream
            .read_exact(&mut frame[start..], self.timeout)
            .await?;
        Ok(())
    }

    async fn read_frame(
        &mut self,
        start_length: usize,
        expected_length: fn(&[u8]) -> ModbusResult<usize>,
    ) -> ModbusResult<RawFrame> {
        let mut frame = Vec::with_capacity(256);
        self.read_more(&mut frame, start_length).await?;

        loop {
            let expected = expected_length(&frame)?;
            if frame.len() >= expected {
                break;
            }
            let missing = expected - frame.len();
            self.read_more(&mut frame, missing).await?;
        }

        debug!("{} RX: {}", self.stream.name(), format_hex(&frame));

        let checksum = frame.split_off(frame.len() - CRC_LENGTH);
        Ok(RawFrame {
            transaction_id: 0,
            message: frame,
            checksum,
        })
    }
}

#[async_trait]
impl<S: ByteStream> Framer for RtuFramer<S> {
    fn name(&self) -> &str {
        self.stream.name()
    }

    async fn read_request(&mut self) -> ModbusResult<RawFrame> {
        self.read_frame(REQUEST_FRAME_START_LENGTH, expected_request_length)
            .await
    }

    async fn read_response(&mut self) -> ModbusResult<RawFrame> {
        self.read_frame(RESPONSE_FRAME_START_LENGTH, expected_response_length)
            .await
    }

    fn build_frame(&self, message: &dyn ModbusMessage) -> Vec<u8> {
        let mut frame = message.message_frame();
        frame.extend(ChecksumKind::Crc16.compute(&frame));
        frame
    }

    async fn write_frame(&mut self, frame: &[u8]) -> ModbusResult<()> {
        debug!("{} TX: {}", self.stream.name(), format_hex(frame));
        Ok(self.stream.write_all(frame).await?)
    }

    fn verify(&self, frame: &RawFrame) -> ModbusResult<()> {
        if self.check_frame {
            frame.verify(ChecksumKind::Crc16)?;
        }
        Ok(())
    }

    async fn discard_input_buffer(&mut self) -> ModbusResult<()> {
        Ok(self.stream.discard_input_buffer().await?)
    }
}
