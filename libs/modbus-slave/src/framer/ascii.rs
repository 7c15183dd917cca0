//! Modbus ASCII: `:` + hex(address, function, payload, LRC) + CRLF

use std::time::Duration;

use async_trait::async_trait;
use errors::{ModbusError, ModbusResult};
use tracing::debug;

use super::{Framer, RawFrame};
use crate::checksum::ChecksumKind;
use crate::message::ModbusMessage;
use crate::port::ByteStream;

pub const ASCII_START: u8 = b':';
pub const ASCII_END: &[u8] = b"\r\n";

/// Start char + 2 * (address + 253-byte PDU + LRC) + CRLF
const MAX_ASCII_FRAME_LENGTH: usize = 513;

#[derive(Debug)]
pub struct AsciiFramer<S> {
    stream: S,
    check_frame: bool,
    timeout: Option<Duration>,
}

impl<S: ByteStream> AsciiFramer<S> {
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

    /// Read up to and including the line feed
    async fn read_line(&mut self) -> ModbusResult<Vec<u8>> {
        let mut line = Vec::with_capacity(64);
        let mut byte = [0u8; 1];

        loop {
            self.stream.read_exact(&mut byte, self.timeout).await?;
            line.push(byte[0]);
            if byte[0] == b'\n' {
                return Ok(line);
            }
            if line.len() >= MAX_ASCII_FRAME_LENGTH {
                return Err(ModbusError::format(
                    "ASCII frame exceeds maximum length",
                    MAX_ASCII_FRAME_LENGTH,
                    line.len(),
                ));
            }
        }
    }

    async fn read_frame(&mut self) -> ModbusResult<RawFrame> {
        let line = self.read_line().await?;
        debug!(
            "{} RX: {}",
            self.stream.name(),
            String::from_utf8_lossy(&line).trim_end()
        );
        decode_line(&line)
    }
}

/// Strip delimiters, decode hex pairs and split off the LRC
fn decode_line(line: &[u8]) -> ModbusResult<RawFrame> {
    let body = match line.split_first() {
        Some((&ASCII_START, rest)) => rest,
        _ => return Err(ModbusError::Io("ASCII frame must start with ':'".to_string())),
    };
    let body = body
        .strip_suffix(ASCII_END)
        .or_else(|| body.strip_suffix(b"\n"))
        .unwrap_or(body);

    let mut bytes = hex::decode(body).map_err(|e| {
        ModbusError::format(
            format!("Invalid hex in ASCII frame: {e}"),
            body.len() + body.len() % 2,
            body.len(),
        )
    })?;

    let Some(lrc) = bytes.pop() else {
        return Err(ModbusError::too_short(ChecksumKind::Lrc.len(), 0));
    };

    Ok(RawFrame {
        transaction_id: 0,
        message: bytes,
        checksum: vec![lrc],
    })
}

#[async_trait]
impl<S: ByteStream> Framer for AsciiFramer<S> {
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
        let mut raw = message.message_frame();
        raw.extend(ChecksumKind::Lrc.compute(&raw));

        let mut frame = Vec::with_capacity(raw.len() * 2 + 3);
        frame.push(ASCII_START);
        frame.extend_from_slice(hex::encode_upper(&raw).as_bytes());
        frame.extend_from_slice(ASCII_END);
        frame
    }

    async fn write_frame(&mut self, frame: &[u8]) -> ModbusResult<()> {
        debug!(
            "{} TX: {}",
            self.stream.name(),
            String::from_utf8_lossy(frame).trim_end()
        );
        Ok(self.stream.write_all(frame).await?)
    }

    fn verify(&self, frame: &RawFrame) -> ModbusResult<()> {
        if self.check_frame {
            frame.verify(ChecksumKind::Lrc)?;
        }
        Ok(())
    }

    async fn discard_input_buffer(&mut self) -> ModbusResult<()> {
        Ok(self.stream.discard_input_buffer().await?)
    }
}
