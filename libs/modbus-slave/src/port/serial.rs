use std::time::Duration;

use async_trait::async_trait;
use errors::{ModbusError, ModbusResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use super::{guarded, ByteStream, CloseHandle, TransportError};
use crate::config::{Parity, SerialConfig};

/// Serial line opened through tokio-serial
#[derive(Debug)]
pub struct SerialLine {
    stream: SerialStream,
    name: String,
    close: CloseHandle,
}

impl SerialLine {
    pub fn open(config: &SerialConfig, close: CloseHandle) -> ModbusResult<Self> {
        debug!("Opening serial port: {}", config.port);

        #[allow(unused_mut)]
        let mut stream = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(data_bits(config.data_bits))
            .parity(parity(config.parity))
            .stop_bits(stop_bits(config.stop_bits))
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                ModbusError::Io(format!("Failed to open serial port {}: {e}", config.port))
            })?;

        #[cfg(unix)]
        stream
            .set_exclusive(false)
            .map_err(|e| ModbusError::Io(format!("Failed to set exclusive mode: {e}")))?;

        info!(
            "Opened serial port {} at {} baud",
            config.port, config.baud_rate
        );
        Ok(Self {
            stream,
            name: config.port.clone(),
            close,
        })
    }
}

fn data_bits(bits: u8) -> tokio_serial::DataBits {
    match bits {
        5 => tokio_serial::DataBits::Five,
        6 => tokio_serial::DataBits::Six,
        7 => tokio_serial::DataBits::Seven,
        _ => tokio_serial::DataBits::Eight,
    }
}

fn stop_bits(bits: u8) -> tokio_serial::StopBits {
    match bits {
        2 => tokio_serial::StopBits::Two,
        _ => tokio_serial::StopBits::One,
    }
}

fn parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Even => tokio_serial::Parity::Even,
        Parity::Odd => tokio_serial::Parity::Odd,
    }
}

#[async_trait]
impl ByteStream for SerialLine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_exact(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<(), TransportError> {
        guarded(&self.close, timeout, self.stream.read_exact(buf))
            .await
            .map(|_| ())
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        guarded(&self.close, None, self.stream.write_all(data)).await
    }

    async fn discard_input_buffer(&mut self) -> Result<(), TransportError> {
        self.stream
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::Io(format!("Failed to clear input buffer: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_line_settings() {
        assert_eq!(data_bits(7), tokio_serial::DataBits::Seven);
        assert_eq!(data_bits(9), tokio_serial::DataBits::Eight);
        assert_eq!(stop_bits(2), tokio_serial::StopBits::Two);
        assert_eq!(parity(Parity::Even), tokio_serial::Parity::Even);
    }

    #[tokio::test]
    async fn test_open_missing_port() {
        let config = SerialConfig {
            port: "/dev/does-not-exist-modbus".to_string(),
            ..SerialConfig::default()
        };
        let err = SerialLine::open(&config, CloseHandle::new()).unwrap_err();
        assert!(err.to_string().contains("/dev/does-not-exist-modbus"));
    }
}
