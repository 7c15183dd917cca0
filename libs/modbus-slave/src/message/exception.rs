use bytes::{BufMut, BytesMut};
use errors::{ExceptionCode, ModbusError, ModbusResult};

use super::PduCodec;

/// Bit set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Exception response: `[slave, fc | 0x80, code]`
///
/// `function_code` holds the original function code without the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function_code: u8,
    pub exception: ExceptionCode,
}

impl ExceptionResponse {
    pub fn new(function_code: u8, exception: ExceptionCode) -> Self {
        Self {
            function_code: function_code & !EXCEPTION_FLAG,
            exception,
        }
    }

    /// Function code as it appears on the wire
    pub fn wire_function_code(&self) -> u8 {
        self.function_code | EXCEPTION_FLAG
    }
}

impl PduCodec for ExceptionResponse {
    const MINIMUM_FRAME_SIZE: usize = 3;

    fn decode(frame: &[u8]) -> ModbusResult<Self> {
        let exception = ExceptionCode::from_u8(frame[2]).ok_or_else(|| {
            ModbusError::format(
                format!("Unknown exception code 0x{:02X}", frame[2]),
                Self::MINIMUM_FRAME_SIZE,
                frame.len(),
            )
        })?;
        Ok(Self::new(frame[1], exception))
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.exception.code());
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::message::create_message;

    #[test]
    fn test_exception_strips_flag() {
        let response: ExceptionResponse = create_message(&[0x01, 0x83, 0x02]).unwrap();
        assert_eq!(response.function_code, 0x03);
        assert_eq!(response.wire_function_code(), 0x83);
        assert_eq!(response.exception, ExceptionCode::IllegalDataAddress);
    }

    #[test]
    fn test_unknown_exception_code() {
        let err = create_message::<ExceptionResponse>(&[0x01, 0x83, 0x7F]).unwrap_err();
        assert!(err.is_decode_failure());
        assert!(err.to_string().contains("0x7F"));
    }
}
