//! Error handling for the Modbus slave stack
//!
//! Every layer (codec, framer, byte-stream port, dispatch loop) reports
//! failures through [`ModbusError`]. The dispatch loop never matches on
//! individual variants directly; it asks the error how it should be
//! handled ([`ModbusError::recovery`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// ExceptionCode - Modbus exception responses
// ============================================================================

/// Modbus exception codes carried by exception responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    SlaveDeviceFailure = 0x04,
    Acknowledge = 0x05,
    SlaveDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDeviceFailedToRespond = 0x0B,
}

impl ExceptionCode {
    /// Convert from the raw wire byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::IllegalFunction),
            0x02 => Some(Self::IllegalDataAddress),
            0x03 => Some(Self::IllegalDataValue),
            0x04 => Some(Self::SlaveDeviceFailure),
            0x05 => Some(Self::Acknowledge),
            0x06 => Some(Self::SlaveDeviceBusy),
            0x08 => Some(Self::MemoryParityError),
            0x0A => Some(Self::GatewayPathUnavailable),
            0x0B => Some(Self::GatewayTargetDeviceFailedToRespond),
            _ => None,
        }
    }

    /// Raw wire byte
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Human-readable description
    pub fn description(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Function code received in the query is not recognized or allowed by slave",
            Self::IllegalDataAddress => "Data address of some or all the required entities are not allowed or do not exist in slave",
            Self::IllegalDataValue => "Value is not accepted by slave",
            Self::SlaveDeviceFailure => "Unrecoverable error occurred while slave was attempting to perform requested action",
            Self::Acknowledge => "Slave has accepted request and is processing it, but a long duration of time is required",
            Self::SlaveDeviceBusy => "Slave is engaged in processing a long-duration command",
            Self::MemoryParityError => "Slave detected a parity error in memory",
            Self::GatewayPathUnavailable => "Gateway could not allocate an internal communication path",
            Self::GatewayTargetDeviceFailedToRespond => "Gateway target device failed to respond",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exception 0x{:02X}: {}", self.code(), self.description())
    }
}

// ============================================================================
// TransportError - byte-stream / datagram collaborator errors
// ============================================================================

/// Errors raised by the byte-stream and datagram ports
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The underlying handle was closed (normal shutdown)
    #[error("Transport closed")]
    Closed,

    /// No data arrived within the configured window
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Link-level fault
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected => Self::Closed,
            _ => Self::Io(err.to_string()),
        }
    }
}

// ============================================================================
// ModbusError - Main error type
// ============================================================================

/// Main error type for the Modbus slave stack
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModbusError {
    // ======================================
    // Decode Errors
    // ======================================
    #[error("Format error: {message} (expected {expected} bytes, got {actual})")]
    Format {
        expected: usize,
        actual: usize,
        message: String,
    },

    #[error("Unsupported function code 0x{0:02X}")]
    UnsupportedFunction(u8),

    // ======================================
    // Link Errors
    // ======================================
    #[error("Checksum mismatch: computed {expected:02X?}, received {actual:02X?}")]
    Checksum { expected: Vec<u8>, actual: Vec<u8> },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport closed")]
    Closed,

    // ======================================
    // Configuration & Executor Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Slave {0}")]
    Exception(ExceptionCode),
}

/// Result type alias using ModbusError
pub type ModbusResult<T> = Result<T, ModbusError>;

/// What the dispatch loop does after a failed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Discard the input buffer and listen again
    Resynchronize,
    /// Drop the current frame and listen again
    AbortCycle,
    /// Stop listening
    Terminate,
}

/// Error category enum - used for classification and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Decode,
    Link,
    Timeout,
    Shutdown,
    Configuration,
    Protocol,
}

impl ModbusError {
    /// Frame shorter than a function family's minimum size
    pub fn too_short(expected: usize, actual: usize) -> Self {
        Self::Format {
            expected,
            actual,
            message: "Message frame does not contain enough bytes".to_string(),
        }
    }

    /// Structurally invalid frame
    pub fn format(message: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::Format {
            expected,
            actual,
            message: message.into(),
        }
    }

    /// Stable error code (for logs and statistics)
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Format { .. } => "FORMAT_ERROR",
            Self::UnsupportedFunction(_) => "UNSUPPORTED_FUNCTION",
            Self::Checksum { .. } => "CHECKSUM_MISMATCH",
            Self::Io(_) => "IO_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Closed => "CLOSED",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Exception(_) => "SLAVE_EXCEPTION",
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Format { .. } | Self::UnsupportedFunction(_) => ErrorCategory::Decode,
            Self::Checksum { .. } | Self::Io(_) => ErrorCategory::Link,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Closed => ErrorCategory::Shutdown,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Exception(_) => ErrorCategory::Protocol,
        }
    }

    /// How a listening slave recovers from this error
    pub fn recovery(&self) -> Recovery {
        match self.category() {
            ErrorCategory::Link | ErrorCategory::Timeout => Recovery::Resynchronize,
            ErrorCategory::Shutdown | ErrorCategory::Configuration => Recovery::Terminate,
            ErrorCategory::Decode | ErrorCategory::Protocol => Recovery::AbortCycle,
        }
    }

    /// Link or timeout fault
    pub fn is_recoverable(&self) -> bool {
        self.recovery() == Recovery::Resynchronize
    }

    /// Frame could not be turned into a message
    pub fn is_decode_failure(&self) -> bool {
        self.category() == ErrorCategory::Decode
    }

    /// Underlying handle was closed
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Get log level
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Link | ErrorCategory::Configuration => Level::ERROR,
            ErrorCategory::Decode | ErrorCategory::Protocol => Level::WARN,
            ErrorCategory::Shutdown => Level::INFO,
            // Idle serial lines time out all the time
            ErrorCategory::Timeout => Level::DEBUG,
        }
    }
}

impl From<TransportError> for ModbusError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed => Self::Closed,
            TransportError::Timeout(after) => Self::Timeout(after),
            TransportError::Io(msg) => Self::Io(msg),
        }
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        TransportError::from(err).into()
    }
}

impl From<ExceptionCode> for ModbusError {
    fn from(code: ExceptionCode) -> Self {
        Self::Exception(code)
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::ModbusError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::ModbusError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! io_error {
    ($msg:expr) => {
        $crate::ModbusError::Io($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::ModbusError::Io(format!($fmt, $($arg)*))
    };
}

// Tests
#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_recovery_classification() {
        assert_eq!(
            ModbusError::Io("line noise".into()).recovery(),
            Recovery::Resynchronize
        );
        assert_eq!(
            ModbusError::Timeout(Duration::from_millis(50)).recovery(),
            Recovery::Resynchronize
        );
        assert_eq!(
            ModbusError::Checksum {
                expected: vec![0x12],
                actual: vec![0x13]
            }
            .recovery(),
            Recovery::Resynchronize
        );
        assert_eq!(ModbusError::too_short(6, 3).recovery(), Recovery::AbortCycle);
        assert_eq!(
            ModbusError::UnsupportedFunction(0x42).recovery(),
            Recovery::AbortCycle
        );
        assert_eq!(ModbusError::Closed.recovery(), Recovery::Terminate);
    }

    #[test]
    fn test_transport_error_conversion() {
        assert_eq!(ModbusError::from(TransportError::Closed), ModbusError::Closed);
        assert!(ModbusError::from(TransportError::Timeout(Duration::from_secs(1))).is_recoverable());

        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(ModbusError::from(eof).is_closed());

        let other = std::io::Error::new(std::io::ErrorKind::Other, "framing");
        assert!(matches!(ModbusError::from(other), ModbusError::Io(_)));
    }

    #[test]
    fn test_format_error_carries_lengths() {
        let err = ModbusError::too_short(11, 7);
        let text = err.to_string();
        assert!(text.contains("expected 11"));
        assert!(text.contains("got 7"));
        assert!(err.is_decode_failure());
        assert_eq!(err.error_code(), "FORMAT_ERROR");
    }

    #[test]
    fn test_unsupported_function_names_code() {
        let err = ModbusError::UnsupportedFunction(0x2B);
        assert_eq!(err.to_string(), "Unsupported function code 0x2B");
    }

    #[test]
    fn test_exception_code_conversion() {
        for code in [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x08, 0x0A, 0x0B] {
            assert_eq!(ExceptionCode::from_u8(code).unwrap().code(), code);
        }
        assert_eq!(ExceptionCode::from_u8(0x07), None);
        assert_eq!(ExceptionCode::from_u8(0x00), None);
    }

    #[test]
    fn test_exception_code_serde() {
        let json = serde_json::to_string(&ExceptionCode::IllegalDataAddress).unwrap();
        assert_eq!(json, "\"IllegalDataAddress\"");
    }

    #[test]
    fn test_macros() {
        let err = config_error!("unit id {} out of range", 300);
        assert_eq!(err.to_string(), "Configuration error: unit id 300 out of range");
        assert!(matches!(io_error!("broken"), ModbusError::Io(_)));
    }
}
