//! Logging helpers for the slave stack
//!
//! Frames are logged as upper-case, space-separated hex at `debug` level.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a console subscriber
///
/// `RUST_LOG` wins over `level` when set. Returns an error instead of
/// panicking if a global subscriber is already installed.
pub fn init(level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let default_level: Level = level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level.as_str()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;
    Ok(())
}

/// Format bytes as `01 03 00 0A`
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x01, 0x03, 0x00, 0x0A]), "01 03 00 0A");
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn test_init_twice_is_an_error() {
        // The first call may lose to another test's subscriber; the second never succeeds
        let _ = init("debug");
        assert!(init("debug").is_err());
    }
}
