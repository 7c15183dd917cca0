//! Observability sink injected into the slave hosts

use std::sync::atomic::{AtomicU64, Ordering};

use errors::{ErrorCategory, ModbusError};
use serde::Serialize;

use crate::framer::RawFrame;
use crate::message::{Request, Response};

/// Callbacks fired by a slave at each step of a cycle
///
/// Every method defaults to a no-op.
pub trait SlaveObserver: Send + Sync {
    fn frame_received(&self, _frame: &RawFrame) {}

    /// Well-formed request addressed to another unit
    fn request_ignored(&self, _request: &Request) {}

    fn response_sent(&self, _response: &Response) {}

    fn cycle_failed(&self, _error: &ModbusError) {}

    fn terminated(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SlaveObserver for NoopObserver {}

/// Counters over the lifetime of one or more slaves
#[derive(Debug, Default)]
pub struct SlaveStats {
    frames_received: AtomicU64,
    requests_ignored: AtomicU64,
    responses_sent: AtomicU64,
    exceptions_sent: AtomicU64,
    decode_errors: AtomicU64,
    link_errors: AtomicU64,
    timeouts: AtomicU64,
    terminations: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_received: u64,
    pub requests_ignored: u64,
    pub responses_sent: u64,
    pub exceptions_sent: u64,
    pub decode_errors: u64,
    pub link_errors: u64,
    pub timeouts: u64,
    pub terminations: u64,
}

impl SlaveStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            requests_ignored: self.requests_ignored.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            exceptions_sent: self.exceptions_sent.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            link_errors: self.link_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            terminations: self.terminations.load(Ordering::Relaxed),
        }
    }
}

impl SlaveObserver for SlaveStats {
    fn frame_received(&self, _frame: &RawFrame) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    fn request_ignored(&self, _request: &Request) {
        self.requests_ignored.fetch_add(1, Ordering::Relaxed);
    }

    fn response_sent(&self, response: &Response) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        if response.is_exception() {
            self.exceptions_sent.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn cycle_failed(&self, error: &ModbusError) {
        let counter = match error.category() {
            ErrorCategory::Decode | ErrorCategory::Protocol => &self.decode_errors,
            ErrorCategory::Timeout => &self.timeouts,
            ErrorCategory::Link | ErrorCategory::Shutdown | ErrorCategory::Configuration => {
                &self.link_errors
            },
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn terminated(&self) {
        self.terminations.fetch_add(1, Ordering::Relaxed);
    }
}
