//! Byte and status accounting hook.

use std::io;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use axum::http::StatusCode;

use crate::hooks::Hooks;
use crate::sink::ResponseSink;

/// Counts body bytes and captures the committed status.
#[derive(Debug, Default)]
pub struct ResponseMetrics {
    bytes_written: AtomicU64,
    writes: AtomicU64,
    status: AtomicU16,
}

impl ResponseMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes the write hook passed to the sink.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Number of write hook invocations.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Committed status, `None` if nothing was committed.
    pub fn status(&self) -> Option<StatusCode> {
        match self.status.load(Ordering::Acquire) {
            0 => None,
            code => StatusCode::from_u16(code).ok(),
        }
    }
}

impl Hooks for ResponseMetrics {
    fn hook_write(&self, sink: &dyn ResponseSink, buf: &[u8]) -> io::Result<usize> {
        let n = sink.write(buf)?;
        self.bytes_written.fetch_add(n as u64, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(n)
    }

    fn hook_write_header(&self, sink: &dyn ResponseSink, status: StatusCode) {
        self.status.store(status.as_u16(), Ordering::Release);
        sink.write_header(status);
    }
}
