//! Access logging middleware.
//!
//! # Responsibilities
//! - Wrap the response sink with [`ResponseMetrics`] hooks
//! - Log method, path, status, body bytes and latency per request
//! - Feed the Prometheus response metrics
//!
//! # Design Decisions
//! - The inner handler sees a sink with exactly the capabilities of the
//!   transport sink, so flushing and bulk transfers keep working
//! - Bytes moved by the file fast path are not counted

use std::sync::Arc;
use std::time::Instant;

use axum::http::{Request, StatusCode};
use bytes::Bytes;

use crate::hooks::ResponseMetrics;
use crate::http::handler::Handler;
use crate::observability::metrics;
use crate::sink::ResponseSink;
use crate::wrap::{wrap_with_pool, BufferPool};

/// Logs every response produced by `next`.
pub struct AccessLog {
    next: Arc<dyn Handler>,
    pool: Arc<BufferPool>,
}

impl AccessLog {
    pub fn new(next: Arc<dyn Handler>, pool: Arc<BufferPool>) -> Self {
        Self { next, pool }
    }
}

impl Handler for AccessLog {
    fn serve(&self, w: &dyn ResponseSink, req: &Request<Bytes>) {
        let start = Instant::now();
        let counters = ResponseMetrics::new();
        let wrapped = wrap_with_pool(w, &counters, &self.pool);

        self.next.serve(&wrapped, req);

        let status = counters.status().unwrap_or(StatusCode::OK);
        let bytes = counters.bytes_written();
        tracing::info!(
            method = %req.method(),
            path = %req.uri().path(),
            status = status.as_u16(),
            bytes,
            capabilities = ?wrapped.capabilities(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request served"
        );
        metrics::record_response(req.method().as_str(), status.as_u16(), bytes, start);
    }
}
