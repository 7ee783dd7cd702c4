//! Demo handlers served by the host.
//!
//! Each one exercises a different part of the sink protocol: plain writes,
//! flushing, source-driven transfer, and the file fast path.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, Request, StatusCode};
use bytes::Bytes;
use serde::Serialize;

use crate::http::handler::Handler;
use crate::sink::{self, ResponseSink};
use crate::wrap::BufferPool;

fn set_content_type(w: &dyn ResponseSink, value: &'static str) {
    w.headers()
        .lock()
        .insert(CONTENT_TYPE, HeaderValue::from_static(value));
}

fn plain_error(w: &dyn ResponseSink, status: StatusCode, message: &str) {
    set_content_type(w, "text/plain; charset=utf-8");
    w.write_header(status);
    if let Err(e) = w.write(message.as_bytes()) {
        tracing::debug!(error = %e, "Failed to write error body");
    }
}

/// `GET /`: a fixed greeting.
pub fn hello(w: &dyn ResponseSink, _req: &Request<Bytes>) {
    set_content_type(w, "text/plain; charset=utf-8");
    if let Err(e) = w.write(b"Hello, world!\n") {
        tracing::debug!(error = %e, "Client went away");
    }
}

/// `GET /stream`: numbered lines, flushed one at a time when possible.
///
/// `?lines=N` picks how many (default 10, capped at 10 000).
pub fn stream(w: &dyn ResponseSink, req: &Request<Bytes>) {
    let lines = query_param(req, "lines")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(10)
        .min(10_000);
    let closed = w.as_close_notifier().map(|n| n.close_notify());

    set_content_type(w, "text/plain; charset=utf-8");
    for i in 0..lines {
        if closed.as_ref().is_some_and(|rx| *rx.borrow()) {
            tracing::debug!(line = i, "Client closed stream");
            return;
        }
        if let Err(e) = w.write(format!("line {}\n", i).as_bytes()) {
            tracing::debug!(error = %e, line = i, "Stream write failed");
            return;
        }
        if let Some(flusher) = w.as_flusher() {
            if let Err(e) = flusher.flush() {
                tracing::debug!(error = %e, line = i, "Stream flush failed");
                return;
            }
        }
    }
}

/// `POST /echo`: sends the request body back.
pub fn echo(w: &dyn ResponseSink, req: &Request<Bytes>) {
    if let Some(content_type) = req.headers().get(CONTENT_TYPE) {
        w.headers().lock().insert(CONTENT_TYPE, content_type.clone());
    }
    w.headers()
        .lock()
        .insert(CONTENT_LENGTH, HeaderValue::from(req.body().len()));
    let mut body = Cursor::new(req.body().clone());
    if let Err(e) = sink::copy(w, &mut body) {
        tracing::debug!(error = %e, "Echo copy failed");
    }
}

/// `GET /files/{*path}`: serves files below a root directory.
///
/// `?limit=N` serves at most the first `N` bytes.
pub struct FileHandler {
    root: PathBuf,
}

impl FileHandler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a request path onto the root, rejecting anything that escapes it.
    fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = request_path.strip_prefix("/files/")?;
        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || relative.as_os_str().is_empty() {
            return None;
        }
        Some(self.root.join(relative))
    }

    fn send(&self, w: &dyn ResponseSink, path: &Path, limit: Option<u64>) -> io::Result<u64> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"));
        }
        let len = limit.map_or(metadata.len(), |l| l.min(metadata.len()));

        {
            let headers = w.headers();
            let mut headers = headers.lock();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        }

        match limit {
            Some(limit) => sink::copy(w, &mut file.take(limit)),
            None => {
                let mut file = file;
                sink::copy(w, &mut file)
            }
        }
    }
}

impl Handler for FileHandler {
    fn serve(&self, w: &dyn ResponseSink, req: &Request<Bytes>) {
        let Some(path) = self.resolve(req.uri().path()) else {
            plain_error(w, StatusCode::BAD_REQUEST, "invalid file path\n");
            return;
        };
        let limit = query_param(req, "limit").and_then(|v| v.parse::<u64>().ok());

        match self.send(w, &path, limit) {
            Ok(bytes) => tracing::debug!(path = %path.display(), bytes, "File sent"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                plain_error(w, StatusCode::NOT_FOUND, "not found\n");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "File transfer failed");
                plain_error(w, StatusCode::INTERNAL_SERVER_ERROR, "file transfer failed\n");
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct PoolStats {
    buffer_size: usize,
    idle_buffers: usize,
}

/// `GET /stats`: buffer pool occupancy as JSON.
pub struct Stats {
    pool: Arc<BufferPool>,
}

impl Stats {
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self { pool }
    }
}

impl Handler for Stats {
    fn serve(&self, w: &dyn ResponseSink, _req: &Request<Bytes>) {
        let stats = PoolStats {
            buffer_size: self.pool.buffer_size(),
            idle_buffers: self.pool.idle(),
        };
        let body = match serde_json::to_vec(&stats) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode stats");
                plain_error(w, StatusCode::INTERNAL_SERVER_ERROR, "stats unavailable\n");
                return;
            }
        };
        set_content_type(w, "application/json");
        let mut body = body.as_slice();
        if let Err(e) = sink::copy(w, &mut body) {
            tracing::debug!(error = %e, "Failed to write stats");
        }
    }
}

fn query_param<'r>(req: &'r Request<Bytes>, name: &str) -> Option<&'r str> {
    req.uri().query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}
