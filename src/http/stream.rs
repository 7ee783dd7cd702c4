//! Sink bridged into a streaming axum response.
//!
//! # Data Flow
//! ```text
//! blocking handler thread                     async response task
//! StreamingSink::write_header ── head ──▶    PendingResponse::into_response
//! StreamingSink::write/flush  ── chunks ──▶  Body::from_stream
//!                              ◀── closed ── body dropped (client gone / done)
//! ```
//!
//! # Design Decisions
//! - The head is sent on status commit; body chunks can only follow it
//! - Writes are buffered up to `chunk_size` and sent as one chunk
//! - The channel is bounded, so a slow client applies backpressure to the
//!   handler thread
//! - Dropping the sink commits `200 OK` if needed and flushes what is left

use std::convert::Infallible;
use std::io;
use std::sync::{Mutex, MutexGuard};

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};

use crate::sink::{BodySource, CloseNotifier, Flusher, Headers, ReaderFrom, ResponseSink};

struct Head {
    status: StatusCode,
    headers: HeaderMap,
}

struct SinkState {
    head: Option<oneshot::Sender<Head>>,
    buffer: Vec<u8>,
}

/// Sink side of a streamed response.
///
/// Sending blocks, so the sink must be used and dropped on a blocking
/// thread (`spawn_blocking` or a plain OS thread).
pub struct StreamingSink {
    headers: Headers,
    state: Mutex<SinkState>,
    body: mpsc::Sender<Bytes>,
    closed: watch::Receiver<bool>,
    chunk_size: usize,
}

/// Async side of a streamed response.
///
/// Dropping it, or the body built from it, flags the close-notify channel.
pub struct PendingResponse {
    head: oneshot::Receiver<Head>,
    body: mpsc::Receiver<Bytes>,
    closed: ClosedGuard,
}

/// Create a connected sink / response pair.
///
/// `chunk_size` bounds the bytes buffered before a chunk is sent and
/// `capacity` bounds the chunks in flight.
pub fn channel(chunk_size: usize, capacity: usize) -> (StreamingSink, PendingResponse) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(capacity.max(1));
    let (closed_tx, closed_rx) = watch::channel(false);

    let sink = StreamingSink {
        headers: Headers::new(),
        state: Mutex::new(SinkState {
            head: Some(head_tx),
            buffer: Vec::new(),
        }),
        body: body_tx,
        closed: closed_rx,
        chunk_size: chunk_size.max(1),
    };
    let pending = PendingResponse {
        head: head_rx,
        body: body_rx,
        closed: ClosedGuard(closed_tx),
    };
    (sink, pending)
}

fn commit(headers: &Headers, state: &mut SinkState, status: StatusCode) {
    if let Some(tx) = state.head.take() {
        let head = Head {
            status,
            headers: headers.snapshot(),
        };
        if tx.send(head).is_err() {
            tracing::debug!(status = %status, "Response dropped before head was sent");
        }
    }
}

fn send_chunk(body: &mpsc::Sender<Bytes>, chunk: Vec<u8>) -> io::Result<()> {
    body.blocking_send(Bytes::from(chunk)).map_err(|_| {
        io::Error::new(io::ErrorKind::BrokenPipe, "response body receiver dropped")
    })
}

impl StreamingSink {
    fn state(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().expect("streaming sink mutex poisoned")
    }

    fn flush_buffer(&self, state: &mut SinkState) -> io::Result<()> {
        if state.buffer.is_empty() {
            return Ok(());
        }
        send_chunk(&self.body, std::mem::take(&mut state.buffer))
    }
}

impl ResponseSink for StreamingSink {
    fn headers(&self) -> Headers {
        self.headers.clone()
    }

    fn write_header(&self, status: StatusCode) {
        commit(&self.headers, &mut self.state(), status);
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state();
        commit(&self.headers, &mut state, StatusCode::OK);
        state.buffer.extend_from_slice(buf);
        if state.buffer.len() >= self.chunk_size {
            self.flush_buffer(&mut state)?;
        }
        Ok(buf.len())
    }

    fn as_flusher(&self) -> Option<&dyn Flusher> {
        Some(self)
    }

    fn as_reader_from(&self) -> Option<&dyn ReaderFrom> {
        Some(self)
    }

    fn as_close_notifier(&self) -> Option<&dyn CloseNotifier> {
        Some(self)
    }
}

impl Flusher for StreamingSink {
    fn flush(&self) -> io::Result<()> {
        let mut state = self.state();
        commit(&self.headers, &mut state, StatusCode::OK);
        self.flush_buffer(&mut state)
    }
}

impl ReaderFrom for StreamingSink {
    fn read_from(&self, src: &mut dyn BodySource) -> io::Result<u64> {
        let mut state = self.state();
        commit(&self.headers, &mut state, StatusCode::OK);
        self.flush_buffer(&mut state)?;

        let mut total = 0u64;
        loop {
            let mut chunk = vec![0u8; self.chunk_size];
            let n = match src.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            chunk.truncate(n);
            send_chunk(&self.body, chunk)?;
            total += n as u64;
        }
        Ok(total)
    }
}

impl CloseNotifier for StreamingSink {
    fn close_notify(&self) -> watch::Receiver<bool> {
        self.closed.clone()
    }
}

impl Drop for StreamingSink {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        commit(&self.headers, state, StatusCode::OK);
        if !state.buffer.is_empty() {
            let _ = send_chunk(&self.body, std::mem::take(&mut state.buffer));
        }
    }
}

/// Flags the close-notify channel when the body stream goes away.
struct ClosedGuard(watch::Sender<bool>);

impl Drop for ClosedGuard {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

impl PendingResponse {
    /// Wait for the head, then stream the body as it is produced.
    pub async fn into_response(self) -> Response {
        let PendingResponse { head, body, closed } = self;
        let head = match head.await {
            Ok(head) => head,
            Err(_) => {
                tracing::error!("Response sink dropped without a head");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let state = (body, closed);
        let chunks = futures_util::stream::unfold(state, |(mut body, closed)| async move {
            body.recv()
                .await
                .map(|chunk| (Ok::<_, Infallible>(chunk), (body, closed)))
        });

        let mut response = Response::new(Body::from_stream(chunks));
        *response.status_mut() = head.status;
        *response.headers_mut() = head.headers;
        response
    }
}
