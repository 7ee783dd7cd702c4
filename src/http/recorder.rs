//! In-memory response sink.
//!
//! # Responsibilities
//! - Record status, headers and body of a response for inspection
//! - Offer any chosen subset of the optional capabilities
//! - Convert the recorded response into an axum `Response`
//!
//! # Design Decisions
//! - Status defaults to 200 when nothing was committed
//! - The first `write_header` wins, later ones are ignored
//! - Hijacking hands out an in-memory connection and can happen once

use std::io::{self, Cursor};
use std::sync::Mutex;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;
use tokio::sync::watch;

use crate::sink::{
    BodySource, Capabilities, Capability, CloseNotifier, Flusher, Headers, Hijacked, Hijacker,
    PushOptions, Pusher, ReaderFrom, ResponseSink,
};

#[derive(Debug, Default)]
struct Recorded {
    status: Option<StatusCode>,
    body: Vec<u8>,
    flushes: usize,
    pushes: Vec<(String, Option<PushOptions>)>,
    hijacked: bool,
    native_transfers: usize,
}

/// A sink that keeps the whole response in memory.
#[derive(Debug)]
pub struct ResponseRecorder {
    capabilities: Capabilities,
    headers: Headers,
    recorded: Mutex<Recorded>,
    closed: watch::Sender<bool>,
}

impl ResponseRecorder {
    /// A recorder that can only flush, like a typical buffered transport.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::NONE.with(Capability::Flush))
    }

    /// A recorder offering exactly `capabilities`.
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            capabilities,
            headers: Headers::new(),
            recorded: Mutex::new(Recorded::default()),
            closed,
        }
    }

    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().expect("recorder mutex poisoned")
    }

    fn commit(recorded: &mut Recorded, status: StatusCode) {
        if recorded.status.is_none() {
            recorded.status = Some(status);
        }
    }

    /// Committed status, `200 OK` if none was committed.
    pub fn status(&self) -> StatusCode {
        self.recorded().status.unwrap_or(StatusCode::OK)
    }

    /// Whether any status was committed.
    pub fn status_committed(&self) -> bool {
        self.recorded().status.is_some()
    }

    pub fn body(&self) -> Vec<u8> {
        self.recorded().body.clone()
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.recorded().body).into_owned()
    }

    pub fn flushes(&self) -> usize {
        self.recorded().flushes
    }

    /// Targets pushed so far, in order.
    pub fn pushes(&self) -> Vec<String> {
        self.recorded()
            .pushes
            .iter()
            .map(|(target, _)| target.clone())
            .collect()
    }

    /// Targets pushed so far with the options each push carried.
    pub fn pushes_with_options(&self) -> Vec<(String, Option<PushOptions>)> {
        self.recorded().pushes.clone()
    }

    pub fn is_hijacked(&self) -> bool {
        self.recorded().hijacked
    }

    /// Number of `read_from` calls served natively.
    pub fn native_transfers(&self) -> usize {
        self.recorded().native_transfers
    }

    /// Signal a client disconnect to close-notify receivers.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    /// Build an axum response from what was recorded.
    pub fn into_response(self) -> Response {
        let recorded = self
            .recorded
            .into_inner()
            .expect("recorder mutex poisoned");
        let mut response = Response::new(Body::from(recorded.body));
        *response.status_mut() = recorded.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers.snapshot();
        response
    }
}

impl Default for ResponseRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for ResponseRecorder {
    fn headers(&self) -> Headers {
        self.headers.clone()
    }

    fn write_header(&self, status: StatusCode) {
        Self::commit(&mut self.recorded(), status);
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut recorded = self.recorded();
        Self::commit(&mut recorded, StatusCode::OK);
        recorded.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn as_flusher(&self) -> Option<&dyn Flusher> {
        self.capabilities
            .contains(Capability::Flush)
            .then_some(self as &dyn Flusher)
    }

    fn as_hijacker(&self) -> Option<&dyn Hijacker> {
        self.capabilities
            .contains(Capability::Hijack)
            .then_some(self as &dyn Hijacker)
    }

    fn as_pusher(&self) -> Option<&dyn Pusher> {
        self.capabilities
            .contains(Capability::Push)
            .then_some(self as &dyn Pusher)
    }

    fn as_reader_from(&self) -> Option<&dyn ReaderFrom> {
        self.capabilities
            .contains(Capability::ReadFrom)
            .then_some(self as &dyn ReaderFrom)
    }

    fn as_close_notifier(&self) -> Option<&dyn CloseNotifier> {
        self.capabilities
            .contains(Capability::CloseNotify)
            .then_some(self as &dyn CloseNotifier)
    }
}

impl Flusher for ResponseRecorder {
    fn flush(&self) -> io::Result<()> {
        let mut recorded = self.recorded();
        Self::commit(&mut recorded, StatusCode::OK);
        recorded.flushes += 1;
        Ok(())
    }
}

impl Hijacker for ResponseRecorder {
    fn hijack(&self) -> io::Result<Hijacked> {
        let mut recorded = self.recorded();
        if recorded.hijacked {
            return Err(io::Error::other("connection has already been hijacked"));
        }
        recorded.hijacked = true;
        Ok(Hijacked {
            conn: Box::new(Cursor::new(Vec::<u8>::new())),
            read_buf: Bytes::new(),
        })
    }
}

impl Pusher for ResponseRecorder {
    fn push(&self, target: &str, opts: Option<&PushOptions>) -> io::Result<()> {
        self.recorded()
            .pushes
            .push((target.to_string(), opts.cloned()));
        Ok(())
    }
}

impl ReaderFrom for ResponseRecorder {
    fn read_from(&self, src: &mut dyn BodySource) -> io::Result<u64> {
        let mut data: Vec<u8> = Vec::new();
        let n = io::copy(src, &mut data)?;
        let mut recorded = self.recorded();
        Self::commit(&mut recorded, StatusCode::OK);
        recorded.body.extend_from_slice(&data);
        recorded.native_transfers += 1;
        Ok(n)
    }
}

impl CloseNotifier for ResponseRecorder {
    fn close_notify(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::HeaderValue;

    #[test]
    fn defaults_to_ok() {
        let recorder = ResponseRecorder::new();
        assert_eq!(recorder.status(), StatusCode::OK);
        assert!(!recorder.status_committed());
    }

    #[test]
    fn first_status_wins() {
        let recorder = ResponseRecorder::new();
        recorder.write_header(StatusCode::CREATED);
        recorder.write_header(StatusCode::NOT_FOUND);
        assert_eq!(recorder.status(), StatusCode::CREATED);
    }

    #[test]
    fn second_hijack_fails() {
        let recorder = ResponseRecorder::with_capabilities(Capabilities::ALL);
        recorder.hijack().unwrap();
        assert!(recorder.hijack().is_err());
    }

    #[test]
    fn only_chosen_capabilities_are_offered() {
        let caps = Capabilities::NONE
            .with(Capability::Push)
            .with(Capability::CloseNotify);
        let recorder = ResponseRecorder::with_capabilities(caps);

        assert!(recorder.as_pusher().is_some());
        assert!(recorder.as_close_notifier().is_some());
        assert!(recorder.as_flusher().is_none());
        assert!(recorder.as_hijacker().is_none());
        assert!(recorder.as_reader_from().is_none());
    }

    #[tokio::test]
    async fn converts_into_axum_response() {
        let recorder = ResponseRecorder::new();
        recorder
            .headers()
            .lock()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        recorder.write_header(StatusCode::ACCEPTED);
        recorder.write(b"queued").unwrap();

        let response = recorder.into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"queued");
    }
}
