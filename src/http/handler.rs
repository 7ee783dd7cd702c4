//! Synchronous request handlers.
//!
//! A handler writes its response into a [`ResponseSink`]. Middleware wraps
//! the sink before delegating, so the inner handler never knows whether it
//! is being observed.

use axum::http::Request;
use bytes::Bytes;

use crate::sink::ResponseSink;

/// A handler producing a response into a sink.
pub trait Handler: Send + Sync + 'static {
    fn serve(&self, w: &dyn ResponseSink, req: &Request<Bytes>);
}

impl<F> Handler for F
where
    F: Fn(&dyn ResponseSink, &Request<Bytes>) + Send + Sync + 'static,
{
    fn serve(&self, w: &dyn ResponseSink, req: &Request<Bytes>) {
        self(w, req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::recorder::ResponseRecorder;
    use axum::http::StatusCode;
    use std::sync::Arc;

    #[test]
    fn closures_are_handlers() {
        let handler: Arc<dyn Handler> = Arc::new(|w: &dyn ResponseSink, _req: &Request<Bytes>| {
            w.write_header(StatusCode::NO_CONTENT);
        });
        let recorder = ResponseRecorder::new();

        handler.serve(&recorder, &Request::new(Bytes::new()));

        assert_eq!(recorder.status(), StatusCode::NO_CONTENT);
    }
}
