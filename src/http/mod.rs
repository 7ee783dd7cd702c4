//! HTTP host subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, body limit, request ID)
//!     → stream.rs (StreamingSink on a blocking thread)
//!     → middleware/ (wrap the sink, delegate)
//!     → handlers.rs (write the response)
//!     → stream.rs (chunks back into the async response body)
//!     → Send to client
//! ```
//!
//! `recorder.rs` is the in-memory sink used wherever no connection exists.

pub mod handler;
pub mod handlers;
pub mod middleware;
pub mod recorder;
pub mod server;
pub mod stream;

pub use handler::Handler;
pub use recorder::ResponseRecorder;
pub use server::{AppState, HttpServer};
