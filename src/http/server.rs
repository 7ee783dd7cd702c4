//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the demo handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bridge each request onto a blocking handler thread
//! - Bind server to listener, with optional TLS
//! - Shut down gracefully on Ctrl+C

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{on, MethodFilter, MethodRouter},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{AppConfig, TlsConfig};
use crate::http::handler::Handler;
use crate::http::handlers::{self, FileHandler, Stats};
use crate::http::middleware::AccessLog;
use crate::http::stream;
use crate::wrap::BufferPool;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: Arc<BufferPool>,
}

/// HTTP server hosting the demo handlers.
pub struct HttpServer {
    router: Router,
    config: Arc<AppConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            pool: Arc::new(BufferPool::from_config(&config.transfer)),
            config: config.clone(),
        };
        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let pool = state.pool.clone();
        let logged = move |handler: Arc<dyn Handler>| -> Arc<dyn Handler> {
            Arc::new(AccessLog::new(handler, pool.clone()))
        };
        let stats = logged(Arc::new(Stats::new(state.pool.clone())));
        let timeout = Duration::from_secs(state.config.limits.request_timeout_secs);

        let mut router = Router::new()
            .route("/", endpoint(MethodFilter::GET, logged(Arc::new(handlers::hello))))
            .route("/stream", endpoint(MethodFilter::GET, logged(Arc::new(handlers::stream))))
            .route("/echo", endpoint(MethodFilter::POST, logged(Arc::new(handlers::echo))))
            .route("/stats", endpoint(MethodFilter::GET, stats));
        if let Some(root) = &state.config.files.root {
            tracing::info!(root = %root, "Serving files");
            let files = logged(Arc::new(FileHandler::new(root)));
            router = router.route("/files/{*path}", endpoint(MethodFilter::GET, files));
        }

        router
            .with_state(state)
            .layer(TimeoutLayer::new(timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for serving without a listener (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;

        match self.config.listener.tls.clone() {
            Some(tls) => {
                tracing::info!(address = %addr, "HTTPS server starting");
                let rustls = load_tls_config(&tls).await?;
                let handle = axum_server::Handle::new();
                let signal = handle.clone();
                tokio::spawn(async move {
                    shutdown_signal().await;
                    signal.graceful_shutdown(Some(Duration::from_secs(10)));
                });

                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                axum::serve(listener, self.router)
                    .with_graceful_shutdown(shutdown_signal())
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Route `filter` requests to `handler` through a blocking bridge.
fn endpoint(filter: MethodFilter, handler: Arc<dyn Handler>) -> MethodRouter<AppState> {
    on(filter, move |State(state): State<AppState>, request: Request<Body>| {
        let handler = handler.clone();
        async move { dispatch(state, handler, request).await }
    })
}

/// Buffer the request body, run `handler` on a blocking thread, and stream
/// whatever it writes back to the client.
async fn dispatch(state: AppState, handler: Arc<dyn Handler>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.config.limits.max_request_body).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Rejected request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };
    let request = Request::from_parts(parts, body);

    let transfer = &state.config.transfer;
    let (sink, pending) = stream::channel(transfer.chunk_size, transfer.channel_capacity);
    let task = tokio::task::spawn_blocking(move || handler.serve(&sink, &request));
    tokio::spawn(async move {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Handler task failed");
        }
    });

    pending.into_response().await
}

/// Load TLS configuration from certificate and key files.
async fn load_tls_config(tls: &TlsConfig) -> Result<RustlsConfig, io::Error> {
    let cert_path = Path::new(&tls.cert_path);
    let key_path = Path::new(&tls.key_path);
    if !cert_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }
    RustlsConfig::from_pem_file(cert_path, key_path).await
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
