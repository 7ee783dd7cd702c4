//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use axum::http::StatusCode;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;

use response_hook::config::AppConfig;
use response_hook::HttpServer;
use response_hook::{Capabilities, Hooks, ResponseSink};

/// Hooks that remember every chunk and every status commit.
#[derive(Default)]
pub struct RecordingHooks {
    chunks: Mutex<Vec<Vec<u8>>>,
    commits: AtomicUsize,
    status: Mutex<Option<StatusCode>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// All observed chunks, concatenated in call order.
    pub fn observed(&self) -> Vec<u8> {
        self.chunks.lock().unwrap().concat()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> Option<StatusCode> {
        *self.status.lock().unwrap()
    }
}

impl Hooks for RecordingHooks {
    fn hook_write(&self, sink: &dyn ResponseSink, buf: &[u8]) -> io::Result<usize> {
        self.chunks.lock().unwrap().push(buf.to_vec());
        sink.write(buf)
    }

    fn hook_write_header(&self, sink: &dyn ResponseSink, status: StatusCode) {
        self.commits.fetch_add(1, Ordering::SeqCst);
        *self.status.lock().unwrap() = Some(status);
        sink.write_header(status);
    }
}

/// Every one of the 32 capability subsets.
pub fn every_mask() -> impl Iterator<Item = Capabilities> {
    (0..32u8).map(Capabilities::from_bits)
}

/// Deterministic, non-repeating-looking test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `contents` to a fresh file under a per-process temp directory.
pub fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
    let dir = temp_dir();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("response-hook-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Start the server on an ephemeral port and return its address.
pub async fn spawn_server(config: AppConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config);
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    addr
}
