//! SHA-256 over the observed body.

use std::io;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::hooks::Hooks;
use crate::sink::ResponseSink;

/// Hashes every chunk the write hook sees, then writes it through.
#[derive(Debug, Default)]
pub struct BodyDigest {
    hasher: Mutex<Sha256>,
}

impl BodyDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hex digest of the bytes observed so far.
    pub fn hex(&self) -> String {
        let hasher = self.hasher.lock().expect("digest mutex poisoned");
        hex::encode(hasher.clone().finalize())
    }
}

impl Hooks for BodyDigest {
    fn hook_write(&self, sink: &dyn ResponseSink, buf: &[u8]) -> io::Result<usize> {
        self.hasher
            .lock()
            .expect("digest mutex poisoned")
            .update(buf);
        sink.write(buf)
    }
}
