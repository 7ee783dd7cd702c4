//! Reusable copy buffers for bulk transfers.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, OnceLock};

use crate::config::TransferConfig;

/// Default size of a pooled copy buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Default number of idle buffers kept by a pool.
pub const DEFAULT_MAX_IDLE: usize = 64;

static GLOBAL_POOL: OnceLock<BufferPool> = OnceLock::new();

/// Pool of fixed-size byte buffers shared across responses.
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    buffer_size: usize,
    max_idle: usize,
}

impl BufferPool {
    /// Create a pool handing out `buffer_size`-byte buffers and keeping at
    /// most `max_idle` of them between uses.
    pub fn new(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            buffer_size: buffer_size.max(1),
            max_idle,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.buffer_size, config.max_pooled_buffers)
    }

    /// Process-wide pool used by [`wrap`](crate::wrap::wrap).
    pub fn global() -> &'static BufferPool {
        GLOBAL_POOL.get_or_init(BufferPool::default)
    }

    /// Take a buffer; it goes back to the pool when the guard drops.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let reused = self.idle.lock().expect("buffer pool mutex poisoned").pop();
        let buf = match reused {
            Some(buf) => buf,
            None => {
                tracing::trace!(size = self.buffer_size, "Allocating copy buffer");
                vec![0u8; self.buffer_size]
            }
        };
        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    /// Number of buffers currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle.lock().expect("buffer pool mutex poisoned").len()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn release(&self, buf: Vec<u8>) {
        let mut idle = self.idle.lock().expect("buffer pool mutex poisoned");
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, DEFAULT_MAX_IDLE)
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Vec<u8>>,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_reused() {
        let pool = BufferPool::new(16, 4);
        assert_eq!(pool.idle(), 0);

        {
            let mut buf = pool.acquire();
            assert_eq!(buf.len(), 16);
            buf[0] = 42;
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.acquire();
        assert_eq!(buf[0], 42);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn idle_buffers_are_capped() {
        let pool = BufferPool::new(8, 2);
        let held: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        drop(held);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn zero_size_is_clamped() {
        let pool = BufferPool::new(0, 1);
        assert_eq!(pool.acquire().len(), 1);
    }

    #[test]
    fn buffer_returns_on_unwind() {
        let pool = BufferPool::new(8, 2);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _buf = pool.acquire();
            panic!("copy failed");
        }));
        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);
    }
}
