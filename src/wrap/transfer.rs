//! Bulk-transfer path of a wrapped sink.
//!
//! # Decision Order
//! ```text
//! classify source (file? bounded file?)  ── error ──▶ return, nothing sent
//!     → commit status (200 unless already committed)
//!     → regular file + native ReaderFrom ──▶ inner read_from (hooks bypassed)
//!     → source can drive itself         ──▶ src.write_to(HookWriter)
//!     → otherwise                       ──▶ pooled copy loop into HookWriter
//! ```

use std::io::{self, Write};

use axum::http::StatusCode;

use crate::hooks::Hooks;
use crate::sink::source::{is_regular_file, BodySource};
use crate::sink::ResponseSink;
use crate::wrap::pool::BufferPool;
use crate::wrap::WrappedSink;

/// Writer that routes each chunk through the write hook.
pub(crate) struct HookWriter<'a> {
    sink: &'a dyn ResponseSink,
    hooks: &'a dyn Hooks,
}

impl<'a> HookWriter<'a> {
    pub(crate) fn new(sink: &'a dyn ResponseSink, hooks: &'a dyn Hooks) -> Self {
        Self { sink, hooks }
    }
}

impl Write for HookWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hooks.hook_write(self.sink, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub(crate) fn read_from(sink: &WrappedSink<'_>, src: &mut dyn BodySource) -> io::Result<u64> {
    let regular = is_regular_file(src)?;

    sink.write_header(StatusCode::OK);

    if regular {
        if let Some(native) = sink.native_reader_from() {
            tracing::debug!("Regular file source, delegating to native bulk transfer");
            return native.read_from(src);
        }
    }

    let mut writer = HookWriter::new(sink.inner(), sink.hooks());
    if let Some(result) = src.write_to(&mut writer) {
        return result;
    }

    copy_pooled(src, &mut writer, sink.pool())
}

/// Copy `src` into `dst` with a buffer borrowed from `pool`.
///
/// A write that accepts fewer bytes than offered ends the copy with
/// `WriteZero`.
pub(crate) fn copy_pooled(
    src: &mut dyn BodySource,
    dst: &mut dyn Write,
    pool: &BufferPool,
) -> io::Result<u64> {
    let mut buf = pool.acquire();
    let mut written = 0u64;
    loop {
        let nr = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let nw = dst.write(&buf[..nr])?;
        written += nw as u64;
        if nw != nr {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "short write"));
        }
    }
    tracing::debug!(bytes = written, "Pooled copy finished");
    Ok(written)
}
