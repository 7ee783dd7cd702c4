//! Body delivery through wrapped sinks: writes, bulk transfers and the
//! file fast path.

use std::fs::File;
use std::io::{self, Cursor, Read, Write};

use axum::http::StatusCode;

use response_hook::http::ResponseRecorder;
use response_hook::sink::{self, BodyWriter, ReaderFrom};
use response_hook::{
    wrap, wrap_with_pool, BodyDigest, BodySource, BufferPool, Capabilities, Capability, Opaque,
    Passthrough, ResponseMetrics, ResponseSink,
};

mod common;

use common::{payload, sha256_hex, temp_file, RecordingHooks};

fn native_recorder() -> ResponseRecorder {
    ResponseRecorder::with_capabilities(Capabilities::NONE.with(Capability::ReadFrom))
}

#[test]
fn status_and_byte_count_are_observed() {
    let recorder = ResponseRecorder::new();
    let metrics = ResponseMetrics::new();
    let wrapped = wrap(&recorder, &metrics);

    wrapped.write_header(StatusCode::CREATED);
    wrapped.write(&[0xAB; 4096]).unwrap();

    assert_eq!(metrics.bytes_written(), 4096);
    assert_eq!(metrics.status(), Some(StatusCode::CREATED));
    assert_eq!(recorder.status(), StatusCode::CREATED);
    assert_eq!(recorder.body().len(), 4096);
}

#[test]
fn double_wrapping_writes_once() {
    let recorder = ResponseRecorder::new();
    let first = Passthrough;
    let second = Passthrough;
    let inner = wrap(&recorder, &first);
    let outer = wrap(&inner, &second);

    outer.write(b"Hello world\n").unwrap();

    assert_eq!(recorder.body_string(), "Hello world\n");
}

#[test]
fn source_driven_transfer_digest_matches_delivered_bytes() {
    let data = payload(70_000);
    let recorder = native_recorder();
    let digest = BodyDigest::new();
    let wrapped = wrap(&recorder, &digest);

    let n = wrapped
        .as_reader_from()
        .unwrap()
        .read_from(&mut Cursor::new(data.clone()))
        .unwrap();

    assert_eq!(n, 70_000);
    assert_eq!(recorder.body(), data);
    assert_eq!(digest.hex(), sha256_hex(&recorder.body()));
    assert_eq!(recorder.native_transfers(), 0);
}

#[test]
fn pooled_copy_digest_matches_delivered_bytes() {
    let data = payload(70_000);
    let recorder = native_recorder();
    let digest = BodyDigest::new();
    let pool = BufferPool::new(4096, 2);
    let wrapped = wrap_with_pool(&recorder, &digest, &pool);

    let n = wrapped
        .read_from(&mut Opaque(Cursor::new(data.clone())))
        .unwrap();

    assert_eq!(n, 70_000);
    assert_eq!(digest.hex(), sha256_hex(&data));
    assert_eq!(recorder.body(), data);
    assert_eq!(pool.idle(), 1);
}

#[test]
fn regular_file_takes_the_fast_path() {
    let data = payload(10_000);
    let path = temp_file("fast-path.bin", &data);
    let recorder = native_recorder();
    let hooks = RecordingHooks::new();
    let wrapped = wrap(&recorder, &hooks);

    let mut file = File::open(&path).unwrap();
    let n = wrapped.read_from(&mut file).unwrap();

    assert_eq!(n, 10_000);
    assert_eq!(hooks.chunk_count(), 0);
    assert!(hooks.observed().is_empty());
    assert_eq!(recorder.body(), data);
    assert_eq!(recorder.native_transfers(), 1);
    assert_eq!(hooks.commits(), 1);
    assert_eq!(hooks.status(), Some(StatusCode::OK));
}

#[test]
fn bounded_file_takes_the_fast_path() {
    let data = payload(5_000);
    let path = temp_file("bounded.bin", &data);
    let recorder = native_recorder();
    let hooks = RecordingHooks::new();
    let wrapped = wrap(&recorder, &hooks);

    let n = wrapped
        .read_from(&mut File::open(&path).unwrap().take(1_000))
        .unwrap();

    assert_eq!(n, 1_000);
    assert!(hooks.observed().is_empty());
    assert_eq!(recorder.body(), &data[..1_000]);
}

#[test]
fn twice_bounded_file_takes_the_fast_path() {
    let data = payload(5_000);
    let path = temp_file("twice-bounded.bin", &data);
    let recorder = native_recorder();
    let hooks = RecordingHooks::new();
    let wrapped = wrap(&recorder, &hooks);

    let mut src = File::open(&path).unwrap().take(3_000).take(2_000);
    let n = wrapped.read_from(&mut src).unwrap();

    assert_eq!(n, 2_000);
    assert!(hooks.observed().is_empty());
    assert_eq!(recorder.body(), &data[..2_000]);
    assert_eq!(recorder.native_transfers(), 1);
}

struct StatFails;

impl Read for StatFails {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        buf.fill(1);
        Ok(buf.len())
    }
}

impl BodySource for StatFails {
    fn is_regular(&self) -> Option<io::Result<bool>> {
        Some(Err(io::Error::new(io::ErrorKind::PermissionDenied, "stat denied")))
    }
}

#[test]
fn classification_error_aborts_before_commit() {
    let recorder = native_recorder();
    let hooks = RecordingHooks::new();
    let wrapped = wrap(&recorder, &hooks);

    let err = wrapped.read_from(&mut StatFails.take(100)).unwrap_err();

    assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    assert_eq!(err.to_string(), "stat denied");
    assert_eq!(hooks.commits(), 0);
    assert!(!wrapped.status_committed());
    assert!(!recorder.status_committed());
    assert!(recorder.body().is_empty());
    assert!(hooks.observed().is_empty());
}

#[test]
fn opaque_file_is_observed() {
    let data = payload(9_000);
    let path = temp_file("opaque.bin", &data);
    let recorder = native_recorder();
    let hooks = RecordingHooks::new();
    let wrapped = wrap(&recorder, &hooks);

    wrapped
        .read_from(&mut Opaque(File::open(&path).unwrap()))
        .unwrap();

    assert_eq!(hooks.observed(), data);
    assert_eq!(recorder.body(), data);
}

#[test]
fn file_without_native_transfer_is_observed() {
    let data = payload(3_000);
    let path = temp_file("no-native.bin", &data);
    let recorder = ResponseRecorder::with_capabilities(Capabilities::NONE);
    let hooks = RecordingHooks::new();
    let wrapped = wrap(&recorder, &hooks);

    // The inner sink has no ReaderFrom, so a handler would not see one
    // either; force the call to check the fallback.
    let n = ReaderFrom::read_from(&wrapped, &mut File::open(&path).unwrap()).unwrap();

    assert_eq!(n, 3_000);
    assert_eq!(hooks.observed(), data);
}

#[test]
fn observed_bytes_equal_delivered_bytes_for_any_chunking() {
    let data = payload(20_000);
    for chunk in [1, 3, 64, 1000, 4096, 20_000] {
        let recorder = ResponseRecorder::new();
        let hooks = RecordingHooks::new();
        let wrapped = wrap(&recorder, &hooks);

        for piece in data.chunks(chunk) {
            wrapped.write(piece).unwrap();
        }

        assert_eq!(hooks.observed(), recorder.body(), "chunk size {}", chunk);
        assert_eq!(recorder.body(), data);
        assert_eq!(hooks.chunk_count(), data.len().div_ceil(chunk));
    }
}

#[test]
fn body_writer_and_copy_helper_go_through_hooks() {
    let data = payload(12_345);
    let recorder = ResponseRecorder::new();
    let hooks = RecordingHooks::new();
    let wrapped = wrap(&recorder, &hooks);

    let mut writer = BodyWriter::new(&wrapped);
    writer.write_all(&data[..345]).unwrap();
    writer.flush().unwrap();
    sink::copy(&wrapped, &mut &data[345..]).unwrap();

    assert_eq!(hooks.observed(), data);
    assert_eq!(recorder.body(), data);
    assert_eq!(recorder.flushes(), 1);
}
