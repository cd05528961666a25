//! Exercises each `ChunkError` variant that a caller can actually trigger
//! from the public API.

use std::io::Write;
use std::sync::Arc;

use chunkkit::ccb::Ccb;
use chunkkit::error::ChunkError;
use chunkkit::hcd::Hcd;
use chunkkit::sfc::{Medium, Sfc};

#[test]
fn stale_file_detected_after_mtime_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("segment.bin");
    std::fs::write(&path, b"original contents").unwrap();

    let mut ccb = Ccb::new();
    ccb.add_file(&path, 0, -1).unwrap();

    // Touch the file so its stat snapshot no longer matches.
    std::thread::sleep(std::time::Duration::from_millis(10));
    let mut f = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    f.write_all(b"mutated contents, different length").unwrap();
    f.flush().unwrap();

    let mut buf = vec![0u8; 4];
    let err = ccb.read(&mut buf, 0, false).unwrap_err();
    assert!(matches!(err, ChunkError::StaleFile { .. }));
}

#[test]
fn add_file_on_missing_path_is_io_error() {
    let mut ccb = Ccb::new();
    let err = ccb.add_file("/definitely/does/not/exist", 0, -1).unwrap_err();
    assert!(matches!(err, ChunkError::Io(_)));
}

#[test]
fn hcd_protocol_error_on_malformed_size_line() {
    let mut hcd = Hcd::new();
    let mut ccb = Ccb::new();
    let err = hcd.push(&mut ccb, b"ZZZ\r\n").unwrap_err();
    assert!(matches!(err, ChunkError::Protocol(_)));
}

#[test]
fn sfc_out_of_range_pack_is_invalid_argument() {
    let data = vec![0u8; 16];
    let sfc = Sfc::new(Medium::Memory(data.clone().into()), 0, data.len() as i64, 4, 2, 0.0);
    // `at` beyond total_length returns Ok(None); the InvalidArgument path is
    // reached internally only for out-of-range pack indices, which a caller
    // cannot address directly -- so this documents the contract at the
    // boundary `at` actually exposes instead.
    assert_eq!(sfc.at(data.len() as i64).unwrap(), None);
    assert_eq!(sfc.at(-1).unwrap(), None);
}

#[test]
fn sfc_callback_error_propagates_as_io() {
    let medium = Medium::Callback(parking_lot::Mutex::new(Box::new(|_offset: i64, _buf: &mut [u8]| {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "upstream failed"))
    })));
    let sfc = Sfc::new(medium, 0, 16, 4, 2, 0.0);
    let mut out = [0u8; 4];
    let err = sfc.read(&mut out, false).unwrap_err();
    assert!(matches!(err, ChunkError::Io(_)));
}

#[test]
fn remove_bufptr_on_unknown_identity_is_a_no_op() {
    let mut ccb = Ccb::new();
    ccb.add_buffer(b"hello");
    let foreign: Arc<[u8]> = Arc::from(&b"hello"[..]);
    assert!(!ccb.remove_bufptr(&foreign));
    assert_eq!(ccb.num(), 1);
}
