//! Boundary conditions: empty input, single-byte buffers, patterns as long
//! as (or longer than) the haystack, and other edges the worked scenarios
//! don't otherwise exercise.

use chunkkit::ccb::Ccb;
use chunkkit::error::ChunkError;
use chunkkit::hcd::{Hcd, HcdStatus};
use chunkkit::jhd::{self, CommentMode, SepType};
use chunkkit::mpe::{AhoCorasick, WuManber};
use chunkkit::rft::Rft;
use chunkkit::sfc::{Medium, Sfc};

#[test]
fn ccb_empty_has_zero_size_and_no_reads() {
    let ccb = Ccb::new();
    assert_eq!(ccb.size(false), 0);
    let mut buf = [0u8; 4];
    assert_eq!(ccb.read(&mut buf, 0, false).unwrap(), 0);
    assert_eq!(ccb.at(0).unwrap(), None);
}

#[test]
fn ccb_single_byte_segment() {
    let mut ccb = Ccb::new();
    ccb.add_buffer(b"X");
    assert_eq!(ccb.size(false), 1);
    assert_eq!(ccb.at(0).unwrap(), Some(b'X'));
    assert_eq!(ccb.at(1).unwrap(), None);
}

#[test]
fn ccb_pattern_search_with_no_match_returns_none() {
    let mut ccb = Ccb::new();
    ccb.add_buffer(b"abcdef");
    assert!(ccb.sun_find_bytes(0, b"zzz").is_none());
    assert!(ccb.sun_find_bytes(0, b"").is_none());
}

#[test]
fn rft_empty_tracker_gap_covers_everything() {
    let rft = Rft::new(0);
    assert_eq!(rft.gap(0), (0, -1)); // unbounded length: tail is open-ended
    assert!(!rft.complete());
}

#[test]
fn rft_zero_length_add_is_rejected() {
    let rft = Rft::new(100);
    assert!(!rft.add(10, 0));
    assert!(rft.items().is_empty());
}

#[test]
fn sfc_seek_past_end_clamps() {
    let data = vec![1u8, 2, 3, 4];
    let sfc = Sfc::new(Medium::Memory(data.clone().into()), 0, data.len() as i64, 2, 2, 0.0);
    let clamped = sfc.seek(1_000_000);
    assert_eq!(clamped, data.len() as i64);
}

#[test]
fn aho_corasick_pattern_length_one() {
    let mut ac = AhoCorasick::new(false);
    ac.add(b"a", 1);
    ac.failjump();
    let hits = ac.scan(b"banana");
    assert_eq!(hits.len(), 3);
}

#[test]
fn aho_corasick_scan_of_empty_text() {
    let mut ac = AhoCorasick::new(false);
    ac.add(b"x", 1);
    ac.failjump();
    assert!(ac.scan(b"").is_empty());
}

#[test]
fn wu_manber_pattern_longer_than_haystack_finds_nothing() {
    let mut wm = WuManber::new(true, false);
    wm.add_pattern(b"a much longer pattern than the text");
    wm.precalc();
    assert!(wm.search(b"short").is_empty());
}

#[test]
fn jhd_decode_of_empty_object() {
    let (obj, consumed) = jhd::decode(b"{}", SepType::Standard, CommentMode::Skip, false, true, true);
    assert!(obj.is_empty());
    assert_eq!(consumed, 2);
}

#[test]
fn jhd_mget_on_missing_path_segment_returns_none() {
    let (obj, _) = jhd::decode(br#"{a:{b:"c"}}"#, SepType::Standard, CommentMode::Skip, false, true, true);
    assert!(jhd::mget(&obj, "a.missing.c").is_none());
    assert!(jhd::mget(&obj, "").is_none());
}

#[test]
fn hcd_zero_length_body_completes_immediately() {
    let mut hcd = Hcd::new();
    let mut ccb = Ccb::new();
    let (status, _) = hcd.push(&mut ccb, b"0\r\n\r\n").unwrap();
    assert_eq!(status, HcdStatus::Done);
    assert_eq!(ccb.size(false), 0);
}

#[test]
fn hcd_rejects_non_hex_size_line() {
    let mut hcd = Hcd::new();
    let mut ccb = Ccb::new();
    let err = hcd.push(&mut ccb, b"not-hex\r\n").unwrap_err();
    assert!(matches!(err, ChunkError::Protocol(_)));
}
