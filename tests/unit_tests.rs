//! Smoke tests across every module's public surface, one per module,
//! separate from the focused unit tests living alongside each module.

use chunkkit::bytes;
use chunkkit::ccb::Ccb;
use chunkkit::hcd::{Hcd, HcdStatus};
use chunkkit::jhd::{self, CommentMode, SepType, Value};
use chunkkit::mpe::{AhoCorasick, WuManber};
use chunkkit::rft::Rft;
use chunkkit::search;
use chunkkit::sfc::{Medium, Sfc};

#[test]
fn bytes_skip_and_strip_are_wired_up() {
    let p = bytes::skip_over(b"   x", 0, b" ");
    assert_eq!(p, 3);
    assert_eq!(bytes::strip(br#"a\tb"#), b"a\tb");
}

#[test]
fn search_algorithms_are_wired_up() {
    assert_eq!(search::kmp_find(b"haystack needle", b"needle"), Some(9));
    assert_eq!(search::sunday_find(b"haystack needle", b"needle"), Some(9));
}

#[test]
fn ccb_buffer_add_and_read_roundtrip() {
    let mut ccb = Ccb::new();
    ccb.add_buffer(b"hello");
    let mut out = [0u8; 5];
    ccb.read(&mut out, 0, false).unwrap();
    assert_eq!(&out, b"hello");
}

#[test]
fn rft_add_and_complete() {
    let rft = Rft::new(10);
    assert!(!rft.complete());
    rft.add(0, 10);
    assert!(rft.complete());
}

#[test]
fn sfc_reads_in_memory_medium() {
    let data = b"0123456789".to_vec();
    let sfc = Sfc::new(Medium::Memory(data.clone().into()), 0, data.len() as i64, 4, 2, 0.0);
    let mut out = [0u8; 10];
    let n = sfc.read(&mut out, false).unwrap();
    assert_eq!(n, 10);
    assert_eq!(&out, data.as_slice());
}

#[test]
fn mpe_aho_corasick_and_wu_manber_both_find_matches() {
    let mut ac = AhoCorasick::new(false);
    ac.add(b"needle", ());
    ac.failjump();
    assert!(ac.match_first(b"a needle here").is_some());

    let mut wm = WuManber::new(true, false);
    wm.add_pattern(b"needle");
    wm.precalc();
    assert_eq!(wm.search(b"a needle here").len(), 1);
}

#[test]
fn jhd_decode_then_encode_preserves_a_value() {
    let (obj, _) = jhd::decode(br#"{name:"alice"}"#, SepType::Standard, CommentMode::Skip, false, true, true);
    assert_eq!(jhd::mget(&obj, "name"), Some("alice"));
    let encoded = jhd::encode(&obj);
    assert!(String::from_utf8(encoded).unwrap().contains("alice"));

    let mut built = jhd::Object::new(SepType::Standard, CommentMode::Skip, false);
    built.add("role", Value::from("admin"), false);
    assert_eq!(built.get("role", 0).unwrap().as_str(), Some("admin"));
}

#[test]
fn hcd_reports_waiting_until_terminal_chunk() {
    let mut hcd = Hcd::new();
    let mut ccb = Ccb::new();
    let (status, _) = hcd.push(&mut ccb, b"3\r\nabc\r\n").unwrap();
    assert_eq!(status, HcdStatus::Waiting);
    let (status, _) = hcd.push(&mut ccb, b"0\r\n\r\n").unwrap();
    assert_eq!(status, HcdStatus::Done);
}
