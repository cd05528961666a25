//! End-to-end scenarios spanning more than one module.

use std::sync::Arc;

use chunkkit::ccb::Ccb;
use chunkkit::hcd::{Hcd, HcdStatus};
use chunkkit::jhd::{self, CommentMode, SepType};
use chunkkit::mpe::AhoCorasick;
use chunkkit::rft::{Containment, Rft};

/// Scenario A: a pattern search that crosses CCB segment boundaries.
#[test]
fn scenario_a_cross_segment_pattern_search() {
    let mut ccb = Ccb::new();
    ccb.add_buffer(b"GET /index.");
    ccb.add_buffer(b"html HTTP/1.1");
    ccb.add_buffer(b"\r\nHost: example.com\r\n\r\n");

    let (off, idx, intra) = ccb.sun_find_bytes(0, b"index.html").unwrap();
    assert_eq!(off, 4);
    assert_eq!(idx, 0);
    assert_eq!(intra, 4);

    let (off2, _, _) = ccb.kmp_find_bytes(0, b"Host:").unwrap();
    assert!(off2 > off);
}

/// Scenario B: a fragment tracker reports the gap between two received
/// ranges and classifies a query that straddles both.
#[test]
fn scenario_b_fragment_gap_and_containment() {
    let rft = Rft::new(1000);
    assert!(rft.add(0, 100));
    assert!(rft.add(300, 200));

    assert_eq!(rft.gap(0), (100, 200));
    assert!(!rft.complete());

    let (kind, data_pos, data_len, gap_pos, gap_len) = rft.contain(50, 300);
    assert_eq!(kind, Containment::LeftPartial);
    assert_eq!((data_pos, data_len), (50, 50));
    assert_eq!((gap_pos, gap_len), (100, 200));

    assert!(rft.add(100, 200));
    assert_eq!(rft.received_len(), 500);
}

/// Scenario C: an HTTP chunked body arriving across three incremental
/// pushes, decoded straight into a CCB.
#[test]
fn scenario_c_chunked_transfer_decodes_incrementally() {
    let mut hcd = Hcd::new();
    let mut ccb = Ccb::new();

    let (s1, _) = hcd.push(&mut ccb, b"5\r\nHello\r\n").unwrap();
    assert_eq!(s1, HcdStatus::Waiting);
    let (s2, _) = hcd.push(&mut ccb, b"6\r\n World\r\n").unwrap();
    assert_eq!(s2, HcdStatus::Waiting);
    let (s3, _) = hcd.push(&mut ccb, b"0\r\n\r\n").unwrap();
    assert_eq!(s3, HcdStatus::Done);

    assert!(hcd.got_all());
    assert_eq!(hcd.chk_num, 3);

    let mut out = vec![0u8; ccb.size(false) as usize];
    ccb.read(&mut out, 0, false).unwrap();
    assert_eq!(&out, b"Hello World");
}

/// Scenario D: dotted-path access into a config decoded with the permissive
/// JSON/config grammar, including deletion of an array element.
#[test]
fn scenario_d_config_dotted_path_roundtrip() {
    let src = br#"{
        http: {
            server: {
                location: [
                    { path: "/", root: "/var/www" },
                    { path: "/api", root: "/srv/api" }
                ]
            }
        }
    }"#;
    let (mut obj, consumed) = jhd::decode(src, SepType::Standard, CommentMode::Skip, false, true, true);
    assert_eq!(consumed, src.len());

    assert_eq!(jhd::mget(&obj, "http.server.location[1].root"), Some("/srv/api"));
    assert!(jhd::mdel(&mut obj, "http.server.location[0]"));
    assert_eq!(jhd::mget(&obj, "http.server.location[0].root"), Some("/srv/api"));
}

/// Scenario E: Aho-Corasick failure links let a single pass over the text
/// surface every overlapping pattern, including ones that only match after
/// a failed longer attempt.
#[test]
fn scenario_e_aho_corasick_overlapping_matches() {
    let mut ac = AhoCorasick::new(false);
    ac.add(b"he", "pronoun");
    ac.add(b"she", "pronoun-fem");
    ac.add(b"his", "possessive");
    ac.add(b"hers", "possessive-fem");
    ac.failjump();

    let hits = ac.scan(b"ushers");
    let mut got: Vec<(usize, usize, &str)> = hits.iter().map(|h| (h.end, h.len, *h.payload)).collect();
    got.sort();
    assert_eq!(
        got,
        vec![(3, 2, "pronoun"), (4, 3, "pronoun-fem"), (6, 4, "possessive-fem")]
    );
}

/// Scenario F: chunk bodies are attached to the CCB as shared segments;
/// `remove_bufptr` keys on allocation identity, not content equality.
#[test]
fn scenario_f_bufptr_identity_is_not_content_equality() {
    let mut hcd = Hcd::new();
    let mut ccb = Ccb::new();
    hcd.push(&mut ccb, b"4\r\nabcd\r\n0\r\n\r\n").unwrap();
    assert!(hcd.got_all());
    assert_eq!(ccb.num(), 1);

    let lookalike: Arc<[u8]> = Arc::from(&b"abcd"[..]);
    assert!(!ccb.remove_bufptr(&lookalike));
    assert_eq!(ccb.num(), 1);
}
