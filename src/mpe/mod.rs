//! Multi-Pattern Engine (spec §4.5, L5): an Aho-Corasick trie plus a
//! Wu-Manber block-hash scanner, covering both memory buffers and (via
//! [`crate::sfc::Sfc::at`]) the streaming file cache.

pub mod aho_corasick;
pub mod wu_manber;

pub use aho_corasick::{AhoCorasick, MatchHit};
pub use wu_manber::{WmHit, WuManber};
