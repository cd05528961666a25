//! Error taxonomy shared across every component (spec §7).
//!
//! Parsers and readers mostly report partial progress as plain integers
//! (bytes consumed / bytes transferred) per the propagation policy in §7;
//! `ChunkError` covers the cases that are genuinely exceptional.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("destination buffer too short: needed {needed}, had {available}")]
    ShortBuffer { needed: usize, available: usize },

    #[error("unexpected end of input while parsing {0}")]
    UnexpectedEof(&'static str),

    #[error("file segment changed on disk: {path:?} (expected inode {expected_inode}, mtime {expected_mtime}, size {expected_size})")]
    StaleFile {
        path: PathBuf,
        expected_inode: u64,
        expected_mtime: i64,
        expected_size: i64,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(&'static str),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("out of memory")]
    OutOfMemory,

    #[error("operation would block")]
    WouldBlock,
}

pub type Result<T> = std::result::Result<T, ChunkError>;
