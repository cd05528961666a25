//! Byte-stream building blocks for network services: chunked content
//! buffers, fragment tracking, a streaming file cache, multi-pattern
//! matching, a permissive JSON/config decoder, and an HTTP chunk decoder.

pub mod bytes;
pub mod ccb;
pub mod collab;
pub mod error;
pub mod hcd;
pub mod jhd;
pub mod mpe;
pub mod rft;
pub mod search;
pub mod sfc;

pub use error::{ChunkError, Result};
