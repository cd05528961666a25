//! Scatter/gather vector extraction (spec §4.3.1 "Vector extraction",
//! `chunk_vec_t` in the original `chunk.h`).

use super::segment::Bytes;

pub const MAX_IOVECS: usize = 192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VecType {
    Memory,
    File,
}

/// One file-backed slice: enough to drive a `sendfile`-style transfer
/// without the caller needing to re-derive path/offset bookkeeping.
#[derive(Debug, Clone)]
pub struct FileSlice {
    pub path: std::path::PathBuf,
    pub file_pos: i64,
    pub size: i64,
}

/// Up to [`MAX_IOVECS`] memory-backed spans, OR exactly one file-backed
/// span. The two kinds never mix, matching the original contract.
pub struct ChunkVec<'a> {
    pub vectype: VecType,
    pub offset: i64,
    pub size: i64,
    pub iovs: Vec<Bytes<'a>>,
    pub file: Option<FileSlice>,
}

impl<'a> ChunkVec<'a> {
    pub fn memory(offset: i64, iovs: Vec<Bytes<'a>>) -> Self {
        let size = iovs.iter().map(|b| b.as_slice().len() as i64).sum();
        ChunkVec {
            vectype: VecType::Memory,
            offset,
            size,
            iovs,
            file: None,
        }
    }

    pub fn file(offset: i64, file: FileSlice) -> Self {
        let size = file.size;
        ChunkVec {
            vectype: VecType::File,
            offset,
            size,
            iovs: Vec::new(),
            file: Some(file),
        }
    }
}
