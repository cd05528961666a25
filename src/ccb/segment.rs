//! CCB segment kinds (spec §3 "CCB segment").
//!
//! The C source dispatches on a `cktype` tag over a `void*` union
//! (`ckent_t` in `chunk.h`). Here each kind is a variant of a sum type with
//! its own drop behavior, per the design note in spec §9: `alloctype`
//! disappears because the Rust allocator already owns the memory, and
//! `FilePtr`/`FileDesc` collapse into one borrowed-handle variant since both
//! only differ in *how* the caller identifies an already-open file.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ChunkError, Result};

/// Payload small enough to be stored inline in the segment record itself
/// (CCB's `CharArray` kind), avoiding a heap allocation.
pub const INLINE_CAP: usize = 48;

#[derive(Clone)]
pub struct InlineBuf {
    buf: [u8; INLINE_CAP],
    len: u8,
}

impl InlineBuf {
    pub fn new(data: &[u8]) -> Option<Self> {
        if data.len() > INLINE_CAP {
            return None;
        }
        let mut buf = [0u8; INLINE_CAP];
        buf[..data.len()].copy_from_slice(data);
        Some(InlineBuf {
            buf,
            len: data.len() as u8,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }
}

/// A stat-time snapshot used as the `(inode, mtime, size)` generation guard
/// (spec §4.3.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStamp {
    pub inode: u64,
    pub mtime: i64,
    pub size: i64,
}

fn stamp_of(meta: &std::fs::Metadata) -> FileStamp {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        FileStamp {
            inode: meta.ino(),
            mtime: meta.mtime(),
            size: meta.len() as i64,
        }
    }
    #[cfg(not(unix))]
    {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        FileStamp {
            inode: 0,
            mtime,
            size: meta.len() as i64,
        }
    }
}

/// A `File` segment identified by path; the CCB owns the open handle and
/// any cached memory-map window.
pub struct FileSegment {
    pub path: PathBuf,
    pub stamp: FileStamp,
    pub offset: i64,
    pub length: i64,
    handle: OnceCell<File>,
    map: OnceCell<memmap2::Mmap>,
}

impl FileSegment {
    pub fn open(path: impl Into<PathBuf>, offset: i64, length: i64) -> Result<Self> {
        let path = path.into();
        let meta = std::fs::metadata(&path)?;
        let stamp = stamp_of(&meta);
        let length = if length < 0 {
            stamp.size - offset
        } else {
            length
        };
        Ok(FileSegment {
            path,
            stamp,
            offset,
            length,
            handle: OnceCell::new(),
            map: OnceCell::new(),
        })
    }

    fn file(&self) -> Result<&File> {
        self.handle.get_or_try_init(|| File::open(&self.path).map_err(ChunkError::from))
    }

    fn check_stale(&self) -> Result<()> {
        let meta = std::fs::metadata(&self.path)?;
        let now = stamp_of(&meta);
        if now != self.stamp {
            return Err(ChunkError::StaleFile {
                path: self.path.clone(),
                expected_inode: self.stamp.inode,
                expected_mtime: self.stamp.mtime,
                expected_size: self.stamp.size,
            });
        }
        Ok(())
    }

    /// Lazily memory-map the file and return the payload slice for this
    /// segment's `[offset, offset+length)` window.
    pub fn mapped(&self) -> Result<&[u8]> {
        self.check_stale()?;
        let file = self.file()?;
        let map = self
            .map
            .get_or_try_init(|| unsafe { memmap2::Mmap::map(file) }.map_err(ChunkError::from))?;
        let start = self.offset as usize;
        let end = start + self.length as usize;
        if end > map.len() {
            return Err(ChunkError::UnexpectedEof("file segment extends past EOF"));
        }
        Ok(&map[start..end])
    }

    pub fn read_into(&self, dst: &mut [u8], rel_pos: i64) -> Result<usize> {
        let data = self.mapped()?;
        let start = rel_pos as usize;
        if start >= data.len() {
            return Ok(0);
        }
        let n = dst.len().min(data.len() - start);
        dst[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }
}

/// `FilePtr`/`FileDesc`: the CCB does not own this handle, only borrows a
/// reference-counted one (the real C source stores a borrowed `FILE*`/`fd`;
/// `Arc<File>` is the safe idiomatic equivalent of "caller keeps ownership").
pub struct FileHandleSegment {
    pub file: Arc<File>,
    pub stamp: FileStamp,
    pub offset: i64,
    pub length: i64,
    map: OnceCell<memmap2::Mmap>,
}

impl FileHandleSegment {
    pub fn new(file: Arc<File>, offset: i64, length: i64) -> Result<Self> {
        let meta = file.metadata()?;
        let stamp = stamp_of(&meta);
        let length = if length < 0 {
            stamp.size - offset
        } else {
            length
        };
        Ok(FileHandleSegment {
            file,
            stamp,
            offset,
            length,
            map: OnceCell::new(),
        })
    }

    pub fn mapped(&self) -> Result<&[u8]> {
        let map = self
            .map
            .get_or_try_init(|| unsafe { memmap2::Mmap::map(&*self.file) }.map_err(ChunkError::from))?;
        let start = self.offset as usize;
        let end = start + self.length as usize;
        if end > map.len() {
            return Err(ChunkError::UnexpectedEof("file segment extends past EOF"));
        }
        Ok(&map[start..end])
    }
}

/// Lazy producer yielding `(bytes)` on demand. `advance` is invoked as the
/// cursor steps past already-fetched data, `end` once when the segment is
/// exhausted or the CCB is dropped.
pub struct CallbackSegment {
    pub length: i64,
    fetch: Mutex<Box<dyn FnMut(i64, i64) -> Option<Vec<u8>> + Send>>,
    advance: Mutex<Box<dyn FnMut(i64, i64) -> bool + Send>>,
    end: Mutex<Box<dyn FnMut(i32) + Send>>,
    ended: Mutex<bool>,
}

impl CallbackSegment {
    pub fn new(
        length: i64,
        fetch: impl FnMut(i64, i64) -> Option<Vec<u8>> + Send + 'static,
        advance: impl FnMut(i64, i64) -> bool + Send + 'static,
        end: impl FnMut(i32) + Send + 'static,
    ) -> Self {
        CallbackSegment {
            length,
            fetch: Mutex::new(Box::new(fetch)),
            advance: Mutex::new(Box::new(advance)),
            end: Mutex::new(Box::new(end)),
            ended: Mutex::new(false),
        }
    }

    pub fn fetch(&self, offset: i64, length: i64) -> Option<Vec<u8>> {
        (self.fetch.lock())(offset, length)
    }

    pub fn go_ahead(&self, offset: i64, step: i64) -> bool {
        (self.advance.lock())(offset, step)
    }

    pub fn signal_end(&self, status: i32) {
        let mut ended = self.ended.lock();
        if !*ended {
            (self.end.lock())(status);
            *ended = true;
        }
    }
}

impl Drop for CallbackSegment {
    fn drop(&mut self) {
        self.signal_end(0);
    }
}

pub enum SegmentKind {
    Inline(InlineBuf),
    /// `Buffer`: shared, reference-counted payload the caller also holds.
    Shared(Arc<[u8]>),
    /// `OwnedBuffer`: the CCB exclusively owns and frees this payload.
    Owned(Box<[u8]>),
    File(FileSegment),
    FileHandle(FileHandleSegment),
    Callback(CallbackSegment),
}

/// Owned bytes returned by zero-copy-when-possible reads: borrowed for
/// memory-backed segments, owned when the data had to be materialized (e.g.
/// from a callback producer).
pub enum Bytes<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
}

impl<'a> Bytes<'a> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Bytes::Borrowed(b) => b,
            Bytes::Owned(v) => v,
        }
    }
}

/// One entry in the CCB's segment list: a [`SegmentKind`] plus the common
/// bookkeeping fields every kind carries (spec §3).
pub struct SegmentEntry {
    pub kind: SegmentKind,
    pub length: i64,
    pub header: bool,
    /// Cached `HEX(len)` string (uppercase, unpadded) used when emitting
    /// HTTP chunk framing.
    pub size_hex: String,
}

/// Number of hex digits needed to represent `size` (at least 1), matching
/// `size_hex_len` in the original `chunk.h`.
pub fn size_hex_len(size: i64) -> usize {
    if size <= 0 {
        return 1;
    }
    let mut n = 0usize;
    let mut v = size;
    while v > 0 {
        n += 1;
        v >>= 4;
    }
    n
}

impl SegmentEntry {
    pub fn new(kind: SegmentKind, length: i64, header: bool) -> Self {
        let size_hex = format!("{length:X}");
        SegmentEntry {
            kind,
            length,
            header,
            size_hex,
        }
    }

    /// Framing overhead added in HTTP-chunk mode: `HEX(len)CRLF` before the
    /// payload, `CRLF` after.
    pub fn framing_overhead(&self) -> i64 {
        self.size_hex.len() as i64 + 2 + 2
    }

    pub fn read_at(&self, rel_pos: i64, dst: &mut [u8]) -> Result<usize> {
        match &self.kind {
            SegmentKind::Inline(b) => Ok(copy_from(b.as_slice(), rel_pos, dst)),
            SegmentKind::Shared(b) => Ok(copy_from(b, rel_pos, dst)),
            SegmentKind::Owned(b) => Ok(copy_from(b, rel_pos, dst)),
            SegmentKind::File(f) => f.read_into(dst, rel_pos),
            SegmentKind::FileHandle(f) => {
                let data = f.mapped()?;
                Ok(copy_from(data, rel_pos, dst))
            }
            SegmentKind::Callback(cb) => {
                let want = dst.len() as i64;
                match cb.fetch(rel_pos, want) {
                    Some(data) => {
                        let n = data.len().min(dst.len());
                        dst[..n].copy_from_slice(&data[..n]);
                        Ok(n)
                    }
                    None => Ok(0),
                }
            }
        }
    }

    pub fn bytes_at(&self, rel_pos: i64, want: i64) -> Result<Bytes<'_>> {
        match &self.kind {
            SegmentKind::Inline(b) => Ok(slice_bytes(b.as_slice(), rel_pos, want)),
            SegmentKind::Shared(b) => Ok(slice_bytes(b, rel_pos, want)),
            SegmentKind::Owned(b) => Ok(slice_bytes(b, rel_pos, want)),
            SegmentKind::File(f) => Ok(slice_bytes(f.mapped()?, rel_pos, want)),
            SegmentKind::FileHandle(f) => Ok(slice_bytes(f.mapped()?, rel_pos, want)),
            SegmentKind::Callback(cb) => Ok(match cb.fetch(rel_pos, want) {
                Some(v) => Bytes::Owned(v),
                None => Bytes::Owned(Vec::new()),
            }),
        }
    }

    pub fn is_file_like(&self) -> bool {
        matches!(self.kind, SegmentKind::File(_) | SegmentKind::FileHandle(_))
    }

    pub fn is_buffer_like(&self) -> bool {
        matches!(
            self.kind,
            SegmentKind::Inline(_) | SegmentKind::Shared(_) | SegmentKind::Owned(_)
        )
    }
}

fn copy_from(src: &[u8], rel_pos: i64, dst: &mut [u8]) -> usize {
    let start = rel_pos as usize;
    if start >= src.len() {
        return 0;
    }
    let n = dst.len().min(src.len() - start);
    dst[..n].copy_from_slice(&src[start..start + n]);
    n
}

fn slice_bytes(src: &[u8], rel_pos: i64, want: i64) -> Bytes<'_> {
    let start = rel_pos as usize;
    if start >= src.len() {
        return Bytes::Borrowed(&[]);
    }
    let n = (want.max(0) as usize).min(src.len() - start);
    Bytes::Borrowed(&src[start..start + n])
}
