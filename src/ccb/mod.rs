//! Chunked Content Buffer (spec §4.3, L3) — the hardest component.
//!
//! A CCB behaves like one contiguous byte range of logical length
//! `raw_size`, assembled from heterogeneous segments and optionally
//! projected through HTTP chunked-transfer framing.

pub mod segment;
pub mod vec;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ChunkError, Result};
use segment::{Bytes, CallbackSegment, FileHandleSegment, FileSegment, InlineBuf, SegmentEntry, SegmentKind};
use vec::{ChunkVec, FileSlice, MAX_IOVECS};

/// Where a logical (or HTTP-projected) position falls within one segment.
#[derive(Debug, Clone, Copy)]
enum Within {
    Prefix(i64),
    Payload(i64),
    Suffix(i64),
}

#[derive(Debug, Clone, Copy)]
enum Loc {
    Entry { index: usize, within: Within },
    Terminator(i64),
}

pub struct Ccb {
    entities: Vec<SegmentEntry>,

    httpchunk: bool,
    raw_size: i64,
    removed_size: i64,
    seek_pos: i64,
    end_flag: bool,
    file_count: i32,
    buffer_count: i32,

    progress_notify: Option<Box<dyn FnMut(i64, i64) + Send>>,
}

impl Default for Ccb {
    fn default() -> Self {
        Self::new()
    }
}

impl Ccb {
    pub fn new() -> Self {
        Ccb {
            entities: Vec::new(),
            httpchunk: false,
            raw_size: 0,
            removed_size: 0,
            seek_pos: 0,
            end_flag: false,
            file_count: 0,
            buffer_count: 0,
            progress_notify: None,
        }
    }

    pub fn set_httpchunk(&mut self, on: bool) {
        self.httpchunk = on;
    }

    pub fn set_progress_notify(&mut self, f: impl FnMut(i64, i64) + Send + 'static) {
        self.progress_notify = Some(Box::new(f));
    }

    pub fn set_end(&mut self) {
        self.end_flag = true;
    }

    pub fn has_ended(&self) -> bool {
        self.end_flag
    }

    pub fn num(&self) -> usize {
        self.entities.len()
    }

    pub fn has_file(&self) -> bool {
        self.file_count > 0
    }

    pub fn has_buf(&self) -> bool {
        self.buffer_count > 0
    }

    // ---- mutation -------------------------------------------------------

    fn push(&mut self, entry: SegmentEntry) {
        if entry.is_file_like() {
            self.file_count += 1;
        }
        if entry.is_buffer_like() {
            self.buffer_count += 1;
        }
        self.raw_size += entry.length;
        self.entities.push(entry);
    }

    fn prepend(&mut self, entry: SegmentEntry) {
        if entry.is_file_like() {
            self.file_count += 1;
        }
        if entry.is_buffer_like() {
            self.buffer_count += 1;
        }
        self.raw_size += entry.length;
        self.entities.insert(0, entry);
    }

    /// `add_buffer`: copy `data` into the CCB, inline if it fits in 48
    /// bytes, heap-allocated otherwise.
    pub fn add_buffer(&mut self, data: &[u8]) {
        let kind = match InlineBuf::new(data) {
            Some(inline) => SegmentKind::Inline(inline),
            None => SegmentKind::Owned(data.to_vec().into_boxed_slice()),
        };
        let len = data.len() as i64;
        self.push(SegmentEntry::new(kind, len, false));
    }

    /// `add_bufptr`/`prepend_bufptr`/`append_bufptr`: a shared, caller-owned
    /// payload the CCB does not allocate-copy. `porig` identity for later
    /// [`Ccb::remove_bufptr`] is the buffer's own address.
    pub fn add_bufptr(&mut self, data: Arc<[u8]>) {
        let len = data.len() as i64;
        self.push(SegmentEntry::new(SegmentKind::Shared(data), len, false));
    }

    pub fn prepend_bufptr(&mut self, data: Arc<[u8]>) {
        let len = data.len() as i64;
        self.prepend(SegmentEntry::new(SegmentKind::Shared(data), len, false));
    }

    pub fn append_bufptr(&mut self, data: Arc<[u8]>) {
        self.add_bufptr(data);
    }

    /// `remove_bufptr(porig)`: delete exactly the segment whose `Shared`
    /// payload's address equals `porig`'s.
    pub fn remove_bufptr(&mut self, porig: &Arc<[u8]>) -> bool {
        let want = Arc::as_ptr(porig) as *const u8;
        if let Some(idx) = self.entities.iter().position(|e| match &e.kind {
            SegmentKind::Shared(b) => Arc::as_ptr(b) as *const u8 == want,
            _ => false,
        }) {
            let e = self.entities.remove(idx);
            self.raw_size -= e.length;
            if e.is_buffer_like() {
                self.buffer_count -= 1;
            }
            true
        } else {
            false
        }
    }

    /// Escape-strip variants: strip `\`-escapes before storing (spec
    /// §4.3.1's strip family).
    pub fn add_strip_buffer(&mut self, data: &[u8]) {
        let stripped = crate::bytes::strip(data);
        self.add_buffer(&stripped);
    }

    pub fn prepend_strip_buffer(&mut self, data: &[u8], is_header: bool) {
        let stripped = crate::bytes::strip(data);
        let kind = match InlineBuf::new(&stripped) {
            Some(inline) => SegmentKind::Inline(inline),
            None => SegmentKind::Owned(stripped.clone().into_boxed_slice()),
        };
        let len = stripped.len() as i64;
        self.prepend(SegmentEntry::new(kind, len, is_header));
    }

    pub fn append_strip_buffer(&mut self, data: &[u8]) {
        self.add_strip_buffer(data);
    }

    /// `add_file`: a file segment identified by path; stat'd once at add
    /// time, mmap'd lazily on first read.
    pub fn add_file(&mut self, path: impl AsRef<Path>, offset: i64, length: i64) -> Result<()> {
        let seg = FileSegment::open(path, offset, length)?;
        let len = seg.length;
        self.push(SegmentEntry::new(SegmentKind::File(seg), len, false));
        Ok(())
    }

    /// `add_filefp`/`add_filefd`: the CCB borrows an already-open handle.
    pub fn add_filehandle(&mut self, file: Arc<std::fs::File>, offset: i64, length: i64) -> Result<()> {
        let seg = FileHandleSegment::new(file, offset, length)?;
        let len = seg.length;
        self.push(SegmentEntry::new(SegmentKind::FileHandle(seg), len, false));
        Ok(())
    }

    fn raw_start_of(&self, idx: usize) -> i64 {
        self.entities[..idx].iter().map(|e| e.length).sum()
    }

    /// `chunk_remove`: drop entities fully consumed up to `pos`, freeing
    /// their storage and advancing the removed-bytes high-water mark.
    /// `pos` may be expressed in HTTP-chunk space; it is translated back to
    /// raw space before deciding what can be dropped, since framing bytes
    /// belonging to a not-yet-fully-consumed segment must not be discarded.
    pub fn remove(&mut self, pos: i64, httpchunk: bool) -> i64 {
        let raw_pos = if !httpchunk {
            pos
        } else {
            match self.locate_mode(pos, true) {
                Some(Loc::Entry {
                    index,
                    within: Within::Payload(rel),
                }) => self.raw_start_of(index) + rel,
                Some(Loc::Entry { index, within: Within::Prefix(_) }) => self.raw_start_of(index),
                Some(Loc::Entry { index, within: Within::Suffix(_) }) => {
                    self.raw_start_of(index) + self.entities[index].length
                }
                Some(Loc::Terminator(_)) | None => self.raw_size,
            }
        }
        .clamp(0, self.raw_size);

        let mut consumed = 0i64;
        let mut count = 0usize;
        for e in &self.entities {
            if consumed + e.length <= raw_pos {
                consumed += e.length;
                count += 1;
            } else {
                break;
            }
        }
        if count > 0 {
            for e in self.entities.drain(0..count) {
                if e.is_file_like() {
                    self.file_count -= 1;
                }
                if e.is_buffer_like() {
                    self.buffer_count -= 1;
                }
            }
            self.removed_size += consumed;
            self.raw_size -= consumed;
            self.seek_pos = (self.seek_pos - consumed).max(0);
        }
        consumed
    }

    pub fn removed_size(&self) -> i64 {
        self.removed_size
    }

    /// `chunk_go_ahead`: notify a callback-backed segment that its data up
    /// to `pos` has been consumed by `step` further bytes. A no-op (always
    /// permitted) on every other segment kind.
    pub fn go_ahead(&self, pos: i64, step: i64) -> bool {
        match self.raw_locate(pos) {
            Some((idx, rel)) => match &self.entities[idx].kind {
                SegmentKind::Callback(cb) => cb.go_ahead(rel, step),
                _ => true,
            },
            None => false,
        }
    }

    pub fn remove_file(&mut self) {
        self.entities.retain(|e| !e.is_file_like());
        self.recompute_counts();
    }

    fn recompute_counts(&mut self) {
        self.raw_size = self.entities.iter().map(|e| e.length).sum();
        self.file_count = self.entities.iter().filter(|e| e.is_file_like()).count() as i32;
        self.buffer_count = self.entities.iter().filter(|e| e.is_buffer_like()).count() as i32;
    }

    /// `add_cbdata`: a lazy producer yielding `(ptr,len)` on demand.
    pub fn add_cbdata(
        &mut self,
        length: i64,
        fetch: impl FnMut(i64, i64) -> Option<Vec<u8>> + Send + 'static,
        advance: impl FnMut(i64, i64) -> bool + Send + 'static,
        end: impl FnMut(i32) + Send + 'static,
    ) {
        let seg = CallbackSegment::new(length, fetch, advance, end);
        self.push(SegmentEntry::new(SegmentKind::Callback(seg), length, false));
    }

    // ---- queries ----------------------------------------------------------

    pub fn size(&self, httpchunk: bool) -> i64 {
        if !httpchunk {
            self.raw_size
        } else {
            let framing: i64 = self.entities.iter().map(|e| e.framing_overhead()).sum();
            self.raw_size + framing + if self.end_flag { 5 } else { 0 }
        }
    }

    pub fn rest_size(&self, httpchunk: bool) -> i64 {
        (self.size(httpchunk) - self.startpos(httpchunk)).max(0)
    }

    pub fn startpos(&self, httpchunk: bool) -> i64 {
        if !httpchunk {
            return self.seek_pos;
        }
        match self.raw_locate(self.seek_pos) {
            Some((idx, intra)) => self.http_offset_of(idx, intra),
            None => self.size(true),
        }
    }

    pub fn seek(&mut self, pos: i64) -> i64 {
        self.seek_pos = pos.clamp(0, self.raw_size);
        self.seek_pos
    }

    pub fn seekpos(&self) -> i64 {
        self.seek_pos
    }

    /// True only if the CCB holds exactly one file-like segment.
    pub fn is_file(&self) -> Option<(&std::path::Path, i64, crate::ccb::segment::FileStamp)> {
        if self.file_count != 1 || self.entities.len() != 1 {
            return None;
        }
        match &self.entities[0].kind {
            SegmentKind::File(f) => Some((&f.path, f.length, f.stamp)),
            _ => None,
        }
    }

    pub fn attr(&self, index: usize) -> Option<(&'static str, i64)> {
        let e = self.entities.get(index)?;
        let kind = match &e.kind {
            SegmentKind::Inline(_) => "char_array",
            SegmentKind::Shared(_) => "buffer",
            SegmentKind::Owned(_) => "owned_buffer",
            SegmentKind::File(_) => "file",
            SegmentKind::FileHandle(_) => "file_handle",
            SegmentKind::Callback(_) => "callback",
        };
        Some((kind, e.length))
    }

    // ---- positional addressing --------------------------------------------

    fn raw_locate(&self, pos: i64) -> Option<(usize, i64)> {
        if pos < 0 {
            return None;
        }
        let mut rem = pos;
        for (idx, e) in self.entities.iter().enumerate() {
            if rem < e.length {
                return Some((idx, rem));
            }
            rem -= e.length;
        }
        None
    }

    fn http_offset_of(&self, target_idx: usize, intra: i64) -> i64 {
        let mut off = 0i64;
        for e in self.entities.iter().take(target_idx) {
            off += e.framing_overhead() + e.length;
        }
        let prefix_len = self.entities[target_idx].size_hex.len() as i64 + 2;
        off + prefix_len + intra
    }

    fn locate(&self, pos: i64) -> Option<Loc> {
        self.locate_mode(pos, self.httpchunk)
    }

    fn locate_mode(&self, pos: i64, httpchunk: bool) -> Option<Loc> {
        if pos < 0 {
            return None;
        }
        let mut rem = pos;
        for (idx, e) in self.entities.iter().enumerate() {
            if httpchunk {
                let prefix_len = e.size_hex.len() as i64 + 2;
                if rem < prefix_len {
                    return Some(Loc::Entry {
                        index: idx,
                        within: Within::Prefix(rem),
                    });
                }
                rem -= prefix_len;
                if rem < e.length {
                    return Some(Loc::Entry {
                        index: idx,
                        within: Within::Payload(rem),
                    });
                }
                rem -= e.length;
                if rem < 2 {
                    return Some(Loc::Entry {
                        index: idx,
                        within: Within::Suffix(rem),
                    });
                }
                rem -= 2;
            } else if rem < e.length {
                return Some(Loc::Entry {
                    index: idx,
                    within: Within::Payload(rem),
                });
            } else {
                rem -= e.length;
            }
        }
        if httpchunk && self.end_flag && rem < 5 {
            return Some(Loc::Terminator(rem));
        }
        None
    }

    /// `read(dst,pos,len,httpchunk)`: copy into a caller buffer, crossing
    /// segment boundaries and HTTP framing transparently. Returns bytes
    /// actually copied.
    pub fn read(&self, dst: &mut [u8], pos: i64, httpchunk: bool) -> Result<usize> {
        self.read_inner(dst, pos, httpchunk)
    }

    fn read_inner(&self, dst: &mut [u8], pos: i64, httpchunk: bool) -> Result<usize> {
        let mut copied = 0usize;
        let mut cursor = pos;
        while copied < dst.len() {
            match self.locate_mode(cursor, httpchunk) {
                None => break,
                Some(Loc::Terminator(rel)) => {
                    const TERM: &[u8] = b"0\r\n\r\n";
                    let n = copy_slice(TERM, rel, &mut dst[copied..]);
                    if n == 0 {
                        break;
                    }
                    copied += n;
                    cursor += n as i64;
                }
                Some(Loc::Entry { index, within }) => match within {
                    Within::Prefix(rel) => {
                        let lit = format!("{}\r\n", self.entities[index].size_hex);
                        let n = copy_slice(lit.as_bytes(), rel, &mut dst[copied..]);
                        copied += n;
                        cursor += n as i64;
                    }
                    Within::Suffix(rel) => {
                        const CRLF: &[u8] = b"\r\n";
                        let n = copy_slice(CRLF, rel, &mut dst[copied..]);
                        copied += n;
                        cursor += n as i64;
                    }
                    Within::Payload(rel) => {
                        let n = self.entities[index].read_at(rel, &mut dst[copied..])?;
                        if n == 0 {
                            break;
                        }
                        copied += n;
                        cursor += n as i64;
                    }
                },
            }
        }
        Ok(copied)
    }

    /// `read_ptr`: zero-copy where possible (memory/mmap'd segments),
    /// otherwise a materialized copy (callback producers, framing
    /// literals).
    pub fn read_ptr(&self, pos: i64, len: i64) -> Result<Bytes<'_>> {
        match self.locate(pos) {
            None => Ok(Bytes::Borrowed(&[])),
            Some(Loc::Terminator(rel)) => {
                const TERM: &[u8] = b"0\r\n\r\n";
                Ok(Bytes::Owned(slice_owned(TERM, rel, len)))
            }
            Some(Loc::Entry { index, within }) => match within {
                Within::Prefix(rel) => {
                    let lit = format!("{}\r\n", self.entities[index].size_hex);
                    Ok(Bytes::Owned(slice_owned(lit.as_bytes(), rel, len)))
                }
                Within::Suffix(rel) => Ok(Bytes::Owned(slice_owned(b"\r\n", rel, len))),
                Within::Payload(rel) => self.entities[index].bytes_at(rel, len),
            },
        }
    }

    pub fn at(&self, pos: i64) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        let n = self.read_inner(&mut buf, pos, self.httpchunk)?;
        Ok(if n == 1 { Some(buf[0]) } else { None })
    }

    /// `write_file`: flush a slice to an already-open descriptor.
    pub fn write_file(&self, w: &mut impl Write, pos: i64, len: i64, httpchunk: bool) -> Result<i64> {
        let mut remaining = len;
        let mut cursor = pos;
        let mut total = 0i64;
        let mut buf = vec![0u8; 64 * 1024];
        while remaining > 0 {
            let want = remaining.min(buf.len() as i64) as usize;
            let n = self.read_inner(&mut buf[..want], cursor, httpchunk)?;
            if n == 0 {
                break;
            }
            w.write_all(&buf[..n])?;
            total += n as i64;
            cursor += n as i64;
            remaining -= n as i64;
        }
        Ok(total)
    }

    /// `writev`: gather consecutive memory segments into one vectored
    /// write; when a file segment is hit, copy that slice directly.
    pub fn writev(&self, w: &mut impl Write, pos: i64, httpchunk: bool) -> Result<i64> {
        let vecinfo = self.vec_get(pos, httpchunk)?;
        match vecinfo.vectype {
            vec::VecType::Memory => {
                let mut total = 0i64;
                for b in &vecinfo.iovs {
                    loop {
                        match w.write(b.as_slice()) {
                            Ok(n) => {
                                total += n as i64;
                                break;
                            }
                            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                            Err(e) => return Err(ChunkError::from(e)),
                        }
                    }
                }
                Ok(total)
            }
            vec::VecType::File => {
                let slice = vecinfo.file.unwrap();
                let data = std::fs::read(&slice.path)?;
                let start = slice.file_pos as usize;
                let end = (start + slice.size as usize).min(data.len());
                w.write_all(&data[start..end])?;
                Ok((end - start) as i64)
            }
        }
    }

    /// `vec_get`: populate up to 192 iovecs for memory-backed bytes, or a
    /// single file descriptor slice.
    pub fn vec_get(&self, pos: i64, httpchunk: bool) -> Result<ChunkVec<'_>> {
        self.vec_get_inner(pos, httpchunk)
    }

    fn vec_get_inner(&self, pos: i64, httpchunk: bool) -> Result<ChunkVec<'_>> {
        match self.locate_mode(pos, httpchunk) {
            None => Ok(ChunkVec::memory(pos, Vec::new())),
            Some(Loc::Terminator(rel)) => Ok(ChunkVec::memory(
                pos,
                vec![Bytes::Owned(slice_owned(b"0\r\n\r\n", rel, 5))],
            )),
            Some(Loc::Entry { index, within }) => {
                if let Within::Payload(rel) = within {
                    if self.entities[index].is_file_like() {
                        if let SegmentKind::File(f) = &self.entities[index].kind {
                            return Ok(ChunkVec::file(
                                pos,
                                FileSlice {
                                    path: f.path.clone(),
                                    file_pos: f.offset + rel,
                                    size: f.length - rel,
                                },
                            ));
                        }
                        // FileHandle: no stable path to report; materialize instead.
                        let bytes = self.entities[index].bytes_at(rel, self.entities[index].length - rel)?;
                        return Ok(ChunkVec::memory(pos, vec![bytes]));
                    }
                }

                let mut iovs = Vec::new();
                let mut cursor = pos;
                while iovs.len() < MAX_IOVECS {
                    match self.locate_mode(cursor, httpchunk) {
                        Some(Loc::Entry {
                            index: i2,
                            within: Within::Payload(rel2),
                        }) if !self.entities[i2].is_file_like() => {
                            let want = self.entities[i2].length - rel2;
                            let b = self.entities[i2].bytes_at(rel2, want)?;
                            let taken = b.as_slice().len() as i64;
                            if taken == 0 {
                                break;
                            }
                            iovs.push(b);
                            cursor += taken;
                        }
                        Some(Loc::Entry {
                            index: i2,
                            within: Within::Prefix(rel2),
                        }) => {
                            let lit = format!("{}\r\n", self.entities[i2].size_hex);
                            let b = slice_owned(lit.as_bytes(), rel2, lit.len() as i64 - rel2);
                            let taken = b.len() as i64;
                            iovs.push(Bytes::Owned(b));
                            cursor += taken;
                        }
                        Some(Loc::Entry {
                            index: i2,
                            within: Within::Suffix(rel2),
                        }) => {
                            let b = slice_owned(b"\r\n", rel2, 2 - rel2);
                            let taken = b.len() as i64;
                            iovs.push(Bytes::Owned(b));
                            cursor += taken;
                        }
                        Some(Loc::Terminator(rel2)) => {
                            let b = slice_owned(b"0\r\n\r\n", rel2, 5 - rel2);
                            let taken = b.len() as i64;
                            iovs.push(Bytes::Owned(b));
                            cursor += taken;
                        }
                        _ => break,
                    }
                }
                Ok(ChunkVec::memory(pos, iovs))
            }
        }
    }

    // ---- skip primitives (always operate in raw address space) ------------

    fn raw_window(&self, start: i64, len: i64) -> Vec<u8> {
        let start = start.max(0);
        let len = len.max(0).min((self.raw_size - start).max(0));
        if len <= 0 {
            return Vec::new();
        }
        let mut buf = vec![0u8; len as usize];
        let _ = self.read_inner(&mut buf, start, false);
        buf
    }

    pub fn skip_over(&self, pos: i64, skiplimit: i64, chars: &[u8]) -> i64 {
        let buf = self.raw_window(pos, skiplimit);
        pos + crate::bytes::skip_over(&buf, 0, chars) as i64
    }

    pub fn skip_to(&self, pos: i64, skiplimit: i64, chars: &[u8]) -> i64 {
        let buf = self.raw_window(pos, skiplimit);
        pos + crate::bytes::skip_to(&buf, 0, chars) as i64
    }

    pub fn skip_quote_to(&self, pos: i64, skiplimit: i64, chars: &[u8]) -> i64 {
        let buf = self.raw_window(pos, skiplimit);
        pos + crate::bytes::skip_quote_to(&buf, 0, chars) as i64
    }

    pub fn skip_esc_to(&self, pos: i64, skiplimit: i64, chars: &[u8]) -> i64 {
        let buf = self.raw_window(pos, skiplimit);
        pos + crate::bytes::skip_esc_to(&buf, 0, chars) as i64
    }

    pub fn rskip_over(&self, pos: i64, skiplimit: i64, chars: &[u8]) -> i64 {
        let start = (pos - skiplimit).max(0);
        let buf = self.raw_window(start, pos - start);
        let mut i = buf.len() as i64;
        while i > 0 && chars.contains(&buf[(i - 1) as usize]) {
            i -= 1;
        }
        start + i
    }

    pub fn rskip_to(&self, pos: i64, skiplimit: i64, chars: &[u8]) -> i64 {
        let start = (pos - skiplimit).max(0);
        let buf = self.raw_window(start, pos - start);
        let mut i = buf.len() as i64;
        while i > 0 {
            if chars.contains(&buf[(i - 1) as usize]) {
                return start + i;
            }
            i -= 1;
        }
        start
    }

    // ---- pattern search across segments ------------------------------------

    fn materialize(&self) -> Vec<u8> {
        self.raw_window(0, self.raw_size)
    }

    /// Result of a cross-segment pattern search: the logical offset of the
    /// match plus the `(entry_index, intra_offset)` where it begins.
    pub fn sun_find_bytes(&self, pos: i64, pattern: &[u8]) -> Option<(i64, usize, i64)> {
        self.find_bytes_with(pos, pattern, crate::search::sunday_find)
    }

    pub fn bm_find_bytes(&self, pos: i64, pattern: &[u8]) -> Option<(i64, usize, i64)> {
        self.find_bytes_with(pos, pattern, crate::search::bm_find)
    }

    pub fn kmp_find_bytes(&self, pos: i64, pattern: &[u8]) -> Option<(i64, usize, i64)> {
        self.find_bytes_with(pos, pattern, crate::search::kmp_find)
    }

    fn find_bytes_with(
        &self,
        pos: i64,
        pattern: &[u8],
        algo: impl Fn(&[u8], &[u8]) -> Option<usize>,
    ) -> Option<(i64, usize, i64)> {
        if pos < 0 || pos > self.raw_size || pattern.is_empty() {
            return None;
        }
        let buf = self.materialize();
        let rel = algo(&buf[pos as usize..], pattern)?;
        let abs = pos + rel as i64;
        let (idx, intra) = self.raw_locate(abs)?;
        Some((abs, idx, intra))
    }
}

fn copy_slice(src: &[u8], rel: i64, dst: &mut [u8]) -> usize {
    let start = rel as usize;
    if start >= src.len() {
        return 0;
    }
    let n = dst.len().min(src.len() - start);
    dst[..n].copy_from_slice(&src[start..start + n]);
    n
}

fn slice_owned(src: &[u8], rel: i64, want: i64) -> Vec<u8> {
    let start = rel.max(0) as usize;
    if start >= src.len() {
        return Vec::new();
    }
    let n = (want.max(0) as usize).min(src.len() - start);
    src[start..start + n].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_consistency_raw_and_http() {
        let mut ccb = Ccb::new();
        ccb.add_buffer(b"ABCDE");
        ccb.add_buffer(b"FGHIJ");
        assert_eq!(ccb.size(false), 10);

        // 5 CRLF ABCDE CRLF = 1+2+5+2 = 10, twice, plus terminator 5
        ccb.set_end();
        let framing_each = 1 + 2 + 5 + 2;
        assert_eq!(ccb.size(true), 10 + 2 * framing_each as i64 + 5);
    }

    #[test]
    fn read_crosses_segment_boundaries() {
        let mut ccb = Ccb::new();
        ccb.add_buffer(b"ABCDE");
        ccb.add_buffer(b"FGHIJ");
        ccb.add_buffer(b"KLMNO");
        let mut buf = [0u8; 15];
        let n = ccb.read(&mut buf, 0, false).unwrap();
        assert_eq!(n, 15);
        assert_eq!(&buf, b"ABCDEFGHIJKLMNO");
    }

    #[test]
    fn scenario_a_pattern_search_across_segments() {
        let mut ccb = Ccb::new();
        ccb.add_buffer(b"ABCDE");
        ccb.add_buffer(b"FGHIJ");
        ccb.add_buffer(b"KLMNO");

        let (off, idx, intra) = ccb.sun_find_bytes(0, b"EFGH").unwrap();
        assert_eq!(off, 4);
        assert_eq!(idx, 0);
        assert_eq!(intra, 4);

        let (off2, _, _) = ccb.sun_find_bytes(5, b"HIJ").unwrap();
        assert_eq!(off2, 7);
    }

    #[test]
    fn http_chunk_framing_roundtrip() {
        let mut ccb = Ccb::new();
        ccb.add_buffer(b"Hello World");
        ccb.set_end();
        let size = ccb.size(true) as usize;
        let mut buf = vec![0u8; size];
        let n = ccb.read(&mut buf, 0, true).unwrap();
        assert_eq!(n, size);
        assert_eq!(&buf, b"B\r\nHello World\r\n0\r\n\r\n");
    }

    #[test]
    fn remove_bufptr_by_identity() {
        let mut ccb = Ccb::new();
        let data: Arc<[u8]> = Arc::from(&b"payload"[..]);
        ccb.add_bufptr(data.clone());
        assert_eq!(ccb.num(), 1);
        assert!(ccb.remove_bufptr(&data));
        assert_eq!(ccb.num(), 0);
    }

    #[test]
    fn remove_drops_fully_consumed_segments() {
        let mut ccb = Ccb::new();
        ccb.add_buffer(b"ABCDE");
        ccb.add_buffer(b"FGHIJ");
        ccb.add_buffer(b"KLMNO");
        let removed = ccb.remove(7, false);
        assert_eq!(removed, 5);
        assert_eq!(ccb.num(), 2);
        assert_eq!(ccb.removed_size(), 5);
        let mut buf = [0u8; 10];
        let n = ccb.read(&mut buf, 0, false).unwrap();
        assert_eq!(&buf[..n], b"FGHIJKLMNO");
    }

    #[test]
    fn file_segment_rejects_missing_file() {
        let mut ccb = Ccb::new();
        assert!(ccb.add_file("/no/such/file/hopefully", 0, -1).is_err());
    }
}
