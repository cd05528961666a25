//! External collaborator contracts (spec §6).
//!
//! These traits describe the seams the rest of the crate assumes but does
//! not implement: a native file handle, a TLS-capable socket, and a growable
//! frame buffer. Concrete sockets/files/TLS contexts are owned by whatever
//! binds this library into a server; CCB, SFC, and HCD only need the shapes
//! below. No implementation lives here by design — see spec §9 on treating
//! the source's process-wide singletons as explicit handles instead.

use std::io;

/// Permission bits a [`NativeFile`] was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    pub read: bool,
    pub read_plus: bool,
    pub write: bool,
    pub write_plus: bool,
    pub exec: bool,
}

/// `(size, mtime, inode, mime_id)` as reported by `attr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttr {
    pub size: i64,
    pub mtime: i64,
    pub inode: u64,
    pub mime_id: i32,
}

/// A mapped window returned by [`NativeFile::file_mmap`]: a raw pointer
/// (owned by the implementation, unmapped via `file_munmap`), its length,
/// and the page-aligned offset it was mapped at.
pub struct MappedWindow {
    pub ptr: *const u8,
    pub len: usize,
    pub map_offset: i64,
}

/// A native file handle: open/read/write/seek/stat plus an mmap escape
/// hatch for the CCB's file-backed segments (spec §6).
pub trait NativeFile: io::Read + io::Write + io::Seek {
    fn size(&self) -> io::Result<i64>;
    fn attr(&self) -> io::Result<FileAttr>;
    fn file_mmap(&self, offset: i64, len: i64) -> io::Result<MappedWindow>;
    fn file_munmap(&self, window: MappedWindow) -> io::Result<()>;
}

/// TLS handshake progress, mirroring OpenSSL's want-read/want-write split
/// (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    WantRead,
    WantWrite,
    Ok,
    Err,
}

/// A TLS-capable socket. HCD and the `webget` sample consume this contract;
/// this crate does not redefine or implement TLS.
pub trait SslTcp {
    fn handshake(&mut self) -> io::Result<HandshakeState>;
    fn read(&mut self, frame: &mut dyn FrameBuffer) -> io::Result<usize>;
    fn writev(&mut self, iovs: &[&[u8]]) -> io::Result<usize>;
    fn sendfile(&mut self, file: &dyn NativeFile, pos: i64, len: i64) -> io::Result<usize>;
    fn close(&mut self) -> io::Result<()>;
}

/// A growable byte buffer with deque-like ends, used as the socket-facing
/// read/write staging area (spec §6).
pub trait FrameBuffer {
    fn append(&mut self, data: &[u8]);
    fn put_last(&mut self, data: &[u8]);
    fn put_first(&mut self, data: &[u8]);
    fn get_nlast(&self, n: usize) -> &[u8];
    fn get_nfirst(&self, n: usize) -> &[u8];
    fn del_first(&mut self, n: usize);
    fn is_empty(&self) -> bool;
    fn as_slice(&self) -> &[u8];
}
