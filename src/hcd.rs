//! HTTP Chunk Decoder (spec §4.7, L7).
//!
//! A push-style state machine: bytes arrive incrementally via [`Hcd::push`]
//! and decoded payload ranges are appended to a caller-owned [`Ccb`]. States
//! move `ExpectSize -> ExpectBody -> ExpectTrailerCrlf -> [ExpectEntityHeaders]
//! -> Done`; trailing entity headers only appear when the terminal `0\r\n` is
//! followed by a non-empty header block before the closing blank line.

use std::sync::Arc;

use crate::ccb::Ccb;
use crate::error::{ChunkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ExpectSize,
    ExpectBody,
    ExpectTrailerCrlf,
    ExpectEntityHeaders,
    Done,
}

/// What [`Hcd::push`] accomplished with the bytes it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HcdStatus {
    /// More input is needed; the decoder consumed what it could.
    Waiting,
    /// The terminal chunk and trailer were fully consumed.
    Done,
}

pub struct Hcd {
    state: State,
    /// Bytes still owed for the in-flight chunk's body + trailing CRLF.
    chunk_remaining: i64,
    /// Partial size-line bytes carried across pushes (spec: "size line split
    /// across two buffers").
    size_line: Vec<u8>,
    /// Partial trailer bytes carried across pushes while hunting for the
    /// blank line (or immediate CRLF) that ends the trailer section.
    trailer_scan: Vec<u8>,

    pub chk_num: i64,
    pub chk_size: i64,
    pub chk_len: i64,
    pub recv_size: i64,
    pub recv_len: i64,
    got_all: bool,
    trailer: Vec<u8>,
}

impl Default for Hcd {
    fn default() -> Self {
        Self::new()
    }
}

impl Hcd {
    pub fn new() -> Self {
        Hcd {
            state: State::ExpectSize,
            chunk_remaining: 0,
            size_line: Vec::new(),
            trailer_scan: Vec::new(),
            chk_num: 0,
            chk_size: 0,
            chk_len: 0,
            recv_size: 0,
            recv_len: 0,
            got_all: false,
            trailer: Vec::new(),
        }
    }

    pub fn got_all(&self) -> bool {
        self.got_all
    }

    pub fn trailer(&self) -> &[u8] {
        &self.trailer
    }

    /// Feed `data` through the state machine, appending decoded chunk bodies
    /// to `ccb`. Returns how many bytes of `data` were consumed alongside
    /// whether the decode is complete.
    pub fn push(&mut self, ccb: &mut Ccb, data: &[u8]) -> Result<(HcdStatus, usize)> {
        let mut pos = 0;
        loop {
            if self.state == State::Done {
                return Ok((HcdStatus::Done, pos));
            }
            if pos >= data.len() {
                return Ok((HcdStatus::Waiting, pos));
            }
            match self.state {
                State::ExpectSize => {
                    pos += self.consume_size_line(&data[pos..])?;
                    if self.state == State::ExpectSize {
                        // size line incomplete; wait for more
                        return Ok((HcdStatus::Waiting, pos));
                    }
                }
                State::ExpectBody => {
                    pos += self.consume_body(ccb, &data[pos..]);
                }
                State::ExpectTrailerCrlf | State::ExpectEntityHeaders => {
                    pos += self.consume_trailer(&data[pos..]);
                }
                State::Done => unreachable!(),
            }
        }
    }

    /// Parse `HEX*CRLF`. Returns bytes consumed from `data`; leaves the
    /// state in `ExpectSize` (caller waits for more) if no CRLF was found.
    fn consume_size_line(&mut self, data: &[u8]) -> Result<usize> {
        self.size_line.extend_from_slice(data);
        let consumed = data.len();
        let nl = match self.size_line.iter().position(|&b| b == b'\n') {
            Some(i) => i,
            None => return Ok(consumed),
        };
        let line = self.size_line[..nl].to_vec();
        let extra = self.size_line.len() - (nl + 1);
        self.size_line.clear();

        let hex = std::str::from_utf8(&line)
            .map_err(|_| ChunkError::Protocol("chunk size line is not valid utf-8"))?;
        let hex = hex.trim_end_matches('\r').trim();
        let hex = hex.split(';').next().unwrap_or(hex); // drop chunk-extensions
        let size =
            i64::from_str_radix(hex.trim(), 16).map_err(|_| ChunkError::Protocol("malformed chunk size line"))?;

        self.chk_num += 1;
        self.chk_size += if size > 0 { size } else { 1 } + 4; // +2 CRLF after size, +2 trailing CRLF (or final CRLFCRLF)
        self.recv_size += size;

        if size == 0 {
            self.state = State::ExpectTrailerCrlf;
        } else {
            self.chunk_remaining = size + 2; // body + trailing CRLF
            self.state = State::ExpectBody;
        }
        // `extra` bytes after the CRLF belong to the next state; report them
        // as unconsumed so the outer loop re-feeds them.
        Ok(consumed - extra)
    }

    fn consume_body(&mut self, ccb: &mut Ccb, data: &[u8]) -> usize {
        let body_remaining = (self.chunk_remaining - 2).max(0);
        let take_body = (body_remaining as usize).min(data.len());
        if take_body > 0 {
            ccb.add_bufptr(Arc::from(&data[..take_body]));
            self.chk_len += take_body as i64;
            self.recv_len += take_body as i64;
            self.chunk_remaining -= take_body as i64;
        }
        let mut consumed = take_body;
        // Drain the trailing CRLF (never attached to the CCB payload).
        while self.chunk_remaining > 0 && consumed < data.len() {
            consumed += 1;
            self.chunk_remaining -= 1;
        }
        if self.chunk_remaining <= 0 {
            self.state = State::ExpectSize;
        }
        consumed
    }

    fn consume_trailer(&mut self, data: &[u8]) -> usize {
        self.trailer_scan.extend_from_slice(data);
        let consumed = data.len();
        if self.trailer_scan.starts_with(b"\r\n") {
            self.finish(2);
            return consumed;
        }
        if let Some(end) = find_subslice(&self.trailer_scan, b"\r\n\r\n") {
            self.trailer = self.trailer_scan[..end].to_vec();
            self.finish(end + 4);
            return consumed;
        }
        if !self.trailer_scan.is_empty() && self.state == State::ExpectTrailerCrlf {
            self.state = State::ExpectEntityHeaders;
        }
        consumed
    }

    fn finish(&mut self, trailer_bytes: usize) {
        self.state = State::Done;
        self.got_all = true;
        let _ = trailer_bytes;
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_c_incremental_chunks() {
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
        assert_eq!(hcd.chk_len, 11);
        assert_eq!(hcd.chk_size, 24);

        let mut out = vec![0u8; ccb.size(false) as usize];
        ccb.read(&mut out, 0, false).unwrap();
        assert_eq!(&out, b"Hello World");
    }

    #[test]
    fn size_line_split_across_two_pushes() {
        let mut hcd = Hcd::new();
        let mut ccb = Ccb::new();
        let (s1, _) = hcd.push(&mut ccb, b"5\r").unwrap();
        assert_eq!(s1, HcdStatus::Waiting);
        let (s2, _) = hcd.push(&mut ccb, b"\nHello\r\n0\r\n\r\n").unwrap();
        assert_eq!(s2, HcdStatus::Done);
        let mut out = vec![0u8; ccb.size(false) as usize];
        ccb.read(&mut out, 0, false).unwrap();
        assert_eq!(&out, b"Hello");
    }

    #[test]
    fn trailer_headers_before_final_blank_line() {
        let mut hcd = Hcd::new();
        let mut ccb = Ccb::new();
        let (status, _) = hcd.push(&mut ccb, b"3\r\nabc\r\n0\r\nX-Checksum: deadbeef\r\n\r\n").unwrap();
        assert_eq!(status, HcdStatus::Done);
        assert_eq!(hcd.trailer(), b"X-Checksum: deadbeef");
    }

    #[test]
    fn malformed_size_line_is_protocol_error() {
        let mut hcd = Hcd::new();
        let mut ccb = Ccb::new();
        let err = hcd.push(&mut ccb, b"zzz\r\n").unwrap_err();
        assert!(matches!(err, ChunkError::Protocol(_)));
    }
}
