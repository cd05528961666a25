//! Received-Fragment Tracker (spec §4.2, L2).
//!
//! A sorted, non-overlapping interval set over a known-or-unknown total
//! length, used to record which byte ranges of a stream have arrived. One
//! `parking_lot::Mutex` guards the vector, matching the single-mutex
//! concurrency model in §5.

use parking_lot::Mutex;

/// One contiguous received range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragItem {
    pub offset: i64,
    pub length: i64,
}

/// Result of [`Rft::contain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    None,
    RightPartial,
    LeftPartial,
    Full,
}

struct Inner {
    total_length: i64,
    items: Vec<FragItem>,
}

impl Inner {
    fn recompute_complete(&self) -> bool {
        self.total_length > 0
            && self.items.len() == 1
            && self.items[0].offset == 0
            && self.items[0].length == self.total_length
    }
}

pub struct Rft {
    inner: Mutex<Inner>,
}

impl Default for Rft {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Rft {
    pub fn new(total_length: i64) -> Self {
        Rft {
            inner: Mutex::new(Inner {
                total_length,
                items: Vec::new(),
            }),
        }
    }

    pub fn total_length(&self) -> i64 {
        self.inner.lock().total_length
    }

    /// Set (or change) the total length. Does not discard existing items;
    /// `complete` is re-evaluated against the new length.
    pub fn set_length(&self, length: i64) {
        let mut g = self.inner.lock();
        g.total_length = length;
    }

    pub fn complete(&self) -> bool {
        let g = self.inner.lock();
        g.recompute_complete()
    }

    pub fn items(&self) -> Vec<FragItem> {
        self.inner.lock().items.clone()
    }

    pub fn received_len(&self) -> i64 {
        self.inner.lock().items.iter().map(|i| i.length).sum()
    }

    /// Merge `[pos, pos+len)` into the set. Returns `false` if the range was
    /// already fully contained (no change), `true` otherwise.
    pub fn add(&self, mut pos: i64, mut len: i64) -> bool {
        if len <= 0 {
            return false;
        }
        let mut g = self.inner.lock();

        if g.total_length > 0 {
            if pos > g.total_length {
                pos = g.total_length;
            }
            if pos + len > g.total_length {
                len = g.total_length - pos;
            }
            if len <= 0 {
                return false;
            }
        }

        let end = pos + len;

        // Binary search for the first item whose end >= pos (candidate for merging).
        let start_idx = g
            .items
            .partition_point(|it| it.offset + it.length < pos);

        // Check full containment by the immediately preceding item.
        if start_idx < g.items.len() {
            let it = g.items[start_idx];
            if it.offset <= pos && it.offset + it.length >= end {
                return false; // fully contained already
            }
        }

        let mut new_offset = pos;
        let mut new_end = end;

        // Absorb every item that overlaps or touches [pos, end).
        let mut remove_start = start_idx;
        let mut remove_end = start_idx;
        while remove_end < g.items.len() && g.items[remove_end].offset <= new_end {
            let it = g.items[remove_end];
            new_offset = new_offset.min(it.offset);
            new_end = new_end.max(it.offset + it.length);
            remove_end += 1;
        }
        // also check the item immediately before start_idx in case it touches pos
        if remove_start > 0 {
            let prev = g.items[remove_start - 1];
            if prev.offset + prev.length >= new_offset {
                new_offset = new_offset.min(prev.offset);
                new_end = new_end.max(prev.offset + prev.length);
                remove_start -= 1;
            }
        }

        g.items.splice(
            remove_start..remove_end,
            std::iter::once(FragItem {
                offset: new_offset,
                length: new_end - new_offset,
            }),
        );

        true
    }

    /// Remove `[pos, pos+len)`, splitting an item in two if the range falls
    /// in its interior.
    pub fn del(&self, pos: i64, len: i64) {
        if len <= 0 {
            return;
        }
        let end = pos + len;
        let mut g = self.inner.lock();

        let mut result = Vec::with_capacity(g.items.len() + 1);
        for it in g.items.drain(..) {
            let it_end = it.offset + it.length;
            if it_end <= pos || it.offset >= end {
                result.push(it);
                continue;
            }
            if it.offset < pos {
                result.push(FragItem {
                    offset: it.offset,
                    length: pos - it.offset,
                });
            }
            if it_end > end {
                result.push(FragItem {
                    offset: end,
                    length: it_end - end,
                });
            }
        }
        g.items = result;
    }

    /// Return the item containing `pos`, or the next item at/after `pos`.
    /// The bool is `true` iff `pos` falls inside the returned item.
    pub fn get(&self, pos: i64) -> Option<(FragItem, bool)> {
        let g = self.inner.lock();
        let idx = g.items.partition_point(|it| it.offset + it.length <= pos);
        let it = *g.items.get(idx)?;
        let contains = it.offset <= pos && pos < it.offset + it.length;
        Some((it, contains))
    }

    /// First gap at or after `pos`. `length == -1` means the tail is
    /// unbounded (total length unknown).
    pub fn gap(&self, pos: i64) -> (i64, i64) {
        let g = self.inner.lock();
        let idx = g.items.partition_point(|it| it.offset + it.length <= pos);

        match g.items.get(idx) {
            Some(it) if it.offset <= pos => {
                // pos is inside this item; the gap starts after it.
                let gap_start = it.offset + it.length;
                match g.items.get(idx + 1) {
                    Some(next) => (gap_start, next.offset - gap_start),
                    None => {
                        if g.total_length > 0 {
                            (gap_start, (g.total_length - gap_start).max(0))
                        } else {
                            (gap_start, -1)
                        }
                    }
                }
            }
            Some(it) => (pos, it.offset - pos),
            None => {
                if g.total_length > 0 {
                    (pos, (g.total_length - pos).max(0))
                } else {
                    (pos, -1)
                }
            }
        }
    }

    /// Classify how `[pos, pos+length)` relates to the received set.
    pub fn contain(&self, pos: i64, length: i64) -> (Containment, i64, i64, i64, i64) {
        let end = pos + length;
        let g = self.inner.lock();
        let idx = g.items.partition_point(|it| it.offset + it.length <= pos);

        let it = match g.items.get(idx) {
            Some(it) => *it,
            None => {
                let (gp, gl) = self.gap_locked(&g, pos);
                return (Containment::None, 0, 0, gp, gl);
            }
        };

        if it.offset >= end {
            let (gp, gl) = self.gap_locked(&g, pos);
            return (Containment::None, 0, 0, gp, gl);
        }

        let overlap_start = pos.max(it.offset);
        let overlap_end = end.min(it.offset + it.length);
        let data_pos = overlap_start;
        let data_len = overlap_end - overlap_start;

        let kind = if it.offset <= pos && it.offset + it.length >= end {
            Containment::Full
        } else if it.offset <= pos {
            // Stored item covers the start of the query range.
            Containment::LeftPartial
        } else {
            // Stored item covers the end of the query range.
            Containment::RightPartial
        };

        let (gp, gl) = self.gap_locked(&g, overlap_end);
        (kind, data_pos, data_len, gp, gl)
    }

    fn gap_locked(&self, g: &Inner, pos: i64) -> (i64, i64) {
        let idx = g.items.partition_point(|it| it.offset + it.length <= pos);
        match g.items.get(idx) {
            Some(it) if it.offset <= pos => {
                let gap_start = it.offset + it.length;
                match g.items.get(idx + 1) {
                    Some(next) => (gap_start, next.offset - gap_start),
                    None => {
                        if g.total_length > 0 {
                            (gap_start, (g.total_length - gap_start).max(0))
                        } else {
                            (gap_start, -1)
                        }
                    }
                }
            }
            Some(it) => (pos, it.offset - pos),
            None => {
                if g.total_length > 0 {
                    (pos, (g.total_length - pos).max(0))
                } else {
                    (pos, -1)
                }
            }
        }
    }

    /// Serialize as `[i64 total_len][i32 byte_size][items...]`, little-endian
    /// (spec §6 / §9: a deliberate deviation from the C source's host-endian
    /// on-disk format).
    pub fn write_to<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        let g = self.inner.lock();
        w.write_all(&g.total_length.to_le_bytes())?;
        let byte_size = (g.items.len() * 16) as i32;
        w.write_all(&byte_size.to_le_bytes())?;
        for it in &g.items {
            w.write_all(&it.offset.to_le_bytes())?;
            w.write_all(&it.length.to_le_bytes())?;
        }
        Ok(())
    }

    /// Replace the whole structure from a serialized form written by
    /// [`Rft::write_to`].
    pub fn read_from<R: std::io::Read>(&self, r: &mut R) -> crate::error::Result<()> {
        use crate::error::ChunkError;

        let mut buf8 = [0u8; 8];
        r.read_exact(&mut buf8)?;
        let total_length = i64::from_le_bytes(buf8);

        let mut buf4 = [0u8; 4];
        r.read_exact(&mut buf4)?;
        let byte_size = i32::from_le_bytes(buf4);
        if byte_size < 0 || byte_size % 16 != 0 {
            return Err(ChunkError::Protocol("corrupt RFT item count"));
        }

        let count = (byte_size / 16) as usize;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            r.read_exact(&mut buf8)?;
            let offset = i64::from_le_bytes(buf8);
            r.read_exact(&mut buf8)?;
            let length = i64::from_le_bytes(buf8);
            items.push(FragItem { offset, length });
        }

        let mut g = self.inner.lock();
        g.total_length = total_length;
        g.items = items;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items_of(r: &Rft) -> Vec<(i64, i64)> {
        r.items().into_iter().map(|i| (i.offset, i.length)).collect()
    }

    #[test]
    fn add_merges_adjacent_and_overlapping() {
        let r = Rft::new(0);
        assert!(r.add(0, 10));
        assert!(r.add(20, 10));
        assert_eq!(items_of(&r), vec![(0, 10), (20, 10)]);

        assert!(r.add(10, 10)); // bridges the gap exactly
        assert_eq!(items_of(&r), vec![(0, 30)]);
    }

    #[test]
    fn add_idempotent_when_fully_contained() {
        let r = Rft::new(0);
        assert!(r.add(0, 10));
        assert!(!r.add(0, 10));
        assert!(!r.add(2, 4));
        assert_eq!(items_of(&r), vec![(0, 10)]);
    }

    #[test]
    fn sorted_and_strictly_separated_invariant() {
        let r = Rft::new(0);
        r.add(50, 10);
        r.add(0, 10);
        r.add(25, 10);
        let items = r.items();
        for w in items.windows(2) {
            assert!(w[0].offset + w[0].length < w[1].offset);
        }
    }

    #[test]
    fn del_splits_interior() {
        let r = Rft::new(0);
        r.add(0, 100);
        r.del(40, 10);
        assert_eq!(items_of(&r), vec![(0, 40), (50, 50)]);
    }

    #[test]
    fn gap_detection_scenario_b() {
        let r = Rft::new(1000);
        r.add(0, 100);
        r.add(300, 200);
        assert_eq!(r.gap(0), (100, 200));
        assert_eq!(r.gap(500), (500, 500));
    }

    #[test]
    fn contain_scenario_b() {
        let r = Rft::new(1000);
        r.add(0, 100);
        r.add(300, 200);
        let (kind, datapos, datalen, gappos, gaplen) = r.contain(50, 300);
        assert_eq!(kind, Containment::LeftPartial);
        assert_eq!((datapos, datalen), (50, 50));
        assert_eq!((gappos, gaplen), (100, 200));
    }

    #[test]
    fn complete_detection() {
        let r = Rft::new(10);
        assert!(!r.complete());
        r.add(0, 10);
        assert!(r.complete());
    }

    #[test]
    fn serialize_roundtrip() {
        let r = Rft::new(500);
        r.add(0, 50);
        r.add(100, 20);

        let mut buf = Vec::new();
        r.write_to(&mut buf).unwrap();

        let r2 = Rft::new(0);
        r2.read_from(&mut std::io::Cursor::new(&buf)).unwrap();
        assert_eq!(r2.total_length(), 500);
        assert_eq!(items_of(&r2), items_of(&r));
    }
}
