//! Wu-Manber multi-pattern scanner (spec §4.5.2).
//!
//! Block length `B` is 2 for up to 4096 patterns, 3 beyond that. `SHIFT`
//! maps a hashed trailing block to how far the window can safely advance;
//! `PREFIX` lists candidate pattern indices sharing a hashed prefix block,
//! consulted only when `SHIFT` hits zero.

use rustc_hash::FxHashMap;

const SMALL_PATTERN_BLOCK: usize = 2;
const LARGE_PATTERN_BLOCK: usize = 3;
const SMALL_PATTERN_LIMIT: usize = 4096;

struct Pattern {
    bytes: Vec<u8>,
    ignorecase: Vec<u8>,
}

/// A single reported occurrence: the pattern's index (insertion order) and
/// the byte offset where it begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WmHit {
    pub pattern_index: usize,
    pub pos: usize,
    pub len: usize,
}

pub struct WuManber {
    isascii: bool,
    ignorecase: bool,
    patterns: Vec<Pattern>,
    block: usize,
    min_len: usize,
    shift: FxHashMap<u64, i32>,
    prefix: FxHashMap<u64, Vec<usize>>,
    built: bool,
}

impl WuManber {
    pub fn new(isascii: bool, ignorecase: bool) -> Self {
        WuManber {
            isascii,
            ignorecase,
            patterns: Vec::new(),
            block: SMALL_PATTERN_BLOCK,
            min_len: usize::MAX,
            shift: FxHashMap::default(),
            prefix: FxHashMap::default(),
            built: false,
        }
    }

    fn normalize(&self, b: u8) -> u8 {
        if self.ignorecase && self.isascii {
            b.to_ascii_lowercase()
        } else {
            b
        }
    }

    pub fn add_pattern(&mut self, pattern: &[u8]) -> usize {
        let folded: Vec<u8> = pattern.iter().map(|&b| self.normalize(b)).collect();
        self.patterns.push(Pattern {
            bytes: pattern.to_vec(),
            ignorecase: folded,
        });
        self.built = false;
        self.patterns.len() - 1
    }

    fn hash_block(block: &[u8]) -> u64 {
        let mut h = 0u64;
        for &b in block {
            h = (h << 8) | b as u64;
        }
        h
    }

    /// Precompute `SHIFT`/`PREFIX`. Must be called (directly, or lazily via
    /// the scan methods) after all patterns are added.
    pub fn precalc(&mut self) {
        self.block = if self.patterns.len() <= SMALL_PATTERN_LIMIT {
            SMALL_PATTERN_BLOCK
        } else {
            LARGE_PATTERN_BLOCK
        };
        self.min_len = self.patterns.iter().map(|p| p.bytes.len()).min().unwrap_or(0);
        self.shift.clear();
        self.prefix.clear();

        let b = self.block;
        let m = self.min_len;
        if m < b {
            self.built = true;
            return;
        }

        for pat in &self.patterns {
            let plen = pat.ignorecase.len();
            let mut j = 0usize;
            while j + b <= plen {
                let block = &pat.ignorecase[j..j + b];
                let shift_val = (m as i64 - j as i64 - b as i64) as i32;
                let hash = Self::hash_block(block);
                let entry = self.shift.entry(hash).or_insert(i32::MAX);
                if shift_val < *entry {
                    *entry = shift_val;
                }
                j += 1;
            }
        }
        for (idx, pat) in self.patterns.iter().enumerate() {
            if pat.ignorecase.len() < b {
                continue;
            }
            let prefix_block = &pat.ignorecase[0..b];
            let hash = Self::hash_block(prefix_block);
            self.prefix.entry(hash).or_default().push(idx);
        }
        self.built = true;
    }

    fn ensure_built(&mut self) {
        if !self.built {
            self.precalc();
        }
    }

    fn matches_at(&self, text: &[u8], pos: usize, pat: &Pattern) -> bool {
        if pos + pat.bytes.len() > text.len() {
            return false;
        }
        if self.ignorecase && self.isascii {
            text[pos..pos + pat.bytes.len()]
                .iter()
                .zip(pat.ignorecase.iter())
                .all(|(&a, &b)| a.to_ascii_lowercase() == b)
        } else {
            &text[pos..pos + pat.bytes.len()] == pat.bytes.as_slice()
        }
    }

    /// Scan `text` for every occurrence of every registered pattern.
    pub fn search(&mut self, text: &[u8]) -> Vec<WmHit> {
        self.ensure_built();
        let mut hits = Vec::new();
        let b = self.block;
        let m = self.min_len;
        if m == 0 || m < b || text.len() < m {
            return hits;
        }

        let mut pos = m - b;
        while pos + b <= text.len() {
            let folded: Vec<u8> = text[pos..pos + b].iter().map(|&x| self.normalize(x)).collect();
            let hash = Self::hash_block(&folded);
            match self.shift.get(&hash).copied() {
                Some(0) | None => {
                    let window_start = pos + b - m;
                    let prefix_folded: Vec<u8> = text[window_start..window_start + b.min(m)]
                        .iter()
                        .map(|&x| self.normalize(x))
                        .collect();
                    let prefix_hash = Self::hash_block(&prefix_folded);
                    if let Some(candidates) = self.prefix.get(&prefix_hash) {
                        for &idx in candidates {
                            let pat = &self.patterns[idx];
                            if self.matches_at(text, window_start, pat) {
                                hits.push(WmHit {
                                    pattern_index: idx,
                                    pos: window_start,
                                    len: pat.bytes.len(),
                                });
                            }
                        }
                    }
                    pos += 1;
                }
                Some(shift) => {
                    pos += shift.max(1) as usize;
                }
            }
        }
        hits
    }

    /// Whole-buffer match-and-replace, writing the transformed bytes into a
    /// growable output vector. `on_match` receives the matched pattern index
    /// and may return `Some(replacement)` to substitute it, or `None` to
    /// keep the source bytes verbatim.
    pub fn replace(&mut self, text: &[u8], mut on_match: impl FnMut(usize, &[u8]) -> Option<Vec<u8>>) -> Vec<u8> {
        let hits = self.search(text);
        let mut hits = hits;
        hits.sort_by_key(|h| h.pos);

        let mut out = Vec::with_capacity(text.len());
        let mut cursor = 0usize;
        for hit in hits {
            if hit.pos < cursor {
                continue; // overlapping match already covered
            }
            out.extend_from_slice(&text[cursor..hit.pos]);
            let matched = &text[hit.pos..hit.pos + hit.len];
            match on_match(hit.pattern_index, matched) {
                Some(replacement) => out.extend_from_slice(&replacement),
                None => out.extend_from_slice(matched),
            }
            cursor = hit.pos + hit.len;
        }
        out.extend_from_slice(&text[cursor..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_all_patterns_case_sensitive() {
        let mut wm = WuManber::new(true, false);
        wm.add_pattern(b"needle");
        wm.add_pattern(b"gold");
        wm.precalc();
        let hits = wm.search(b"a golden needle in a haystack");
        let mut positions: Vec<(usize, usize)> = hits.iter().map(|h| (h.pattern_index, h.pos)).collect();
        positions.sort();
        assert_eq!(positions, vec![(0, 9), (1, 2)]);
    }

    #[test]
    fn ignorecase_matches_regardless_of_case() {
        let mut wm = WuManber::new(true, true);
        wm.add_pattern(b"Needle");
        wm.precalc();
        let hits = wm.search(b"a NEEDLE here");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].pos, 2);
    }

    #[test]
    fn replace_substitutes_matches() {
        let mut wm = WuManber::new(true, false);
        wm.add_pattern(b"cat");
        wm.precalc();
        let out = wm.replace(b"the cat sat on the cat mat", |_idx, _m| Some(b"dog".to_vec()));
        assert_eq!(out, b"the dog sat on the dog mat");
    }

    #[test]
    fn no_match_returns_input_unchanged_via_replace() {
        let mut wm = WuManber::new(true, false);
        wm.add_pattern(b"zzz");
        wm.precalc();
        let out = wm.replace(b"hello world", |_, _| None);
        assert_eq!(out, b"hello world");
    }
}
