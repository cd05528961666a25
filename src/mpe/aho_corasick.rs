//! Aho-Corasick trie (spec §4.5.1).
//!
//! A generic multi-pattern automaton carrying a user payload `P` at each
//! pattern's terminal node. `reverse` mode stores patterns byte-reversed
//! and expects the caller to scan byte-reversed text too, matching the
//! "suffix matching scanned right-to-left" use case (e.g. domain names).

use rustc_hash::FxHashMap;

struct Node<P> {
    depth: u32,
    phrase_end: bool,
    payload: Option<P>,
    children: FxHashMap<u8, usize>,
    fail: usize,
}

impl<P> Node<P> {
    fn root() -> Self {
        Node {
            depth: 0,
            phrase_end: false,
            payload: None,
            children: FxHashMap::default(),
            fail: 0,
        }
    }
}

/// One match emitted by [`AhoCorasick::scan`]: the byte offset one past the
/// match's last byte, its length, and the payload stored at insertion.
pub struct MatchHit<'a, P> {
    pub end: usize,
    pub len: usize,
    pub payload: &'a P,
}

pub struct AhoCorasick<P> {
    nodes: Vec<Node<P>>,
    reverse: bool,
    dirty: bool,
    count: usize,
}

const ROOT: usize = 0;

impl<P> Default for AhoCorasick<P> {
    fn default() -> Self {
        Self::new(false)
    }
}

impl<P> AhoCorasick<P> {
    pub fn new(reverse: bool) -> Self {
        AhoCorasick {
            nodes: vec![Node::root()],
            reverse,
            dirty: false,
            count: 0,
        }
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn oriented<'a>(&self, pattern: &'a [u8]) -> std::borrow::Cow<'a, [u8]> {
        if self.reverse {
            std::borrow::Cow::Owned(pattern.iter().rev().copied().collect())
        } else {
            std::borrow::Cow::Borrowed(pattern)
        }
    }

    /// Insert `pattern` with its payload, replacing any existing payload at
    /// that exact key. Invalidates failure links until [`Self::failjump`]
    /// is called again (matching methods rebuild lazily if needed).
    pub fn add(&mut self, pattern: &[u8], payload: P) {
        let key = self.oriented(pattern);
        let mut cur = ROOT;
        for &b in key.iter() {
            cur = match self.nodes[cur].children.get(&b) {
                Some(&next) => next,
                None => {
                    let depth = self.nodes[cur].depth + 1;
                    self.nodes.push(Node {
                        depth,
                        phrase_end: false,
                        payload: None,
                        children: FxHashMap::default(),
                        fail: ROOT,
                    });
                    let new_id = self.nodes.len() - 1;
                    self.nodes[cur].children.insert(b, new_id);
                    new_id
                }
            };
        }
        if !self.nodes[cur].phrase_end {
            self.count += 1;
        }
        self.nodes[cur].phrase_end = true;
        self.nodes[cur].payload = Some(payload);
        self.dirty = true;
    }

    /// Clear the terminal flag/payload for `pattern`. The node itself is
    /// left in place (it may still be an interior node of another
    /// pattern's path).
    pub fn del(&mut self, pattern: &[u8]) -> bool {
        let key = self.oriented(pattern);
        let mut cur = ROOT;
        for &b in key.iter() {
            match self.nodes[cur].children.get(&b) {
                Some(&next) => cur = next,
                None => return false,
            }
        }
        if self.nodes[cur].phrase_end {
            self.nodes[cur].phrase_end = false;
            self.nodes[cur].payload = None;
            self.count -= 1;
            true
        } else {
            false
        }
    }

    /// Rebuild failure links with a BFS from the root (spec §4.5.1).
    pub fn failjump(&mut self) {
        let mut queue = std::collections::VecDeque::new();
        let root_children: Vec<(u8, usize)> = self.nodes[ROOT]
            .children
            .iter()
            .map(|(&b, &id)| (b, id))
            .collect();
        for (_, id) in root_children {
            self.nodes[id].fail = ROOT;
            queue.push_back(id);
        }
        while let Some(id) = queue.pop_front() {
            let children: Vec<(u8, usize)> = self.nodes[id].children.iter().map(|(&b, &c)| (b, c)).collect();
            for (b, child) in children {
                let mut f = self.nodes[id].fail;
                let fail_target = loop {
                    if let Some(&next) = self.nodes[f].children.get(&b) {
                        break next;
                    }
                    if f == ROOT {
                        break ROOT;
                    }
                    f = self.nodes[f].fail;
                };
                self.nodes[child].fail = if fail_target == child { ROOT } else { fail_target };
                queue.push_back(child);
            }
        }
        self.dirty = false;
    }

    fn ensure_built(&mut self) {
        if self.dirty {
            self.failjump();
        }
    }

    fn step(&self, state: usize, b: u8) -> usize {
        let mut s = state;
        loop {
            if let Some(&next) = self.nodes[s].children.get(&b) {
                return next;
            }
            if s == ROOT {
                return ROOT;
            }
            s = self.nodes[s].fail;
        }
    }

    /// Longest stored pattern that is an exact prefix of `prefix` (walking
    /// direct children only, no failure fallback).
    pub fn get(&self, prefix: &[u8]) -> Option<(usize, &P)> {
        let key = self.oriented(prefix);
        let mut cur = ROOT;
        let mut best: Option<usize> = None;
        for &b in key.iter() {
            match self.nodes[cur].children.get(&b) {
                Some(&next) => {
                    cur = next;
                    if self.nodes[cur].phrase_end {
                        best = Some(cur);
                    }
                }
                None => break,
            }
        }
        best.map(|id| (self.nodes[id].depth as usize, self.nodes[id].payload.as_ref().unwrap()))
    }

    /// Every match in `text`, scanned left to right (or, in reverse mode,
    /// expected to already be presented in reverse byte order).
    pub fn scan(&mut self, text: &[u8]) -> Vec<MatchHit<'_, P>> {
        self.ensure_built();
        let mut hits = Vec::new();
        let mut state = ROOT;
        for (i, &b) in text.iter().enumerate() {
            state = self.step(state, b);
            let mut n = state;
            loop {
                if self.nodes[n].phrase_end {
                    hits.push(MatchHit {
                        end: i + 1,
                        len: self.nodes[n].depth as usize,
                        payload: self.nodes[n].payload.as_ref().unwrap(),
                    });
                }
                if n == ROOT {
                    break;
                }
                n = self.nodes[n].fail;
            }
        }
        hits
    }

    /// First match found scanning from position 0 (earliest end position).
    pub fn match_first(&mut self, text: &[u8]) -> Option<MatchHit<'_, P>> {
        self.ensure_built();
        let mut state = ROOT;
        for (i, &b) in text.iter().enumerate() {
            state = self.step(state, b);
            let mut n = state;
            while n != ROOT {
                if self.nodes[n].phrase_end {
                    let len = self.nodes[n].depth as usize;
                    return Some(MatchHit {
                        end: i + 1,
                        len,
                        payload: self.nodes[n].payload.as_ref().unwrap(),
                    });
                }
                n = self.nodes[n].fail;
            }
        }
        None
    }

    /// The single longest match found anywhere in `text`.
    pub fn fwmaxmatch(&mut self, text: &[u8]) -> Option<MatchHit<'_, P>> {
        self.ensure_built();
        let mut state = ROOT;
        let mut best: Option<(usize, usize, usize)> = None; // (end, len, node)
        for (i, &b) in text.iter().enumerate() {
            state = self.step(state, b);
            let mut n = state;
            loop {
                if self.nodes[n].phrase_end {
                    let len = self.nodes[n].depth as usize;
                    if best.map(|(_, l, _)| len > l).unwrap_or(true) {
                        best = Some((i + 1, len, n));
                    }
                }
                if n == ROOT {
                    break;
                }
                n = self.nodes[n].fail;
            }
        }
        best.map(|(end, len, node)| MatchHit {
            end,
            len,
            payload: self.nodes[node].payload.as_ref().unwrap(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_emits_all_patterns_at_overlapping_ends() {
        let mut ac = AhoCorasick::new(false);
        ac.add(b"he", 1);
        ac.add(b"she", 2);
        ac.add(b"his", 3);
        ac.add(b"hers", 4);
        ac.failjump();

        let hits = ac.scan(b"ushers");
        let mut got: Vec<(usize, usize, i32)> = hits.iter().map(|h| (h.end, h.len, *h.payload)).collect();
        got.sort();
        assert_eq!(got, vec![(3, 2, 1), (4, 3, 2), (6, 4, 4)]);
    }

    #[test]
    fn get_returns_longest_prefix_match() {
        let mut ac = AhoCorasick::new(false);
        ac.add(b"a", 1);
        ac.add(b"ab", 2);
        ac.add(b"abc", 3);
        ac.failjump();
        let (len, payload) = ac.get(b"abcd").unwrap();
        assert_eq!(len, 3);
        assert_eq!(*payload, 3);
    }

    #[test]
    fn reverse_mode_matches_suffix() {
        let mut ac = AhoCorasick::new(true);
        ac.add(b".com", 1);
        ac.add(b".org", 2);
        ac.failjump();

        let text = b"www.example.com";
        let reversed: Vec<u8> = text.iter().rev().copied().collect();
        let hit = ac.match_first(&reversed).unwrap();
        assert_eq!(hit.len, 4);
        assert_eq!(*hit.payload, 1);
    }

    #[test]
    fn del_removes_terminal_flag_but_keeps_shared_prefix() {
        let mut ac = AhoCorasick::new(false);
        ac.add(b"cat", 1);
        ac.add(b"cats", 2);
        ac.failjump();
        assert!(ac.del(b"cat"));
        ac.failjump();
        assert!(ac.get(b"cat").is_none());
        let hit = ac.match_first(b"cats").unwrap();
        assert_eq!(hit.len, 4);
    }

    #[test]
    fn fwmaxmatch_picks_longest_over_first() {
        let mut ac = AhoCorasick::new(false);
        ac.add(b"a", 1);
        ac.add(b"abc", 2);
        ac.failjump();
        let hit = ac.fwmaxmatch(b"xxabcxx").unwrap();
        assert_eq!(hit.len, 3);
        assert_eq!(*hit.payload, 2);
    }
}
