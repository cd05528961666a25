//! Pattern-matching benchmark (grounded in `sample/patmat/patmat.c`):
//! times Rabin-Karp, KMP, Boyer-Moore, Sunday and Sunday-reverse, and
//! Shift-And across one pattern over a list of mmap'd files.

use std::time::Instant;

use chunkkit::search::{rabin_karp, BmTable, KmpTable, ShiftAndTable, SundayTable};

struct AlgoResult {
    name: &'static str,
    matches: usize,
    elapsed_ms: u128,
}

fn count_with<F>(text: &[u8], pattern_len: usize, mut finder: F) -> usize
where
    F: FnMut(&[u8]) -> Option<usize>,
{
    let mut offset = 0;
    let mut count = 0;
    while offset <= text.len() {
        match finder(&text[offset..]) {
            Some(rel) => {
                count += 1;
                offset += rel + pattern_len.max(1);
            }
            None => break,
        }
    }
    count
}

fn time_it<F: FnMut(&[u8]) -> Option<usize>>(name: &'static str, text: &[u8], pattern_len: usize, finder: F) -> AlgoResult {
    let t0 = Instant::now();
    let matches = count_with(text, pattern_len, finder);
    AlgoResult {
        name,
        matches,
        elapsed_ms: t0.elapsed().as_millis(),
    }
}

fn main() -> std::process::ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <pattern> <file1> [file2 ...]", args[0]);
        return std::process::ExitCode::from(0);
    }
    let pattern = args[1].as_bytes();

    let kmp_table = KmpTable::new(pattern);
    let bm_table = BmTable::new(pattern);
    let sunday_table = SundayTable::new(pattern);
    let sunday_rev_table = SundayTable::new_reverse(pattern);
    let shift_table = ShiftAndTable::new(pattern);

    let mut totals: Vec<(String, u128, usize)> = Vec::new();

    for path in &args[2..] {
        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("file {path} open failed: {e}");
                continue;
            }
        };
        let mmap = match unsafe { memmap2::Mmap::map(&file) } {
            Ok(m) => m,
            Err(e) => {
                eprintln!("mmap {path} failed: {e}");
                continue;
            }
        };
        let text: &[u8] = &mmap;

        let results = [
            time_it("shift-and", text, pattern.len(), |t| shift_table.find(t)),
            time_it("kmp", text, pattern.len(), |t| kmp_table.find(t)),
            time_it("boyer-moore", text, pattern.len(), |t| bm_table.find(t)),
            time_it("rabin-karp", text, pattern.len(), |t| rabin_karp(t, pattern)),
            time_it("sunday", text, pattern.len(), |t| sunday_table.find(t)),
            time_it("reverse sunday", text, pattern.len(), |t| sunday_rev_table.find(t)),
        ];

        for r in &results {
            tracing::debug!(file = %path, algo = r.name, matches = r.matches, ms = r.elapsed_ms, "pattern scan complete");
            if let Some(entry) = totals.iter_mut().find(|(name, _, _)| name == r.name) {
                entry.1 += r.elapsed_ms;
                entry.2 += r.matches;
            } else {
                totals.push((r.name.to_string(), r.elapsed_ms, r.matches));
            }
        }
    }

    println!("pattern algorithm comparing:");
    for (name, ms, matches) in &totals {
        println!("{name:>16} time: {ms}ms ({matches} matches)");
    }

    std::process::ExitCode::from(0)
}
