//! Dotted-path accessors (spec §4.6.3): `"http.server.location[1].root"`.

use super::{Object, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subscript {
    /// No `[...]` was written at all.
    None,
    Index(i64),
    /// `[]` — every value under the key.
    All,
}

struct Segment {
    name: String,
    subscript: Subscript,
}

fn parse_path(path: &str) -> Vec<Segment> {
    path.split('.')
        .map(|part| {
            if let Some(open) = part.find('[') {
                let name = part[..open].to_string();
                let inner = &part[open + 1..part.len().saturating_sub(1)];
                let subscript = if inner.is_empty() {
                    Subscript::All
                } else {
                    inner.parse::<i64>().map(Subscript::Index).unwrap_or(Subscript::All)
                };
                Segment { name, subscript }
            } else {
                Segment {
                    name: part.to_string(),
                    subscript: Subscript::None,
                }
            }
        })
        .collect()
}

fn resolve_index(subscript: Subscript, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match subscript {
        Subscript::None => Some(0),
        Subscript::Index(n) if n >= 0 => {
            let n = n as usize;
            (n < len).then_some(n)
        }
        Subscript::Index(n) => {
            let from_end = (-n) as usize;
            (from_end <= len).then(|| len - from_end)
        }
        Subscript::All => Some(0),
    }
}

/// Follow a dotted path, returning the final value.
pub fn mget_value<'a>(obj: &'a Object, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path);
    let mut cur_obj = obj;
    let mut last: Option<&Value> = None;
    for (i, seg) in segments.iter().enumerate() {
        let idx = obj_find_value(cur_obj, &seg.name, seg.subscript)?;
        if i + 1 == segments.len() {
            return Some(idx);
        }
        last = Some(idx);
        cur_obj = idx.as_object()?;
    }
    last
}

fn obj_find_value<'a>(obj: &'a Object, key: &str, subscript: Subscript) -> Option<&'a Value> {
    let values = obj.values_of(key)?;
    let i = resolve_index(subscript, values.len())?;
    values.get(i)
}

pub fn mget<'a>(obj: &'a Object, path: &str) -> Option<&'a str> {
    mget_value(obj, path).and_then(Value::as_str)
}

pub fn mget_obj<'a>(obj: &'a Object, path: &str) -> Option<&'a Object> {
    mget_value(obj, path).and_then(Value::as_object)
}

/// Remove the value(s) named by a dotted path. `[n]` removes one array
/// element; `[]` or a bare trailing key removes every value under that key.
pub fn mdel(obj: &mut Object, path: &str) -> bool {
    let segments = parse_path(path);
    if segments.is_empty() {
        return false;
    }
    mdel_rec(obj, &segments)
}

fn mdel_rec(obj: &mut Object, segments: &[Segment]) -> bool {
    let (head, rest) = segments.split_first().unwrap();
    if rest.is_empty() {
        return match head.subscript {
            Subscript::None | Subscript::All => obj.del(&head.name),
            Subscript::Index(n) => obj.del_index(&head.name, n),
        };
    }
    let idx = match resolve_index(head.subscript, obj.value_count(&head.name)) {
        Some(i) => i,
        None => return false,
    };
    match obj.get_mut(&head.name, idx).and_then(Value::as_object_mut) {
        Some(child) => mdel_rec(child, rest),
        None => false,
    }
}

/// Parse a numeric getter value, accepting an optional `0x`/`0X` hex prefix
/// and a trailing `k|K|m|M|g|G` unit suffix meaning `1024^{1,2,3}` (spec
/// §4.6.3).
pub fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (body, mult) = match raw.as_bytes()[raw.len() - 1] {
        b'k' | b'K' => (&raw[..raw.len() - 1], 1024i64),
        b'm' | b'M' => (&raw[..raw.len() - 1], 1024 * 1024),
        b'g' | b'G' => (&raw[..raw.len() - 1], 1024 * 1024 * 1024),
        _ => (raw, 1),
    };
    let body = body.trim();
    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        body.parse::<i64>().ok()?
    };
    Some(value * mult)
}

pub fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

pub fn mget_int(obj: &Object, path: &str) -> Option<i64> {
    mget(obj, path).and_then(parse_int)
}

pub fn mget_double(obj: &Object, path: &str) -> Option<f64> {
    mget(obj, path).and_then(parse_float)
}
