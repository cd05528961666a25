//! Canonical re-serialization (spec §4.6.3 `encode`).
//!
//! Produces output using the object's own configured separators; string
//! values are JSON-escaped via [`crate::bytes::json_escape`] regardless of
//! `sep_type` (the original encoder always emits JSON-style quoting even for
//! conf-style objects, since that's what round-trips unambiguously).

use super::{Object, Value};

pub fn encode(obj: &Object) -> Vec<u8> {
    let mut out = Vec::new();
    encode_body(obj, &mut out);
    out
}

fn encode_body(obj: &Object, out: &mut Vec<u8>) {
    out.push(b'{');
    let sep = obj.sep_type.separators();
    let mut first = true;
    for (key, item) in &obj.items {
        if !first {
            out.push(sep.itemsep);
        }
        first = false;
        out.push(b'"');
        out.extend_from_slice(&crate::bytes::json_escape(key.as_bytes()));
        out.push(b'"');
        out.push(sep.kvsep);
        if item.arrflag {
            out.push(b'[');
            for (i, v) in item.values.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                encode_value(v, out);
            }
            out.push(b']');
        } else if let Some(v) = item.values.first() {
            encode_value(v, out);
        } else {
            out.extend_from_slice(b"\"\"");
        }
    }
    out.push(b'}');
}

fn encode_value(v: &Value, out: &mut Vec<u8>) {
    match v {
        Value::Scalar { text, .. } => {
            out.push(b'"');
            out.extend_from_slice(&crate::bytes::json_escape(text.as_bytes()));
            out.push(b'"');
        }
        Value::Object(o) => encode_body(o, out),
    }
}
