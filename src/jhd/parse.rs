//! Recursive-descent decoder (spec §4.6.2).
//!
//! Tokens are bytes; separators are configuration-defined (see
//! [`super::SepType`]). The grammar is permissive: an unterminated object or
//! string simply stops at the end of input, returning whatever was parsed
//! so far along with the number of bytes consumed.

use std::path::{Path, PathBuf};

use crate::bytes::{skip_over, skip_quote_to, skip_to};

use super::{CommentMode, Object, SepType, Separators, Value};

const WS: &[u8] = b" \t\r\n";

/// Decode `buf` into a fresh [`Object`]. If `find_obj_begin` is set, skips to
/// the first `{`; otherwise parses `buf` as an implicit top-level object.
/// Returns the object and the number of bytes consumed.
pub fn decode(
    buf: &[u8],
    sep_type: SepType,
    comment_mode: CommentMode,
    sibling_coexist: bool,
    find_obj_begin: bool,
    strip: bool,
) -> (Object, usize) {
    let mut obj = Object::new(sep_type, comment_mode, sibling_coexist);
    let sep = sep_type.separators();
    let mut pos = 0;
    let mut expect_close = false;
    if find_obj_begin {
        pos = skip_to(buf, pos, b"{");
        if pos < buf.len() {
            pos += 1;
            expect_close = true;
        }
    }
    let consumed = parse_body(&mut obj, buf, pos, sep, strip, None, expect_close);
    (obj, consumed)
}

/// Decode the file at `path` the same way, resolving any `include`
/// directives relative to the file's own directory.
pub fn decode_file(
    path: &Path,
    sep_type: SepType,
    comment_mode: CommentMode,
    sibling_coexist: bool,
    find_obj_begin: bool,
    strip: bool,
) -> std::io::Result<(Object, usize)> {
    let data = std::fs::read(path)?;
    let mut obj = Object::new(sep_type, comment_mode, sibling_coexist);
    let sep = sep_type.separators();
    let base = path.parent().map(|p| p.to_path_buf());
    let mut pos = 0;
    let mut expect_close = false;
    if find_obj_begin {
        pos = skip_to(&data, pos, b"{");
        if pos < data.len() {
            pos += 1;
            expect_close = true;
        }
    }
    let consumed = parse_body(&mut obj, &data, pos, sep, strip, base.as_deref(), expect_close);
    Ok((obj, consumed))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim_bytes(b: &[u8]) -> &[u8] {
    let mut start = 0;
    let mut end = b.len();
    while start < end && WS.contains(&b[start]) {
        start += 1;
    }
    while end > start && WS.contains(&b[end - 1]) {
        end -= 1;
    }
    &b[start..end]
}

fn brace_balance(b: &[u8]) -> (usize, usize) {
    let mut open = 0;
    let mut close = 0;
    let mut i = 0;
    while i + 1 < b.len() {
        if b[i] == b'$' && b[i + 1] == b'{' {
            open += 1;
            i += 2;
            continue;
        }
        if b[i] == b'}' && open > close {
            close += 1;
        }
        i += 1;
    }
    (open, close)
}

/// Quoted content (spec §4.6.2 step 4/5): `"..."`/`'...'` with `\`-escapes.
fn parse_quoted(buf: &[u8], pos: usize, strip: bool) -> (String, usize) {
    let quote = buf[pos];
    let mut i = pos + 1;
    let start = i;
    while i < buf.len() && buf[i] != quote {
        if buf[i] == b'\\' && i + 1 < buf.len() {
            i += 2;
        } else {
            i += 1;
        }
    }
    let raw = &buf[start..i];
    let end = if i < buf.len() { i + 1 } else { i };
    let bytes = if strip { crate::bytes::strip(raw) } else { raw.to_vec() };
    (String::from_utf8_lossy(&bytes).into_owned(), end)
}

fn parse_key(buf: &[u8], pos: usize, keyend: &[u8]) -> (String, usize) {
    let pos = skip_over(buf, pos, WS);
    if pos < buf.len() && (buf[pos] == b'"' || buf[pos] == b'\'') {
        parse_quoted(buf, pos, false)
    } else {
        let mut stop = keyend.to_vec();
        stop.extend_from_slice(WS);
        let end = skip_to(buf, pos, &stop);
        (String::from_utf8_lossy(trim_bytes(&buf[pos..end])).into_owned(), end)
    }
}

/// An unquoted value, tolerating balanced `${...}` regions before the stop
/// set actually ends the token (spec §4.6.2 step 5).
fn parse_value_token(buf: &[u8], pos: usize, stopset: &[u8], strip: bool) -> (String, usize) {
    let pos = skip_over(buf, pos, WS);
    if pos < buf.len() && (buf[pos] == b'"' || buf[pos] == b'\'') {
        return parse_quoted(buf, pos, strip);
    }
    let mut end = skip_quote_to(buf, pos, stopset);
    loop {
        let (open, close) = brace_balance(&buf[pos..end]);
        if open <= close || end >= buf.len() {
            break;
        }
        let next = skip_quote_to(buf, end + 1, stopset);
        if next <= end {
            break;
        }
        end = next;
    }
    let raw = trim_bytes(&buf[pos..end]);
    let bytes = if strip { crate::bytes::strip(raw) } else { raw.to_vec() };
    (String::from_utf8_lossy(&bytes).into_owned(), end)
}

const TAGS: [(&str, &str, &str); 2] = [("script", "<script>", "</script>"), ("reply_script", "<reply_script>", "</reply_script>")];

fn tag_at(buf: &[u8], pos: usize) -> Option<(&'static str, &'static str, &'static str)> {
    TAGS.into_iter().find(|(_, open, _)| buf[pos..].starts_with(open.as_bytes()))
}

fn consume_tag_item(obj: &mut Object, buf: &[u8], pos: usize, name: &'static str, open: &str, close: &str) -> usize {
    let body_start = pos + open.len();
    match find_subslice(&buf[body_start..], close.as_bytes()) {
        Some(rel) => {
            let body_end = body_start + rel;
            let text = String::from_utf8_lossy(trim_bytes(&buf[body_start..body_end])).into_owned();
            obj.add(name, Value::from(text), false);
            body_end + close.len()
        }
        None => {
            let text = String::from_utf8_lossy(trim_bytes(&buf[body_start..])).into_owned();
            obj.add(name, Value::from(text), false);
            buf.len()
        }
    }
}

fn consume_comment(obj: &mut Object, buf: &[u8], pos: usize, comment_mode: CommentMode) -> usize {
    if buf[pos] == b'#' {
        let end = skip_to(buf, pos, b"\n");
        if comment_mode == CommentMode::Retain {
            let text = String::from_utf8_lossy(trim_bytes(&buf[pos + 1..end])).into_owned();
            obj.add("cmt#", Value::from(text), true);
        }
        if end < buf.len() {
            end + 1
        } else {
            end
        }
    } else {
        match find_subslice(&buf[pos + 2..], b"*/") {
            Some(rel) => {
                let close = pos + 2 + rel;
                if comment_mode == CommentMode::Retain {
                    let text = String::from_utf8_lossy(trim_bytes(&buf[pos + 2..close])).into_owned();
                    obj.add("cmt*", Value::from(text), true);
                }
                close + 2
            }
            None => buf.len(),
        }
    }
}

fn is_comment_start(buf: &[u8], pos: usize, comment_mode: CommentMode) -> bool {
    if comment_mode == CommentMode::Off || pos >= buf.len() {
        return false;
    }
    buf[pos] == b'#' || (buf[pos] == b'/' && buf.get(pos + 1) == Some(&b'*'))
}

#[allow(clippy::too_many_arguments)]
fn parse_array(
    buf: &[u8],
    pos: usize,
    sep_type: SepType,
    sep: Separators,
    comment_mode: CommentMode,
    sibling_coexist: bool,
    strip: bool,
    base_dir: Option<&Path>,
) -> (Vec<Value>, usize) {
    let mut values = Vec::new();
    let mut pos = pos;
    loop {
        pos = skip_over(buf, pos, b" \t\r\n,");
        if pos >= buf.len() {
            break;
        }
        if buf[pos] == b']' {
            pos += 1;
            break;
        }
        if buf[pos] == b'{' {
            let mut child = Object::new(sep_type, comment_mode, sibling_coexist);
            let consumed = parse_body(&mut child, buf, pos + 1, sep, strip, base_dir, true);
            pos += 1 + consumed;
            values.push(Value::Object(child));
        } else {
            let (s, newpos) = parse_value_token(buf, pos, sep.arrend, strip);
            pos = newpos;
            values.push(Value::scalar(s, !strip));
        }
    }
    (values, pos)
}

/// Store each parsed array element as its own value under `key`, matching
/// `Item`'s flat `values` list (spec §3: array-ness lives on the item, not
/// inside `Value`).
fn add_array_values(obj: &mut Object, key: &str, values: Vec<Value>) {
    for v in values {
        obj.add(key, v, true);
    }
}

#[allow(clippy::too_many_arguments)]
fn parse_body(
    obj: &mut Object,
    buf: &[u8],
    start: usize,
    sep: Separators,
    strip: bool,
    base_dir: Option<&Path>,
    expect_close: bool,
) -> usize {
    let mut pos = start;
    let skip_set: Vec<u8> = {
        let mut v = WS.to_vec();
        v.push(sep.itemsep);
        v
    };
    loop {
        pos = skip_over(buf, pos, &skip_set);
        if pos >= buf.len() {
            return pos - start;
        }
        if buf[pos] == b'}' {
            if expect_close {
                pos += 1;
            }
            return pos - start;
        }
        if is_comment_start(buf, pos, obj.comment_mode) {
            pos = consume_comment(obj, buf, pos, obj.comment_mode);
            continue;
        }
        if let Some((name, open, close)) = tag_at(buf, pos) {
            pos = consume_tag_item(obj, buf, pos, name, open, close);
            continue;
        }

        let (key, newpos) = parse_key(buf, pos, sep.keyend);
        pos = newpos;
        pos = skip_over(buf, pos, WS);

        if pos < buf.len() && buf[pos] == sep.kvsep {
            pos += 1;
            pos = skip_over(buf, pos, WS);
            if pos >= buf.len() {
                obj.add(&key, Value::from(String::new()), false);
                return pos - start;
            }
            if buf[pos] == b'{' && (key == "script" || key == "reply_script") {
                match crate::bytes::skip_to_peer(buf, pos, b'{', b'}') {
                    Some(end) => {
                        let text = String::from_utf8_lossy(trim_bytes(&buf[pos + 1..end - 1])).into_owned();
                        obj.add(&key, Value::from(text), false);
                        pos = end;
                    }
                    None => {
                        obj.add(&key, Value::from(String::new()), false);
                        pos = buf.len();
                    }
                }
            } else if buf[pos] == b'{' {
                let mut child = Object::new(obj.sep_type, obj.comment_mode, obj.sibling_coexist);
                let consumed = parse_body(&mut child, buf, pos + 1, sep, strip, base_dir, true);
                pos += 1 + consumed;
                obj.add(&key, Value::Object(child), false);
            } else if buf[pos] == b'[' {
                let (values, newpos) = parse_array(
                    buf,
                    pos + 1,
                    obj.sep_type,
                    sep,
                    obj.comment_mode,
                    obj.sibling_coexist,
                    strip,
                    base_dir,
                );
                pos = newpos;
                if values.is_empty() {
                    obj.add_empty_array(&key);
                } else {
                    add_array_values(obj, &key, values);
                }
            } else if let Some((name, open, close)) = tag_at(buf, pos) {
                let tag_start = pos;
                pos = consume_tag_item(obj, buf, tag_start, name, open, close);
                // The tag already stored itself under its own name; re-home
                // it under the requested key too when they differ.
                if name != key {
                    if let Some(v) = obj.get(name, 0).cloned() {
                        obj.add(&key, v, false);
                    }
                }
            } else {
                let (val, newpos) = parse_value_token(buf, pos, sep.kvend, strip);
                pos = newpos;
                obj.add(&key, Value::scalar(val, !strip), false);
            }
        } else if key == "include" {
            pos = skip_over(buf, pos, WS);
            let path_end = skip_to(buf, pos, sep.kvend);
            let path_str = String::from_utf8_lossy(trim_bytes(&buf[pos..path_end])).into_owned();
            pos = path_end;
            if !path_str.is_empty() {
                let resolved = base_dir.map(|d| d.join(&path_str)).unwrap_or_else(|| PathBuf::from(&path_str));
                match std::fs::read(&resolved) {
                    Ok(data) => {
                        let sub_base = resolved.parent().map(|p| p.to_path_buf());
                        parse_body(obj, &data, 0, sep, strip, sub_base.as_deref(), false);
                    }
                    Err(e) => {
                        tracing::warn!(path = %resolved.display(), error = %e, "jhd include failed");
                    }
                }
            }
        } else {
            obj.add(&key, Value::from(String::new()), false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jhd::{CommentMode, SepType};

    #[test]
    fn decodes_nested_object_with_array() {
        let src = br#"{ http: { server: { location: [ { path: "/", root: "/var/www" }, { path: "/api", root: "/srv/api" } ] } } }"#;
        let (obj, _) = decode(src, SepType::Standard, CommentMode::Skip, false, true, true);
        let http = obj.get("http", 0).unwrap().as_object().unwrap();
        let server = http.get("server", 0).unwrap().as_object().unwrap();
        assert_eq!(server.value_count("location"), 2);
        let second = server.get("location", 1).unwrap().as_object().unwrap();
        assert_eq!(second.get("root", 0).unwrap().as_str(), Some("/srv/api"));
    }

    #[test]
    fn conf_style_separators() {
        let src = b"name=value; other=thing;";
        let (obj, _) = decode(src, SepType::Conf, CommentMode::Skip, false, false, false);
        assert_eq!(obj.get("name", 0).unwrap().as_str(), Some("value"));
        assert_eq!(obj.get("other", 0).unwrap().as_str(), Some("thing"));
    }

    #[test]
    fn hash_comment_is_skipped() {
        let src = b"a: 1,\n# a trailing note\nb: 2";
        let (obj, _) = decode(src, SepType::Standard, CommentMode::Skip, false, false, false);
        assert_eq!(obj.get("a", 0).unwrap().as_str(), Some("1"));
        assert_eq!(obj.get("b", 0).unwrap().as_str(), Some("2"));
        assert!(obj.get("cmt#", 0).is_none());
    }

    #[test]
    fn hash_comment_is_retained_when_configured() {
        let src = b"# note one\na: 1";
        let (obj, _) = decode(src, SepType::Standard, CommentMode::Retain, false, false, false);
        assert_eq!(obj.get("cmt#", 0).unwrap().as_str(), Some("note one"));
    }

    #[test]
    fn script_tag_is_captured_verbatim() {
        let src = b"<script>\n  return 1;\n</script>";
        let (obj, _) = decode(src, SepType::Standard, CommentMode::Skip, false, false, false);
        assert_eq!(obj.get("script", 0).unwrap().as_str(), Some("return 1;"));
    }

    #[test]
    fn bare_key_with_no_value_stores_empty_string() {
        let src = b"flag,";
        let (obj, _) = decode(src, SepType::Standard, CommentMode::Skip, false, false, false);
        assert_eq!(obj.get("flag", 0).unwrap().as_str(), Some(""));
    }

    #[test]
    fn include_merges_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let included = dir.path().join("extra.conf");
        std::fs::write(&included, b"extra: 42").unwrap();
        let src = format!("base: 1, include {}", included.display());
        let (obj, _) = decode(src.as_bytes(), SepType::Standard, CommentMode::Skip, false, false, false);
        assert_eq!(obj.get("base", 0).unwrap().as_str(), Some("1"));
        assert_eq!(obj.get("extra", 0).unwrap().as_str(), Some("42"));
    }

    #[test]
    fn strip_flag_controls_whether_scalars_are_marked_escaped() {
        let src = br#"{a: "x\ty", b: "p\tq"}"#;
        let (unstripped, _) = decode(src, SepType::Standard, CommentMode::Skip, false, true, false);
        assert!(unstripped.get("a", 0).unwrap().is_escaped());

        let (stripped, _) = decode(src, SepType::Standard, CommentMode::Skip, false, true, true);
        assert!(!stripped.get("b", 0).unwrap().is_escaped());
    }
}
