//! Permissive JSON / Hierarchical-Config Decoder (spec §4.6, L6).
//!
//! [`Object`] is a typed tree: each key maps to one [`Item`], which holds
//! either a single value or (when built from `[...]` syntax, or from
//! `sibling_coexist` merging repeated keys) several. Separator behavior is
//! fixed at construction time via [`SepType`]; see §4.6.1.

pub mod access;
pub mod encode;
pub mod parse;
pub mod value;

pub use access::{mdel, mget, mget_double, mget_int, mget_obj, mget_value};
pub use encode::encode;
pub use parse::{decode, decode_file};
pub use value::Value;

/// Key/value separator style (spec §4.6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SepType {
    /// `{ "key":"value", "name":"data" }`
    Standard,
    /// `{ key=value; name=data }`
    Conf,
}

/// Comment handling (spec §4.6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentMode {
    /// `#...` and `/*...*/` are not recognised as comments at all.
    Off,
    /// Comments are recognised and silently discarded.
    Skip,
    /// Comments are recognised and retained as pseudo-items under `cmt#`/`cmt*`.
    Retain,
}

#[derive(Clone, Copy)]
pub(crate) struct Separators {
    pub kvsep: u8,
    pub itemsep: u8,
    pub keyend: &'static [u8],
    pub arrend: &'static [u8],
    pub kvend: &'static [u8],
}

impl SepType {
    pub(crate) fn separators(self) -> Separators {
        match self {
            SepType::Standard => Separators {
                kvsep: b':',
                itemsep: b',',
                keyend: b":,}",
                arrend: b",]}",
                kvend: b",}",
            },
            SepType::Conf => Separators {
                kvsep: b'=',
                itemsep: b';',
                keyend: b"=;}",
                arrend: b",];}",
                kvend: b";}",
            },
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Item {
    pub arrflag: bool,
    pub values: Vec<Value>,
}

/// A decoded object: an ordered list of key/item pairs plus the separator
/// configuration it was built (and will be re-encoded) with.
#[derive(Debug, Clone)]
pub struct Object {
    pub sep_type: SepType,
    pub comment_mode: CommentMode,
    pub sibling_coexist: bool,
    pub(crate) items: Vec<(String, Item)>,
}

impl Object {
    pub fn new(sep_type: SepType, comment_mode: CommentMode, sibling_coexist: bool) -> Self {
        Object {
            sep_type,
            comment_mode,
            sibling_coexist,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn find(&self, key: &str) -> Option<usize> {
        self.items.iter().position(|(k, _)| k == key)
    }

    /// Insert `val` under `key`. `is_array` marks the item as JSON-array
    /// syntax regardless of how many values it ends up holding; otherwise
    /// repeated `add` calls either overwrite (sibling_coexist == false) or
    /// accumulate (sibling_coexist == true) per the object's configuration.
    pub fn add(&mut self, key: &str, val: Value, is_array: bool) {
        match self.find(key) {
            Some(idx) if is_array => {
                let item = &mut self.items[idx].1;
                item.arrflag = true;
                item.values.push(val);
            }
            Some(idx) if self.sibling_coexist => {
                let item = &mut self.items[idx].1;
                item.arrflag = true;
                item.values.push(val);
            }
            Some(idx) => {
                self.items[idx].1 = Item {
                    arrflag: is_array,
                    values: vec![val],
                };
            }
            None => {
                self.items.push((
                    key.to_string(),
                    Item {
                        arrflag: is_array,
                        values: vec![val],
                    },
                ));
            }
        }
    }

    /// Record `key` as present with array syntax but zero elements (an
    /// empty `[...]`), overwriting whatever was there before.
    pub fn add_empty_array(&mut self, key: &str) {
        match self.find(key) {
            Some(idx) => {
                self.items[idx].1 = Item { arrflag: true, values: Vec::new() };
            }
            None => {
                self.items.push((key.to_string(), Item { arrflag: true, values: Vec::new() }));
            }
        }
    }

    /// Insert a string value, optionally escape-stripping it first (spec
    /// §4.6.2 step 6).
    pub fn add_str(&mut self, key: &str, val: &[u8], is_array: bool, strip: bool) {
        let bytes = if strip { crate::bytes::strip(val) } else { val.to_vec() };
        let s = String::from_utf8_lossy(&bytes).into_owned();
        self.add(key, Value::scalar(s, !strip), is_array);
    }

    /// Concatenate `val` onto every existing value stored under `key`.
    /// Returns `false` if the key does not exist.
    pub fn append(&mut self, key: &str, val: &[u8], strip: bool) -> bool {
        let bytes = if strip { crate::bytes::strip(val) } else { val.to_vec() };
        let suffix = String::from_utf8_lossy(&bytes).into_owned();
        match self.find(key) {
            Some(idx) => {
                for v in &mut self.items[idx].1.values {
                    if let Value::Scalar { text, .. } = v {
                        text.push_str(&suffix);
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Remove every value stored under `key`. Returns `false` if absent.
    pub fn del(&mut self, key: &str) -> bool {
        match self.find(key) {
            Some(idx) => {
                self.items.remove(idx);
                true
            }
            None => false,
        }
    }

    /// The `index`-th value stored under `key` (`0` for a non-array item).
    pub fn get(&self, key: &str, index: usize) -> Option<&Value> {
        self.find(key).and_then(|idx| self.items[idx].1.values.get(index))
    }

    pub fn value_count(&self, key: &str) -> usize {
        self.find(key).map(|idx| self.items[idx].1.values.len()).unwrap_or(0)
    }

    pub(crate) fn values_of(&self, key: &str) -> Option<&[Value]> {
        self.find(key).map(|idx| self.items[idx].1.values.as_slice())
    }

    pub fn get_mut(&mut self, key: &str, index: usize) -> Option<&mut Value> {
        let idx = self.find(key)?;
        self.items[idx].1.values.get_mut(index)
    }

    /// Remove a single value by (possibly negative) array index, dropping
    /// the item entirely once its last value is gone.
    pub fn del_index(&mut self, key: &str, n: i64) -> bool {
        let idx = match self.find(key) {
            Some(idx) => idx,
            None => return false,
        };
        let values = &mut self.items[idx].1.values;
        let len = values.len();
        let real = if n >= 0 {
            n as usize
        } else {
            let from_end = (-n) as usize;
            if from_end > len {
                return false;
            }
            len - from_end
        };
        if real >= len {
            return false;
        }
        values.remove(real);
        if values.is_empty() {
            self.items.remove(idx);
        }
        true
    }

    /// Iterate `(key, value_index, value)` triples in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize, &Value)> {
        self.items
            .iter()
            .flat_map(|(k, item)| item.values.iter().enumerate().map(move |(i, v)| (k.as_str(), i, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_overwrites_when_sibling_coexist_is_false() {
        let mut obj = Object::new(SepType::Standard, CommentMode::Skip, false);
        obj.add("name", Value::from("alice"), false);
        obj.add("name", Value::from("bob"), false);
        assert_eq!(obj.value_count("name"), 1);
        assert_eq!(obj.get("name", 0).unwrap().as_str(), Some("bob"));
    }

    #[test]
    fn add_coexists_when_sibling_coexist_is_true() {
        let mut obj = Object::new(SepType::Standard, CommentMode::Skip, true);
        obj.add("tag", Value::from("a"), false);
        obj.add("tag", Value::from("b"), false);
        assert_eq!(obj.value_count("tag"), 2);
    }

    #[test]
    fn coexisting_values_survive_an_encode_roundtrip() {
        let mut obj = Object::new(SepType::Standard, CommentMode::Skip, true);
        obj.add("tag", Value::from("a"), false);
        obj.add("tag", Value::from("b"), false);
        let bytes = super::encode::encode(&obj);
        let (decoded, _) = super::parse::decode(&bytes, SepType::Standard, CommentMode::Skip, true, true, true);
        assert_eq!(decoded.value_count("tag"), 2);
        assert_eq!(decoded.get("tag", 0).unwrap().as_str(), Some("a"));
        assert_eq!(decoded.get("tag", 1).unwrap().as_str(), Some("b"));
    }

    #[test]
    fn append_concatenates_onto_existing_string() {
        let mut obj = Object::new(SepType::Standard, CommentMode::Skip, false);
        obj.add_str("path", b"/var/www", false, false);
        assert!(obj.append("path", b"/html", false));
        assert_eq!(obj.get("path", 0).unwrap().as_str(), Some("/var/www/html"));
    }

    #[test]
    fn del_removes_item() {
        let mut obj = Object::new(SepType::Standard, CommentMode::Skip, false);
        obj.add("k", Value::from("v"), false);
        assert!(obj.del("k"));
        assert!(!obj.del("k"));
        assert!(obj.is_empty());
    }
}
