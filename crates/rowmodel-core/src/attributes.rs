//! Attribute bags and dotted-path addressing.
//!
//! A record's state is an [`Attributes`] map: field name to JSON value. Nested
//! structures are addressed with dotted paths (`profile.address.city`), numeric
//! segments (`tags.0`) or bracket indices (`tags[0].name`).

use serde_json::Map;

pub use serde_json::Value;

use crate::error::{Error, Result};

/// Field name to value map holding one row's state.
pub type Attributes = Map<String, Value>;

/// Split a path into its segments.
///
/// `a.b[0].c` becomes `["a", "b", "0", "c"]`. Empty paths, empty segments and
/// unbalanced brackets are rejected.
pub fn parse_path(path: &str) -> Result<Vec<String>> {
    if path.is_empty() {
        return Err(Error::invalid_argument("attribute path must not be empty"));
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        let (head, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };

        if head.is_empty() && (rest.is_empty() || segments.is_empty()) {
            return Err(Error::invalid_argument(format!(
                "attribute path `{path}` contains an empty segment"
            )));
        }
        if !head.is_empty() {
            segments.push(head.to_string());
        }

        while !rest.is_empty() {
            let Some(end) = rest.find(']') else {
                return Err(Error::invalid_argument(format!(
                    "attribute path `{path}` has an unclosed `[`"
                )));
            };
            let inner = &rest[1..end];
            if inner.is_empty() {
                return Err(Error::invalid_argument(format!(
                    "attribute path `{path}` contains an empty index"
                )));
            }
            segments.push(inner.to_string());
            rest = &rest[end + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(Error::invalid_argument(format!(
                    "attribute path `{path}` has trailing characters after `]`"
                )));
            }
        }
    }
    Ok(segments)
}

/// Interpret a segment as an array index (`0`, `1`, ... without leading zeros).
fn parse_index(segment: &str) -> Option<usize> {
    let valid = segment == "0"
        || (!segment.starts_with('0') && segment.bytes().all(|b| b.is_ascii_digit()));
    if valid { segment.parse().ok() } else { None }
}

/// Look up the value at `path`.
///
/// A top-level key that literally equals `path` wins over path traversal, so a
/// column named `a.b` stays reachable. Returns `None` for malformed paths.
pub fn get_path<'a>(attrs: &'a Attributes, path: &str) -> Option<&'a Value> {
    if let Some(value) = attrs.get(path) {
        return Some(value);
    }

    let segments = parse_path(path).ok()?;
    let (first, rest) = segments.split_first()?;
    let mut current = attrs.get(first)?;
    for segment in rest {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(parse_index(segment)?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Set `value` at `path`, creating intermediate containers as needed.
///
/// Intermediate scalars are replaced by a container: an array when the next
/// segment is an index, an object otherwise. Arrays are padded with `null` up to
/// the addressed index. The value is written as given, falsy or not.
pub fn set_path(attrs: &mut Attributes, path: &str, value: Value) -> Result<()> {
    let segments = parse_path(path)?;

    let mut root = Value::Object(std::mem::take(attrs));
    let result = assign_at(&mut root, &segments, value, path);
    if let Value::Object(map) = root {
        *attrs = map;
    }
    result
}

fn assign_at(current: &mut Value, segments: &[String], value: Value, path: &str) -> Result<()> {
    let Some((head, tail)) = segments.split_first() else {
        return Err(Error::invalid_argument("attribute path must not be empty"));
    };

    let slot = slot_mut(current, head, path)?;
    let Some(next) = tail.first() else {
        *slot = value;
        return Ok(());
    };

    if !matches!(slot, Value::Object(_) | Value::Array(_)) {
        *slot = if parse_index(next).is_some() {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };
    }
    assign_at(slot, tail, value, path)
}

/// Most `null` slots a single `set_path` may pad an array with.
const MAX_ARRAY_PADDING: usize = 1024;

fn slot_mut<'a>(current: &'a mut Value, key: &str, path: &str) -> Result<&'a mut Value> {
    match current {
        Value::Object(map) => Ok(map.entry(key.to_string()).or_insert(Value::Null)),
        Value::Array(items) => {
            let Some(idx) = parse_index(key) else {
                return Err(Error::invalid_argument(format!(
                    "cannot set `{path}`: `{key}` is not a valid index into an array"
                )));
            };
            if items.len() <= idx {
                let gap = idx - items.len();
                let len = idx
                    .checked_add(1)
                    .filter(|_| gap <= MAX_ARRAY_PADDING)
                    .ok_or_else(|| {
                        Error::invalid_argument(format!(
                            "cannot set `{path}`: index {idx} is too far past the end of an array of {} items",
                            items.len()
                        ))
                    })?;
                items.resize(len, Value::Null);
            }
            Ok(&mut items[idx])
        }
        other => {
            *other = Value::Object(Map::new());
            slot_mut(other, key, path)
        }
    }
}

/// Shallow merge: every top-level key of `patch` overwrites the key in `target`,
/// other keys are left alone.
pub fn merge(target: &mut Attributes, patch: Attributes) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

/// Deep, serialization-safe snapshot of an attribute bag.
pub fn to_json(attrs: &Attributes) -> Value {
    Value::Object(attrs.clone())
}
