// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! `application/x-www-form-urlencoded` decoding with bracket nesting.
//!
//! - `user[name]=ada` builds nested objects: `{"user":{"name":"ada"}}`
//! - `tags[]=a&tags[]=b` appends to an array
//! - small numeric indices (`a[0]=x`) become array positions
//! - a repeated key collects its values into an array in body order

use percent_encoding::percent_decode;
use serde_json::{map::Entry, Map, Value};

/// Bracket segments parsed per key. Anything deeper stays one literal segment.
pub const MAX_DEPTH: usize = 5;
/// Largest numeric index still treated as an array position.
pub const MAX_ARRAY_INDEX: usize = 20;
/// Maximum number of `key=value` pairs per body.
pub const PARAMETER_LIMIT: usize = 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormError {
    #[error("more than {PARAMETER_LIMIT} parameters")]
    TooManyParameters,
    #[error("invalid UTF-8 in {0:?}")]
    InvalidUtf8(String),
}

/// Decode a urlencoded body into a JSON object.
pub fn decode(bytes: &[u8]) -> Result<Value, FormError> {
    let pairs: Vec<&[u8]> = bytes
        .split(|b| *b == b'&')
        .filter(|pair| !pair.is_empty())
        .collect();
    if pairs.len() > PARAMETER_LIMIT {
        return Err(FormError::TooManyParameters);
    }

    let mut root = Value::Object(Map::new());
    for pair in pairs {
        let (raw_key, raw_value) = match pair.iter().position(|b| *b == b'=') {
            Some(eq) => (&pair[..eq], &pair[eq + 1..]),
            None => (pair, &b""[..]),
        };
        let key = decode_component(raw_key)?;
        if key.is_empty() {
            continue;
        }
        let value = Value::String(decode_component(raw_value)?);
        merge(&mut root, nest(&key, value));
    }

    // The top level always stays an object, even for keys like `0=a`.
    Ok(match root {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key, compact_arrays(value)))
                .collect(),
        ),
        other => other,
    })
}

/// Percent-decode one component, `+` meaning space. Rejects invalid UTF-8.
fn decode_component(raw: &[u8]) -> Result<String, FormError> {
    let plus_as_space: Vec<u8> = raw
        .iter()
        .map(|b| if *b == b'+' { b' ' } else { *b })
        .collect();
    percent_decode(&plus_as_space)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| FormError::InvalidUtf8(String::from_utf8_lossy(raw).into_owned()))
}

/// Split `user[address][city]` into `("user", ["address", "city"])`.
fn split_key(key: &str) -> (&str, Vec<String>) {
    let Some(open) = key.find('[').filter(|&idx| idx > 0) else {
        return (key, Vec::new());
    };

    let (root, mut rest) = key.split_at(open);
    let mut segments = Vec::new();
    while segments.len() < MAX_DEPTH {
        let Some(inner) = rest.strip_prefix('[') else {
            break;
        };
        let Some(close) = inner.find(']') else {
            break;
        };
        segments.push(inner[..close].to_string());
        rest = &inner[close + 1..];
    }
    if !rest.is_empty() {
        segments.push(rest.to_string());
    }
    (root, segments)
}

/// Wrap `value` in the structure its key describes.
fn nest(key: &str, value: Value) -> Value {
    let (root, segments) = split_key(key);
    let leaf = segments.iter().rev().fold(value, |inner, segment| {
        if segment.is_empty() {
            Value::Array(vec![inner])
        } else {
            let mut fields = Map::new();
            fields.insert(segment.clone(), inner);
            Value::Object(fields)
        }
    });

    let mut fields = Map::new();
    fields.insert(root.to_string(), leaf);
    Value::Object(fields)
}

fn merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.entry(key) {
                    Entry::Occupied(mut slot) => merge(slot.get_mut(), value),
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        (Value::Array(existing), Value::Array(incoming)) => existing.extend(incoming),
        (Value::Array(existing), incoming) => existing.push(incoming),
        (slot, incoming) => {
            let mut values = vec![slot.take()];
            match incoming {
                Value::Array(rest) => values.extend(rest),
                other => values.push(other),
            }
            *slot = Value::Array(values);
        }
    }
}

/// Turn objects keyed only by small indices into arrays ordered by index.
fn compact_arrays(value: Value) -> Value {
    match value {
        Value::Object(fields) => {
            let fields: Map<String, Value> = fields
                .into_iter()
                .map(|(key, value)| (key, compact_arrays(value)))
                .collect();
            if fields.is_empty() || !fields.keys().all(|key| array_index(key).is_some()) {
                return Value::Object(fields);
            }

            let mut indexed: Vec<(usize, Value)> = fields
                .into_iter()
                .filter_map(|(key, value)| array_index(&key).map(|idx| (idx, value)))
                .collect();
            indexed.sort_by_key(|(idx, _)| *idx);
            Value::Array(indexed.into_iter().map(|(_, value)| value).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(compact_arrays).collect()),
        other => other,
    }
}

fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    key.parse::<usize>()
        .ok()
        .filter(|idx| *idx <= MAX_ARRAY_INDEX)
}
