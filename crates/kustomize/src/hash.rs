// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Content hashes for generated resources.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest as ShaDigest, Sha256};

use crate::Resource;

#[cfg(test)]
#[path = "./hash_test.rs"]
mod hash_test;

/// Number of hex digits kept from the digest.
const HASH_LEN: usize = 10;

/// Compute the name suffix hash of a resource.
///
/// The hash covers the sorted data, kind and name (and `type` for secrets),
/// so reordering generator inputs never changes it.
pub fn content_hash(res: &Resource) -> crate::Result<String> {
    let encoded = canonical_json(res)?;
    let digest = format!("{:x}", Sha256::digest(encoded.as_bytes()));
    Ok(encode_digits(&digest[..HASH_LEN]))
}

/// Compact, key-sorted JSON of the hashed fields.
fn canonical_json(res: &Resource) -> crate::Result<String> {
    let kind = res.gvk().kind;
    let mut doc: BTreeMap<&str, Value> = BTreeMap::new();
    match kind.as_str() {
        "ConfigMap" => {
            doc.insert("data", sorted_field(res, "data"));
            let binary = sorted_field(res, "binaryData");
            if binary.as_object().is_some_and(|m| !m.is_empty()) {
                doc.insert("binaryData", binary);
            }
        }
        "Secret" => {
            doc.insert("data", sorted_field(res, "data"));
            doc.insert(
                "type",
                res.content().get("type").cloned().unwrap_or(Value::Null),
            );
        }
        _ => {
            let mut content = res.content().clone();
            content.remove("status");
            return Ok(escape(&serde_json::to_string(&sort_value(Value::Object(content)))?));
        }
    }
    doc.insert("kind", Value::String(kind));
    doc.insert("name", Value::String(res.name().to_string()));
    Ok(escape(&serde_json::to_string(&doc)?))
}

fn sorted_field(res: &Resource, key: &str) -> Value {
    res.content().get(key).cloned().map(sort_value).unwrap_or(Value::Null)
}

/// Rebuild mappings with their keys in sorted order.
fn sort_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_value(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}

/// Escape the characters that must not appear raw in embedded JSON.
fn escape(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

/// Swap digits and letters that could spell unfortunate words.
fn encode_digits(hex: &str) -> String {
    hex.chars()
        .map(|c| match c {
            '0' => 'g',
            '1' => 'h',
            '3' => 'k',
            'a' => 'm',
            'e' => 't',
            c => c,
        })
        .collect()
}
