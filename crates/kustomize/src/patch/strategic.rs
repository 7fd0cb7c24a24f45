// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Field-wise merge of a partial document into a full one.
//!
//! Mappings merge recursively and `null` deletes a key. Lists of known
//! fields merge element-wise by a key field; any other list is replaced.
//! The `$patch: delete` and `$patch: replace` directives are honoured on
//! mappings and on keyed list elements.

use serde_json::{Map, Value};

#[cfg(test)]
#[path = "./strategic_test.rs"]
mod strategic_test;

const DIRECTIVE: &str = "$patch";

/// Merge key candidates for list-valued fields, by field name.
fn merge_keys(field: &str) -> &'static [&'static str] {
    match field {
        "containers" | "initContainers" | "ephemeralContainers" | "volumes" | "env"
        | "imagePullSecrets" => &["name"],
        "volumeMounts" => &["mountPath"],
        "ports" => &["containerPort", "port"],
        "hostAliases" => &["ip"],
        _ => &[],
    }
}

fn directive(map: &Map<String, Value>) -> Option<&str> {
    map.get(DIRECTIVE).and_then(Value::as_str)
}

/// Merge `patch` into `target`.
pub fn merge(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    if directive(patch) == Some("replace") {
        *target = strip_map(patch);
        return;
    }
    for (key, incoming) in patch {
        if key == DIRECTIVE {
            continue;
        }
        match incoming {
            Value::Null => {
                target.remove(key);
            }
            Value::Object(patch_map) if directive(patch_map) == Some("delete") => {
                target.remove(key);
            }
            Value::Object(patch_map) => match target.get_mut(key) {
                Some(Value::Object(existing)) => merge(existing, patch_map),
                _ => {
                    target.insert(key.clone(), strip(incoming));
                }
            },
            Value::Array(patch_items) => match target.get_mut(key) {
                Some(Value::Array(existing)) => merge_list(key, existing, patch_items),
                _ => {
                    target.insert(key.clone(), strip(incoming));
                }
            },
            scalar => {
                target.insert(key.clone(), scalar.clone());
            }
        }
    }
}

fn merge_list(field: &str, target: &mut Vec<Value>, patch: &[Value]) {
    let replace_all = patch
        .iter()
        .filter_map(Value::as_object)
        .any(|item| directive(item) == Some("replace"));
    let merge_key = merge_keys(field)
        .iter()
        .find(|key| patch.iter().chain(target.iter()).any(|item| item.get(**key).is_some()));
    let Some(merge_key) = merge_key.filter(|_| !replace_all) else {
        *target = patch
            .iter()
            .filter(|item| item.as_object().is_none_or(|m| directive(m).is_none()))
            .map(strip)
            .collect();
        return;
    };

    for item in patch {
        let Some(item_map) = item.as_object() else {
            target.push(item.clone());
            continue;
        };
        let position = item_map
            .get(*merge_key)
            .and_then(|key| target.iter().position(|t| t.get(*merge_key) == Some(key)));
        match (directive(item_map), position) {
            (Some("delete"), Some(pos)) => {
                target.remove(pos);
            }
            (Some("delete"), None) => {}
            (_, Some(pos)) => match &mut target[pos] {
                Value::Object(existing) => merge(existing, item_map),
                other => *other = strip(item),
            },
            (_, None) => target.push(strip(item)),
        }
    }
}

/// Copy a patch value without its directives.
fn strip(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(strip).collect()),
        other => other.clone(),
    }
}

fn strip_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter(|(key, _)| *key != DIRECTIVE)
        .map(|(key, value)| (key.clone(), strip(value)))
        .collect()
}
