// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Addressing nested fields of a resource by `/`-separated path.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Gvk};

#[cfg(test)]
#[path = "./fieldspec_test.rs"]
mod fieldspec_test;

/// A field path, optionally restricted to resources of a given gvk.
///
/// Sequences met along the path are traversed element by element. When
/// `create` is set, missing mappings along the path, including the leaf, are
/// created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct FieldSpec {
    #[serde(flatten)]
    pub gvk: Gvk,
    pub path: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub create: bool,
}

impl FieldSpec {
    /// A spec that applies to every resource.
    pub fn any(path: impl Into<String>, create: bool) -> Self {
        Self {
            gvk: Gvk::default(),
            path: path.into(),
            create,
        }
    }

    /// A spec that applies to resources of `kind` only.
    pub fn for_kind(kind: &str, path: impl Into<String>, create: bool) -> Self {
        Self {
            gvk: Gvk::new("", "", kind),
            path: path.into(),
            create,
        }
    }

    pub fn applies_to(&self, gvk: &Gvk) -> bool {
        gvk.is_selected_by(&self.gvk)
    }

    fn segments(&self) -> crate::Result<Vec<&str>> {
        let segments: Vec<&str> = self.path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidFieldPath {
                path: self.path.clone(),
                reason: "empty path segment".to_string(),
            });
        }
        Ok(segments)
    }

    /// Call `f` on every value found at this path inside `content`.
    pub fn apply<F>(&self, content: &mut Map<String, Value>, f: &mut F) -> crate::Result<()>
    where
        F: FnMut(&mut Value) -> crate::Result<()>,
    {
        let segments = self.segments()?;
        walk_map(content, &segments, self.create, f)
    }

    /// Collect every value found at this path, without creating anything.
    pub fn find<'a>(&self, content: &'a Map<String, Value>) -> Vec<&'a Value> {
        let mut found = Vec::new();
        if let Ok(segments) = self.segments() {
            collect_map(content, &segments, &mut found);
        }
        found
    }
}

fn walk_map<F>(map: &mut Map<String, Value>, segments: &[&str], create: bool, f: &mut F) -> crate::Result<()>
where
    F: FnMut(&mut Value) -> crate::Result<()>,
{
    let Some((first, rest)) = segments.split_first() else {
        return Ok(());
    };
    let missing = map.get(*first).is_none_or(Value::is_null);
    if missing {
        if !create {
            return Ok(());
        }
        map.insert(first.to_string(), Value::Object(Map::new()));
    }
    let Some(value) = map.get_mut(*first) else {
        return Ok(());
    };
    walk_value(value, rest, create, f)
}

fn walk_value<F>(value: &mut Value, rest: &[&str], create: bool, f: &mut F) -> crate::Result<()>
where
    F: FnMut(&mut Value) -> crate::Result<()>,
{
    match value {
        Value::Array(items) => {
            for item in items {
                walk_value(item, rest, create, f)?;
            }
            Ok(())
        }
        _ if rest.is_empty() => f(value),
        Value::Object(map) => walk_map(map, rest, create, f),
        _ => Ok(()),
    }
}

fn collect_map<'a>(map: &'a Map<String, Value>, segments: &[&str], found: &mut Vec<&'a Value>) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if let Some(value) = map.get(*first) {
        collect_value(value, rest, found);
    }
}

fn collect_value<'a>(value: &'a Value, rest: &[&str], found: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_value(item, rest, found);
            }
        }
        Value::Null => {}
        _ if rest.is_empty() => found.push(value),
        Value::Object(map) => collect_map(map, rest, found),
        _ => {}
    }
}
