// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Resource documents and the behaviors that control how they combine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Gvk, ResId};

#[cfg(test)]
#[path = "./resource_test.rs"]
mod resource_test;

/// How a resource combines with an existing resource of the same identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// Must not collide with anything already accumulated.
    #[default]
    Create,
    /// Folded into the existing resource.
    Merge,
    /// Substitutes the existing resource.
    Replace,
}

/// A single structured document with identity metadata.
///
/// The document is an ordered tree, so field order survives a round trip
/// through the codec.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    content: Map<String, Value>,
    behavior: Behavior,
    needs_hash: bool,
    /// Every `metadata.name` this resource carried before its current one.
    name_history: Vec<String>,
}

impl Resource {
    /// Build a resource from a parsed document, validating its identity fields.
    pub fn from_value(value: Value) -> crate::Result<Self> {
        match value {
            Value::Object(content) => Self::from_map(content),
            other => Err(Error::InvalidResource(format!(
                "expected a mapping, found {other}"
            ))),
        }
    }

    pub fn from_map(content: Map<String, Value>) -> crate::Result<Self> {
        let resource = Self {
            content,
            behavior: Behavior::default(),
            needs_hash: false,
            name_history: Vec::new(),
        };
        for field in ["apiVersion", "kind"] {
            if resource.string_field(&[field]).is_none() {
                return Err(Error::InvalidResource(format!("missing {field}")));
            }
        }
        if resource.name().is_empty() {
            return Err(Error::InvalidResource(format!(
                "{} has no metadata.name",
                resource.gvk()
            )));
        }
        Ok(resource)
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn set_behavior(&mut self, behavior: Behavior) {
        self.behavior = behavior;
    }

    /// Whether a content hash suffix is still due on this resource's name.
    pub fn needs_hash(&self) -> bool {
        self.needs_hash
    }

    pub fn set_needs_hash(&mut self, needs_hash: bool) {
        self.needs_hash = needs_hash;
    }

    pub fn gvk(&self) -> Gvk {
        Gvk::from_api_version(
            self.string_field(&["apiVersion"]).unwrap_or_default(),
            self.string_field(&["kind"]).unwrap_or_default(),
        )
    }

    /// The current `metadata.name`.
    pub fn name(&self) -> &str {
        self.string_field(&["metadata", "name"]).unwrap_or_default()
    }

    /// Rename the resource, remembering the previous name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        let previous = self.name().to_string();
        if previous == name {
            return;
        }
        if !self.name_history.contains(&previous) {
            self.name_history.push(previous);
        }
        self.metadata_mut()
            .insert("name".to_string(), Value::String(name));
    }

    pub fn name_history(&self) -> &[String] {
        &self.name_history
    }

    /// True when `name` is the current name or any earlier one.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name() == name || self.name_history.iter().any(|n| n == name)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.string_field(&["metadata", "namespace"])
            .filter(|ns| !ns.is_empty())
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.metadata_mut()
            .insert("namespace".to_string(), Value::String(namespace.into()));
    }

    /// The identity this resource would have if it were added untransformed.
    pub fn initial_id(&self) -> ResId {
        ResId::new(self.gvk(), self.name()).with_namespace(self.namespace())
    }

    pub fn content(&self) -> &Map<String, Value> {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.content
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.content.clone())
    }

    /// Look up a nested field by its path segments.
    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.content.get(*first)?;
        for segment in rest {
            current = current.as_object()?.get(*segment)?;
        }
        Some(current)
    }

    fn string_field(&self, path: &[&str]) -> Option<&str> {
        self.field(path).and_then(Value::as_str)
    }

    fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        let metadata = self
            .content
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if !metadata.is_object() {
            *metadata = Value::Object(Map::new());
        }
        match metadata {
            Value::Object(map) => map,
            _ => unreachable!("metadata was just made a mapping"),
        }
    }

    /// Fold `other` into this resource: scalars from `other` win, mappings
    /// union recursively and sequences concatenate.
    ///
    /// This resource keeps its name and namespace.
    pub fn merge_from(&mut self, other: &Resource) {
        let name = self.name().to_string();
        let namespace = self.namespace().map(String::from);
        for (key, value) in &other.content {
            match self.content.get_mut(key) {
                Some(existing) => merge_values(existing, value),
                None => {
                    self.content.insert(key.clone(), value.clone());
                }
            }
        }
        self.restore_identity(&name, namespace.as_deref());
    }

    /// Take over the content of `other` while keeping this resource's name
    /// and namespace.
    pub fn replace_from(&mut self, other: &Resource) {
        let name = self.name().to_string();
        let namespace = self.namespace().map(String::from);
        self.content = other.content.clone();
        self.restore_identity(&name, namespace.as_deref());
    }

    /// Put back a name and namespace that a merge or patch may have overwritten.
    pub(crate) fn restore_identity(&mut self, name: &str, namespace: Option<&str>) {
        let metadata = self.metadata_mut();
        metadata.insert("name".to_string(), Value::String(name.to_string()));
        match namespace {
            Some(ns) => {
                metadata.insert("namespace".to_string(), Value::String(ns.to_string()));
            }
            None => {
                metadata.remove("namespace");
            }
        }
    }
}

/// Recursive merge used for `behavior: merge`.
fn merge_values(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(incoming)) => {
            target.extend(incoming.iter().cloned());
        }
        (target, incoming) => *target = incoming.clone(),
    }
}

/// Render a scalar as the string a manifest author would have written.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
