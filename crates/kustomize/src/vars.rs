// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Declared variables and `$(NAME)` substitution.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::scalar_to_string;
use crate::transform::Transformer;
use crate::{Error, Gvk, ResourceMap};

#[cfg(test)]
#[path = "./vars_test.rs"]
mod vars_test;

/// Matches `$$(NAME)` escapes and `$(NAME)` references.
static VAR_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\$\(([A-Za-z_][A-Za-z0-9_]*)\)|\$\(([A-Za-z_][A-Za-z0-9_]*)\)")
        .expect("variable reference pattern is valid")
});

const DEFAULT_FIELD_PATH: &str = "metadata.name";

fn default_field_path() -> String {
    DEFAULT_FIELD_PATH.to_string()
}

/// The resource a var reads from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjRef {
    /// Selector for the referenced kind; an empty apiVersion matches any.
    pub fn gvk(&self) -> Gvk {
        if self.api_version.is_empty() {
            Gvk::new("", "", &self.kind)
        } else {
            Gvk::from_api_version(&self.api_version, &self.kind)
        }
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.gvk())?;
        match &self.namespace {
            Some(ns) => write!(f, " {ns}/{}", self.name),
            None => write!(f, " {}", self.name),
        }
    }
}

/// The field of the referenced resource that provides the value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldRef {
    #[serde(rename = "fieldpath", alias = "fieldPath", default = "default_field_path")]
    pub field_path: String,
}

impl Default for FieldRef {
    fn default() -> Self {
        Self {
            field_path: default_field_path(),
        }
    }
}

/// A named reference to a field of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Var {
    pub name: String,
    #[serde(rename = "objref", alias = "objRef")]
    pub obj_ref: ObjRef,
    #[serde(rename = "fieldref", alias = "fieldRef", default)]
    pub field_ref: FieldRef,
}

/// Vars keyed, and therefore sorted, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarSet {
    vars: BTreeMap<String, Var>,
}

impl VarSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Var> {
        self.vars.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Var> {
        self.vars.values()
    }

    /// Add a var; an identical redeclaration is accepted, any other
    /// redeclaration collides.
    pub fn absorb(&mut self, var: Var) -> crate::Result<()> {
        match self.vars.get(&var.name) {
            Some(existing) if *existing == var => Ok(()),
            Some(_) => Err(Error::VarCollision { name: var.name }),
            None => {
                self.vars.insert(var.name.clone(), var);
                Ok(())
            }
        }
    }

    pub fn absorb_all<I: IntoIterator<Item = Var>>(&mut self, vars: I) -> crate::Result<()> {
        vars.into_iter().try_for_each(|var| self.absorb(var))
    }

    /// Resolve every var against `map`.
    pub fn resolve(&self, map: &ResourceMap) -> crate::Result<BTreeMap<String, String>> {
        self.vars
            .values()
            .map(|var| Ok((var.name.clone(), resolve_var(var, map)?)))
            .collect()
    }
}

impl IntoIterator for VarSet {
    type Item = Var;
    type IntoIter = std::collections::btree_map::IntoValues<String, Var>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.into_values()
    }
}

fn resolve_var(var: &Var, map: &ResourceMap) -> crate::Result<String> {
    let selector = var.obj_ref.gvk();
    let matches: Vec<_> = map
        .iter()
        .filter(|(id, res)| {
            id.gvk().is_selected_by(&selector)
                && (id.name() == var.obj_ref.name || res.name() == var.obj_ref.name)
                && var
                    .obj_ref
                    .namespace
                    .as_deref()
                    .is_none_or(|ns| res.namespace() == Some(ns))
        })
        .collect();
    let res = match matches.as_slice() {
        [(_, res)] => *res,
        [] => {
            return Err(Error::VarTargetMissing {
                name: var.name.clone(),
                target: var.obj_ref.to_string(),
            });
        }
        several => {
            return Err(Error::VarTargetAmbiguous {
                name: var.name.clone(),
                target: var.obj_ref.to_string(),
                count: several.len(),
            });
        }
    };

    let path = &var.field_ref.field_path;
    let value = lookup(&res.to_value(), path)?;
    scalar_to_string(&value).ok_or_else(|| Error::VarValueNotScalar {
        name: var.name.clone(),
        path: path.clone(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
    Select(String, String),
}

/// Parse `a.b[0].c[name=x]` into steps.
fn parse_path(path: &str) -> crate::Result<Vec<Step>> {
    let invalid = |reason: &str| Error::InvalidFieldPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    let mut steps = Vec::new();
    let mut key = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !key.is_empty() {
                    steps.push(Step::Key(std::mem::take(&mut key)));
                } else if !matches!(steps.last(), Some(Step::Index(_) | Step::Select(..))) {
                    return Err(invalid("empty segment"));
                }
            }
            '[' => {
                if !key.is_empty() {
                    steps.push(Step::Key(std::mem::take(&mut key)));
                }
                let selector: String = chars.by_ref().take_while(|c| *c != ']').collect();
                let step = match selector.split_once('=') {
                    Some((field, value)) if !field.is_empty() => {
                        Step::Select(field.to_string(), value.to_string())
                    }
                    Some(_) => return Err(invalid("selector needs a field name")),
                    None => Step::Index(
                        selector
                            .parse()
                            .map_err(|_| invalid("index must be a number or key=value"))?,
                    ),
                };
                steps.push(step);
            }
            c => key.push(c),
        }
    }
    if !key.is_empty() {
        steps.push(Step::Key(key));
    }
    if steps.is_empty() {
        return Err(invalid("empty path"));
    }
    Ok(steps)
}

/// Walk `path` through `value`.
pub(crate) fn lookup(value: &Value, path: &str) -> crate::Result<Value> {
    let mut current = value;
    for step in parse_path(path)? {
        let next = match (&step, current) {
            (Step::Key(key), Value::Object(map)) => map.get(key),
            (Step::Index(index), Value::Array(items)) => items.get(*index),
            (Step::Select(field, expected), Value::Array(items)) => items.iter().find(|item| {
                item.get(field)
                    .and_then(scalar_to_string)
                    .is_some_and(|v| v == *expected)
            }),
            _ => None,
        };
        current = next.ok_or_else(|| Error::InvalidFieldPath {
            path: path.to_string(),
            reason: format!("no match for {step:?}"),
        })?;
    }
    Ok(current.clone())
}

/// Replace `$(NAME)` in `text`; `$$(NAME)` becomes a literal `$(NAME)`.
pub fn substitute(text: &str, values: &BTreeMap<String, String>) -> crate::Result<String> {
    for caps in VAR_REFERENCE.captures_iter(text) {
        if let Some(name) = caps.get(2) {
            if !values.contains_key(name.as_str()) {
                return Err(Error::VarUnresolved(name.as_str().to_string()));
            }
        }
    }
    let replaced = VAR_REFERENCE.replace_all(text, |caps: &Captures<'_>| match (caps.get(1), caps.get(2)) {
        (Some(escaped), _) => format!("$({})", escaped.as_str()),
        (None, Some(name)) => values.get(name.as_str()).cloned().unwrap_or_default(),
        (None, None) => String::new(),
    });
    Ok(replaced.into_owned())
}

fn substitute_value(value: &mut Value, values: &BTreeMap<String, String>) -> crate::Result<()> {
    match value {
        Value::String(text) if text.contains("$(") => {
            *text = substitute(text, values)?;
        }
        Value::Array(items) => {
            for item in items {
                substitute_value(item, values)?;
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                substitute_value(item, values)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Resolves vars against the map and substitutes them into every string.
#[derive(Debug, Clone, Default)]
pub struct VarResolver {
    vars: VarSet,
}

impl VarResolver {
    pub fn new(vars: VarSet) -> Self {
        Self { vars }
    }
}

impl Transformer for VarResolver {
    fn transform(&self, mut map: ResourceMap) -> crate::Result<ResourceMap> {
        let values = self.vars.resolve(&map)?;
        for (id, res) in map.iter_mut() {
            for (_, field) in res.content_mut().iter_mut() {
                substitute_value(field, &values)?;
            }
            tracing::trace!(resource = %id, "substituted vars");
        }
        Ok(map)
    }
}
