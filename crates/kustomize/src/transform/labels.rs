// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde_json::Value;

use super::Transformer;
use crate::resource::scalar_to_string;
use crate::{Error, FieldSpec, ResId, ResourceMap};

#[cfg(test)]
#[path = "./labels_test.rs"]
mod labels_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Label,
    Annotation,
}

/// Unions a fixed set of key/value pairs into every mapping a field spec
/// selects, refusing to overwrite a different existing value.
#[derive(Debug, Clone)]
struct MapFieldUnion {
    flavor: Flavor,
    values: BTreeMap<String, String>,
    specs: Vec<FieldSpec>,
}

impl MapFieldUnion {
    fn transform(&self, mut map: ResourceMap) -> crate::Result<ResourceMap> {
        if self.values.is_empty() {
            return Ok(map);
        }
        for (id, res) in map.iter_mut() {
            let gvk = id.gvk();
            for spec in self.specs.iter().filter(|spec| spec.applies_to(gvk)) {
                spec.apply(res.content_mut(), &mut |target| self.union_into(id, &spec.path, target))?;
            }
        }
        Ok(map)
    }

    fn union_into(&self, id: &ResId, path: &str, target: &mut Value) -> crate::Result<()> {
        let Value::Object(existing) = target else {
            return Err(Error::InvalidFieldPath {
                path: path.to_string(),
                reason: format!("expected a mapping in {id}"),
            });
        };
        for (key, value) in &self.values {
            match existing.get(key) {
                Some(current) if scalar_to_string(current).as_deref() == Some(value.as_str()) => {}
                Some(current) => return Err(self.conflict(id, key, current, value)),
                None => {
                    existing.insert(key.clone(), Value::String(value.clone()));
                }
            }
        }
        Ok(())
    }

    fn conflict(&self, id: &ResId, key: &str, current: &Value, value: &str) -> Error {
        let resource = id.to_string();
        let key = key.to_string();
        let existing = scalar_to_string(current).unwrap_or_else(|| current.to_string());
        let value = value.to_string();
        match self.flavor {
            Flavor::Label => Error::LabelConflict {
                resource,
                key,
                existing,
                value,
            },
            Flavor::Annotation => Error::AnnotationConflict {
                resource,
                key,
                existing,
                value,
            },
        }
    }
}

/// Adds common labels to metadata, selectors and pod templates.
#[derive(Debug, Clone)]
pub struct LabelTransformer(MapFieldUnion);

impl LabelTransformer {
    pub fn new(labels: BTreeMap<String, String>, specs: Vec<FieldSpec>) -> Self {
        Self(MapFieldUnion {
            flavor: Flavor::Label,
            values: labels,
            specs,
        })
    }
}

impl Transformer for LabelTransformer {
    fn transform(&self, map: ResourceMap) -> crate::Result<ResourceMap> {
        self.0.transform(map)
    }
}

/// Adds common annotations to metadata and pod templates.
#[derive(Debug, Clone)]
pub struct AnnotationTransformer(MapFieldUnion);

impl AnnotationTransformer {
    pub fn new(annotations: BTreeMap<String, String>, specs: Vec<FieldSpec>) -> Self {
        Self(MapFieldUnion {
            flavor: Flavor::Annotation,
            values: annotations,
            specs,
        })
    }
}

impl Transformer for AnnotationTransformer {
    fn transform(&self, map: ResourceMap) -> crate::Result<ResourceMap> {
        self.0.transform(map)
    }
}
