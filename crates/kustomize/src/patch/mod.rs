// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Strategic-merge and JSON 6902 patches against targeted resources.

pub mod strategic;

use json_patch::{Patch, PatchErrorKind};
use serde_json::Value;

use crate::kustomization::PatchTarget;
use crate::transform::Transformer;
use crate::{Error, Gvk, ResId, Resource, ResourceMap};


/// Locate the single resource a patch addresses.
fn locate(map: &ResourceMap, gvk: &Gvk, name: &str, namespace: Option<&str>) -> crate::Result<ResId> {
    let describe = || match namespace {
        Some(ns) => format!("{gvk} {ns}/{name}"),
        None => format!("{gvk} {name}"),
    };
    let mut found = map.find_target(gvk, name, namespace);
    match found.len() {
        0 => Err(Error::PatchTargetMissing(describe())),
        1 => Ok(found.remove(0)),
        count => Err(Error::PatchFailed {
            target: describe(),
            detail: format!("{count} resources match; add a namespace to the patch"),
        }),
    }
}

/// Applies partial documents to the resources they name.
#[derive(Debug, Clone, Default)]
pub struct StrategicMergeTransformer {
    patches: Vec<Resource>,
}

impl StrategicMergeTransformer {
    pub fn new(patches: Vec<Resource>) -> Self {
        Self { patches }
    }
}

impl Transformer for StrategicMergeTransformer {
    fn transform(&self, mut map: ResourceMap) -> crate::Result<ResourceMap> {
        for patch in &self.patches {
            let id = locate(&map, &patch.gvk(), patch.name(), patch.namespace())?;
            let target = map
                .get_mut(&id)
                .ok_or_else(|| Error::PatchTargetMissing(id.to_string()))?;
            let name = target.name().to_string();
            let namespace = target.namespace().map(String::from);
            strategic::merge(target.content_mut(), patch.content());
            target.restore_identity(&name, namespace.as_deref());
            tracing::debug!(resource = %id, "applied strategic merge patch");
        }
        Ok(map)
    }
}

/// A parsed JSON 6902 patch and the resource it applies to.
#[derive(Debug, Clone)]
pub struct Json6902Patch {
    pub target: PatchTarget,
    pub patch: Patch,
}

impl Json6902Patch {
    /// Parse patch text given as a JSON array or the equivalent YAML list.
    pub fn parse(target: PatchTarget, text: &str) -> crate::Result<Self> {
        let describe = |detail: String| Error::PatchFailed {
            target: target.name.clone(),
            detail,
        };
        let patch = match serde_json::from_str::<Patch>(text) {
            Ok(patch) => patch,
            Err(_) => serde_yaml::from_str::<Patch>(text)
                .map_err(|err| describe(format!("invalid JSON patch: {err}")))?,
        };
        Ok(Self { target, patch })
    }

    fn gvk(&self) -> Gvk {
        Gvk::new(&self.target.group, &self.target.version, &self.target.kind)
    }
}

/// Applies JSON 6902 operation lists, in order, to their targets.
#[derive(Debug, Clone, Default)]
pub struct Json6902Transformer {
    patches: Vec<Json6902Patch>,
}

impl Json6902Transformer {
    pub fn new(patches: Vec<Json6902Patch>) -> Self {
        Self { patches }
    }
}

impl Transformer for Json6902Transformer {
    fn transform(&self, mut map: ResourceMap) -> crate::Result<ResourceMap> {
        for entry in &self.patches {
            let id = locate(
                &map,
                &entry.gvk(),
                &entry.target.name,
                entry.target.namespace.as_deref(),
            )?;
            let target = map
                .get_mut(&id)
                .ok_or_else(|| Error::PatchTargetMissing(id.to_string()))?;
            let mut doc = target.to_value();
            json_patch::patch(&mut doc, &entry.patch.0).map_err(|err| {
                let detail = err.to_string();
                match err.kind {
                    PatchErrorKind::TestFailed => Error::PatchTestFailed {
                        target: id.to_string(),
                        detail,
                    },
                    _ => Error::PatchFailed {
                        target: id.to_string(),
                        detail,
                    },
                }
            })?;
            let Value::Object(content) = doc else {
                return Err(Error::PatchFailed {
                    target: id.to_string(),
                    detail: "patch replaced the document with a non-mapping".to_string(),
                });
            };
            *target.content_mut() = content;
            tracing::debug!(resource = %id, ops = entry.patch.0.len(), "applied JSON patch");
        }
        Ok(map)
    }
}
