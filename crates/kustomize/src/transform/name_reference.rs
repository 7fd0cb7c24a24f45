// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use serde_json::{Map, Value};

use super::Transformer;
use crate::resid::namespaces_compatible;
use crate::{FieldSpec, Gvk, NameReference, ResId, ResourceMap};

#[cfg(test)]
#[path = "./name_reference_test.rs"]
mod name_reference_test;

/// What a referring field may point at.
#[derive(Debug)]
struct Referee {
    gvk: Gvk,
    namespace: Option<String>,
    current: String,
    /// Every name the referee has carried, current one included.
    names: Vec<String>,
}

/// Rewrites fields that name another resource so that they follow the
/// referee through renames.
#[derive(Debug, Clone)]
pub struct NameReferenceTransformer {
    references: Vec<NameReference>,
}

impl NameReferenceTransformer {
    pub fn new(references: Vec<NameReference>) -> Self {
        Self { references }
    }
}

impl Transformer for NameReferenceTransformer {
    fn transform(&self, mut map: ResourceMap) -> crate::Result<ResourceMap> {
        let referees: Vec<Referee> = map
            .iter()
            .map(|(id, res)| {
                let mut names = res.name_history().to_vec();
                names.push(res.name().to_string());
                Referee {
                    gvk: id.gvk().clone(),
                    namespace: res.namespace().map(String::from),
                    current: res.name().to_string(),
                    names,
                }
            })
            .collect();
        if referees.iter().all(|r| r.names.len() == 1) {
            return Ok(map);
        }

        for (id, res) in map.iter_mut() {
            let namespace = res.namespace().map(String::from);
            for reference in &self.references {
                let candidates: Vec<&Referee> = referees
                    .iter()
                    .filter(|r| r.gvk.is_selected_by(&reference.gvk) && r.names.len() > 1)
                    .collect();
                if candidates.is_empty() {
                    continue;
                }
                let site = Site {
                    referrer: id,
                    namespace: namespace.as_deref(),
                    kind: &reference.gvk.kind,
                    candidates: &candidates,
                };
                for spec in reference.field_specs.iter().filter(|s| s.applies_to(id.gvk())) {
                    site.rewrite(spec, res.content_mut())?;
                }
            }
        }
        Ok(map)
    }
}

/// One referring resource paired with the referees of one kind.
struct Site<'a> {
    referrer: &'a ResId,
    namespace: Option<&'a str>,
    kind: &'a str,
    candidates: &'a [&'a Referee],
}

impl Site<'_> {
    fn rewrite(&self, spec: &FieldSpec, content: &mut Map<String, Value>) -> crate::Result<()> {
        let (parent, leaf) = match spec.path.rsplit_once('/') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, spec.path.as_str()),
        };
        match parent {
            None => {
                // The top-level `kind` is the referrer's own.
                self.rewrite_leaf(content, leaf);
                Ok(())
            }
            Some(parent) => {
                let parent_spec = FieldSpec {
                    gvk: spec.gvk.clone(),
                    path: parent.to_string(),
                    create: false,
                };
                parent_spec.apply(content, &mut |value| {
                    if let Value::Object(holder) = value {
                        self.rewrite_in(holder, leaf);
                    }
                    Ok(())
                })
            }
        }
    }

    /// Rewrite `holder[leaf]`, a name or a list of names.
    fn rewrite_in(&self, holder: &mut Map<String, Value>, leaf: &str) {
        // Bindings and scale targets name the kind next to the name.
        if let Some(kind) = holder.get("kind").and_then(Value::as_str) {
            if kind != self.kind {
                return;
            }
        }
        self.rewrite_leaf(holder, leaf);
    }

    fn rewrite_leaf(&self, holder: &mut Map<String, Value>, leaf: &str) {
        match holder.get_mut(leaf) {
            Some(Value::String(name)) => self.rewrite_name(name),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::String(name) = item {
                        self.rewrite_name(name);
                    }
                }
            }
            _ => {}
        }
    }

    fn rewrite_name(&self, name: &mut String) {
        let matches: Vec<&Referee> = self
            .candidates
            .iter()
            .copied()
            .filter(|r| {
                r.names.iter().any(|n| n.as_str() == name.as_str())
                    && (r.gvk.is_cluster_scoped()
                        || namespaces_compatible(self.namespace, r.namespace.as_deref()))
            })
            .collect();
        let chosen = match matches.as_slice() {
            [] => return,
            [only] => *only,
            several => {
                let same_namespace: Vec<&Referee> = several
                    .iter()
                    .copied()
                    .filter(|r| r.namespace.as_deref() == self.namespace)
                    .collect();
                match same_namespace.as_slice() {
                    [only] => *only,
                    _ => {
                        tracing::warn!(
                            referrer = %self.referrer,
                            %name,
                            count = several.len(),
                            "ambiguous name reference left unchanged"
                        );
                        return;
                    }
                }
            }
        };
        if *name != chosen.current {
            tracing::debug!(referrer = %self.referrer, from = %name, to = %chosen.current, "updating reference");
            *name = chosen.current.clone();
        }
    }
}
