// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! The accumulated set of resources, keyed by identity.

use std::collections::BTreeMap;

use crate::{Behavior, Error, Gvk, ResId, Resource};

#[cfg(test)]
#[path = "./resmap_test.rs"]
mod resmap_test;

/// Kinds emitted first, in this order, so that dependencies exist before
/// their dependents are applied.
const ORDER_FIRST: &[&str] = &[
    "Namespace",
    "ResourceQuota",
    "StorageClass",
    "CustomResourceDefinition",
    "ServiceAccount",
    "PodSecurityPolicy",
    "Role",
    "ClusterRole",
    "RoleBinding",
    "ClusterRoleBinding",
    "ConfigMap",
    "Secret",
    "Endpoints",
    "Service",
    "LimitRange",
    "PriorityClass",
    "PersistentVolume",
    "PersistentVolumeClaim",
    "Deployment",
    "StatefulSet",
    "CronJob",
    "PodDisruptionBudget",
];

/// Kinds emitted after everything else.
const ORDER_LAST: &[&str] = &["MutatingWebhookConfiguration", "ValidatingWebhookConfiguration"];

fn kind_rank(kind: &str) -> usize {
    if let Some(pos) = ORDER_FIRST.iter().position(|k| *k == kind) {
        return pos;
    }
    match ORDER_LAST.iter().position(|k| *k == kind) {
        Some(pos) => ORDER_FIRST.len() + 1 + pos,
        None => ORDER_FIRST.len(),
    }
}

/// Mapping from [`ResId`] to [`Resource`] with at most one resource per id.
///
/// Iteration follows the id ordering and is therefore deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceMap {
    resources: BTreeMap<ResId, Resource>,
}

impl ResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, id: &ResId) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn get_mut(&mut self, id: &ResId) -> Option<&mut Resource> {
        self.resources.get_mut(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ResId> {
        self.resources.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResId, &Resource)> {
        self.resources.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ResId, &mut Resource)> {
        self.resources.iter_mut()
    }

    /// Add a resource under its untransformed identity.
    pub fn add(&mut self, res: Resource) -> crate::Result<()> {
        let id = res.initial_id();
        self.add_with_id(id, res)
    }

    /// Add a resource under `id`.
    ///
    /// Fails when a resource with the same current identity already exists
    /// with behavior `create`; any other existing resource is substituted.
    pub fn add_with_id(&mut self, id: ResId, res: Resource) -> crate::Result<()> {
        let existing = self
            .resources
            .iter()
            .find(|(other, _)| other.current_matches(&id))
            .map(|(other, r)| (other.clone(), r.behavior()));
        if let Some((other, behavior)) = existing {
            if behavior == Behavior::Create {
                return Err(Error::DuplicateResource(other.to_string()));
            }
            self.resources.remove(&other);
        }
        self.resources.insert(id, res);
        Ok(())
    }

    /// Insert without collision checks; used when re-keying a map.
    pub(crate) fn insert(&mut self, id: ResId, res: Resource) {
        self.resources.insert(id, res);
    }

    pub fn remove(&mut self, id: &ResId) -> Option<Resource> {
        self.resources.remove(id)
    }

    /// Fold every resource of `other` into this map according to its behavior.
    pub fn merge_from(&mut self, other: ResourceMap) -> crate::Result<()> {
        for (id, res) in other {
            self.merge_one(id, res)?;
        }
        Ok(())
    }

    /// Fold a single resource into this map according to its behavior.
    ///
    /// A `create` collides only with a resource of the same original name in
    /// the same namespace; `merge` and `replace` also find a target whose
    /// namespace is unset on either side.
    pub fn merge_one(&mut self, id: ResId, res: Resource) -> crate::Result<()> {
        if res.behavior() == Behavior::Create {
            let duplicate = self.resources.keys().find(|existing| {
                existing.original_matches(&id) && existing.namespace() == id.namespace()
            });
            if let Some(existing) = duplicate {
                return Err(Error::DuplicateResource(existing.to_string()));
            }
            self.resources.insert(id, res);
            return Ok(());
        }
        let existing = self
            .resources
            .keys()
            .find(|existing| existing.original_matches(&id))
            .cloned()
            .ok_or_else(|| Error::MergeTargetMissing(id.to_string()))?;
        let behavior = res.behavior();
        tracing::debug!(resource = %existing, ?behavior, "combining resource");
        let target = self
            .resources
            .get_mut(&existing)
            .ok_or_else(|| Error::MergeTargetMissing(existing.to_string()))?;
        if behavior == Behavior::Merge {
            target.merge_from(&res);
        } else {
            target.replace_from(&res);
        }
        Ok(())
    }

    /// Ids of resources selected by `gvk` whose original name is `name`.
    ///
    /// A `namespace` of `None` matches every namespace.
    pub fn find_by_original_name(&self, gvk: &Gvk, name: &str, namespace: Option<&str>) -> Vec<&ResId> {
        self.resources
            .keys()
            .filter(|id| {
                id.gvk().is_selected_by(gvk)
                    && id.name() == name
                    && namespace.is_none_or(|ns| id.namespace() == Some(ns))
            })
            .collect()
    }

    /// Ids of resources selected by `gvk` whose current `metadata.name` is `name`.
    pub fn find_by_current_name(&self, gvk: &Gvk, name: &str, namespace: Option<&str>) -> Vec<&ResId> {
        self.resources
            .iter()
            .filter(|(id, res)| {
                id.gvk().is_selected_by(gvk)
                    && res.name() == name
                    && namespace.is_none_or(|ns| id.namespace() == Some(ns))
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Original-name matches, falling back to current-name matches.
    pub fn find_target(&self, gvk: &Gvk, name: &str, namespace: Option<&str>) -> Vec<ResId> {
        let found = self.find_by_original_name(gvk, name, namespace);
        let found = if found.is_empty() {
            self.find_by_current_name(gvk, name, namespace)
        } else {
            found
        };
        found.into_iter().cloned().collect()
    }

    /// Resources in apply order: kind precedence, then group, version,
    /// namespace and name.
    pub fn as_ordered_slice(&self) -> Vec<&Resource> {
        let mut ordered: Vec<&Resource> = self.resources.values().collect();
        ordered.sort_by_cached_key(|res| {
            let gvk = res.gvk();
            (
                kind_rank(&gvk.kind),
                gvk.kind,
                gvk.group,
                gvk.version,
                res.namespace().unwrap_or_default().to_string(),
                res.name().to_string(),
            )
        });
        ordered
    }
}

impl IntoIterator for ResourceMap {
    type Item = (ResId, Resource);
    type IntoIter = std::collections::btree_map::IntoIter<ResId, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.into_iter()
    }
}

impl FromIterator<(ResId, Resource)> for ResourceMap {
    fn from_iter<T: IntoIterator<Item = (ResId, Resource)>>(iter: T) -> Self {
        Self {
            resources: iter.into_iter().collect(),
        }
    }
}
