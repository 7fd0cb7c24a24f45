// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

use serde_json::Value;

use super::Transformer;
use crate::{ResId, Resource, ResourceMap};

#[cfg(test)]
#[path = "./namespace_test.rs"]
mod namespace_test;

const BINDING_KINDS: &[&str] = &["RoleBinding", "ClusterRoleBinding"];

/// Moves every namespaced resource into one namespace.
///
/// Cluster-scoped kinds are left alone. Binding subjects that name a
/// service account of this map follow it into the namespace.
#[derive(Debug, Clone)]
pub struct NamespaceTransformer {
    namespace: String,
}

impl NamespaceTransformer {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl Transformer for NamespaceTransformer {
    fn transform(&self, map: ResourceMap) -> crate::Result<ResourceMap> {
        if self.namespace.is_empty() {
            return Ok(map);
        }
        let service_accounts: BTreeSet<String> = map
            .iter()
            .filter(|(id, _)| id.gvk().kind == "ServiceAccount")
            .flat_map(|(_, res)| {
                std::iter::once(res.name().to_string()).chain(res.name_history().iter().cloned())
            })
            .collect();

        let mut out = ResourceMap::new();
        for (id, mut res) in map {
            if BINDING_KINDS.contains(&id.gvk().kind.as_str()) {
                self.update_subjects(&mut res, &service_accounts);
            }
            if id.gvk().is_cluster_scoped() {
                out.add_with_id(id, res)?;
                continue;
            }
            res.set_namespace(&self.namespace);
            let id = ResId::new(id.gvk().clone(), id.name())
                .with_namespace(Some(self.namespace.as_str()))
                .with_prefix_suffix(id.prefix(), id.suffix());
            out.add_with_id(id, res)?;
        }
        Ok(out)
    }
}

impl NamespaceTransformer {
    fn update_subjects(&self, res: &mut Resource, service_accounts: &BTreeSet<String>) {
        let Some(Value::Array(subjects)) = res.content_mut().get_mut("subjects") else {
            return;
        };
        for subject in subjects.iter_mut().filter_map(Value::as_object_mut) {
            let is_local_account = subject.get("kind").and_then(Value::as_str) == Some("ServiceAccount")
                && subject
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| service_accounts.contains(name));
            if is_local_account {
                subject.insert("namespace".to_string(), Value::String(self.namespace.clone()));
            }
        }
    }
}
