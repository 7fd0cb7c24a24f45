// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Field tables that drive the label, annotation, image and name
//! reference transformers.

use serde::{Deserialize, Serialize};

use crate::{Error, FieldSpec, Gvk, Loader};

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

/// Workload kinds that embed a pod template at `spec/template`.
const TEMPLATE_KINDS: &[&str] = &[
    "Deployment",
    "ReplicaSet",
    "DaemonSet",
    "StatefulSet",
    "Job",
    "ReplicationController",
];

/// Every location of a pod spec, per kind.
fn pod_spec_paths() -> Vec<(&'static str, &'static str)> {
    let mut paths = vec![("Pod", "spec")];
    paths.extend(TEMPLATE_KINDS.iter().map(|kind| (*kind, "spec/template/spec")));
    paths.push(("CronJob", "spec/jobTemplate/spec/template/spec"));
    paths
}

/// Field specs for `suffix` below every pod spec.
fn pod_spec_fields(suffix: &str) -> Vec<FieldSpec> {
    pod_spec_paths()
        .into_iter()
        .map(|(kind, prefix)| FieldSpec::for_kind(kind, format!("{prefix}/{suffix}"), false))
        .collect()
}

/// Fields of referring resources that hold the name of a referee kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameReference {
    /// The kind of resource being referred to.
    #[serde(flatten)]
    pub gvk: Gvk,
    #[serde(default)]
    pub field_specs: Vec<FieldSpec>,
}

/// Field tables for every table-driven transformer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformerConfig {
    #[serde(default)]
    pub name_reference: Vec<NameReference>,
    #[serde(default)]
    pub common_labels: Vec<FieldSpec>,
    #[serde(default)]
    pub common_annotations: Vec<FieldSpec>,
    #[serde(default)]
    pub images: Vec<FieldSpec>,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            name_reference: default_name_references(),
            common_labels: default_common_labels(),
            common_annotations: default_common_annotations(),
            images: default_images(),
        }
    }
}

impl TransformerConfig {
    /// A configuration with no field specs at all.
    pub fn empty() -> Self {
        Self {
            name_reference: Vec::new(),
            common_labels: Vec::new(),
            common_annotations: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Parse a configurations file.
    pub fn from_yaml(yaml: &str, origin: &std::path::Path) -> crate::Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::empty());
        }
        serde_yaml::from_str(yaml).map_err(|error| Error::InvalidYaml {
            path: origin.to_path_buf(),
            error,
        })
    }

    /// The defaults extended by each file in `paths`, read through `loader`.
    pub fn load(loader: &dyn Loader, paths: &[String]) -> crate::Result<Self> {
        let mut config = Self::default();
        for path in paths {
            let bytes = loader.load(path)?;
            let origin = loader.root().join(path);
            let yaml = String::from_utf8_lossy(&bytes);
            config.merge(Self::from_yaml(&yaml, &origin)?);
            tracing::debug!(path = %origin.display(), "merged transformer configuration");
        }
        Ok(config)
    }

    /// Add every spec of `other` not already present.
    pub fn merge(&mut self, other: Self) {
        for reference in other.name_reference {
            match self.name_reference.iter_mut().find(|r| r.gvk == reference.gvk) {
                Some(existing) => extend_unique(&mut existing.field_specs, reference.field_specs),
                None => self.name_reference.push(reference),
            }
        }
        extend_unique(&mut self.common_labels, other.common_labels);
        extend_unique(&mut self.common_annotations, other.common_annotations);
        extend_unique(&mut self.images, other.images);
    }
}

fn extend_unique(specs: &mut Vec<FieldSpec>, incoming: Vec<FieldSpec>) {
    for spec in incoming {
        if !specs.contains(&spec) {
            specs.push(spec);
        }
    }
}

fn default_common_labels() -> Vec<FieldSpec> {
    let mut specs = vec![
        FieldSpec::any("metadata/labels", true),
        FieldSpec::for_kind("Service", "spec/selector", true),
        FieldSpec::for_kind("ReplicationController", "spec/selector", true),
        FieldSpec::for_kind("ReplicationController", "spec/template/metadata/labels", true),
    ];
    for kind in ["Deployment", "ReplicaSet", "DaemonSet", "StatefulSet"] {
        specs.push(FieldSpec::for_kind(kind, "spec/selector/matchLabels", true));
        specs.push(FieldSpec::for_kind(kind, "spec/template/metadata/labels", true));
    }
    // A Job's selector is generated by the cluster unless the author set one.
    specs.push(FieldSpec::for_kind("Job", "spec/selector/matchLabels", false));
    specs.push(FieldSpec::for_kind("Job", "spec/template/metadata/labels", true));
    specs.push(FieldSpec::for_kind("CronJob", "spec/jobTemplate/metadata/labels", true));
    specs.push(FieldSpec::for_kind(
        "CronJob",
        "spec/jobTemplate/spec/selector/matchLabels",
        false,
    ));
    specs.push(FieldSpec::for_kind(
        "CronJob",
        "spec/jobTemplate/spec/template/metadata/labels",
        true,
    ));
    specs.push(FieldSpec::for_kind("PodDisruptionBudget", "spec/selector/matchLabels", false));
    specs.push(FieldSpec::for_kind("NetworkPolicy", "spec/podSelector/matchLabels", false));
    specs
}

fn default_common_annotations() -> Vec<FieldSpec> {
    let mut specs = vec![FieldSpec::any("metadata/annotations", true)];
    for kind in TEMPLATE_KINDS {
        specs.push(FieldSpec::for_kind(kind, "spec/template/metadata/annotations", true));
    }
    specs.push(FieldSpec::for_kind(
        "CronJob",
        "spec/jobTemplate/spec/template/metadata/annotations",
        true,
    ));
    specs
}

fn default_images() -> Vec<FieldSpec> {
    let mut specs = pod_spec_fields("containers/image");
    specs.extend(pod_spec_fields("initContainers/image"));
    specs
}

fn referee(kind: &str, field_specs: Vec<FieldSpec>) -> NameReference {
    NameReference {
        gvk: Gvk::new("", "", kind),
        field_specs,
    }
}

fn default_name_references() -> Vec<NameReference> {
    let mut config_map = Vec::new();
    let mut secret = Vec::new();
    let mut service_account = Vec::new();
    let mut pvc = Vec::new();
    for suffix in [
        "volumes/configMap/name",
        "volumes/projected/sources/configMap/name",
        "containers/env/valueFrom/configMapKeyRef/name",
        "initContainers/env/valueFrom/configMapKeyRef/name",
        "containers/envFrom/configMapRef/name",
        "initContainers/envFrom/configMapRef/name",
    ] {
        config_map.extend(pod_spec_fields(suffix));
    }
    for suffix in [
        "volumes/secret/secretName",
        "volumes/projected/sources/secret/name",
        "containers/env/valueFrom/secretKeyRef/name",
        "initContainers/env/valueFrom/secretKeyRef/name",
        "containers/envFrom/secretRef/name",
        "initContainers/envFrom/secretRef/name",
        "imagePullSecrets/name",
    ] {
        secret.extend(pod_spec_fields(suffix));
    }
    secret.push(FieldSpec::for_kind("ServiceAccount", "imagePullSecrets/name", false));
    secret.push(FieldSpec::for_kind("Ingress", "spec/tls/secretName", false));
    service_account.extend(pod_spec_fields("serviceAccountName"));
    service_account.push(FieldSpec::for_kind("RoleBinding", "subjects/name", false));
    service_account.push(FieldSpec::for_kind("ClusterRoleBinding", "subjects/name", false));
    pvc.extend(pod_spec_fields("volumes/persistentVolumeClaim/claimName"));

    vec![
        referee("ConfigMap", config_map),
        referee("Secret", secret),
        referee("ServiceAccount", service_account),
        referee("PersistentVolumeClaim", pvc),
        referee(
            "Service",
            vec![
                FieldSpec::for_kind("StatefulSet", "spec/serviceName", false),
                FieldSpec::for_kind("Ingress", "spec/rules/http/paths/backend/serviceName", false),
                FieldSpec::for_kind("Ingress", "spec/rules/http/paths/backend/service/name", false),
                FieldSpec::for_kind("Ingress", "spec/backend/serviceName", false),
                FieldSpec::for_kind("APIService", "spec/service/name", false),
            ],
        ),
        referee(
            "Role",
            vec![FieldSpec::for_kind("RoleBinding", "roleRef/name", false)],
        ),
        referee(
            "ClusterRole",
            vec![
                FieldSpec::for_kind("RoleBinding", "roleRef/name", false),
                FieldSpec::for_kind("ClusterRoleBinding", "roleRef/name", false),
            ],
        ),
        referee(
            "PersistentVolume",
            vec![FieldSpec::for_kind("PersistentVolumeClaim", "spec/volumeName", false)],
        ),
        referee(
            "StorageClass",
            vec![
                FieldSpec::for_kind("PersistentVolume", "spec/storageClassName", false),
                FieldSpec::for_kind("PersistentVolumeClaim", "spec/storageClassName", false),
            ],
        ),
        referee(
            "Deployment",
            vec![FieldSpec::for_kind("HorizontalPodAutoscaler", "spec/scaleTargetRef/name", false)],
        ),
    ]
}
