// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Resource identity: group/version/kind plus name, namespace and the
//! prefix/suffix history applied to the name.

use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "./resid_test.rs"]
mod resid_test;

/// Kinds that are never placed in a namespace.
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "APIService",
    "CSIDriver",
    "CSINode",
    "CertificateSigningRequest",
    "ClusterRole",
    "ClusterRoleBinding",
    "ComponentStatus",
    "CustomResourceDefinition",
    "IngressClass",
    "MutatingWebhookConfiguration",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PodSecurityPolicy",
    "PriorityClass",
    "RuntimeClass",
    "StorageClass",
    "ValidatingWebhookConfiguration",
    "VolumeAttachment",
];

/// Group, version and kind of a resource.
///
/// When used as a selector, empty fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Gvk {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl Gvk {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Split an `apiVersion` such as `apps/v1` or `v1` into group and version.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }

    /// The `apiVersion` string for this group and version.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Check whether this gvk is matched by `selector`.
    pub fn is_selected_by(&self, selector: &Gvk) -> bool {
        (selector.group.is_empty() || selector.group == self.group)
            && (selector.version.is_empty() || selector.version == self.version)
            && (selector.kind.is_empty() || selector.kind == self.kind)
    }

    pub fn is_cluster_scoped(&self) -> bool {
        CLUSTER_SCOPED_KINDS.contains(&self.kind.as_str())
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_version = self.api_version();
        if api_version.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}/{}", api_version, self.kind)
        }
    }
}

/// Identity key of a resource within a [`crate::ResourceMap`].
///
/// The derived ordering sorts by gvk, then original name, then namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResId {
    gvk: Gvk,
    name: String,
    namespace: Option<String>,
    prefix: String,
    suffix: String,
}

impl ResId {
    pub fn new(gvk: Gvk, name: impl Into<String>) -> Self {
        Self {
            gvk,
            name: name.into(),
            namespace: None,
            prefix: String::new(),
            suffix: String::new(),
        }
    }

    /// Set the namespace, treating an empty string as no namespace.
    pub fn with_namespace(mut self, namespace: Option<&str>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty()).map(String::from);
        self
    }

    pub fn with_prefix_suffix(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self.suffix = suffix.into();
        self
    }

    pub fn gvk(&self) -> &Gvk {
        &self.gvk
    }

    /// The name the resource was declared with.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// The transformed name, `prefix + name + suffix`.
    pub fn current_name(&self) -> String {
        format!("{}{}{}", self.prefix, self.name, self.suffix)
    }

    /// Record another prefix/suffix application; the new prefix goes
    /// outermost on the left, the new suffix outermost on the right.
    pub fn add_prefix_suffix(&self, prefix: &str, suffix: &str) -> Self {
        Self {
            prefix: format!("{prefix}{}", self.prefix),
            suffix: format!("{}{suffix}", self.suffix),
            ..self.clone()
        }
    }

    /// Same gvk, original name and a compatible namespace.
    ///
    /// A missing namespace on either side is compatible with any namespace.
    pub fn original_matches(&self, other: &ResId) -> bool {
        self.gvk == other.gvk
            && self.name == other.name
            && namespaces_compatible(self.namespace(), other.namespace())
    }

    /// Same gvk, current name and namespace.
    pub fn current_matches(&self, other: &ResId) -> bool {
        self.gvk == other.gvk
            && self.current_name() == other.current_name()
            && self.namespace == other.namespace
    }
}

impl fmt::Display for ResId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.gvk)?;
        if let Some(ns) = &self.namespace {
            write!(f, "{ns}/")?;
        }
        write!(f, "{}", self.name)?;
        if !self.prefix.is_empty() || !self.suffix.is_empty() {
            write!(f, " (as {})", self.current_name())?;
        }
        Ok(())
    }
}

/// Namespaces are compatible when equal or when either is unset.
pub(crate) fn namespaces_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}
