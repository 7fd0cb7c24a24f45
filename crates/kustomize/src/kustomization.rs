// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Directive parsing and data types for kustomization files.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Behavior, Error, Loader, Var};

#[cfg(test)]
#[path = "./kustomization_test.rs"]
mod kustomization_test;

/// File names searched, in order, when loading a directive from a root.
pub const KUSTOMIZATION_FILENAMES: [&str; 3] =
    ["kustomization.yaml", "kustomization.yml", "Kustomization"];

/// Top-level fields a directive may contain.
const KNOWN_FIELDS: &[&str] = &[
    "apiVersion",
    "kind",
    "resources",
    "bases",
    "namePrefix",
    "nameSuffix",
    "namespace",
    "commonLabels",
    "commonAnnotations",
    "configMapGenerator",
    "secretGenerator",
    "generatorOptions",
    "patchesStrategicMerge",
    "patchesJson6902",
    "images",
    "vars",
    "configurations",
];

const KUSTOMIZATION_KIND: &str = "Kustomization";

/// Inputs shared by config map and secret generators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorArgs {
    /// Name of the generated resource, before prefix, suffix and hash.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// How the generated resource combines with an existing one.
    #[serde(default)]
    pub behavior: Behavior,

    /// `KEY=VALUE` pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub literals: Vec<String>,

    /// Files of `KEY=VALUE` lines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<String>,

    /// `[KEY=]path` specs; the key defaults to the file's base name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

/// A `configMapGenerator` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigMapArgs {
    #[serde(flatten)]
    pub generator: GeneratorArgs,
}

/// A `secretGenerator` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretArgs {
    #[serde(flatten)]
    pub generator: GeneratorArgs,

    /// Keys whose values are the stdout of a shell command.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<String, String>,

    /// Secret `type`; `Opaque` when unset.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,

    /// Per-command timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// Options applied to every generator of a directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorOptions {
    #[serde(default)]
    pub disable_name_suffix_hash: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Resource addressed by a JSON 6902 patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PatchTarget {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A `patchesJson6902` entry: a target plus a patch file or inline patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PatchJson6902 {
    pub target: PatchTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

/// An `images` entry overriding the name, tag or digest of a container image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// A parsed kustomization directive.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kustomization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Resource files, or directories holding nested directives.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,

    /// Directories holding base directives (deprecated in favor of `resources`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name_prefix: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name_suffix: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub common_labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub common_annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_map_generator: Vec<ConfigMapArgs>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_generator: Vec<SecretArgs>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_options: Option<GeneratorOptions>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches_strategic_merge: Vec<String>,

    #[serde(default, rename = "patchesJson6902", skip_serializing_if = "Vec::is_empty")]
    pub patches_json6902: Vec<PatchJson6902>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<Var>,

    /// Files extending the transformer field tables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configurations: Vec<String>,
}

impl Kustomization {
    /// Parse a directive from YAML; `origin` names the source in errors.
    pub fn from_yaml(yaml: &str, origin: &Path) -> crate::Result<Self> {
        let invalid = |error| Error::InvalidYaml {
            path: origin.to_path_buf(),
            error,
        };

        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        // Stage 1: inspect the raw document
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(invalid)?;
        let mapping = match &value {
            serde_yaml::Value::Null => return Ok(Self::default()),
            serde_yaml::Value::Mapping(mapping) => mapping,
            _ => {
                return Err(Error::InvalidDirective(format!(
                    "{} is not a mapping",
                    origin.display()
                )));
            }
        };
        for key in mapping.keys() {
            let key = key.as_str().ok_or_else(|| {
                Error::InvalidDirective(format!("non-string key {key:?}"))
            })?;
            if !KNOWN_FIELDS.contains(&key) {
                return Err(Error::UnknownDirectiveField(key.to_string()));
            }
        }

        // Stage 2: typed deserialization
        let kustomization: Self = serde_yaml::from_value(value).map_err(invalid)?;
        kustomization.validate()?;
        Ok(kustomization)
    }

    /// Load the directive at the loader's root.
    pub fn load(loader: &dyn Loader) -> crate::Result<Self> {
        for filename in KUSTOMIZATION_FILENAMES {
            let bytes = match loader.load(filename) {
                Ok(bytes) => bytes,
                Err(Error::LoadFailed { error, .. })
                    if error.kind() == std::io::ErrorKind::NotFound =>
                {
                    continue;
                }
                Err(err) => return Err(err),
            };
            let origin = loader.root().join(filename);
            let yaml = String::from_utf8(bytes).map_err(|_| {
                Error::InvalidDirective(format!("{} is not valid UTF-8", origin.display()))
            })?;
            tracing::debug!(path = %origin.display(), "loaded kustomization");
            return Self::from_yaml(&yaml, &origin);
        }
        Err(Error::MissingDirective(loader.root().to_path_buf()))
    }

    /// Check constraints that deserialization cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(kind) = &self.kind {
            if kind != KUSTOMIZATION_KIND {
                return Err(Error::InvalidDirective(format!(
                    "kind must be {KUSTOMIZATION_KIND}, found {kind}"
                )));
            }
        }
        let generator_names = self
            .config_map_generator
            .iter()
            .map(|args| &args.generator.name)
            .chain(self.secret_generator.iter().map(|args| &args.generator.name));
        for name in generator_names {
            if name.is_empty() {
                return Err(Error::InvalidDirective(
                    "every generator needs a name".to_string(),
                ));
            }
        }
        for entry in &self.patches_json6902 {
            if entry.path.is_some() == entry.patch.is_some() {
                return Err(Error::InvalidDirective(format!(
                    "patchesJson6902 entry for {} needs exactly one of path or patch",
                    entry.target.name
                )));
            }
        }
        Ok(())
    }

    /// Generator options, or the defaults when the directive sets none.
    pub fn generator_options(&self) -> GeneratorOptions {
        self.generator_options.clone().unwrap_or_default()
    }
}
