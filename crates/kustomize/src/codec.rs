// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Parsing and emitting resource documents.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Resource};

#[cfg(test)]
#[path = "./codec_test.rs"]
mod codec_test;

/// Converts between bytes and resources.
///
/// Implementations must preserve field order and unknown fields.
pub trait Codec: std::fmt::Debug {
    /// Parse every resource in `bytes`; `origin` names the source for errors.
    fn parse(&self, bytes: &[u8], origin: &Path) -> crate::Result<Vec<Resource>>;

    /// Serialize resources in the given order.
    fn emit(&self, resources: &[&Resource]) -> crate::Result<Vec<u8>>;
}

/// Multi-document YAML codec.
///
/// Empty documents are skipped and `kind: List` documents are expanded into
/// their items.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn parse(&self, bytes: &[u8], origin: &Path) -> crate::Result<Vec<Resource>> {
        let invalid = |error| Error::InvalidYaml {
            path: origin.to_path_buf(),
            error,
        };

        let mut resources = Vec::new();
        for document in serde_yaml::Deserializer::from_slice(bytes) {
            let value = Value::deserialize(document).map_err(invalid)?;
            match value {
                Value::Null => continue,
                Value::Object(mut map) if is_list(&map) => {
                    let items = match map.remove("items") {
                        Some(Value::Array(items)) => items,
                        Some(Value::Null) | None => Vec::new(),
                        Some(_) => {
                            return Err(Error::InvalidResource(format!(
                                "{}: List items must be a sequence",
                                origin.display()
                            )));
                        }
                    };
                    for item in items {
                        resources.push(Resource::from_value(item)?);
                    }
                }
                other => resources.push(Resource::from_value(other)?),
            }
        }
        tracing::debug!(origin = %origin.display(), count = resources.len(), "parsed resources");
        Ok(resources)
    }

    fn emit(&self, resources: &[&Resource]) -> crate::Result<Vec<u8>> {
        let mut out = String::new();
        for (i, res) in resources.iter().enumerate() {
            if i > 0 {
                out.push_str("---\n");
            }
            let doc = serde_yaml::to_string(res.content()).map_err(|error| Error::InvalidYaml {
                path: PathBuf::from(res.name()),
                error,
            })?;
            out.push_str(&doc);
        }
        Ok(out.into_bytes())
    }
}

fn is_list(map: &serde_json::Map<String, Value>) -> bool {
    map.get("kind").and_then(Value::as_str) == Some("List")
}
