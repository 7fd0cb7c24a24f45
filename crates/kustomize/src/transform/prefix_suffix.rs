// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use super::Transformer;
use crate::ResourceMap;

#[cfg(test)]
#[path = "./prefix_suffix_test.rs"]
mod prefix_suffix_test;

/// Kinds whose names are dictated by their content and never renamed.
const SKIPPED_KINDS: &[&str] = &["CustomResourceDefinition"];

/// Prepends a prefix and appends a suffix to every resource name.
#[derive(Debug, Clone, Default)]
pub struct PrefixSuffixTransformer {
    prefix: String,
    suffix: String,
}

impl PrefixSuffixTransformer {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }
}

impl Transformer for PrefixSuffixTransformer {
    fn transform(&self, map: ResourceMap) -> crate::Result<ResourceMap> {
        if self.prefix.is_empty() && self.suffix.is_empty() {
            return Ok(map);
        }
        let mut out = ResourceMap::new();
        for (id, mut res) in map {
            if SKIPPED_KINDS.contains(&id.gvk().kind.as_str()) {
                out.insert(id, res);
                continue;
            }
            let name = format!("{}{}{}", self.prefix, res.name(), self.suffix);
            tracing::debug!(from = %res.name(), to = %name, "renaming");
            res.set_name(name);
            out.insert(id.add_prefix_suffix(&self.prefix, &self.suffix), res);
        }
        Ok(out)
    }
}
