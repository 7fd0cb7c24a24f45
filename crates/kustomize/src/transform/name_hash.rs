// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use super::Transformer;
use crate::{ResourceMap, content_hash};

#[cfg(test)]
#[path = "./name_hash_test.rs"]
mod name_hash_test;

/// Appends `-<content hash>` to the name of every resource still waiting
/// for one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameHashTransformer;

impl Transformer for NameHashTransformer {
    fn transform(&self, map: ResourceMap) -> crate::Result<ResourceMap> {
        let mut out = ResourceMap::new();
        for (id, mut res) in map {
            if !res.needs_hash() {
                out.insert(id, res);
                continue;
            }
            let suffix = format!("-{}", content_hash(&res)?);
            let name = format!("{}{suffix}", res.name());
            tracing::debug!(resource = %id, %name, "appending content hash");
            res.set_name(name);
            res.set_needs_hash(false);
            out.insert(id.add_prefix_suffix("", &suffix), res);
        }
        Ok(out)
    }
}
