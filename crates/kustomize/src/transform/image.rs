// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

use super::Transformer;
use crate::{FieldSpec, Image, ResourceMap};

#[cfg(test)]
#[path = "./image_test.rs"]
mod image_test;

/// Rewrites container image references whose name matches an override.
#[derive(Debug, Clone)]
pub struct ImageTransformer {
    images: Vec<Image>,
    specs: Vec<FieldSpec>,
}

impl ImageTransformer {
    pub fn new(images: Vec<Image>, specs: Vec<FieldSpec>) -> Self {
        Self { images, specs }
    }

    fn rewrite(&self, reference: &str) -> Option<String> {
        let (name, tag, digest) = split_image(reference);
        let image = self.images.iter().find(|image| image.name == name)?;
        let name = image.new_name.as_deref().unwrap_or(name);
        let rewritten = match (&image.digest, &image.new_tag) {
            (Some(digest), _) => format!("{name}@{digest}"),
            (None, Some(tag)) => format!("{name}:{tag}"),
            (None, None) => match (tag, digest) {
                (_, Some(digest)) => format!("{name}@{digest}"),
                (Some(tag), None) => format!("{name}:{tag}"),
                (None, None) => name.to_string(),
            },
        };
        Some(rewritten)
    }
}

/// Split `name[:tag][@digest]`, leaving registry ports in the name.
pub(crate) fn split_image(reference: &str) -> (&str, Option<&str>, Option<&str>) {
    let (rest, digest) = match reference.split_once('@') {
        Some((rest, digest)) => (rest, Some(digest)),
        None => (reference, None),
    };
    let name_start = rest.rfind('/').map_or(0, |i| i + 1);
    match rest[name_start..].rfind(':') {
        Some(i) => {
            let colon = name_start + i;
            (&rest[..colon], Some(&rest[colon + 1..]), digest)
        }
        None => (rest, None, digest),
    }
}

impl Transformer for ImageTransformer {
    fn transform(&self, mut map: ResourceMap) -> crate::Result<ResourceMap> {
        if self.images.is_empty() {
            return Ok(map);
        }
        for (id, res) in map.iter_mut() {
            for spec in self.specs.iter().filter(|spec| spec.applies_to(id.gvk())) {
                spec.apply(res.content_mut(), &mut |value| {
                    if let Some(rewritten) = value.as_str().and_then(|s| self.rewrite(s)) {
                        tracing::debug!(resource = %id, image = %rewritten, "updating image");
                        *value = Value::String(rewritten);
                    }
                    Ok(())
                })?;
            }
        }
        Ok(map)
    }
}
