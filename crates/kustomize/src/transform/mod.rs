// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Cross-cutting passes over a resource map.
//!
//! Each pass consumes a map and returns the transformed map. A pass that has
//! nothing to do returns its input unchanged.

mod image;
mod labels;
mod name_hash;
mod name_reference;
mod namespace;
mod prefix_suffix;

pub use image::ImageTransformer;
pub use labels::{AnnotationTransformer, LabelTransformer};
pub use name_hash::NameHashTransformer;
pub use name_reference::NameReferenceTransformer;
pub use namespace::NamespaceTransformer;
pub use prefix_suffix::PrefixSuffixTransformer;

use crate::ResourceMap;

/// A single pass over a [`ResourceMap`].
pub trait Transformer: std::fmt::Debug {
    fn transform(&self, map: ResourceMap) -> crate::Result<ResourceMap>;
}

/// Run `transformers` in order, feeding each the output of the previous one.
pub fn apply_all(transformers: &[Box<dyn Transformer + '_>], map: ResourceMap) -> crate::Result<ResourceMap> {
    transformers
        .iter()
        .try_fold(map, |map, transformer| transformer.transform(map))
}
