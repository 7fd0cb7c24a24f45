// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Recursive accumulation of a directive tree into one resource map.

use std::path::PathBuf;

use crate::patch::{Json6902Patch, Json6902Transformer, StrategicMergeTransformer};
use crate::transform::{
    AnnotationTransformer,
    ImageTransformer,
    LabelTransformer,
    NameHashTransformer,
    NameReferenceTransformer,
    NamespaceTransformer,
    PrefixSuffixTransformer,
    Transformer,
    apply_all,
};
use crate::{
    Behavior,
    Codec,
    CommandRunner,
    Error,
    Generator,
    Kustomization,
    Loader,
    ResourceMap,
    TransformerConfig,
    VarResolver,
    VarSet,
};

#[cfg(test)]
#[path = "./target_test.rs"]
mod target_test;

/// A directive together with the collaborators needed to build it.
///
/// Bases are built by targets derived from this one, each with a loader
/// rooted at the base directory.
#[derive(Debug)]
pub struct KustTarget<'a> {
    /// The parsed directive at the loader's root.
    pub kustomization: Kustomization,
    loader: Box<dyn Loader>,
    runner: &'a dyn CommandRunner,
    codec: &'a dyn Codec,
}

impl<'a> KustTarget<'a> {
    /// Load the directive at the loader's root.
    pub fn new(
        loader: Box<dyn Loader>,
        runner: &'a dyn CommandRunner,
        codec: &'a dyn Codec,
    ) -> crate::Result<Self> {
        let kustomization = Kustomization::load(loader.as_ref())?;
        Ok(Self {
            kustomization,
            loader,
            runner,
            codec,
        })
    }

    pub fn loader(&self) -> &dyn Loader {
        self.loader.as_ref()
    }

    /// Build the fully customized map: accumulate the directive tree, hash
    /// generated names, update references to them and substitute vars.
    pub fn make_customized_res_map(&self) -> crate::Result<ResourceMap> {
        let mut stack = Vec::new();
        let map = self.build_map(&mut stack)?;
        tracing::info!(resources = map.len(), "accumulated directive tree");

        let config = self.collect_config(&mut Vec::new())?;
        let finish: Vec<Box<dyn Transformer>> = vec![
            Box::new(NameHashTransformer),
            Box::new(NameReferenceTransformer::new(config.name_reference)),
        ];
        let map = apply_all(&finish, map)?;

        let vars = self.get_all_vars()?;
        tracing::info!(vars = vars.len(), "resolving vars");
        VarResolver::new(vars).transform(map)
    }

    /// Every var declared by this directive and its bases.
    pub fn get_all_vars(&self) -> crate::Result<VarSet> {
        let mut stack = Vec::new();
        self.collect_vars(&mut stack)
    }

    /// Accumulate this directive and its bases, then run generators,
    /// transformers and patches over the result.
    #[tracing::instrument(skip_all, fields(root = %self.loader.root().display()))]
    pub fn build_map(&self, stack: &mut Vec<PathBuf>) -> crate::Result<ResourceMap> {
        self.descend(stack, |target, stack| target.accumulate(stack))
    }

    /// Run `f` with this root pushed on the descent stack.
    fn descend<T>(
        &self,
        stack: &mut Vec<PathBuf>,
        f: impl FnOnce(&Self, &mut Vec<PathBuf>) -> crate::Result<T>,
    ) -> crate::Result<T> {
        let root = self.loader.root().to_path_buf();
        if stack.contains(&root) {
            return Err(Error::CyclicBase(root));
        }
        stack.push(root);
        let result = f(self, stack);
        stack.pop();
        result
    }

    /// Targets for `bases` and for directory entries of `resources`, in order.
    fn sub_targets(&self) -> crate::Result<Vec<KustTarget<'a>>> {
        let dirs = self.kustomization.bases.iter().chain(
            self.kustomization
                .resources
                .iter()
                .filter(|entry| self.loader.is_dir(entry)),
        );
        dirs.map(|dir| {
            let loader = self.loader.new_loader(dir)?;
            KustTarget::new(loader, self.runner, self.codec)
        })
        .collect()
    }

    fn accumulate(&self, stack: &mut Vec<PathBuf>) -> crate::Result<ResourceMap> {
        let k = &self.kustomization;
        let mut accum = ResourceMap::new();

        for base in self.sub_targets()? {
            let map = base.build_map(stack)?;
            accum.merge_from(map)?;
        }
        for entry in k.resources.iter().filter(|entry| !self.loader.is_dir(entry)) {
            let bytes = self.loader.load(entry)?;
            let origin = self.loader.root().join(entry);
            for res in self.codec.parse(&bytes, &origin)? {
                accum.add(res)?;
            }
        }

        let generator = Generator::new(self.loader.as_ref(), self.runner, k.generator_options());
        for res in generator.generate(k)? {
            match res.behavior() {
                Behavior::Create => accum.add(res)?,
                Behavior::Merge | Behavior::Replace => accum.merge_one(res.initial_id(), res)?,
            }
        }

        let config = self.transformer_config()?;
        let strategic = self.strategic_patches()?;
        let json = self.json_patches()?;
        let pipeline: Vec<Box<dyn Transformer>> = vec![
            Box::new(PrefixSuffixTransformer::new(&k.name_prefix, &k.name_suffix)),
            Box::new(NamespaceTransformer::new(k.namespace.clone().unwrap_or_default())),
            Box::new(LabelTransformer::new(k.common_labels.clone(), config.common_labels)),
            Box::new(AnnotationTransformer::new(
                k.common_annotations.clone(),
                config.common_annotations,
            )),
            Box::new(ImageTransformer::new(k.images.clone(), config.images)),
            Box::new(StrategicMergeTransformer::new(strategic)),
            Box::new(Json6902Transformer::new(json)),
            Box::new(NameReferenceTransformer::new(config.name_reference)),
        ];
        let map = apply_all(&pipeline, accum)?;
        tracing::debug!(resources = map.len(), "built directive");
        Ok(map)
    }

    fn transformer_config(&self) -> crate::Result<TransformerConfig> {
        TransformerConfig::load(self.loader.as_ref(), &self.kustomization.configurations)
    }

    fn strategic_patches(&self) -> crate::Result<Vec<crate::Resource>> {
        let mut patches = Vec::new();
        for path in &self.kustomization.patches_strategic_merge {
            let bytes = self.loader.load(path)?;
            patches.extend(self.codec.parse(&bytes, &self.loader.root().join(path))?);
        }
        Ok(patches)
    }

    fn json_patches(&self) -> crate::Result<Vec<Json6902Patch>> {
        self.kustomization
            .patches_json6902
            .iter()
            .map(|entry| {
                let text = match (&entry.path, &entry.patch) {
                    (Some(path), _) => String::from_utf8_lossy(&self.loader.load(path)?).into_owned(),
                    (None, Some(inline)) => inline.clone(),
                    (None, None) => String::new(),
                };
                Json6902Patch::parse(entry.target.clone(), &text)
            })
            .collect()
    }

    /// The transformer tables of this directive merged with those of every base.
    fn collect_config(&self, stack: &mut Vec<PathBuf>) -> crate::Result<TransformerConfig> {
        self.descend(stack, |target, stack| {
            let mut config = target.transformer_config()?;
            for base in target.sub_targets()? {
                config.merge(base.collect_config(stack)?);
            }
            Ok(config)
        })
    }

    fn collect_vars(&self, stack: &mut Vec<PathBuf>) -> crate::Result<VarSet> {
        self.descend(stack, |target, stack| {
            let mut vars = VarSet::new();
            for base in target.sub_targets()? {
                vars.absorb_all(base.collect_vars(stack)?)?;
            }
            vars.absorb_all(target.kustomization.vars.iter().cloned())?;
            Ok(vars)
        })
    }
}
