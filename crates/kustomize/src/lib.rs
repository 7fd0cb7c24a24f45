// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! kustomize - Declarative Resource Customization
//!
//! This crate turns a tree of kustomization directives into one fully
//! customized set of cluster manifest documents.
//!
//! # Overview
//!
//! A directive names resource files and base directories, generators for
//! config maps and secrets, and cross-cutting customizations: name prefixes
//! and suffixes, a namespace, common labels and annotations, image
//! overrides and patches. Bases are built first and customized by the
//! directive that includes them. Generated names receive a content hash,
//! references to renamed resources are updated, and declared vars are
//! substituted into every string.
//!
//! # Example
//!
//! ```yaml
//! # kustomization.yaml
//! namePrefix: prod-
//! namespace: prod
//! commonLabels:
//!   app: web
//!
//! # Files and directories holding nested directives
//! resources:
//!   - ../base
//!   - ingress.yaml
//!
//! configMapGenerator:
//!   - name: settings
//!     literals:
//!       - MODE=fast
//!
//! images:
//!   - name: nginx
//!     newTag: "1.25"
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod fieldspec;
pub mod generator;
pub mod hash;
pub mod kustomization;
pub mod loader;
pub mod patch;
pub mod resid;
pub mod resmap;
pub mod resource;
pub mod runner;
pub mod target;
pub mod transform;
pub mod vars;

pub use codec::{Codec, YamlCodec};
pub use config::{NameReference, TransformerConfig};
pub use error::{Error, Result};
pub use fieldspec::FieldSpec;
pub use generator::Generator;
pub use hash::content_hash;
pub use kustomization::{
    ConfigMapArgs,
    GeneratorArgs,
    GeneratorOptions,
    Image,
    KUSTOMIZATION_FILENAMES,
    Kustomization,
    PatchJson6902,
    PatchTarget,
    SecretArgs,
};
pub use loader::{FileSystemLoader, Loader, MemoryLoader};
pub use resid::{Gvk, ResId};
pub use resmap::ResourceMap;
pub use resource::{Behavior, Resource};
pub use runner::{CancellationToken, CommandRunner, DEFAULT_COMMAND_TIMEOUT, ShellCommandRunner};
pub use target::KustTarget;
pub use transform::Transformer;
pub use vars::{FieldRef, ObjRef, Var, VarResolver, VarSet};
