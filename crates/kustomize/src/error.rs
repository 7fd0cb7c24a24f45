// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for kustomize operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience Result type with kustomize Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a customized resource map.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// No directive file found at a root
    #[error("No kustomization found in {0:?}")]
    #[diagnostic(
        code(kustomize::missing_directive),
        help("Create one of kustomization.yaml, kustomization.yml or Kustomization")
    )]
    MissingDirective(PathBuf),

    /// Failed to read a file through the loader
    #[error("cannot read file {path:?}")]
    #[diagnostic(code(kustomize::load_failed))]
    LoadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// A path resolved outside of the loader sandbox
    #[error("Path {path:?} escapes the sandbox root {root:?}")]
    #[diagnostic(
        code(kustomize::loader_escape),
        help("Only files and bases below the sandbox root may be referenced")
    )]
    LoaderEscape { path: PathBuf, root: PathBuf },

    /// A base is already being accumulated higher up the stack
    #[error("Cyclic base detected: {0:?}")]
    #[diagnostic(
        code(kustomize::cyclic_base),
        help("Remove the circular reference between your bases")
    )]
    CyclicBase(PathBuf),

    /// Invalid YAML in a directive, resource or configuration file
    #[error("Invalid YAML in {path:?}: {error}")]
    #[diagnostic(code(kustomize::invalid_yaml))]
    InvalidYaml {
        path: PathBuf,
        #[source]
        error: serde_yaml::Error,
    },

    /// The directive has a top-level field this engine does not know
    #[error("Unknown field in kustomization: {0}")]
    #[diagnostic(code(kustomize::unknown_directive_field))]
    UnknownDirectiveField(String),

    /// The directive is structurally invalid
    #[error("Invalid kustomization: {0}")]
    #[diagnostic(code(kustomize::invalid_directive))]
    InvalidDirective(String),

    /// A resource document lacks its identity fields
    #[error("Invalid resource: {0}")]
    #[diagnostic(
        code(kustomize::invalid_resource),
        help("Every resource needs apiVersion, kind and metadata.name")
    )]
    InvalidResource(String),

    /// Two resources collide on their current identity
    #[error("Duplicate resource: {0}")]
    #[diagnostic(code(kustomize::duplicate_resource))]
    DuplicateResource(String),

    /// A merge or replace found nothing to merge into
    #[error("No existing resource matches {0} for merge or replace")]
    #[diagnostic(code(kustomize::merge_target_missing))]
    MergeTargetMissing(String),

    /// A generator source could not be parsed
    #[error("Invalid generator source: {0}")]
    #[diagnostic(code(kustomize::invalid_generator_source))]
    InvalidGeneratorSource(String),

    /// A generator command ran past its deadline
    #[error("command {command:?} did not finish within {seconds}s and was killed")]
    #[diagnostic(code(kustomize::generator_timeout))]
    GeneratorTimeout { command: String, seconds: u64 },

    /// A generator command exited unsuccessfully
    #[error("command {command:?} failed ({status}): {stderr}")]
    #[diagnostic(code(kustomize::command_failed))]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The invocation was cancelled while a command was running
    #[error("command {0:?} was cancelled and killed")]
    #[diagnostic(code(kustomize::cancelled))]
    Cancelled(String),

    /// Adding a label would overwrite a different existing value
    #[error("Label {key:?} on {resource} is {existing:?}, refusing to set {value:?}")]
    #[diagnostic(code(kustomize::label_conflict))]
    LabelConflict {
        resource: String,
        key: String,
        existing: String,
        value: String,
    },

    /// Adding an annotation would overwrite a different existing value
    #[error("Annotation {key:?} on {resource} is {existing:?}, refusing to set {value:?}")]
    #[diagnostic(code(kustomize::annotation_conflict))]
    AnnotationConflict {
        resource: String,
        key: String,
        existing: String,
        value: String,
    },

    /// A field path could not be parsed or walked
    #[error("Invalid field path {path:?}: {reason}")]
    #[diagnostic(code(kustomize::invalid_field_path))]
    InvalidFieldPath { path: String, reason: String },

    /// A patch names a resource that is not in the map
    #[error("Patch target not found: {0}")]
    #[diagnostic(
        code(kustomize::patch_target_missing),
        help("Patches address resources by their original group, version, kind and name")
    )]
    PatchTargetMissing(String),

    /// A JSON patch `test` operation did not hold
    #[error("JSON patch test failed on {target}: {detail}")]
    #[diagnostic(code(kustomize::patch_test_failed))]
    PatchTestFailed { target: String, detail: String },

    /// Any other failure while applying a patch
    #[error("Failed to patch {target}: {detail}")]
    #[diagnostic(code(kustomize::patch_failed))]
    PatchFailed { target: String, detail: String },

    /// Two vars share a name but differ otherwise
    #[error("Var {name:?} is declared more than once with different definitions")]
    #[diagnostic(
        code(kustomize::var_collision),
        help("Rename one of the vars or make the declarations identical")
    )]
    VarCollision { name: String },

    /// A `$(NAME)` reference has no declared var
    #[error("Unresolved variable reference $({0})")]
    #[diagnostic(code(kustomize::var_unresolved))]
    VarUnresolved(String),

    /// No resource matches a var's object reference
    #[error("Var {name:?} references {target}, which was not found")]
    #[diagnostic(code(kustomize::var_target_missing))]
    VarTargetMissing { name: String, target: String },

    /// More than one resource matches a var's object reference
    #[error("Var {name:?} references {target}, which matches {count} resources")]
    #[diagnostic(code(kustomize::var_target_ambiguous))]
    VarTargetAmbiguous {
        name: String,
        target: String,
        count: usize,
    },

    /// A var's field path resolved to a mapping, sequence or null
    #[error("Var {name:?} resolves {path:?} to a non-scalar value")]
    #[diagnostic(code(kustomize::var_value_not_scalar))]
    VarValueNotScalar { name: String, path: String },

    /// JSON error passthrough
    #[error(transparent)]
    #[diagnostic(code(kustomize::json_error))]
    Json(#[from] serde_json::Error),

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(kustomize::io_error))]
    Io(#[from] std::io::Error),
}
