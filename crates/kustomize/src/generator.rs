// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! ConfigMap and Secret generators.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};

use crate::kustomization::{ConfigMapArgs, GeneratorArgs, GeneratorOptions, SecretArgs};
use crate::{CommandRunner, Error, Kustomization, Loader, Resource};

#[cfg(test)]
#[path = "./generator_test.rs"]
mod generator_test;

const DEFAULT_SECRET_TYPE: &str = "Opaque";

/// Produces resources from the generator entries of one directive.
///
/// File and env sources are read through the directive's loader, and secret
/// commands run in the loader's root.
#[derive(Debug)]
pub struct Generator<'a> {
    loader: &'a dyn Loader,
    runner: &'a dyn CommandRunner,
    options: GeneratorOptions,
}

impl<'a> Generator<'a> {
    pub fn new(loader: &'a dyn Loader, runner: &'a dyn CommandRunner, options: GeneratorOptions) -> Self {
        Self {
            loader,
            runner,
            options,
        }
    }

    /// Run every config map generator, then every secret generator.
    pub fn generate(&self, kustomization: &Kustomization) -> crate::Result<Vec<Resource>> {
        let mut generated = Vec::new();
        for args in &kustomization.config_map_generator {
            generated.push(self.config_map(args)?);
        }
        for args in &kustomization.secret_generator {
            generated.push(self.secret(args)?);
        }
        Ok(generated)
    }

    pub fn config_map(&self, args: &ConfigMapArgs) -> crate::Result<Resource> {
        let pairs = self.collect(&args.generator)?;

        let mut data = Map::new();
        let mut binary = Map::new();
        for (key, bytes) in pairs {
            match String::from_utf8(bytes) {
                Ok(text) => {
                    data.insert(key, Value::String(text));
                }
                Err(err) => {
                    binary.insert(key, Value::String(STANDARD.encode(err.into_bytes())));
                }
            }
        }

        let mut content = self.header("ConfigMap", &args.generator);
        if !data.is_empty() {
            content.insert("data".to_string(), Value::Object(data));
        }
        if !binary.is_empty() {
            content.insert("binaryData".to_string(), Value::Object(binary));
        }
        tracing::debug!(name = %args.generator.name, "generated config map");
        self.finish(content, &args.generator)
    }

    pub fn secret(&self, args: &SecretArgs) -> crate::Result<Resource> {
        let mut pairs = self.collect(&args.generator)?;
        let timeout = args
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.runner.default_timeout());
        for (key, command) in &args.commands {
            tracing::debug!(%key, %command, "running secret command");
            let stdout = self.runner.run(command, self.loader.root(), timeout)?;
            pairs.push((key.clone(), stdout));
        }
        check_unique(&args.generator.name, &pairs)?;

        let data: Map<String, Value> = pairs
            .into_iter()
            .map(|(key, bytes)| (key, Value::String(STANDARD.encode(bytes))))
            .collect();

        let mut content = self.header("Secret", &args.generator);
        let secret_type = args.secret_type.as_deref().unwrap_or(DEFAULT_SECRET_TYPE);
        content.insert("type".to_string(), Value::String(secret_type.to_string()));
        if !data.is_empty() {
            content.insert("data".to_string(), Value::Object(data));
        }
        tracing::debug!(name = %args.generator.name, "generated secret");
        self.finish(content, &args.generator)
    }

    /// `apiVersion`, `kind` and `metadata` of a generated resource.
    fn header(&self, kind: &str, args: &GeneratorArgs) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), Value::String(args.name.clone()));
        if let Some(ns) = args.namespace.as_ref().filter(|ns| !ns.is_empty()) {
            metadata.insert("namespace".to_string(), Value::String(ns.clone()));
        }
        if !self.options.labels.is_empty() {
            metadata.insert("labels".to_string(), string_map(&self.options.labels));
        }
        if !self.options.annotations.is_empty() {
            metadata.insert("annotations".to_string(), string_map(&self.options.annotations));
        }

        let mut content = Map::new();
        content.insert("apiVersion".to_string(), Value::String("v1".to_string()));
        content.insert("kind".to_string(), Value::String(kind.to_string()));
        content.insert("metadata".to_string(), Value::Object(metadata));
        content
    }

    fn finish(&self, content: Map<String, Value>, args: &GeneratorArgs) -> crate::Result<Resource> {
        let mut res = Resource::from_map(content)?.with_behavior(args.behavior);
        res.set_needs_hash(!self.options.disable_name_suffix_hash);
        Ok(res)
    }

    /// Key/value pairs from literals, env files and files, in that order.
    fn collect(&self, args: &GeneratorArgs) -> crate::Result<Vec<(String, Vec<u8>)>> {
        let mut pairs = Vec::new();
        for literal in &args.literals {
            let (key, value) = parse_literal(literal)?;
            pairs.push((key, value.into_bytes()));
        }
        for path in &args.envs {
            let bytes = self.loader.load(path)?;
            let text = String::from_utf8(bytes).map_err(|_| {
                Error::InvalidGeneratorSource(format!("env file {path} is not valid UTF-8"))
            })?;
            for (key, value) in parse_env(&text, path)? {
                pairs.push((key, value.into_bytes()));
            }
        }
        for spec in &args.files {
            let (key, path) = parse_file_source(spec)?;
            pairs.push((key, self.loader.load(path)?));
        }
        check_unique(&args.name, &pairs)?;
        Ok(pairs)
    }
}

fn string_map(map: &std::collections::BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn check_unique(name: &str, pairs: &[(String, Vec<u8>)]) -> crate::Result<()> {
    let mut seen = BTreeSet::new();
    for (key, _) in pairs {
        if !seen.insert(key.as_str()) {
            return Err(Error::InvalidGeneratorSource(format!(
                "key {key:?} appears more than once in generator {name}"
            )));
        }
    }
    Ok(())
}

/// Split `KEY=VALUE`, removing one pair of matching quotes around the value.
pub fn parse_literal(literal: &str) -> crate::Result<(String, String)> {
    let (key, value) = literal.split_once('=').ok_or_else(|| {
        Error::InvalidGeneratorSource(format!("literal {literal:?} is not of the form KEY=VALUE"))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidGeneratorSource(format!(
            "literal {literal:?} has an empty key"
        )));
    }
    Ok((key.to_string(), unquote(value).to_string()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parse `KEY=VALUE` lines, skipping blanks and `#` comments.
pub fn parse_env(text: &str, origin: &str) -> crate::Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            Error::InvalidGeneratorSource(format!(
                "{origin}:{}: expected KEY=VALUE, found {line:?}",
                number + 1
            ))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidGeneratorSource(format!(
                "{origin}:{}: empty key",
                number + 1
            )));
        }
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(pairs)
}

/// Split `[KEY=]path`; the key defaults to the file's base name.
pub fn parse_file_source(spec: &str) -> crate::Result<(String, &str)> {
    let (key, path) = match spec.split_once('=') {
        Some((key, path)) => (key.trim().to_string(), path.trim()),
        None => {
            let path = spec.trim();
            let key = Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            (key, path)
        }
    };
    if key.is_empty() || path.is_empty() {
        return Err(Error::InvalidGeneratorSource(format!(
            "file source {spec:?} needs a key and a path"
        )));
    }
    Ok((key, path))
}
