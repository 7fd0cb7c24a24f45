// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `kustomize build` command.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use kustomize::{Codec, FileSystemLoader, KustTarget, ShellCommandRunner, YamlCodec};
use miette::{IntoDiagnostic, Result, WrapErr};

/// Build the customized resources of a directive
#[derive(Debug, Args)]
pub struct CmdBuild {
    /// Directory holding the kustomization file
    #[clap(default_value = ".")]
    dir: PathBuf,

    /// Write the output to FILE instead of stdout
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Refuse to load files or bases outside of the sandbox directory
    #[clap(long, env = "KUSTOMIZE_SANDBOX")]
    sandbox: Option<PathBuf>,

    /// Timeout in seconds for generator commands without their own
    #[clap(long, env = "KUSTOMIZE_COMMAND_TIMEOUT")]
    timeout: Option<u64>,
}

impl CmdBuild {
    pub fn run(&mut self) -> Result<i32> {
        let loader = match &self.sandbox {
            Some(sandbox) => FileSystemLoader::with_sandbox(&self.dir, sandbox)?,
            None => FileSystemLoader::new(&self.dir)?,
        };
        let mut runner = ShellCommandRunner::new();
        if let Some(secs) = self.timeout {
            runner = runner.with_default_timeout(Duration::from_secs(secs));
        }
        let codec = YamlCodec;

        let target = KustTarget::new(Box::new(loader), &runner, &codec)?;
        let map = target.make_customized_res_map()?;
        tracing::info!(resources = map.len(), "build complete");
        let yaml = codec.emit(&map.as_ordered_slice())?;

        match &self.output {
            Some(path) => std::fs::write(path, &yaml)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?,
            None => {
                use std::io::Write;
                std::io::stdout()
                    .write_all(&yaml)
                    .into_diagnostic()
                    .wrap_err("Failed to write to stdout")?;
            }
        }
        Ok(0)
    }
}
