// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `kustomize vars` command.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use colored::Colorize;
use kustomize::{FileSystemLoader, KustTarget, ShellCommandRunner, Var, VarSet, YamlCodec};
use miette::{IntoDiagnostic, Result};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Format {
    #[default]
    Table,
    Yaml,
}

/// Display the vars declared across a directive tree
#[derive(Debug, Args)]
pub struct CmdVars {
    /// Directory holding the kustomization file
    #[clap(default_value = ".")]
    dir: PathBuf,

    /// Output format
    #[clap(long, value_enum, default_value_t)]
    format: Format,
}

impl CmdVars {
    pub fn run(&mut self) -> Result<i32> {
        let loader = FileSystemLoader::new(&self.dir)?;
        let runner = ShellCommandRunner::new();
        let target = KustTarget::new(Box::new(loader), &runner, &YamlCodec)?;
        let vars = target.get_all_vars()?;

        match self.format {
            Format::Table => self.show_table(&vars),
            Format::Yaml => self.show_yaml(vars)?,
        }
        Ok(0)
    }

    fn show_table(&self, vars: &VarSet) {
        println!("{}", "Declared Vars:".bold());
        println!();

        if vars.is_empty() {
            println!("  {}", "(no vars)".dimmed());
        }
        for (i, var) in vars.iter().enumerate() {
            println!(
                "  {}. {} = {} {}",
                i + 1,
                var.name.cyan(),
                var.obj_ref.to_string().green(),
                var.field_ref.field_path.dimmed()
            );
        }

        println!();
        println!("Total: {} var(s)", vars.len());
    }

    fn show_yaml(&self, vars: VarSet) -> Result<()> {
        let vars: Vec<Var> = vars.into_iter().collect();
        let yaml = serde_yaml::to_string(&vars).into_diagnostic()?;
        print!("{yaml}");
        Ok(())
    }
}
