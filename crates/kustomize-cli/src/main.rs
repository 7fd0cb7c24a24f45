// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! kustomize - Declarative Resource Customization CLI

use clap::{Parser, Subcommand};
use miette::Result;

mod cmd_build;
mod cmd_vars;

use cmd_build::CmdBuild;
use cmd_vars::CmdVars;

#[derive(Parser)]
#[clap(
    name = "kustomize",
    about = "Declarative Resource Customization",
    version,
    long_about = "Build customized cluster manifests from layered kustomization directives"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build the customized resources of a directive
    Build(CmdBuild),

    /// Display the vars declared across a directive tree
    Vars(CmdVars),
}

impl Opt {
    fn run(self) -> Result<i32> {
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        match self.cmd {
            Command::Build(mut cmd) => cmd.run(),
            Command::Vars(mut cmd) => cmd.run(),
        }
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run()?;
    std::process::exit(code);
}
