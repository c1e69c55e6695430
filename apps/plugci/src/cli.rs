//! Command line interface definition

use clap::{Parser, Subcommand};
use plugci_builder::RootHandling;
use std::path::PathBuf;

/// plugci - build and analyze PocketMine plugin packages
#[derive(Parser)]
#[command(name = "plugci")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and analyze PocketMine plugin packages")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output the report in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose logging; sandboxes and scratch files are left for inspection
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Build a plugin archive from a repository zipball
    Build(BuildArgs),
}

#[derive(clap::Args)]
pub struct BuildArgs {
    /// Repository zipball to build from
    pub zipball: PathBuf,

    /// Project subdirectory inside the repository
    #[arg(long, value_name = "PATH")]
    pub project_path: Option<String>,

    /// Project name, used to pick the entry out of the CI manifest
    #[arg(long, value_name = "NAME", default_value = "plugin")]
    pub project_name: String,

    /// Repository as `owner/name`, used for same-repository virions
    #[arg(long, value_name = "OWNER/NAME")]
    pub repo: Option<String>,

    /// CI manifest (`.poggit.yml`) declaring the project
    #[arg(long, value_name = "FILE")]
    pub poggit_yml: Option<PathBuf>,

    /// Write the assembled archive here
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Skip static analysis regardless of configuration
    #[arg(long)]
    pub no_analysis: bool,

    /// Strip the zipball's single top-level directory whatever its name
    #[arg(long, conflicts_with = "keep_root")]
    pub strip_root: bool,

    /// Keep the zipball's top-level directory even if it looks like a wrapper
    #[arg(long)]
    pub keep_root: bool,
}

impl BuildArgs {
    /// How the zipball's top-level directory is treated
    #[must_use]
    pub fn root_handling(&self) -> RootHandling {
        if self.strip_root {
            RootHandling::Strip
        } else if self.keep_root {
            RootHandling::Keep
        } else {
            RootHandling::Detect
        }
    }
}
