//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use harvest::core::OsFamily;

/// Harvest - collects the native runtime closure of vcpkg packages
#[derive(Parser)]
#[command(name = "harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to Harvest.toml (defaults to searching upward from the current directory)
    #[arg(long, global = true, env = "HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harvest libraries into the output directory
    Run(RunArgs),

    /// Print deployment plans as JSON without deploying
    Plan(PlanArgs),

    /// List the shared libraries a binary links against
    Scan(ScanArgs),

    /// Show vcpkg metadata for an installed package
    Info(InfoArgs),
}

/// Target runtime selection shared by several commands.
#[derive(Args, Clone, Default)]
pub struct RuntimeArgs {
    /// Runtime identifier (e.g. win-x64, linux-x64, osx-arm64); defaults to the host
    #[arg(long)]
    pub rid: Option<String>,

    /// Vcpkg triplet (defaults to the [[runtimes]] entry for the RID)
    #[arg(long)]
    pub triplet: Option<String>,

    /// Vcpkg root directory (overrides [vcpkg] root)
    #[arg(long)]
    pub vcpkg_root: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Libraries to harvest (defaults to every configured library)
    pub libraries: Vec<String>,

    #[command(flatten)]
    pub runtime: RuntimeArgs,

    /// Output directory (overrides [output] dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Plan only; do not copy or archive anything
    #[arg(long)]
    pub dry_run: bool,

    /// Do not write harvest-<library>-<rid>.json reports
    #[arg(long)]
    pub no_report: bool,

    /// Archiver executable (overrides [tools] tar)
    #[arg(long)]
    pub tar: Option<PathBuf>,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Libraries to plan (defaults to every configured library)
    pub libraries: Vec<String>,

    #[command(flatten)]
    pub runtime: RuntimeArgs,

    /// Output directory the plan targets (overrides [output] dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ScanArgs {
    /// Binary to scan
    pub binary: PathBuf,

    /// OS family of the binary (windows, linux, osx); defaults to the host
    #[arg(long)]
    pub os: Option<OsFamily>,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Vcpkg package (port) name
    pub package: String,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}
