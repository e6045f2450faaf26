//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Template-to-hydration-module compiler
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// JSON config file; every field is optional
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Template root (overrides the config file)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output directory (relative to the template root unless absolute)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Emit the single-function shape regardless of the environment
    #[arg(long)]
    pub single: bool,

    /// Skip layout composition regardless of the environment
    #[arg(long)]
    pub no_layouts: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compile every page and layout of the project
    Build,

    /// Compile one page or layout
    Compile {
        /// Template file
        file: PathBuf,
    },
}
