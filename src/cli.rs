use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "component-marker")]
#[command(about = "Scan bnd workspaces for OSGi @Component annotations and render markers and tree decorations")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace directory whose child directories are the projects.
    /// Defaults to the current directory.
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Rescan projects and report emitted markers.
    Scan {
        /// Project names to rescan; every project in the workspace when empty.
        projects: Vec<String>,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Rescan projects, then render the decorated project tree.
    Tree {
        /// Project names to render; every project in the workspace when empty.
        projects: Vec<String>,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
