//! Command-line argument definitions for repobox.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Command-line interface for repobox.
#[derive(Debug, Parser)]
#[command(name = "repobox")]
#[command(
    author,
    version,
    about = "Open a GitHub repository as a live workspace in a container sandbox"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Container engine socket path or URL.
    #[arg(long, global = true)]
    pub engine_socket: Option<String>,

    /// Container image to use.
    #[arg(long, global = true)]
    pub image: Option<String>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a repository and save it as a workspace record.
    Import(ImportArgs),

    /// Open a workspace in a sandbox and attach a shell to it.
    Open(OpenArgs),
}

/// Arguments for the `import` subcommand.
#[derive(Debug, Parser)]
pub struct ImportArgs {
    /// Repository URL containing `github.com/<owner>/<repo>`.
    #[arg(required = true)]
    pub url: String,
}

/// Arguments for the `open` subcommand.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct OpenArgs {
    /// Repository URL to import and open.
    pub url: Option<String>,

    /// Identifier of a previously saved workspace record.
    #[arg(long)]
    pub record: Option<String>,
}
