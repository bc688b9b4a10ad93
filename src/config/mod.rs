//! Configuration system for repobox.
//!
//! Loading and precedence merging is handled by the `ortho_config` crate.
//! CLI flags override environment variables, which override configuration
//! files, which override defaults.
//!
//! The configuration file is expected at `~/.config/repobox/config.toml` by
//! default.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "unix:///run/user/1000/podman/podman.sock"
//! image = "docker.io/library/node:20-bookworm"
//!
//! [github]
//! token = "ghp_..."
//!
//! [import]
//! concurrency = 8
//! on_fetch_error = "abort"
//!
//! [sandbox]
//! workdir = "/workspace"
//! shell = "/bin/bash"
//!
//! [terminal]
//! output_buffer_chunks = 256
//!
//! [store]
//! dir = "/home/user/.local/share/repobox"
//! ```

mod cli;
mod loader;
mod types;


pub use cli::{Cli, Commands, ImportArgs, OpenArgs};
pub use loader::{env_var_names, load_config};
pub use types::{
    AppConfig, DEFAULT_IMAGE, GitHubConfig, ImportConfig, SandboxConfig, StoreConfig,
    TerminalConfig,
};
