//! Configuration data types for repobox.

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::engine::SandboxSettings;
use crate::github::{DEFAULT_IMPORT_CONCURRENCY, FetchFailurePolicy, ImportOptions};
use crate::shell::{DEFAULT_OUTPUT_BUFFER_CHUNKS, ShellOptions};

/// Image used when none is configured.
pub const DEFAULT_IMAGE: &str = "docker.io/library/node:20-bookworm";

/// `GitHub` API configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// Personal access token used to raise the API rate limit.
    pub token: Option<String>,
}

impl GitHubConfig {
    /// Return the token, treating a blank value as unset.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|token| !token.trim().is_empty())
    }
}

/// Repository import tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Maximum number of API requests in flight during an import.
    pub concurrency: usize,

    /// Whether a failed nested fetch aborts the import or is skipped.
    pub on_fetch_error: FetchFailurePolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_IMPORT_CONCURRENCY,
            on_fetch_error: FetchFailurePolicy::Abort,
        }
    }
}

impl ImportConfig {
    /// Build importer options from this section.
    #[must_use]
    pub const fn options(&self) -> ImportOptions {
        ImportOptions {
            concurrency: self.concurrency,
            on_fetch_error: self.on_fetch_error,
        }
    }
}

/// Sandbox container configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Directory inside the container where the workspace is mounted.
    pub workdir: Utf8PathBuf,

    /// Shell spawned for interactive sessions.
    pub shell: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            workdir: Utf8PathBuf::from("/workspace"),
            shell: String::from("/bin/bash"),
        }
    }
}

/// Terminal output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Output chunks buffered between the process and the renderer.
    pub output_buffer_chunks: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            output_buffer_chunks: DEFAULT_OUTPUT_BUFFER_CHUNKS,
        }
    }
}

impl TerminalConfig {
    /// Build shell session options from this section.
    #[must_use]
    pub const fn options(&self) -> ShellOptions {
        ShellOptions {
            output_buffer_chunks: self.output_buffer_chunks,
        }
    }
}

/// Workspace record storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one JSON file per saved workspace.
    pub dir: Utf8PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: Utf8PathBuf::from(".repobox/workspaces"),
        }
    }
}

/// Root application configuration.
///
/// Loaded from defaults, a configuration file, environment variables and
/// command-line arguments, in increasing order of precedence.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `REPOBOX_CONFIG_PATH`
/// 2. `.repobox.toml` in the current working directory
/// 3. `.repobox.toml` in the home directory
/// 4. `~/.config/repobox/config.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "REPOBOX",
    post_merge_hook,
    discovery(
        app_name = "repobox",
        env_var = "REPOBOX_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".repobox.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// The container engine socket path or URL.
    pub engine_socket: Option<String>,

    /// The container image used for the sandbox.
    pub image: Option<String>,

    /// `GitHub` API configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub github: GitHubConfig,

    /// Repository import tuning.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub import: ImportConfig,

    /// Sandbox container configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub sandbox: SandboxConfig,

    /// Terminal output configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub terminal: TerminalConfig,

    /// Workspace record storage configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Return the configured image, or [`DEFAULT_IMAGE`].
    #[must_use]
    pub fn image_or_default(&self) -> &str {
        self.image
            .as_deref()
            .filter(|image| !image.trim().is_empty())
            .unwrap_or(DEFAULT_IMAGE)
    }

    /// Build validated sandbox settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when `sandbox.workdir` is not
    /// absolute.
    pub fn sandbox_settings(&self) -> crate::error::Result<SandboxSettings> {
        SandboxSettings::new(self.image_or_default(), self.sandbox.workdir.clone())
    }
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        if self.github.token().is_none() {
            self.github.token = None;
        }
        Ok(())
    }
}
