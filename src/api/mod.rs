//! Orchestration API for repobox commands.
//!
//! Wires the importer, the record store, the sandbox lifecycle and the
//! materializer together. [`import_repository`] imports and saves a
//! repository, [`load_tree`] fetches a tree from either source and
//! [`open_workspace`] boots the sandbox and mounts a tree into it.
//!
//! Functions accept library-owned types (not clap types) and never print to
//! stdout/stderr.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::engine::{
    DockerSandboxBooter, EngineConnector, SandboxBooter, SandboxHandle, SocketResolver,
    SpawnRequest,
};
use crate::error::Result as RepoboxResult;
use crate::github::{OctocrabRepositoryClient, RepositoryImporter, RepositoryRef, build_client};
use crate::lifecycle::SandboxLifecycle;
use crate::store::{NewWorkspaceRecord, WorkspaceStore};
use crate::tree::FolderNode;
use crate::workspace::Materializer;

/// Where the tree for a workspace comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceSource {
    /// Import a repository URL from GitHub.
    Repository(String),
    /// Load a previously saved record.
    Record(String),
}

/// A repository that was imported and saved.
#[derive(Debug, Clone)]
pub struct ImportedWorkspace {
    /// Identifier of the saved record.
    pub record_id: String,
    /// The parsed repository reference.
    pub repository: RepositoryRef,
    /// The imported tree.
    pub tree: FolderNode,
}

/// A workspace mounted into a ready sandbox.
#[derive(Debug)]
pub struct Workspace {
    lifecycle: Arc<SandboxLifecycle>,
    materializer: Materializer,
    handle: SandboxHandle,
    tree: FolderNode,
}

impl Workspace {
    /// The tree mounted at the workspace root.
    #[must_use]
    pub const fn tree(&self) -> &FolderNode {
        &self.tree
    }

    /// Write-through access to workspace files.
    #[must_use]
    pub const fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    /// The sandbox holding the workspace.
    #[must_use]
    pub const fn handle(&self) -> &SandboxHandle {
        &self.handle
    }

    /// The lifecycle manager owning the sandbox.
    #[must_use]
    pub const fn lifecycle(&self) -> &Arc<SandboxLifecycle> {
        &self.lifecycle
    }

    /// Tear the sandbox down.
    pub async fn close(self) {
        self.lifecycle.destroy().await;
    }
}

/// Build an importer talking to the GitHub API.
///
/// Must be called inside a Tokio runtime.
///
/// # Errors
///
/// Returns `ImportError::ClientBuildFailed` when the HTTP client cannot be
/// built.
pub fn github_importer(config: &AppConfig) -> RepoboxResult<RepositoryImporter> {
    let client = build_client(config.github.token())?;
    Ok(RepositoryImporter::new(
        Arc::new(OctocrabRepositoryClient::new(client)),
        config.import.options(),
    ))
}

/// Connect to the container engine and build a sandbox booter.
///
/// The socket comes from configuration, then `DOCKER_HOST`,
/// `CONTAINER_HOST` and `PODMAN_HOST` read through `env`, then the platform
/// default.
///
/// # Errors
///
/// Returns `ContainerError::ConnectionFailed` when the engine client cannot
/// be created, and `ConfigError` when the sandbox settings are invalid.
pub fn docker_booter<E: mockable::Env>(
    config: &AppConfig,
    env: &E,
) -> RepoboxResult<Arc<dyn SandboxBooter>> {
    let settings = config.sandbox_settings()?;
    let resolver = SocketResolver::new(env);
    let docker =
        EngineConnector::connect_with_fallback(config.engine_socket.as_deref(), &resolver)?;
    Ok(Arc::new(DockerSandboxBooter::new(Arc::new(docker), settings)))
}

/// Host variables copied into the sandbox shell so locale and colour
/// support match the local terminal.
const FORWARDED_ENV_VARS: &[&str] = &["LANG", "LC_ALL", "COLORTERM"];

/// The shell request configured for interactive sessions.
///
/// `interactive` controls pseudo-terminal allocation; pass `false` when the
/// local input is not a terminal. Locale and colour variables are forwarded
/// from `env` when set.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` when `sandbox.shell` is blank.
pub fn shell_request<E: mockable::Env>(
    config: &AppConfig,
    env: &E,
    interactive: bool,
) -> RepoboxResult<SpawnRequest> {
    let forwarded = FORWARDED_ENV_VARS
        .iter()
        .filter_map(|name| env.string(name).map(|value| format!("{name}={value}")));
    Ok(SpawnRequest::shell(&config.sandbox.shell)?
        .with_env(forwarded)
        .with_tty(interactive))
}

/// Import `url` and save it as a workspace record.
///
/// # Errors
///
/// Returns `ImportError::InvalidReference` for a malformed URL,
/// `ImportError::FetchFailure` when the import fails, and `StoreError` when
/// the record cannot be saved.
pub async fn import_repository(
    url: &str,
    importer: &RepositoryImporter,
    store: &dyn WorkspaceStore,
) -> RepoboxResult<ImportedWorkspace> {
    let repository = RepositoryRef::parse(url)?;
    let tree = importer.import(&repository).await?;
    let record = NewWorkspaceRecord::for_repository(&repository, &tree)?;
    let record_id = store.save(&record)?;
    Ok(ImportedWorkspace {
        record_id,
        repository,
        tree,
    })
}

/// Fetch the tree for `source`.
///
/// Repositories are imported and saved; records are loaded from `store`.
///
/// # Errors
///
/// Returns the import or store error raised while fetching the tree.
pub async fn load_tree(
    source: &WorkspaceSource,
    importer: &RepositoryImporter,
    store: &dyn WorkspaceStore,
) -> RepoboxResult<FolderNode> {
    match source {
        WorkspaceSource::Repository(url) => {
            let imported = import_repository(url, importer, store).await?;
            Ok(imported.tree)
        }
        WorkspaceSource::Record(id) => {
            let record = store.load(id)?;
            tracing::info!(record_id = %id, title = %record.record.title, "workspace record loaded");
            Ok(record.tree()?)
        }
    }
}

/// Boot (or reuse) the sandbox and mount `tree` into it.
///
/// # Errors
///
/// Returns `SandboxError::BootFailed` when the sandbox cannot be booted and
/// `SandboxError::MountFailed` when the tree cannot be mounted. A sandbox
/// that booted but failed to mount is destroyed before returning.
pub async fn open_workspace(
    lifecycle: Arc<SandboxLifecycle>,
    tree: FolderNode,
) -> RepoboxResult<Workspace> {
    let handle = lifecycle.acquire().await?;
    let materializer = Materializer::new(Arc::clone(&lifecycle));
    if let Err(error) = materializer.mount(Some(&tree)).await {
        lifecycle.destroy().await;
        return Err(error);
    }
    Ok(Workspace {
        lifecycle,
        materializer,
        handle,
        tree,
    })
}
