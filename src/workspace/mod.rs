//! Materialising a workspace tree inside the sandbox.
//!
//! [`build_mount_tree`] turns a [`FolderNode`] into the mount shape the sandbox
//! accepts. [`Materializer`] mounts that tree into the ready sandbox and
//! writes single files through to it. Neither operation boots a sandbox: both
//! need the lifecycle manager to hold a ready handle already.

mod mount;

use std::sync::Arc;

use camino::{Utf8Component, Utf8Path};

pub use mount::{MountEntry, MountTree, build_mount_tree};

use crate::engine::SandboxHandle;
use crate::error::{RepoboxError, Result, SandboxError};
use crate::lifecycle::SandboxLifecycle;
use crate::tree::FolderNode;

/// Writes workspace content into the sandbox held by a lifecycle manager.
#[derive(Debug, Clone)]
pub struct Materializer {
    lifecycle: Arc<SandboxLifecycle>,
}

impl Materializer {
    /// Create a materializer bound to `lifecycle`.
    #[must_use]
    pub const fn new(lifecycle: Arc<SandboxLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Create or overwrite the file at the slash-separated `path`.
    ///
    /// Missing parent directories are created first, so repeating the call
    /// with the same arguments leaves the same state.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Unavailable` when no sandbox is ready and
    /// `SandboxError::WriteFailed` when the path is invalid or the sandbox
    /// rejects the directory creation or the write.
    pub async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let handle = self.ready_handle().await?;
        let (parent, normalized) =
            split_workspace_path(path).map_err(|message| write_failed(path, message))?;

        let outcome = async {
            if let Some(parent_dir) = parent.as_deref() {
                handle.mkdir(parent_dir, true).await?;
            }
            handle.write_file(&normalized, content).await
        }
        .await;

        outcome.map_err(|error| {
            tracing::error!(path = %path, error = %error, "workspace write failed");
            write_failed(path, error.to_string())
        })?;
        tracing::debug!(path = %normalized, bytes = content.len(), "workspace file written");
        Ok(())
    }

    /// Mount the contents of `root` at the workspace root.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Unavailable` when no sandbox is ready and
    /// `SandboxError::MountFailed` when the sandbox rejects the tree.
    pub async fn mount(&self, root: Option<&FolderNode>) -> Result<()> {
        let handle = self.ready_handle().await?;
        let tree = build_mount_tree(root);
        handle.mount(&tree).await.map_err(|error| {
            tracing::error!(sandbox_id = %handle.id(), error = %error, "workspace mount failed");
            RepoboxError::from(SandboxError::MountFailed {
                message: error.to_string(),
            })
        })?;
        tracing::info!(
            sandbox_id = %handle.id(),
            entries = tree.len(),
            "workspace mounted"
        );
        Ok(())
    }

    async fn ready_handle(&self) -> Result<SandboxHandle> {
        self.lifecycle
            .current()
            .await
            .ok_or_else(|| RepoboxError::from(SandboxError::Unavailable))
    }
}

/// Validate a workspace-relative path and split off its parent directory.
///
/// Returns the parent (if the path has one) and the path with redundant `.`
/// segments and duplicate separators removed.
fn split_workspace_path(path: &str) -> std::result::Result<(Option<String>, String), String> {
    let mut segments = vec![];
    for component in Utf8Path::new(path).components() {
        match component {
            Utf8Component::Normal(segment) => segments.push(segment),
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                return Err(String::from("path must not contain '..' segments"));
            }
            Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                return Err(String::from("path must be relative to the workspace root"));
            }
        }
    }

    let Some((_, parents)) = segments.split_last() else {
        return Err(String::from("path must name a file"));
    };
    let parent = (!parents.is_empty()).then(|| parents.join("/"));
    Ok((parent, segments.join("/")))
}

fn write_failed(path: &str, message: String) -> RepoboxError {
    RepoboxError::from(SandboxError::WriteFailed {
        path: String::from(path),
        message,
    })
}
