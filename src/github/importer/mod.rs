//! Recursive import of a repository tree.
//!
//! Siblings are fetched concurrently and reassembled in listing order. Every
//! API request holds a permit from a shared semaphore, so `concurrency`
//! bounds the number of requests in flight across the whole traversal.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit};

use super::{DirectoryEntry, EntryKind, RepositoryClient, RepositoryRef};
use crate::engine::BoxFuture;
use crate::error::ImportError;
use crate::tree::{FileNode, FolderNode, TreeNode};

/// Default number of API requests allowed in flight.
pub const DEFAULT_IMPORT_CONCURRENCY: usize = 8;

/// What to do when a nested listing or file fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchFailurePolicy {
    /// Abort the whole import; no partial tree is returned.
    #[default]
    Abort,
    /// Log the failure and omit the failing file or folder.
    Skip,
}

/// Tuning for [`RepositoryImporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Maximum API requests in flight. Zero is treated as one.
    pub concurrency: usize,
    /// Handling of nested fetch failures.
    pub on_fetch_error: FetchFailurePolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_IMPORT_CONCURRENCY,
            on_fetch_error: FetchFailurePolicy::Abort,
        }
    }
}

/// Converts a remote repository into a workspace tree.
pub struct RepositoryImporter {
    client: Arc<dyn RepositoryClient>,
    permits: Semaphore,
    policy: FetchFailurePolicy,
}

impl RepositoryImporter {
    /// Create an importer issuing requests through `client`.
    #[must_use]
    pub fn new(client: Arc<dyn RepositoryClient>, options: ImportOptions) -> Self {
        Self {
            client,
            permits: Semaphore::new(options.concurrency.max(1)),
            policy: options.on_fetch_error,
        }
    }

    /// Import the default branch of `repo` as a folder named after it.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::FetchFailure`] when the root listing fails, or
    /// when any nested request fails under [`FetchFailurePolicy::Abort`].
    pub async fn import(&self, repo: &RepositoryRef) -> Result<FolderNode, ImportError> {
        tracing::info!(repository = %repo, "importing repository");
        let children = self.import_directory(repo, "").await.inspect_err(|error| {
            tracing::error!(repository = %repo, error = %error, "repository import failed");
        })?;
        let root = FolderNode::new(repo.name(), children);
        tracing::info!(
            repository = %repo,
            files = root.file_count(),
            "repository imported"
        );
        Ok(root)
    }

    fn import_directory<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<TreeNode>, ImportError>> {
        Box::pin(async move {
            let entries = {
                let _permit = self.permit(path).await?;
                self.client.list_directory(repo, path).await?
            };
            let imported = try_join_all(
                entries
                    .into_iter()
                    .map(|entry| self.import_entry(repo, entry)),
            )
            .await?;
            Ok(imported.into_iter().flatten().collect())
        })
    }

    async fn import_entry(
        &self,
        repo: &RepositoryRef,
        entry: DirectoryEntry,
    ) -> Result<Option<TreeNode>, ImportError> {
        let outcome = match &entry.kind {
            EntryKind::Dir => self
                .import_directory(repo, &entry.path)
                .await
                .map(|children| TreeNode::from(FolderNode::new(entry.name.as_str(), children))),
            EntryKind::File => self
                .import_file(repo, &entry)
                .await
                .map(TreeNode::from),
            EntryKind::Other(kind) => {
                tracing::debug!(path = %entry.path, kind = %kind, "skipping unsupported entry");
                return Ok(None);
            }
        };

        match (outcome, self.policy) {
            (Ok(node), _) => Ok(Some(node)),
            (Err(error), FetchFailurePolicy::Skip) => {
                tracing::warn!(path = %entry.path, error = %error, "skipping entry that failed to fetch");
                Ok(None)
            }
            (Err(error), FetchFailurePolicy::Abort) => Err(error),
        }
    }

    async fn import_file(
        &self,
        repo: &RepositoryRef,
        entry: &DirectoryEntry,
    ) -> Result<FileNode, ImportError> {
        let encoded = {
            let _permit = self.permit(&entry.path).await?;
            self.client.file_content(repo, &entry.path).await?
        };
        let content = decode_content(&encoded).map_err(|message| ImportError::FetchFailure {
            path: entry.path.clone(),
            message,
        })?;
        tracing::debug!(path = %entry.path, bytes = content.len(), "fetched file");
        Ok(FileNode::from_file_name(&entry.name, content))
    }

    async fn permit(&self, path: &str) -> Result<SemaphorePermit<'_>, ImportError> {
        self.permits
            .acquire()
            .await
            .map_err(|error| ImportError::FetchFailure {
                path: String::from(path),
                message: error.to_string(),
            })
    }
}

/// Decode base64 content, ignoring the line breaks the API inserts.
fn decode_content(encoded: &str) -> Result<Vec<u8>, String> {
    let compact: String = encoded
        .chars()
        .filter(|character| !character.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|error| format!("invalid base64 content: {error}"))
}
