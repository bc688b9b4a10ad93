//! GitHub repository access and tree import.
//!
//! [`RepositoryRef`] parses user-supplied repository references, the
//! [`RepositoryClient`] trait abstracts the two contents-API calls the
//! importer needs, and [`RepositoryImporter`] walks a repository's default
//! branch into a [`crate::tree::FolderNode`].

mod importer;

use std::fmt;

use octocrab::Octocrab;

pub use importer::{
    DEFAULT_IMPORT_CONCURRENCY, FetchFailurePolicy, ImportOptions, RepositoryImporter,
};

use crate::engine::BoxFuture;
use crate::error::ImportError;

const GITHUB_HOST_MARKER: &str = "github.com/";

/// An `owner/name` pair identifying a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    owner: String,
    name: String,
}

impl RepositoryRef {
    /// Parse a reference of the form `[scheme://]github.com/<owner>/<repo>[/...]`.
    ///
    /// Trailing path segments, query strings and fragments are ignored and a
    /// `.git` suffix on the repository segment is stripped.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::InvalidReference`] carrying `input` verbatim
    /// when the owner or repository segment cannot be found.
    pub fn parse(input: &str) -> Result<Self, ImportError> {
        let invalid = || ImportError::InvalidReference {
            input: String::from(input),
        };

        let (_, after_host) = input.split_once(GITHUB_HOST_MARKER).ok_or_else(invalid)?;
        let path = after_host
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let mut segments = path.split('/');
        let owner = segments.next().unwrap_or_default();
        let raw_name = segments.next().unwrap_or_default();
        let name = raw_name.strip_suffix(".git").unwrap_or(raw_name);

        if owner.trim().is_empty() || name.trim().is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            owner: String::from(owner),
            name: String::from(name),
        })
    }

    /// Return the owning user or organisation.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Return the repository name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The kind of a directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Dir,
    /// Anything else the API reports, such as `symlink` or `submodule`.
    Other(String),
}

impl EntryKind {
    fn from_api_type(kind: &str) -> Self {
        match kind {
            "file" => Self::File,
            "dir" => Self::Dir,
            other => Self::Other(String::from(other)),
        }
    }
}

/// One entry of a repository directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// The entry's own name, for example `util.js`.
    pub name: String,
    /// The entry's path from the repository root, for example `src/lib/util.js`.
    pub path: String,
    /// What the entry is.
    pub kind: EntryKind,
}

impl DirectoryEntry {
    /// Create an entry.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
        }
    }
}

/// Remote calls the importer makes against a repository's default branch.
pub trait RepositoryClient: Send + Sync {
    /// List the entries of the directory at `path` (empty for the root), in
    /// API order.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::FetchFailure`] for network, authentication or
    /// rate-limit failures.
    fn list_directory(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> BoxFuture<'_, Result<Vec<DirectoryEntry>, ImportError>>;

    /// Fetch the base64-encoded content of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::FetchFailure`] when the request fails or the
    /// response carries no content.
    fn file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> BoxFuture<'_, Result<String, ImportError>>;
}

/// Build an Octocrab client, anonymous or authenticated with `token`.
///
/// # Tokio runtime
///
/// A Tokio runtime context must be active because Octocrab's builder spawns a
/// Tower `Buffer` background task. Without one this returns an error instead
/// of panicking.
///
/// # Errors
///
/// Returns [`ImportError::ClientBuildFailed`] when no runtime is active or the
/// HTTP client cannot be constructed.
pub fn build_client(token: Option<&str>) -> Result<Octocrab, ImportError> {
    let _handle =
        tokio::runtime::Handle::try_current().map_err(|_| ImportError::ClientBuildFailed {
            message: String::from(
                "no Tokio runtime context is active \
                 (Octocrab requires one for its Tower buffer task)",
            ),
        })?;

    let builder = Octocrab::builder();
    let builder = match token.filter(|value| !value.trim().is_empty()) {
        Some(value) => builder.personal_token(String::from(value)),
        None => builder,
    };
    builder
        .build()
        .map_err(|error| ImportError::ClientBuildFailed {
            message: error.to_string(),
        })
}

/// Production [`RepositoryClient`] backed by the GitHub contents API.
pub struct OctocrabRepositoryClient {
    client: Octocrab,
}

impl OctocrabRepositoryClient {
    /// Wrap a configured Octocrab instance.
    #[must_use]
    pub const fn new(client: Octocrab) -> Self {
        Self { client }
    }

    async fn get_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> Result<Vec<octocrab::models::repos::Content>, ImportError> {
        let handler = self.client.repos(repo.owner(), repo.name());
        let request = handler.get_content();
        let request = if path.is_empty() {
            request
        } else {
            request.path(path)
        };
        request
            .send()
            .await
            .map(|listing| listing.items)
            .map_err(|error| ImportError::FetchFailure {
                path: String::from(path),
                message: error.to_string(),
            })
    }
}

impl RepositoryClient for OctocrabRepositoryClient {
    fn list_directory(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> BoxFuture<'_, Result<Vec<DirectoryEntry>, ImportError>> {
        let repo_owned = repo.clone();
        let path_owned = String::from(path);
        Box::pin(async move {
            let items = self.get_content(&repo_owned, &path_owned).await?;
            Ok(items
                .into_iter()
                .map(|item| DirectoryEntry {
                    kind: EntryKind::from_api_type(&item.r#type),
                    name: item.name,
                    path: item.path,
                })
                .collect())
        })
    }

    fn file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> BoxFuture<'_, Result<String, ImportError>> {
        let repo_owned = repo.clone();
        let path_owned = String::from(path);
        Box::pin(async move {
            let items = self.get_content(&repo_owned, &path_owned).await?;
            let item = items
                .into_iter()
                .next()
                .ok_or_else(|| ImportError::FetchFailure {
                    path: path_owned.clone(),
                    message: String::from("response carried no file content"),
                })?;
            base64_payload(&path_owned, item.encoding.as_deref(), item.content)
        })
    }
}

/// Accept file content only when the API delivered it inline as base64.
///
/// Files above the contents API size limit come back with encoding `none`
/// and an empty body; importing that as an empty file would lose data.
fn base64_payload(
    path: &str,
    encoding: Option<&str>,
    content: Option<String>,
) -> Result<String, ImportError> {
    match (encoding, content) {
        (Some("base64"), Some(content)) => Ok(content),
        (Some("base64") | None, None) => Err(ImportError::FetchFailure {
            path: String::from(path),
            message: String::from("response carried no file content"),
        }),
        (other, _) => Err(ImportError::FetchFailure {
            path: String::from(path),
            message: format!(
                "unsupported content encoding {:?}; file may exceed the contents API size limit",
                other.unwrap_or("")
            ),
        }),
    }
}
