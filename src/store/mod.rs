//! Persistence of imported workspaces.
//!
//! An imported repository is saved as a record holding a title, a
//! description, a template tag and the serialised tree. [`DirectoryStore`]
//! keeps one JSON file per record in a directory opened through `cap_std`.

use std::io::ErrorKind;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::github::RepositoryRef;
use crate::tree::FolderNode;

/// Template tag attached to records imported from GitHub.
pub const GITHUB_TEMPLATE: &str = "GITHUB";

const RECORD_EXTENSION: &str = "json";

/// A workspace record that has not been saved yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkspaceRecord {
    /// Display title.
    pub title: String,
    /// Human-readable description.
    pub description: String,
    /// Template tag describing where the workspace came from.
    pub template: String,
    /// The serialised workspace tree.
    pub content: String,
}

impl NewWorkspaceRecord {
    /// Describe an imported repository tree.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Malformed`] when the tree cannot be serialised.
    pub fn for_repository(repo: &RepositoryRef, tree: &FolderNode) -> Result<Self, StoreError> {
        let content = tree.to_blob().map_err(|error| StoreError::Malformed {
            id: repo.to_string(),
            message: error.to_string(),
        })?;
        Ok(Self {
            title: String::from(repo.name()),
            description: format!("GitHub repository: {repo}"),
            template: String::from(GITHUB_TEMPLATE),
            content,
        })
    }
}

/// A saved workspace record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    /// The record identifier.
    pub id: String,
    /// The record fields.
    #[serde(flatten)]
    pub record: NewWorkspaceRecord,
}

impl WorkspaceRecord {
    /// Decode the stored workspace tree.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Malformed`] when the content is not a folder blob.
    pub fn tree(&self) -> Result<FolderNode, StoreError> {
        FolderNode::from_blob(&self.record.content).map_err(|error| StoreError::Malformed {
            id: self.id.clone(),
            message: error.to_string(),
        })
    }
}

/// Saves and loads workspace records.
pub trait WorkspaceStore: Send + Sync {
    /// Persist `record` and return its new identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the record cannot be written.
    fn save(&self, record: &NewWorkspaceRecord) -> Result<String, StoreError>;

    /// Load the record saved under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown identifiers and
    /// [`StoreError::Malformed`] for unreadable records.
    fn load(&self, id: &str) -> Result<WorkspaceRecord, StoreError>;
}

/// A [`WorkspaceStore`] writing `<id>.json` files into one directory.
#[derive(Debug)]
pub struct DirectoryStore {
    dir: Dir,
    path: Utf8PathBuf,
}

impl DirectoryStore {
    /// Open the store at `path`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IoError`] when the directory cannot be created
    /// or opened.
    pub fn open(path: &Utf8Path) -> Result<Self, StoreError> {
        let io_error = |error: std::io::Error| StoreError::IoError {
            path: PathBuf::from(path.as_std_path()),
            message: error.to_string(),
        };
        Dir::create_ambient_dir_all(path, ambient_authority()).map_err(io_error)?;
        let dir = Dir::open_ambient_dir(path, ambient_authority()).map_err(io_error)?;
        Ok(Self::from_dir(dir, path.to_path_buf()))
    }

    /// Wrap an already opened directory capability.
    #[must_use]
    pub const fn from_dir(dir: Dir, path: Utf8PathBuf) -> Self {
        Self { dir, path }
    }

    fn file_name(id: &str) -> String {
        format!("{id}.{RECORD_EXTENSION}")
    }

    fn display_path(&self, file_name: &str) -> PathBuf {
        PathBuf::from(self.path.join(file_name).as_std_path())
    }
}

impl WorkspaceStore for DirectoryStore {
    fn save(&self, record: &NewWorkspaceRecord) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let saved = WorkspaceRecord {
            id: id.clone(),
            record: record.clone(),
        };
        let json = serde_json::to_string_pretty(&saved).map_err(|error| StoreError::Malformed {
            id: id.clone(),
            message: error.to_string(),
        })?;

        let file_name = Self::file_name(&id);
        self.dir
            .write(&file_name, json)
            .map_err(|error| StoreError::IoError {
                path: self.display_path(&file_name),
                message: error.to_string(),
            })?;
        tracing::info!(record_id = %id, title = %record.title, "workspace record saved");
        Ok(id)
    }

    fn load(&self, id: &str) -> Result<WorkspaceRecord, StoreError> {
        let not_found = || StoreError::NotFound {
            id: String::from(id),
        };
        // Record ids are always UUIDs; anything else cannot name a file here.
        Uuid::parse_str(id).map_err(|_| not_found())?;

        let file_name = Self::file_name(id);
        let json = self
            .dir
            .read_to_string(&file_name)
            .map_err(|error| match error.kind() {
                ErrorKind::NotFound => not_found(),
                _ => StoreError::IoError {
                    path: self.display_path(&file_name),
                    message: error.to_string(),
                },
            })?;

        serde_json::from_str(&json).map_err(|error| StoreError::Malformed {
            id: String::from(id),
            message: error.to_string(),
        })
    }
}
