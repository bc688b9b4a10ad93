//! In-memory file tree shared by the importer, materializer and store.
//!
//! A tree is a [`FolderNode`] whose children are [`TreeNode`]s in the order
//! the source listed them. Files keep their base name and extension apart so
//! callers can group or label files by type; [`FileNode::joined_name`]
//! reconstructs the on-disk name.
//!
//! The serialised form matches the persisted workspace record layout:
//!
//! ```json
//! {
//!   "folderName": "demo",
//!   "items": [
//!     { "filename": "README", "fileExtension": "md", "content": "# demo" },
//!     { "folderName": "src", "items": [] }
//!   ]
//! }
//! ```

use std::borrow::Cow;

use serde::{Deserialize, Serialize};


/// A node in a workspace tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// A regular file.
    File(FileNode),
    /// A directory with ordered children.
    Folder(FolderNode),
}

impl TreeNode {
    /// Return the name this node occupies inside its parent directory.
    ///
    /// Folders use their name; files use [`FileNode::joined_name`].
    #[must_use]
    pub fn entry_name(&self) -> Cow<'_, str> {
        match self {
            Self::File(file) => Cow::Owned(file.joined_name()),
            Self::Folder(folder) => Cow::Borrowed(folder.name()),
        }
    }
}

impl From<FileNode> for TreeNode {
    fn from(file: FileNode) -> Self {
        Self::File(file)
    }
}

impl From<FolderNode> for TreeNode {
    fn from(folder: FolderNode) -> Self {
        Self::Folder(folder)
    }
}

/// A file: base name, extension and raw content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    #[serde(rename = "filename")]
    name: String,
    #[serde(rename = "fileExtension")]
    extension: String,
    #[serde(with = "text_content")]
    content: Vec<u8>,
}

impl FileNode {
    /// Create a file node from an already split name.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        extension: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
            content: content.into(),
        }
    }

    /// Create a file node from a full file name, splitting at the last dot.
    ///
    /// See [`split_file_name`] for the exact rules.
    #[must_use]
    pub fn from_file_name(file_name: &str, content: impl Into<Vec<u8>>) -> Self {
        let (name, extension) = split_file_name(file_name);
        Self::new(name, extension, content)
    }

    /// Return the base name (everything before the last dot).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the extension without its leading dot, possibly empty.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Return the raw file content.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Reconstruct the file name: `name`, plus `.extension` when non-empty.
    #[must_use]
    pub fn joined_name(&self) -> String {
        if self.extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.extension)
        }
    }
}

/// A folder and its children in source listing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    #[serde(rename = "folderName")]
    name: String,
    #[serde(rename = "items")]
    children: Vec<TreeNode>,
}

impl FolderNode {
    /// Create a folder from its name and ordered children.
    #[must_use]
    pub fn new(name: impl Into<String>, children: Vec<TreeNode>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    /// Return the folder name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the children in listing order.
    #[must_use]
    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    /// Return whether the folder has no children.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Find a direct child by the name it occupies in this folder.
    #[must_use]
    pub fn child(&self, entry_name: &str) -> Option<&TreeNode> {
        self.children
            .iter()
            .find(|child| child.entry_name() == entry_name)
    }

    /// Count the files in this folder and all of its descendants.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                TreeNode::File(_) => 1,
                TreeNode::Folder(folder) => folder.file_count(),
            })
            .sum()
    }

    /// Serialise the tree into the persisted JSON blob.
    ///
    /// File content is stored as UTF-8 text. Bytes that are not valid UTF-8
    /// are replaced with U+FFFD, so binary files do not survive a save and
    /// reload; the in-memory tree keeps the raw bytes.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialisation fails.
    pub fn to_blob(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a tree from a persisted JSON blob.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the blob is not a folder tree.
    pub fn from_blob(blob: &str) -> serde_json::Result<Self> {
        serde_json::from_str(blob)
    }
}

/// Split a file name into base name and extension at the last dot.
///
/// - `app.test.tsx` splits into `app.test` and `tsx`;
/// - `README` has no dot and keeps the whole name with an empty extension;
/// - `.gitignore` splits into an empty name and `gitignore`;
/// - a trailing dot (`notes.`) keeps the whole name so that
///   [`FileNode::joined_name`] reproduces it exactly.
#[must_use]
pub fn split_file_name(file_name: &str) -> (String, String) {
    match file_name.rsplit_once('.') {
        Some((name, extension)) if !extension.is_empty() => {
            (String::from(name), String::from(extension))
        }
        _ => (String::from(file_name), String::new()),
    }
}

/// Persist file content as text; the record format stores strings.
///
/// Serialisation is lossy: invalid UTF-8 sequences become U+FFFD.
mod text_content {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(content: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(content))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        String::deserialize(deserializer).map(String::into_bytes)
    }
}
