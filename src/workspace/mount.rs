//! Mount tree: the nested name-to-entry mapping a sandbox filesystem accepts.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::tree::{FolderNode, TreeNode};

/// A directory listing to populate inside a sandbox.
///
/// Serialises to `{name: {"file": {"contents": ..}} | {"directory": {..}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MountTree {
    entries: BTreeMap<String, MountEntry>,
}

/// A single entry of a [`MountTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountEntry {
    /// A regular file and its raw contents.
    File {
        /// The file contents.
        #[serde(serialize_with = "contents_as_text")]
        contents: Vec<u8>,
    },
    /// A directory and its entries.
    Directory(MountTree),
}

impl MountEntry {
    /// Create a file entry.
    #[must_use]
    pub fn file(contents: impl Into<Vec<u8>>) -> Self {
        Self::File {
            contents: contents.into(),
        }
    }
}

impl MountTree {
    /// Insert an entry, replacing any entry of the same name.
    pub fn insert(&mut self, name: impl Into<String>, entry: MountEntry) {
        self.entries.insert(name.into(), entry);
    }

    /// Look up a direct entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MountEntry> {
        self.entries.get(name)
    }

    /// Iterate over the direct entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &MountEntry)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
    }

    /// Return the number of direct entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return whether there is nothing to mount.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Transform a workspace tree into a mount tree.
///
/// The *contents* of `root` are mounted at the destination root; the root
/// folder's own name is not used. `None` or an empty root yields an empty
/// mount tree. The transform is pure: equal inputs give equal outputs.
#[must_use]
pub fn build_mount_tree(root: Option<&FolderNode>) -> MountTree {
    root.map(|folder| mount_children(folder.children()))
        .unwrap_or_default()
}

fn mount_children(children: &[TreeNode]) -> MountTree {
    let mut tree = MountTree::default();
    for child in children {
        match child {
            TreeNode::Folder(folder) => {
                tree.insert(
                    folder.name(),
                    MountEntry::Directory(mount_children(folder.children())),
                );
            }
            TreeNode::File(file) => {
                tree.insert(file.joined_name(), MountEntry::file(file.content()));
            }
        }
    }
    tree
}

fn contents_as_text<S: Serializer>(contents: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(contents))
}
