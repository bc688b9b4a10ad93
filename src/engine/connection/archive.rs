//! Tar archive construction for workspace uploads.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use tar::{Builder, EntryType, Header};

use crate::workspace::{MountEntry, MountTree};

const DIRECTORY_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

/// Build a tar archive holding every entry of `tree`, rooted at the archive
/// root.
pub(super) fn build_mount_archive(tree: &MountTree) -> io::Result<Vec<u8>> {
    let mut builder = Builder::new(vec![]);
    append_tree(&mut builder, tree, Utf8Path::new(""))?;
    builder.finish()?;
    builder.into_inner()
}

/// Build a tar archive holding a single regular file at `relative_path`.
pub(super) fn build_file_archive(relative_path: &Utf8Path, contents: &[u8]) -> io::Result<Vec<u8>> {
    let mut builder = Builder::new(vec![]);
    append_file(&mut builder, relative_path, contents)?;
    builder.finish()?;
    builder.into_inner()
}

fn append_tree(
    builder: &mut Builder<Vec<u8>>,
    tree: &MountTree,
    prefix: &Utf8Path,
) -> io::Result<()> {
    for (name, entry) in tree.entries() {
        let entry_path: Utf8PathBuf = prefix.join(name);
        match entry {
            MountEntry::Directory(children) => {
                append_directory(builder, &entry_path)?;
                append_tree(builder, children, &entry_path)?;
            }
            MountEntry::File { contents } => append_file(builder, &entry_path, contents)?,
        }
    }

    Ok(())
}

fn append_directory(builder: &mut Builder<Vec<u8>>, relative_path: &Utf8Path) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Directory);
    header.set_size(0);
    header.set_mode(DIRECTORY_MODE);
    header.set_cksum();

    let path = format!("{}/", normalize_archive_path(relative_path));
    builder.append_data(&mut header, path, io::empty())
}

fn append_file(
    builder: &mut Builder<Vec<u8>>,
    relative_path: &Utf8Path,
    contents: &[u8],
) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(u64::try_from(contents.len()).map_err(io::Error::other)?);
    header.set_mode(FILE_MODE);
    header.set_cksum();

    builder.append_data(&mut header, normalize_archive_path(relative_path), contents)
}

fn normalize_archive_path(path: &Utf8Path) -> String {
    path.as_str().replace('\\', "/")
}
