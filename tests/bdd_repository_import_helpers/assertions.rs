//! Then-step assertions for repository import scenarios.

use repobox::tree::{FolderNode, TreeNode};
use rstest_bdd_macros::then;

use super::state::{ImportOutcome, RepositoryImportState};
use super::steps::StepResult;

fn imported_tree(state: &RepositoryImportState) -> StepResult<FolderNode> {
    match state.outcome.get() {
        Some(ImportOutcome::Success(tree)) => Ok(tree),
        Some(ImportOutcome::Failure { message }) => {
            Err(format!("expected success, got failure: {message}"))
        }
        None => Err(String::from("import outcome should be recorded")),
    }
}

fn folder_at<'a>(root: &'a FolderNode, path: &str) -> StepResult<&'a FolderNode> {
    path.split('/').try_fold(root, |folder, segment| match folder.child(segment) {
        Some(TreeNode::Folder(child)) => Ok(child),
        _ => Err(format!("folder '{path}' should exist")),
    })
}

fn entry_names(folder: &FolderNode) -> Vec<String> {
    folder
        .children()
        .iter()
        .map(|child| child.entry_name().into_owned())
        .collect()
}

#[then("the import succeeds")]
fn import_succeeds(repository_import_state: &RepositoryImportState) -> StepResult<()> {
    imported_tree(repository_import_state).map(|_| ())
}

#[then("the root folder is named {name}")]
fn root_folder_is_named(
    repository_import_state: &RepositoryImportState,
    name: String,
) -> StepResult<()> {
    let tree = imported_tree(repository_import_state)?;
    if tree.name() == name {
        Ok(())
    } else {
        Err(format!("expected root '{name}', got '{}'", tree.name()))
    }
}

#[then("the root lists {names}")]
fn root_lists(repository_import_state: &RepositoryImportState, names: String) -> StepResult<()> {
    let tree = imported_tree(repository_import_state)?;
    let expected: Vec<String> = names.split(", ").map(String::from).collect();
    let actual = entry_names(&tree);
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected children {expected:?}, got {actual:?}"))
    }
}

#[then("folder {path} contains {name}")]
fn folder_contains(
    repository_import_state: &RepositoryImportState,
    path: String,
    name: String,
) -> StepResult<()> {
    let tree = imported_tree(repository_import_state)?;
    let folder = folder_at(&tree, &path)?;
    let actual = entry_names(folder);
    if actual == [name.clone()] {
        Ok(())
    } else {
        Err(format!("expected '{path}' to hold only '{name}', got {actual:?}"))
    }
}

#[then("the import fails mentioning {text}")]
fn import_fails_mentioning(
    repository_import_state: &RepositoryImportState,
    text: String,
) -> StepResult<()> {
    match repository_import_state.outcome.get() {
        Some(ImportOutcome::Failure { message }) if message.contains(&text) => Ok(()),
        Some(ImportOutcome::Failure { message }) => {
            Err(format!("expected failure mentioning '{text}', got: {message}"))
        }
        Some(ImportOutcome::Success(_)) => Err(String::from("expected import to fail")),
        None => Err(String::from("import outcome should be recorded")),
    }
}
