//! Given/When steps for repository import scenarios.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use repobox::engine::BoxFuture;
use repobox::error::ImportError;
use repobox::github::{
    DirectoryEntry, EntryKind, FetchFailurePolicy, ImportOptions, RepositoryClient,
    RepositoryImporter, RepositoryRef,
};
use rstest_bdd_macros::{given, when};

use super::state::{ImportOutcome, RepositoryImportState};

pub type StepResult<T> = Result<T, String>;

/// A small repository served from memory:
///
/// ```text
/// README.md
/// src/
///   index.js
///   lib/
///     util.js
/// ```
struct DemoRepository {
    failing_path: Option<String>,
}

impl DemoRepository {
    fn fails_at(&self, path: &str) -> bool {
        self.failing_path.as_deref() == Some(path)
    }

    fn failure(path: &str) -> ImportError {
        ImportError::FetchFailure {
            path: String::from(path),
            message: String::from("502 Bad Gateway"),
        }
    }
}

impl RepositoryClient for DemoRepository {
    fn list_directory(
        &self,
        _repo: &RepositoryRef,
        path: &str,
    ) -> BoxFuture<'_, Result<Vec<DirectoryEntry>, ImportError>> {
        let result = if self.fails_at(path) {
            Err(Self::failure(path))
        } else {
            Ok(match path {
                "" => vec![
                    DirectoryEntry::new("README.md", "README.md", EntryKind::File),
                    DirectoryEntry::new("src", "src", EntryKind::Dir),
                ],
                "src" => vec![
                    DirectoryEntry::new("index.js", "src/index.js", EntryKind::File),
                    DirectoryEntry::new("lib", "src/lib", EntryKind::Dir),
                ],
                "src/lib" => vec![DirectoryEntry::new(
                    "util.js",
                    "src/lib/util.js",
                    EntryKind::File,
                )],
                _ => vec![],
            })
        };
        Box::pin(async move { result })
    }

    fn file_content(
        &self,
        _repo: &RepositoryRef,
        path: &str,
    ) -> BoxFuture<'_, Result<String, ImportError>> {
        let result = if self.fails_at(path) {
            Err(Self::failure(path))
        } else {
            Ok(STANDARD.encode(format!("// {path}\n")))
        };
        Box::pin(async move { result })
    }
}

#[given("the repository URL is {url}")]
fn repository_url_is(repository_import_state: &RepositoryImportState, url: String) {
    repository_import_state.url.set(url);
}

#[given("fetching {path} fails")]
fn fetching_path_fails(repository_import_state: &RepositoryImportState, path: String) {
    repository_import_state.failing_path.set(path);
}

#[given("failed fetches are skipped")]
fn failed_fetches_are_skipped(repository_import_state: &RepositoryImportState) {
    repository_import_state.policy.set(FetchFailurePolicy::Skip);
}

#[when("the repository is imported")]
fn repository_is_imported(repository_import_state: &RepositoryImportState) -> StepResult<()> {
    let url = repository_import_state
        .url
        .get()
        .ok_or_else(|| String::from("repository URL should be configured"))?;
    let policy = repository_import_state
        .policy
        .get()
        .unwrap_or(FetchFailurePolicy::Abort);
    let client = DemoRepository {
        failing_path: repository_import_state.failing_path.get(),
    };
    let importer = RepositoryImporter::new(
        Arc::new(client),
        ImportOptions {
            concurrency: 2,
            on_fetch_error: policy,
        },
    );

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|error| format!("failed to create runtime: {error}"))?;
    let result = RepositoryRef::parse(&url).and_then(|repo| runtime.block_on(importer.import(&repo)));

    repository_import_state.outcome.set(match result {
        Ok(tree) => ImportOutcome::Success(tree),
        Err(error) => ImportOutcome::Failure {
            message: error.to_string(),
        },
    });
    Ok(())
}
