//! Scenario state and sandbox fakes for lifecycle behavioural tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use repobox::engine::{
    BoxFuture, ProcessPipes, Sandbox, SandboxBooter, SandboxHandle, SpawnRequest,
};
use repobox::error::{RepoboxError, Result, SandboxError};
use repobox::lifecycle::SandboxLifecycle;
use repobox::workspace::MountTree;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

const BOOT_DELAY: Duration = Duration::from_millis(20);

/// In-memory sandbox recording filesystem calls.
pub(crate) struct MemorySandbox {
    id: String,
    pub(crate) directories: Mutex<Vec<String>>,
    pub(crate) files: Mutex<BTreeMap<String, Vec<u8>>>,
    teardowns: Arc<AtomicUsize>,
}

impl Sandbox for MemorySandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn mkdir(&self, path: &str, _recursive: bool) -> BoxFuture<'_, Result<()>> {
        if let Ok(mut directories) = self.directories.lock() {
            directories.push(String::from(path));
        }
        Box::pin(async { Ok(()) })
    }

    fn write_file(&self, path: &str, contents: &[u8]) -> BoxFuture<'_, Result<()>> {
        if let Ok(mut files) = self.files.lock() {
            files.insert(String::from(path), contents.to_vec());
        }
        Box::pin(async { Ok(()) })
    }

    fn mount(&self, _tree: &MountTree) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn spawn(&self, request: &SpawnRequest) -> BoxFuture<'_, Result<ProcessPipes>> {
        let command = request.display_command();
        Box::pin(async move {
            Err(RepoboxError::from(SandboxError::SpawnFailed {
                command,
                message: String::from("not supported"),
            }))
        })
    }

    fn teardown(&self) -> BoxFuture<'_, Result<()>> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

/// Booter counting its boots; optionally fails the first one.
#[derive(Default)]
pub(crate) struct CountingBooter {
    pub(crate) boots: AtomicUsize,
    pub(crate) teardowns: Arc<AtomicUsize>,
    pub(crate) fail_first: bool,
    pub(crate) sandboxes: Mutex<Vec<Arc<MemorySandbox>>>,
}

impl CountingBooter {
    pub(crate) fn latest(&self) -> Option<Arc<MemorySandbox>> {
        self.sandboxes.lock().ok()?.last().cloned()
    }
}

impl SandboxBooter for CountingBooter {
    fn boot(&self) -> BoxFuture<'_, Result<SandboxHandle>> {
        Box::pin(async move {
            let attempt = self.boots.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(BOOT_DELAY).await;
            if self.fail_first && attempt == 1 {
                return Err(RepoboxError::from(SandboxError::BootFailed {
                    message: String::from("image pull failed"),
                }));
            }
            let sandbox = Arc::new(MemorySandbox {
                id: format!("sandbox-{attempt}"),
                directories: Mutex::new(vec![]),
                files: Mutex::new(BTreeMap::new()),
                teardowns: Arc::clone(&self.teardowns),
            });
            if let Ok(mut sandboxes) = self.sandboxes.lock() {
                sandboxes.push(Arc::clone(&sandbox));
            }
            Ok(SandboxHandle::from_arc(sandbox))
        })
    }
}

#[derive(Default, ScenarioState)]
pub(crate) struct SandboxLifecycleState {
    pub(crate) runtime: Slot<Arc<tokio::runtime::Runtime>>,
    pub(crate) booter: Slot<Arc<CountingBooter>>,
    pub(crate) lifecycle: Slot<Arc<SandboxLifecycle>>,
    pub(crate) handles: Slot<Vec<SandboxHandle>>,
    pub(crate) acquire_errors: Slot<Vec<String>>,
    pub(crate) write_error: Slot<Option<String>>,
}

#[fixture]
pub(crate) fn sandbox_lifecycle_state() -> SandboxLifecycleState {
    SandboxLifecycleState::default()
}
