//! Scenario state, a scripted sandbox and a recording renderer for shell
//! session behavioural tests.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use repobox::engine::{BoxFuture, ProcessPipes, Sandbox, SpawnRequest, TerminalSize};
use repobox::error::Result;
use repobox::shell::{ShellSession, TerminalRenderer};
use repobox::workspace::MountTree;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

/// The scenario's side of one spawned process.
pub(crate) struct ProcessControl {
    pub(crate) output: Option<mpsc::UnboundedSender<io::Result<Vec<u8>>>>,
    pub(crate) input: DuplexStream,
}

/// Sandbox whose processes are driven by scenario steps.
#[derive(Default)]
pub(crate) struct ScriptedSandbox {
    pub(crate) processes: Mutex<Vec<ProcessControl>>,
}

impl Sandbox for ScriptedSandbox {
    fn id(&self) -> &str {
        "scripted"
    }

    fn mkdir(&self, _path: &str, _recursive: bool) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn write_file(&self, _path: &str, _contents: &[u8]) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn mount(&self, _tree: &MountTree) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn spawn(&self, _request: &SpawnRequest) -> BoxFuture<'_, Result<ProcessPipes>> {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (process_side, scenario_side) = tokio::io::duplex(4096);
        if let Ok(mut processes) = self.processes.lock() {
            processes.push(ProcessControl {
                output: Some(output_tx),
                input: scenario_side,
            });
        }
        let output = futures_util::stream::unfold(output_rx, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        });
        Box::pin(async move {
            Ok(ProcessPipes {
                input: Box::pin(process_side),
                output: Box::pin(output),
                resizer: None,
            })
        })
    }

    fn teardown(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Renderer recording everything drawn on it.
#[derive(Clone, Default)]
pub(crate) struct RecordingRenderer {
    pub(crate) drawn: Arc<Mutex<Vec<u8>>>,
    pub(crate) disposed: Arc<AtomicBool>,
}

impl RecordingRenderer {
    pub(crate) fn text(&self) -> String {
        self.drawn
            .lock()
            .map(|drawn| String::from_utf8_lossy(&drawn).into_owned())
            .unwrap_or_default()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl TerminalRenderer for RecordingRenderer {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.drawn
            .lock()
            .map_err(|_| io::Error::other("drawn lock poisoned"))?
            .extend_from_slice(bytes);
        Ok(())
    }

    fn fit(&mut self) -> Option<TerminalSize> {
        Some(TerminalSize {
            width: 80,
            height: 24,
        })
    }

    fn dispose(&mut self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default, ScenarioState)]
pub(crate) struct ShellSessionState {
    pub(crate) runtime: Slot<Arc<tokio::runtime::Runtime>>,
    pub(crate) sandbox: Slot<Arc<ScriptedSandbox>>,
    pub(crate) sessions: Slot<Arc<Mutex<Vec<ShellSession>>>>,
    pub(crate) renderers: Slot<Vec<RecordingRenderer>>,
}

#[fixture]
pub(crate) fn shell_session_state() -> ShellSessionState {
    ShellSessionState::default()
}
