//! One interactive shell process and the pipes feeding its terminal.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use super::renderer::TerminalRenderer;
use crate::engine::{InputSink, OutputStream, PtyResizer, SandboxHandle, SpawnRequest, TerminalSize};
use crate::error::{RepoboxError, Result, SandboxError};

/// Default number of output chunks buffered between process and renderer.
pub const DEFAULT_OUTPUT_BUFFER_CHUNKS: usize = 256;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

type SharedRenderer = Arc<Mutex<Box<dyn TerminalRenderer>>>;

/// Tuning for [`ShellSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellOptions {
    /// Output chunks buffered before the output pump stops reading from the
    /// process. Zero is treated as one.
    pub output_buffer_chunks: usize,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            output_buffer_chunks: DEFAULT_OUTPUT_BUFFER_CHUNKS,
        }
    }
}

/// A shell process running in the sandbox, wired to a renderer.
///
/// Output is forwarded to the renderer in emission order through a bounded
/// buffer; when the renderer falls behind, reading from the process pauses.
/// Input is written and flushed chunk by chunk in the order it was sent.
pub struct ShellSession {
    id: u64,
    command: String,
    input: Option<mpsc::UnboundedSender<Vec<u8>>>,
    renderer: SharedRenderer,
    resizer: Option<Box<dyn PtyResizer>>,
    alive: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
    closed: bool,
}

impl ShellSession {
    /// Spawn `request` in the sandbox behind `handle` and start piping.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::SpawnFailed` when the sandbox cannot start the
    /// process.
    pub async fn open(
        handle: &SandboxHandle,
        request: &SpawnRequest,
        renderer: Box<dyn TerminalRenderer>,
        options: ShellOptions,
    ) -> Result<Self> {
        let command = request.display_command();
        let pipes = handle.spawn(request).await.map_err(|error| {
            tracing::error!(command = %command, error = %error, "shell spawn failed");
            RepoboxError::from(SandboxError::SpawnFailed {
                command: command.clone(),
                message: error.to_string(),
            })
        })?;

        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let renderer: SharedRenderer = Arc::new(Mutex::new(renderer));
        let (chunk_tx, chunk_rx) = mpsc::channel(options.output_buffer_chunks.max(1));
        let (alive_tx, alive_rx) = watch::channel(true);
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        let tasks = vec![
            tokio::spawn(pump_output(id, pipes.output, chunk_tx)),
            tokio::spawn(render_output(id, chunk_rx, Arc::clone(&renderer), alive_tx)),
            tokio::spawn(forward_input(id, pipes.input, input_rx)),
        ];

        tracing::info!(session_id = id, command = %command, sandbox_id = %handle.id(), "shell session opened");
        Ok(Self {
            id,
            command,
            input: Some(input_tx),
            renderer,
            resizer: pipes.resizer,
            alive: alive_rx,
            tasks,
            closed: false,
        })
    }

    /// Return the session identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Forward `data` to the process's standard input.
    ///
    /// Chunks are delivered in call order with no batching.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::SessionClosed` once the session is closed or
    /// its input pipe has failed.
    pub fn send_input(&self, data: &[u8]) -> Result<()> {
        let closed = || RepoboxError::from(SandboxError::SessionClosed { session_id: self.id });
        let sender = self.input.as_ref().ok_or_else(closed)?;
        sender.send(data.to_vec()).map_err(|_| closed())
    }

    /// Fit the renderer and forward its size to the process terminal.
    ///
    /// Returns the size the renderer reported, if any.
    ///
    /// # Errors
    ///
    /// Returns the sandbox error raised while resizing the process terminal.
    pub async fn resize(&self) -> Result<Option<TerminalSize>> {
        let size = self.renderer.lock().await.fit();
        if let (Some(fitted), Some(resizer)) = (size, self.resizer.as_ref()) {
            resizer.resize(fitted).await?;
            tracing::debug!(
                session_id = self.id,
                width = fitted.width,
                height = fitted.height,
                "shell terminal resized"
            );
        }
        Ok(size)
    }

    /// Draw `data` directly on the renderer without involving the process.
    ///
    /// # Errors
    ///
    /// Returns the renderer's I/O error.
    pub async fn echo(&self, data: &[u8]) -> std::io::Result<()> {
        self.renderer.lock().await.write(data)
    }

    /// Clear the renderer.
    ///
    /// # Errors
    ///
    /// Returns the renderer's I/O error.
    pub async fn clear(&self) -> std::io::Result<()> {
        self.renderer.lock().await.clear()
    }

    /// Return whether the process output is still open and the session has
    /// not been closed.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.closed && *self.alive.borrow()
    }

    /// Wait until the process output has ended and been fully rendered.
    pub async fn wait_for_exit(&self) {
        let mut alive = self.alive.clone();
        drop(alive.wait_for(|is_alive| !*is_alive).await);
    }

    /// Stop both pipes and dispose the renderer.
    ///
    /// The shell process itself is not killed. Closing twice is a no-op.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.input = None;
        for task in self.tasks.drain(..) {
            task.abort();
            drop(task.await);
        }
        self.renderer.lock().await.dispose();
        tracing::info!(session_id = self.id, command = %self.command, "shell session closed");
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl fmt::Debug for ShellSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellSession")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

async fn pump_output(session_id: u64, mut output: OutputStream, chunks: mpsc::Sender<Vec<u8>>) {
    while let Some(next) = output.next().await {
        match next {
            Ok(bytes) => {
                if chunks.send(bytes).await.is_err() {
                    break;
                }
            }
            Err(error) => {
                tracing::warn!(session_id, error = %error, "shell output stream failed");
                break;
            }
        }
    }
    tracing::debug!(session_id, "shell output ended");
}

async fn render_output(
    session_id: u64,
    mut chunks: mpsc::Receiver<Vec<u8>>,
    renderer: SharedRenderer,
    alive: watch::Sender<bool>,
) {
    while let Some(bytes) = chunks.recv().await {
        if let Err(error) = renderer.lock().await.write(&bytes) {
            tracing::warn!(session_id, error = %error, "renderer rejected shell output");
        }
    }
    alive.send_replace(false);
}

async fn forward_input(
    session_id: u64,
    mut input: InputSink,
    mut chunks: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(bytes) = chunks.recv().await {
        let written = async {
            input.write_all(&bytes).await?;
            input.flush().await
        }
        .await;
        if let Err(error) = written {
            tracing::warn!(session_id, error = %error, "shell input pipe failed");
            return;
        }
    }
}
