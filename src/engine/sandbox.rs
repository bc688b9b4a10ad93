//! The execution sandbox contract consumed by the workspace runtime.
//!
//! A [`SandboxBooter`] starts an execution environment and returns a
//! [`SandboxHandle`]; the handle exposes the filesystem, mount, spawn and
//! teardown operations. Both traits return boxed futures so they can be used
//! as trait objects and mocked with `mockall`.

use std::fmt;
use std::future::Future;
use std::io;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::stream::BoxStream;
use tokio::io::AsyncWrite;

use crate::error::{ConfigError, RepoboxError, Result};
use crate::workspace::MountTree;

/// A boxed, sendable future used by the sandbox traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Byte stream produced by a spawned process.
pub type OutputStream = BoxStream<'static, io::Result<Vec<u8>>>;

/// Byte sink accepting input for a spawned process.
pub type InputSink = Pin<Box<dyn AsyncWrite + Send>>;

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    /// Number of columns.
    pub width: u16,
    /// Number of rows.
    pub height: u16,
}

/// A booted execution environment.
pub trait Sandbox: Send + Sync {
    /// Return the engine-assigned identifier of this sandbox.
    fn id(&self) -> &str;

    /// Create a directory relative to the workspace root.
    ///
    /// With `recursive` set, missing parents are created and an existing
    /// directory is not an error.
    fn mkdir(&self, path: &str, recursive: bool) -> BoxFuture<'_, Result<()>>;

    /// Create or overwrite a file relative to the workspace root.
    fn write_file(&self, path: &str, contents: &[u8]) -> BoxFuture<'_, Result<()>>;

    /// Populate the workspace root from a mount tree.
    fn mount(&self, tree: &MountTree) -> BoxFuture<'_, Result<()>>;

    /// Spawn a process and return its attached pipes.
    fn spawn(&self, request: &SpawnRequest) -> BoxFuture<'_, Result<ProcessPipes>>;

    /// Stop the environment and release its resources.
    fn teardown(&self) -> BoxFuture<'_, Result<()>>;
}

/// Starts execution environments.
#[cfg_attr(test, mockall::automock)]
pub trait SandboxBooter: Send + Sync {
    /// Boot a fresh sandbox.
    fn boot(&self) -> BoxFuture<'_, Result<SandboxHandle>>;
}

/// Resizes the pseudo-terminal of a spawned process.
pub trait PtyResizer: Send + Sync {
    /// Apply `size` to the process terminal.
    fn resize(&self, size: TerminalSize) -> BoxFuture<'_, Result<()>>;
}

/// Shared reference to a booted sandbox.
///
/// Cloning is cheap; all clones refer to the same environment.
#[derive(Clone)]
pub struct SandboxHandle {
    inner: Arc<dyn Sandbox>,
}

impl SandboxHandle {
    /// Wrap a sandbox implementation.
    #[must_use]
    pub fn new(sandbox: impl Sandbox + 'static) -> Self {
        Self {
            inner: Arc::new(sandbox),
        }
    }

    /// Wrap an already shared sandbox implementation.
    #[must_use]
    pub fn from_arc(inner: Arc<dyn Sandbox>) -> Self {
        Self { inner }
    }

    /// Return whether both handles refer to the same sandbox instance.
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }
}

impl Deref for SandboxHandle {
    type Target = dyn Sandbox;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl fmt::Debug for SandboxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxHandle")
            .field("id", &self.inner.id())
            .finish()
    }
}

/// Parameters for spawning a process inside a sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    command: Vec<String>,
    env: Vec<String>,
    tty: bool,
    size: Option<TerminalSize>,
}

impl SpawnRequest {
    /// Create a request for `command` with a pseudo-terminal allocated.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when `command` is empty and
    /// `ConfigError::InvalidValue` when its executable is blank.
    pub fn new(command: Vec<String>) -> Result<Self> {
        let Some(executable) = command.first() else {
            return Err(RepoboxError::from(ConfigError::MissingRequired {
                field: String::from("command"),
            }));
        };
        if executable.trim().is_empty() {
            return Err(RepoboxError::from(ConfigError::InvalidValue {
                field: String::from("command"),
                reason: String::from("command executable must not be empty"),
            }));
        }

        Ok(Self {
            command,
            env: vec![String::from("TERM=xterm-256color")],
            tty: true,
            size: None,
        })
    }

    /// Create a request for an interactive shell program.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::new`].
    pub fn shell(program: &str) -> Result<Self> {
        Self::new(vec![String::from(program)])
    }

    /// Append environment variables in `KEY=value` form.
    #[must_use]
    pub fn with_env(mut self, env: impl IntoIterator<Item = String>) -> Self {
        self.env.extend(env);
        self
    }

    /// Control pseudo-terminal allocation.
    #[must_use]
    pub const fn with_tty(mut self, tty: bool) -> Self {
        self.tty = tty;
        self
    }

    /// Set the initial terminal size applied after spawn.
    #[must_use]
    pub const fn with_size(mut self, size: Option<TerminalSize>) -> Self {
        self.size = size;
        self
    }

    /// Return the command argv.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Return the command line joined with spaces, for messages.
    #[must_use]
    pub fn display_command(&self) -> String {
        self.command.join(" ")
    }

    /// Return the environment entries.
    #[must_use]
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// Return whether a pseudo-terminal is requested.
    #[must_use]
    pub const fn tty(&self) -> bool {
        self.tty
    }

    /// Return the initial terminal size, if any.
    #[must_use]
    pub const fn size(&self) -> Option<TerminalSize> {
        self.size
    }
}

/// The pipes of a spawned process.
pub struct ProcessPipes {
    /// Accepts bytes for the process's standard input.
    pub input: InputSink,
    /// Produces the bytes the process prints, in emission order.
    pub output: OutputStream,
    /// Resizes the process terminal, when one was allocated.
    pub resizer: Option<Box<dyn PtyResizer>>,
}

impl fmt::Debug for ProcessPipes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessPipes")
            .field("resizable", &self.resizer.is_some())
            .finish_non_exhaustive()
    }
}
