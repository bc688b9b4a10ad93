//! A view-level guard owning at most one shell session.

use super::renderer::TerminalRenderer;
use super::session::{ShellOptions, ShellSession};
use crate::engine::{SandboxHandle, SpawnRequest, TerminalSize};
use crate::error::Result;

/// Hosts a shell session for one terminal view.
///
/// Mounting an already mounted pane does nothing, so a view that is shown
/// twice never spawns a second process.
#[derive(Debug)]
pub struct TerminalPane {
    handle: SandboxHandle,
    request: SpawnRequest,
    options: ShellOptions,
    session: Option<ShellSession>,
}

impl TerminalPane {
    /// Create an unmounted pane that will run `request` in `handle`.
    #[must_use]
    pub const fn new(handle: SandboxHandle, request: SpawnRequest, options: ShellOptions) -> Self {
        Self {
            handle,
            request,
            options,
            session: None,
        }
    }

    /// Open the session if the pane has none.
    ///
    /// `make_renderer` is only called when a session is actually opened.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::SpawnFailed` when the shell cannot be spawned.
    pub async fn mount<F>(&mut self, make_renderer: F) -> Result<()>
    where
        F: FnOnce() -> Box<dyn TerminalRenderer>,
    {
        if self.session.is_some() {
            tracing::debug!("terminal pane already mounted");
            return Ok(());
        }
        let session =
            ShellSession::open(&self.handle, &self.request, make_renderer(), self.options).await?;
        self.session = Some(session);
        Ok(())
    }

    /// Close and drop the session, if any.
    pub async fn unmount(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }

    /// Return whether a session is open.
    #[must_use]
    pub const fn is_mounted(&self) -> bool {
        self.session.is_some()
    }

    /// Return the open session.
    #[must_use]
    pub const fn session(&self) -> Option<&ShellSession> {
        self.session.as_ref()
    }

    /// Echo `data` into the terminal without sending it to the process.
    ///
    /// Does nothing while unmounted.
    ///
    /// # Errors
    ///
    /// Returns the renderer's I/O error.
    pub async fn write_to_terminal(&self, data: &[u8]) -> std::io::Result<()> {
        match self.session.as_ref() {
            Some(session) => session.echo(data).await,
            None => Ok(()),
        }
    }

    /// Clear the terminal. Does nothing while unmounted.
    ///
    /// # Errors
    ///
    /// Returns the renderer's I/O error.
    pub async fn clear(&self) -> std::io::Result<()> {
        match self.session.as_ref() {
            Some(session) => session.clear().await,
            None => Ok(()),
        }
    }

    /// Refit the terminal after the view changed size.
    ///
    /// # Errors
    ///
    /// Returns the sandbox error raised while resizing the process terminal.
    pub async fn resize(&self) -> Result<Option<TerminalSize>> {
        match self.session.as_ref() {
            Some(session) => session.resize().await,
            None => Ok(None),
        }
    }
}
