//! Terminal renderers: where shell output is drawn.

use std::io::{self, IsTerminal, Write};
use std::process::Command;

use crate::engine::TerminalSize;

const STTY_COMMAND: &str = "stty";
const CLEAR_SCREEN: &[u8] = b"\x1b[2J\x1b[H";

/// A surface that displays shell output.
///
/// Renderers are driven from a single task at a time, so methods take
/// `&mut self`.
pub trait TerminalRenderer: Send + 'static {
    /// Draw `bytes` exactly as the process emitted them.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the surface rejects the write.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Fit the surface to its available space and report the resulting size.
    ///
    /// Returns `None` when the size cannot be determined.
    fn fit(&mut self) -> Option<TerminalSize>;

    /// Clear the visible surface.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the surface rejects the clear.
    fn clear(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Release the surface. No output is drawn afterwards.
    fn dispose(&mut self);
}

/// Renders to the local process's standard output.
#[derive(Debug)]
pub struct StdoutRenderer {
    stdout: io::Stdout,
    disposed: bool,
}

impl StdoutRenderer {
    /// Create a renderer over standard output.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
            disposed: false,
        }
    }
}

impl Default for StdoutRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalRenderer for StdoutRenderer {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.disposed {
            return Ok(());
        }
        let mut locked = self.stdout.lock();
        locked.write_all(bytes)?;
        locked.flush()
    }

    fn fit(&mut self) -> Option<TerminalSize> {
        local_terminal_size()
    }

    fn clear(&mut self) -> io::Result<()> {
        self.write(CLEAR_SCREEN)
    }

    fn dispose(&mut self) {
        if let Err(error) = self.stdout.flush() {
            tracing::debug!(error = %error, "flushing stdout on dispose failed");
        }
        self.disposed = true;
    }
}

/// Query the size of the controlling terminal through `stty size`.
///
/// Returns `None` when standard input or output is not a terminal.
#[must_use]
pub fn local_terminal_size() -> Option<TerminalSize> {
    if !(io::stdin().is_terminal() && io::stdout().is_terminal()) {
        return None;
    }

    let output = Command::new(STTY_COMMAND).arg("size").output().ok()?;
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8(output.stdout).ok()?;
    parse_stty_size(&stdout)
}

fn parse_stty_size(output: &str) -> Option<TerminalSize> {
    let mut parts = output.split_whitespace();
    let height = parts.next()?.parse::<u16>().ok()?;
    let width = parts.next()?.parse::<u16>().ok()?;
    Some(TerminalSize { width, height })
}
