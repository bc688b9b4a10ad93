//! Interactive shells running inside the sandbox.
//!
//! A [`ShellSession`] owns one spawned shell and pipes its output into a
//! [`TerminalRenderer`] and user input into the process. Sessions on the same
//! sandbox are independent. [`TerminalPane`] guards a view against opening
//! more than one session.

mod pane;
mod renderer;
mod session;

pub use pane::TerminalPane;
pub use renderer::{StdoutRenderer, TerminalRenderer, local_terminal_size};
pub use session::{DEFAULT_OUTPUT_BUFFER_CHUNKS, ShellOptions, ShellSession};
