//! Then-step assertions for shell session scenarios.

use std::time::Duration;

use rstest_bdd_macros::then;
use tokio::io::AsyncReadExt;

use super::state::ShellSessionState;
use super::steps::{StepResult, renderer, runtime, sessions};

const WAIT_LIMIT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

fn terminal_shows(state: &ShellSessionState, index: usize, text: &str) -> StepResult<()> {
    let runtime = runtime(state)?;
    let renderer = renderer(state, index)?;
    let drawn = runtime.block_on(async {
        let wait = async {
            while renderer.text() != text {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        let _ = tokio::time::timeout(WAIT_LIMIT, wait).await;
        renderer.text()
    });
    if drawn == text {
        Ok(())
    } else {
        Err(format!("expected terminal {index} to show '{text}', got '{drawn}'"))
    }
}

#[then("the terminal shows {text}")]
fn the_terminal_shows(shell_session_state: &ShellSessionState, text: String) -> StepResult<()> {
    terminal_shows(shell_session_state, 0, &text)
}

#[then("the second terminal shows {text}")]
fn the_second_terminal_shows(
    shell_session_state: &ShellSessionState,
    text: String,
) -> StepResult<()> {
    terminal_shows(shell_session_state, 1, &text)
}

#[then("the session is no longer alive")]
fn session_is_no_longer_alive(shell_session_state: &ShellSessionState) -> StepResult<()> {
    let runtime = runtime(shell_session_state)?;
    let sessions = sessions(shell_session_state)?;
    let sessions = sessions
        .lock()
        .map_err(|_| String::from("sessions lock poisoned"))?;
    let session = sessions
        .first()
        .ok_or_else(|| String::from("a session should be open"))?;
    runtime
        .block_on(async { tokio::time::timeout(WAIT_LIMIT, session.wait_for_exit()).await })
        .map_err(|_| String::from("session should end after the process exits"))?;
    if session.is_alive() {
        Err(String::from("session still reports alive"))
    } else {
        Ok(())
    }
}

#[then("the process receives {text}")]
fn process_receives(shell_session_state: &ShellSessionState, text: String) -> StepResult<()> {
    let runtime = runtime(shell_session_state)?;
    let sandbox = shell_session_state
        .sandbox
        .get()
        .ok_or_else(|| String::from("sandbox should be configured"))?;
    let mut processes = sandbox
        .processes
        .lock()
        .map_err(|_| String::from("processes lock poisoned"))?;
    let process = processes
        .get_mut(0)
        .ok_or_else(|| String::from("process 0 should exist"))?;

    let mut received = vec![0_u8; text.len()];
    runtime
        .block_on(async {
            tokio::time::timeout(WAIT_LIMIT, process.input.read_exact(&mut received)).await
        })
        .map_err(|_| String::from("timed out waiting for input"))?
        .map_err(|error| format!("failed to read input: {error}"))?;

    let received = String::from_utf8_lossy(&received);
    if received == text {
        Ok(())
    } else {
        Err(format!("expected process input '{text}', got '{received}'"))
    }
}

#[then("the first terminal was disposed")]
fn first_terminal_was_disposed(shell_session_state: &ShellSessionState) -> StepResult<()> {
    if renderer(shell_session_state, 0)?.is_disposed() {
        Ok(())
    } else {
        Err(String::from("first renderer should be disposed"))
    }
}
