//! Given/When steps for shell session scenarios.

use std::sync::{Arc, Mutex};

use repobox::engine::{Sandbox, SandboxHandle, SpawnRequest};
use repobox::shell::{ShellOptions, ShellSession};
use rstest_bdd_macros::{given, when};

use super::state::{RecordingRenderer, ScriptedSandbox, ShellSessionState};

pub type StepResult<T> = Result<T, String>;

pub(crate) fn runtime(state: &ShellSessionState) -> StepResult<Arc<tokio::runtime::Runtime>> {
    state
        .runtime
        .get()
        .ok_or_else(|| String::from("runtime should be configured"))
}

pub(crate) fn sessions(state: &ShellSessionState) -> StepResult<Arc<Mutex<Vec<ShellSession>>>> {
    state
        .sessions
        .get()
        .ok_or_else(|| String::from("sessions should be opened"))
}

pub(crate) fn renderer(state: &ShellSessionState, index: usize) -> StepResult<RecordingRenderer> {
    state
        .renderers
        .get()
        .and_then(|renderers| renderers.get(index).cloned())
        .ok_or_else(|| format!("renderer {index} should exist"))
}

fn open_sessions(state: &ShellSessionState, count: usize) -> StepResult<()> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|error| format!("failed to create runtime: {error}"))?;
    let sandbox = Arc::new(ScriptedSandbox::default());
    let handle = SandboxHandle::from_arc(Arc::clone(&sandbox) as Arc<dyn Sandbox>);
    let request = SpawnRequest::shell("/bin/sh").map_err(|error| error.to_string())?;

    let mut sessions = vec![];
    let mut renderers = vec![];
    for _ in 0..count {
        let renderer = RecordingRenderer::default();
        let session = runtime
            .block_on(ShellSession::open(
                &handle,
                &request,
                Box::new(renderer.clone()),
                ShellOptions::default(),
            ))
            .map_err(|error| format!("session should open: {error}"))?;
        sessions.push(session);
        renderers.push(renderer);
    }

    state.runtime.set(Arc::new(runtime));
    state.sandbox.set(sandbox);
    state.sessions.set(Arc::new(Mutex::new(sessions)));
    state.renderers.set(renderers);
    Ok(())
}

fn emit(state: &ShellSessionState, index: usize, chunks: &[&str]) -> StepResult<()> {
    let sandbox = state
        .sandbox
        .get()
        .ok_or_else(|| String::from("sandbox should be configured"))?;
    let processes = sandbox
        .processes
        .lock()
        .map_err(|_| String::from("processes lock poisoned"))?;
    let sender = processes
        .get(index)
        .and_then(|process| process.output.as_ref())
        .ok_or_else(|| format!("process {index} should be running"))?;
    for chunk in chunks {
        sender
            .send(Ok(chunk.as_bytes().to_vec()))
            .map_err(|_| format!("process {index} output was closed"))?;
    }
    Ok(())
}

#[given("a shell session on a scripted sandbox")]
fn a_shell_session(shell_session_state: &ShellSessionState) -> StepResult<()> {
    open_sessions(shell_session_state, 1)
}

#[given("two shell sessions on one scripted sandbox")]
fn two_shell_sessions(shell_session_state: &ShellSessionState) -> StepResult<()> {
    open_sessions(shell_session_state, 2)
}

#[when("the process writes {first} then {second}")]
fn process_writes(
    shell_session_state: &ShellSessionState,
    first: String,
    second: String,
) -> StepResult<()> {
    emit(shell_session_state, 0, &[&first, &second])
}

#[when("the second process writes {text}")]
fn second_process_writes(shell_session_state: &ShellSessionState, text: String) -> StepResult<()> {
    emit(shell_session_state, 1, &[&text])
}

#[when("the process exits")]
fn process_exits(shell_session_state: &ShellSessionState) -> StepResult<()> {
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
    process.output = None;
    Ok(())
}

#[when("the user types {first} then {second}")]
fn user_types(
    shell_session_state: &ShellSessionState,
    first: String,
    second: String,
) -> StepResult<()> {
    let sessions = sessions(shell_session_state)?;
    let sessions = sessions
        .lock()
        .map_err(|_| String::from("sessions lock poisoned"))?;
    let session = sessions
        .first()
        .ok_or_else(|| String::from("a session should be open"))?;
    for chunk in [first, second] {
        session
            .send_input(chunk.as_bytes())
            .map_err(|error| error.to_string())?;
    }
    Ok(())
}

#[when("the first session is closed")]
fn first_session_is_closed(shell_session_state: &ShellSessionState) -> StepResult<()> {
    let runtime = runtime(shell_session_state)?;
    let sessions = sessions(shell_session_state)?;
    let mut sessions = sessions
        .lock()
        .map_err(|_| String::from("sessions lock poisoned"))?;
    let session = sessions
        .first_mut()
        .ok_or_else(|| String::from("a session should be open"))?;
    runtime.block_on(session.close());
    Ok(())
}
