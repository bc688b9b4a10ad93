//! Then-step assertions for sandbox lifecycle scenarios.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use rstest_bdd_macros::then;

use super::state::{CountingBooter, MemorySandbox, SandboxLifecycleState};
use super::steps::{StepResult, lifecycle, runtime};

fn booter(state: &SandboxLifecycleState) -> StepResult<Arc<CountingBooter>> {
    state
        .booter
        .get()
        .ok_or_else(|| String::from("booter should be configured"))
}

fn latest_sandbox(state: &SandboxLifecycleState) -> StepResult<Arc<MemorySandbox>> {
    booter(state)?
        .latest()
        .ok_or_else(|| String::from("a sandbox should have booted"))
}

#[then("the boot count is {count}")]
fn boot_count_is(sandbox_lifecycle_state: &SandboxLifecycleState, count: usize) -> StepResult<()> {
    let boots = booter(sandbox_lifecycle_state)?.boots.load(Ordering::SeqCst);
    if boots == count {
        Ok(())
    } else {
        Err(format!("expected {count} boots, got {boots}"))
    }
}

#[then("the teardown count is {count}")]
fn teardown_count_is(
    sandbox_lifecycle_state: &SandboxLifecycleState,
    count: usize,
) -> StepResult<()> {
    let teardowns = booter(sandbox_lifecycle_state)?
        .teardowns
        .load(Ordering::SeqCst);
    if teardowns == count {
        Ok(())
    } else {
        Err(format!("expected {count} teardowns, got {teardowns}"))
    }
}

#[then("every caller received the same sandbox")]
fn every_caller_received_same_sandbox(
    sandbox_lifecycle_state: &SandboxLifecycleState,
) -> StepResult<()> {
    let handles = sandbox_lifecycle_state.handles.get().unwrap_or_default();
    let Some(first) = handles.first() else {
        return Err(String::from("at least one caller should hold a sandbox"));
    };
    if handles.iter().all(|handle| handle.same_instance(first)) {
        Ok(())
    } else {
        Err(String::from("callers received different sandboxes"))
    }
}

#[then("acquiring failed with a boot error")]
fn acquiring_failed_with_boot_error(
    sandbox_lifecycle_state: &SandboxLifecycleState,
) -> StepResult<()> {
    let errors = sandbox_lifecycle_state.acquire_errors.get().unwrap_or_default();
    if errors
        .iter()
        .any(|message| message.contains("sandbox failed to boot"))
    {
        Ok(())
    } else {
        Err(format!("expected a boot error, got {errors:?}"))
    }
}

#[then("the lifecycle is {phase}")]
fn lifecycle_is(sandbox_lifecycle_state: &SandboxLifecycleState, phase: String) -> StepResult<()> {
    let runtime = runtime(sandbox_lifecycle_state)?;
    let lifecycle = lifecycle(sandbox_lifecycle_state)?;
    let actual = format!("{:?}", runtime.block_on(lifecycle.phase())).to_lowercase();
    if actual == phase {
        Ok(())
    } else {
        Err(format!("expected lifecycle {phase}, got {actual}"))
    }
}

#[then("the write fails because no sandbox is ready")]
fn write_fails_without_sandbox(sandbox_lifecycle_state: &SandboxLifecycleState) -> StepResult<()> {
    match sandbox_lifecycle_state.write_error.get().flatten() {
        Some(message) if message.contains("no sandbox is ready") => Ok(()),
        Some(message) => Err(format!("unexpected write error: {message}")),
        None => Err(String::from("expected the write to fail")),
    }
}

#[then("the sandbox holds {path}")]
fn sandbox_holds(sandbox_lifecycle_state: &SandboxLifecycleState, path: String) -> StepResult<()> {
    if let Some(message) = sandbox_lifecycle_state.write_error.get().flatten() {
        return Err(format!("write should succeed, got: {message}"));
    }
    let sandbox = latest_sandbox(sandbox_lifecycle_state)?;
    let files = sandbox
        .files
        .lock()
        .map_err(|_| String::from("files lock poisoned"))?;
    if files.contains_key(&path) {
        Ok(())
    } else {
        Err(format!("expected '{path}' in {:?}", files.keys().collect::<Vec<_>>()))
    }
}

#[then("the sandbox created the directory {path}")]
fn sandbox_created_directory(
    sandbox_lifecycle_state: &SandboxLifecycleState,
    path: String,
) -> StepResult<()> {
    let sandbox = latest_sandbox(sandbox_lifecycle_state)?;
    let directories = sandbox
        .directories
        .lock()
        .map_err(|_| String::from("directories lock poisoned"))?;
    if directories.contains(&path) {
        Ok(())
    } else {
        Err(format!("expected directory '{path}', got {directories:?}"))
    }
}
