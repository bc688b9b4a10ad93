//! Given/When steps for sandbox lifecycle scenarios.

use std::sync::Arc;

use futures_util::future::join_all;
use repobox::engine::SandboxBooter;
use repobox::lifecycle::SandboxLifecycle;
use repobox::workspace::Materializer;
use rstest_bdd_macros::{given, when};

use super::state::{CountingBooter, SandboxLifecycleState};

pub type StepResult<T> = Result<T, String>;

pub(crate) fn runtime(
    state: &SandboxLifecycleState,
) -> StepResult<Arc<tokio::runtime::Runtime>> {
    state
        .runtime
        .get()
        .ok_or_else(|| String::from("runtime should be configured"))
}

pub(crate) fn lifecycle(state: &SandboxLifecycleState) -> StepResult<Arc<SandboxLifecycle>> {
    state
        .lifecycle
        .get()
        .ok_or_else(|| String::from("lifecycle should be configured"))
}

fn install_booter(state: &SandboxLifecycleState, booter: CountingBooter) -> StepResult<()> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|error| format!("failed to create runtime: {error}"))?;
    let booter = Arc::new(booter);
    let lifecycle = SandboxLifecycle::new(Arc::clone(&booter) as Arc<dyn SandboxBooter>);
    state.runtime.set(Arc::new(runtime));
    state.booter.set(booter);
    state.lifecycle.set(Arc::new(lifecycle));
    Ok(())
}

#[given("a sandbox booter")]
fn a_sandbox_booter(sandbox_lifecycle_state: &SandboxLifecycleState) -> StepResult<()> {
    install_booter(sandbox_lifecycle_state, CountingBooter::default())
}

#[given("a sandbox booter whose first boot fails")]
fn a_failing_sandbox_booter(sandbox_lifecycle_state: &SandboxLifecycleState) -> StepResult<()> {
    install_booter(
        sandbox_lifecycle_state,
        CountingBooter {
            fail_first: true,
            ..CountingBooter::default()
        },
    )
}

#[when("{count} concurrent acquires are made")]
fn concurrent_acquires(
    sandbox_lifecycle_state: &SandboxLifecycleState,
    count: usize,
) -> StepResult<()> {
    let runtime = runtime(sandbox_lifecycle_state)?;
    let lifecycle = lifecycle(sandbox_lifecycle_state)?;

    let results = runtime.block_on(join_all((0..count).map(|_| lifecycle.acquire())));

    let mut handles = vec![];
    let mut errors = vec![];
    for result in results {
        match result {
            Ok(handle) => handles.push(handle),
            Err(error) => errors.push(error.to_string()),
        }
    }
    sandbox_lifecycle_state.handles.set(handles);
    sandbox_lifecycle_state.acquire_errors.set(errors);
    Ok(())
}

#[when("the sandbox is destroyed")]
fn sandbox_is_destroyed(sandbox_lifecycle_state: &SandboxLifecycleState) -> StepResult<()> {
    let runtime = runtime(sandbox_lifecycle_state)?;
    let lifecycle = lifecycle(sandbox_lifecycle_state)?;
    runtime.block_on(lifecycle.destroy());
    Ok(())
}

#[when("the file {path} is written")]
fn file_is_written(sandbox_lifecycle_state: &SandboxLifecycleState, path: String) -> StepResult<()> {
    let runtime = runtime(sandbox_lifecycle_state)?;
    let materializer = Materializer::new(lifecycle(sandbox_lifecycle_state)?);

    let result = runtime.block_on(materializer.write_file(&path, b"- [ ] ship it\n"));

    sandbox_lifecycle_state
        .write_error
        .set(result.err().map(|error| error.to_string()));
    Ok(())
}
