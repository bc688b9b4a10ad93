//! Exec-session helpers: detached commands with exit-code polling, and
//! attached sessions whose streams are handed back as process pipes.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, ResizeExecOptions, StartExecOptions, StartExecResults};
use futures_util::StreamExt;
use tokio::time::sleep;

use super::client::EngineClient;
use crate::engine::{BoxFuture, ProcessPipes, PtyResizer, SpawnRequest, TerminalSize};
use crate::error::{ContainerError, RepoboxError, Result};

const EXEC_INSPECT_POLL_INTERVAL_MS: u64 = 100;

/// Run `command` to completion without attaching streams and return its exit
/// code.
pub(super) async fn run_detached_async<C: EngineClient + ?Sized>(
    client: &C,
    container_id: &str,
    command: Vec<String>,
) -> Result<i64> {
    let options = CreateExecOptions::<String> {
        attach_stdin: Some(false),
        attach_stdout: Some(false),
        attach_stderr: Some(false),
        tty: Some(false),
        cmd: Some(command),
        ..CreateExecOptions::default()
    };
    let exec_id = client
        .create_exec(container_id, options)
        .await
        .map_err(|error| exec_failed(container_id, format!("create exec failed: {error}")))?
        .id;

    let start_options = StartExecOptions {
        detach: true,
        tty: false,
        output_capacity: None,
    };
    match client
        .start_exec(&exec_id, Some(start_options))
        .await
        .map_err(|error| exec_failed(container_id, format!("start exec failed: {error}")))?
    {
        StartExecResults::Detached => {}
        StartExecResults::Attached { .. } => {
            return Err(exec_failed(
                container_id,
                "daemon returned attached start result for detached mode",
            ));
        }
    }

    wait_for_exit_code_async(client, container_id, &exec_id).await
}

/// Start an attached exec session and return its pipes.
pub(super) async fn spawn_attached_async<C: EngineClient + 'static>(
    client: &Arc<C>,
    container_id: &str,
    workdir: &str,
    request: &SpawnRequest,
) -> Result<ProcessPipes> {
    let options = CreateExecOptions::<String> {
        attach_stdin: Some(true),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        tty: Some(request.tty()),
        env: Some(request.env().to_vec()),
        cmd: Some(request.command().to_vec()),
        working_dir: Some(String::from(workdir)),
        ..CreateExecOptions::default()
    };
    let exec_id = client
        .create_exec(container_id, options)
        .await
        .map_err(|error| exec_failed(container_id, format!("create exec failed: {error}")))?
        .id;

    let start_options = StartExecOptions {
        detach: false,
        tty: request.tty(),
        output_capacity: None,
    };
    let (output, input) = match client
        .start_exec(&exec_id, Some(start_options))
        .await
        .map_err(|error| exec_failed(container_id, format!("start exec failed: {error}")))?
    {
        StartExecResults::Attached { output, input } => (output, input),
        StartExecResults::Detached => {
            return Err(exec_failed(
                container_id,
                "daemon returned detached start result for attached mode",
            ));
        }
    };

    let resizer = request.tty().then(|| ExecResizer {
        client: Arc::clone(client),
        container_id: String::from(container_id),
        exec_id: exec_id.clone(),
    });
    if let (Some(exec_resizer), Some(size)) = (resizer.as_ref(), request.size()) {
        exec_resizer.resize(size).await?;
    }

    let output = output
        .map(|chunk| chunk.map(log_output_bytes).map_err(io::Error::other))
        .boxed();

    Ok(ProcessPipes {
        input,
        output,
        resizer: resizer.map(|exec_resizer| Box::new(exec_resizer) as Box<dyn PtyResizer>),
    })
}

/// Poll an exec session until it stops and return its exit code.
pub(super) async fn wait_for_exit_code_async<C: EngineClient + ?Sized>(
    client: &C,
    container_id: &str,
    exec_id: &str,
) -> Result<i64> {
    loop {
        let inspect = client
            .inspect_exec(exec_id)
            .await
            .map_err(|error| exec_failed(container_id, format!("inspect exec failed: {error}")))?;

        if inspect.running.unwrap_or(false) {
            sleep(Duration::from_millis(EXEC_INSPECT_POLL_INTERVAL_MS)).await;
            continue;
        }

        if let Some(exit_code) = inspect.exit_code {
            return Ok(exit_code);
        }

        return Err(exec_failed(
            container_id,
            format!("exec session '{exec_id}' completed without an exit code"),
        ));
    }
}

fn log_output_bytes(chunk: LogOutput) -> Vec<u8> {
    match chunk {
        LogOutput::StdErr { message }
        | LogOutput::StdOut { message }
        | LogOutput::Console { message }
        | LogOutput::StdIn { message } => message.to_vec(),
    }
}

pub(super) fn exec_failed(container_id: &str, message: impl Into<String>) -> RepoboxError {
    RepoboxError::from(ContainerError::ExecFailed {
        container_id: String::from(container_id),
        message: message.into(),
    })
}

/// Resizes the pseudo-terminal of one exec session.
struct ExecResizer<C> {
    client: Arc<C>,
    container_id: String,
    exec_id: String,
}

impl<C: EngineClient> PtyResizer for ExecResizer<C> {
    fn resize(&self, size: TerminalSize) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.client
                .resize_exec(
                    &self.exec_id,
                    ResizeExecOptions {
                        width: size.width,
                        height: size.height,
                    },
                )
                .await
                .map_err(|error| {
                    exec_failed(&self.container_id, format!("resize exec failed: {error}"))
                })
        })
    }
}
