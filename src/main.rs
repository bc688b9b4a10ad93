//! `repobox` application entry point.
//!
//! Uses `eyre` for opaque error handling at the application boundary,
//! converting domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/repobox/config.toml` or path from `REPOBOX_CONFIG_PATH`)
//! 3. Environment variables (`REPOBOX_*`)
//! 4. Command-line arguments
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`), so the shell's
//! output on stdout stays clean.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Report, Result as EyreResult};
use repobox::api::{self, WorkspaceSource};
use repobox::config::{AppConfig, Cli, Commands, ImportArgs, OpenArgs, load_config};
use repobox::error::{ContainerError, Result as RepoboxResult};
use repobox::lifecycle::SandboxLifecycle;
use repobox::shell::{ShellSession, StdoutRenderer, local_terminal_size};
use repobox::store::DirectoryStore;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

const STDIN_CHUNK_BYTES: usize = 1024;
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// Application entry point.
///
/// Parses the CLI, loads configuration, then runs the subcommand on a Tokio
/// runtime.
fn main() -> EyreResult<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli).map_err(Report::from)?;

    let runtime = tokio::runtime::Runtime::new().map_err(|error| {
        Report::from(ContainerError::RuntimeCreationFailed {
            message: error.to_string(),
        })
    })?;
    let result = runtime.block_on(run(&cli, &config));
    // Tokio's stdin reader parks a blocking thread that never returns.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result.map_err(Report::from)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Execute the CLI command, returning domain-specific errors.
///
/// Keeps semantic errors inside the run loop so the CLI boundary owns
/// conversion to `eyre::Report`.
async fn run(cli: &Cli, config: &AppConfig) -> RepoboxResult<()> {
    match &cli.command {
        Commands::Import(args) => import_command(config, args).await,
        Commands::Open(args) => open_command(config, args).await,
    }
}

/// Import a repository and print the saved record id.
#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn import_command(config: &AppConfig, args: &ImportArgs) -> RepoboxResult<()> {
    let store = DirectoryStore::open(&config.store.dir)?;
    let importer = api::github_importer(config)?;
    let imported = api::import_repository(&args.url, &importer, &store).await?;
    println!("{}", imported.record_id);
    Ok(())
}

/// Open a workspace, attach the local terminal to a shell, then tear down.
async fn open_command(config: &AppConfig, args: &OpenArgs) -> RepoboxResult<()> {
    let source = match (&args.url, &args.record) {
        (_, Some(record)) => WorkspaceSource::Record(record.clone()),
        (Some(url), None) => WorkspaceSource::Repository(url.clone()),
        (None, None) => {
            return Err(repobox::error::ConfigError::MissingRequired {
                field: String::from("url or --record"),
            }
            .into());
        }
    };

    let store = DirectoryStore::open(&config.store.dir)?;
    let importer = api::github_importer(config)?;
    let tree = api::load_tree(&source, &importer, &store).await?;

    let booter = api::docker_booter(config, &mockable::DefaultEnv::new())?;
    let lifecycle = Arc::new(SandboxLifecycle::new(booter));
    let workspace = api::open_workspace(lifecycle, tree).await?;

    let outcome = attach_shell(config, &workspace).await;
    workspace.close().await;
    outcome
}

async fn attach_shell(config: &AppConfig, workspace: &api::Workspace) -> RepoboxResult<()> {
    let interactive = std::io::stdin().is_terminal();
    let request = api::shell_request(config, &mockable::DefaultEnv::new(), interactive)?
        .with_size(local_terminal_size());
    let mut session = ShellSession::open(
        workspace.handle(),
        &request,
        Box::new(StdoutRenderer::new()),
        config.terminal.options(),
    )
    .await?;

    let piped = pipe_local_terminal(&session).await;
    session.close().await;
    piped
}

/// Forward stdin and window resizes to `session` until its process exits.
async fn pipe_local_terminal(session: &ShellSession) -> RepoboxResult<()> {
    let mut stdin = tokio::io::stdin();
    let mut buffer = vec![0_u8; STDIN_CHUNK_BYTES];
    let mut stdin_open = true;
    let mut resizes = WindowChanges::listen();

    loop {
        tokio::select! {
            () = session.wait_for_exit() => return Ok(()),
            read = stdin.read(&mut buffer), if stdin_open => match read {
                Ok(0) => stdin_open = false,
                Err(error) => {
                    tracing::warn!(error = %error, "failed to read stdin; input forwarding stopped");
                    stdin_open = false;
                }
                Ok(count) => {
                    if let Some(chunk) = buffer.get(..count) {
                        session.send_input(chunk)?;
                    }
                }
            },
            () = resizes.next(), if resizes.is_active() => {
                session.resize().await?;
            }
        }
    }
}

/// Local terminal window-change notifications.
struct WindowChanges {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl WindowChanges {
    #[cfg(unix)]
    fn listen() -> Self {
        let signal =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::window_change())
                .inspect_err(|error| {
                    tracing::warn!(error = %error, "failed to subscribe to SIGWINCH");
                })
                .ok();
        Self { signal }
    }

    #[cfg(not(unix))]
    const fn listen() -> Self {
        Self {}
    }

    #[cfg(unix)]
    const fn is_active(&self) -> bool {
        self.signal.is_some()
    }

    #[cfg(not(unix))]
    const fn is_active(&self) -> bool {
        false
    }

    #[cfg(unix)]
    async fn next(&mut self) {
        match self.signal.as_mut() {
            Some(listener) => {
                if listener.recv().await.is_none() {
                    self.signal = None;
                }
            }
            None => std::future::pending().await,
        }
    }

    #[cfg(not(unix))]
    async fn next(&mut self) {
        std::future::pending::<()>().await;
    }
}
