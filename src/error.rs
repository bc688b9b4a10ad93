//! Semantic error types for the repobox application.
//!
//! This module defines the error hierarchy for repobox, following the principle
//! of using semantic error enums (via `thiserror`) for conditions the caller
//! might inspect, retry, or surface to a user, while reserving opaque errors
//! (`eyre::Report`) for the application boundary.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised while importing a remote repository.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The repository reference does not have the `github.com/owner/repo` shape.
    #[error("invalid repository reference: {input}")]
    InvalidReference {
        /// The user-supplied reference, verbatim.
        input: String,
    },

    /// The remote API failed while listing or fetching `path`.
    ///
    /// Raised for network, authentication and rate-limit failures, and for
    /// content that cannot be decoded. No partial tree is returned.
    #[error("failed to fetch '{path}' from repository: {message}")]
    FetchFailure {
        /// The repository path being fetched (empty for the root listing).
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The GitHub client could not be constructed.
    #[error("failed to build GitHub client: {message}")]
    ClientBuildFailed {
        /// A description of the failure.
        message: String,
    },
}

/// Errors that can occur while talking to the container engine.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Failed to connect to the container engine socket.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// Failed to create a tokio runtime for a blocking helper.
    #[error("failed to create async runtime: {message}")]
    RuntimeCreationFailed {
        /// A description of the failure.
        message: String,
    },

    /// Health check failed: the engine did not respond correctly.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// Health check timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// Failed to create or start the sandbox container.
    #[error("failed to start sandbox container: {message}")]
    StartFailed {
        /// A description of the failure.
        message: String,
    },

    /// Failed to execute a command in a container.
    #[error("failed to execute command in container '{container_id}': {message}")]
    ExecFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the execution failure.
        message: String,
    },

    /// Failed to upload an archive into a container.
    #[error("failed to upload files to container '{container_id}': {message}")]
    UploadFailed {
        /// The ID of the target container.
        container_id: String,
        /// A description of the upload failure.
        message: String,
    },
}

/// Errors surfaced by the sandbox lifecycle, materializer and shell sessions.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// An operation needed a ready sandbox but none has been acquired.
    #[error("no sandbox is ready; acquire one first")]
    Unavailable,

    /// The sandbox failed to boot. The failed attempt is cleared, so a later
    /// acquire starts a fresh boot.
    #[error("sandbox failed to boot: {message}")]
    BootFailed {
        /// A description of the boot failure.
        message: String,
    },

    /// A filesystem write inside the sandbox failed.
    #[error("failed to write file at {path}: {message}")]
    WriteFailed {
        /// The workspace path that could not be written.
        path: String,
        /// The underlying cause.
        message: String,
    },

    /// The workspace tree could not be mounted into the sandbox.
    #[error("failed to mount workspace: {message}")]
    MountFailed {
        /// The underlying cause.
        message: String,
    },

    /// The shell process could not be spawned.
    #[error("failed to spawn '{command}' in sandbox: {message}")]
    SpawnFailed {
        /// The command that was requested.
        command: String,
        /// The underlying cause.
        message: String,
    },

    /// Tearing the sandbox down failed.
    #[error("failed to tear down sandbox '{sandbox_id}': {message}")]
    TeardownFailed {
        /// The identifier of the sandbox.
        sandbox_id: String,
        /// The underlying cause.
        message: String,
    },

    /// Input was sent to a shell session that is already closed.
    #[error("shell session {session_id} is closed")]
    SessionClosed {
        /// The identifier of the session.
        session_id: u64,
    },
}

/// Errors raised by the workspace record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred while reading or writing a record.
    #[error("I/O error at '{path}': {message}")]
    IoError {
        /// The path where the error occurred.
        path: PathBuf,
        /// A description of the I/O error.
        message: String,
    },

    /// A record could not be serialised or deserialised.
    #[error("malformed workspace record '{id}': {message}")]
    Malformed {
        /// The record identifier.
        id: String,
        /// A description of the failure.
        message: String,
    },

    /// No record exists with the given identifier.
    #[error("workspace record not found: {id}")]
    NotFound {
        /// The record identifier.
        id: String,
    },
}

/// Top-level error type for the repobox application.
///
/// This enum aggregates all domain-specific errors into a single type that can
/// be used throughout the library. At the application boundary (main.rs),
/// these errors are converted to `eyre::Report` for human-readable reporting.
#[derive(Debug, Error)]
pub enum RepoboxError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred while importing a repository.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// An error occurred while talking to the container engine.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// An error occurred in the sandbox runtime.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// An error occurred in the workspace record store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A specialised `Result` type for repobox operations.
pub type Result<T> = std::result::Result<T, RepoboxError>;
