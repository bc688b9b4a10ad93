//! Open a GitHub repository as a live workspace inside a container sandbox.
//!
//! `repobox` imports a repository's tree through the GitHub contents API,
//! boots a single shared sandbox container, mounts the tree into it and pipes
//! an interactive shell between the sandbox and a terminal.
//!
//! # Architecture
//!
//! Data flows from the importer into the tree model, through the
//! materializer into the sandbox, and out to shell sessions:
//!
//! ```text
//! github -> tree -> workspace -> engine (sandbox) -> shell
//!                                  ^
//!                              lifecycle
//! ```
//!
//! Only [`lifecycle::SandboxLifecycle`] boots or destroys the sandbox; every
//! other component borrows a handle from it.
//!
//! # Modules
//!
//! - [`api`]: Composition root used by the CLI
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`engine`]: Sandbox contract and its container engine implementation
//! - [`error`]: Semantic error types for the application
//! - [`github`]: Repository references and recursive tree import
//! - [`lifecycle`]: Single-instance sandbox ownership
//! - [`shell`]: Interactive shell sessions and terminal renderers
//! - [`store`]: Persistence of imported workspaces
//! - [`tree`]: File and folder model shared by every component
//! - [`workspace`]: Mount-tree building and file write-through

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod github;
pub mod lifecycle;
pub mod shell;
pub mod store;
pub mod tree;
pub mod workspace;
