//! Execution sandboxes and the container engine behind them.
//!
//! The [`Sandbox`] and [`SandboxBooter`] traits describe what the workspace
//! runtime needs from an execution environment. The container-backed
//! implementation connects to Docker or Podman; its socket endpoint is
//! resolved through a priority-based fallback chain:
//!
//! 1. CLI argument (`--engine-socket`)
//! 2. Config file (`engine_socket` in TOML)
//! 3. `REPOBOX_ENGINE_SOCKET` environment variable
//! 4. `DOCKER_HOST` environment variable
//! 5. `CONTAINER_HOST` environment variable
//! 6. `PODMAN_HOST` environment variable
//! 7. Platform default (`/var/run/docker.sock` on Unix)

mod connection;
mod sandbox;

#[cfg(test)]
pub use sandbox::MockSandboxBooter;
pub use connection::{
    DockerSandbox, DockerSandboxBooter, EngineClient, EngineConnector, EngineFuture,
    SandboxSettings, SocketResolver,
};
pub use sandbox::{
    BoxFuture, InputSink, OutputStream, ProcessPipes, PtyResizer, Sandbox, SandboxBooter,
    SandboxHandle, SpawnRequest, TerminalSize,
};
