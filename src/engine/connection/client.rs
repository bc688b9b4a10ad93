//! Trait seam over the `Bollard` calls the container sandbox needs.
//!
//! Keeping every daemon call behind [`EngineClient`] lets the sandbox and
//! booter logic be unit-tested without a live engine.

use bollard::errors::Error as BollardError;
use bollard::exec::{
    CreateExecOptions, CreateExecResults, ResizeExecOptions, StartExecOptions, StartExecResults,
};
use bollard::models::{ContainerCreateBody, ContainerCreateResponse, ExecInspectResponse};
use bollard::query_parameters::{
    CreateContainerOptions, RemoveContainerOptionsBuilder, UploadToContainerOptions,
};
use bollard::{Docker, body_full};

use crate::engine::BoxFuture;

/// Boxed future type returned by [`EngineClient`] methods.
pub type EngineFuture<'a, T> = BoxFuture<'a, Result<T, BollardError>>;

/// Behaviour required from a container engine client.
pub trait EngineClient: Send + Sync {
    /// Check that the engine answers requests.
    fn ping(&self) -> EngineFuture<'_, ()>;

    /// Create a container from `Bollard` options and body payload.
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        body: ContainerCreateBody,
    ) -> EngineFuture<'_, ContainerCreateResponse>;

    /// Start a created container.
    fn start_container(&self, container_id: &str) -> EngineFuture<'_, ()>;

    /// Force-remove a container, stopping it first if needed.
    fn remove_container(&self, container_id: &str) -> EngineFuture<'_, ()>;

    /// Upload a tar archive payload into `container_id`.
    fn upload_to_container(
        &self,
        container_id: &str,
        options: Option<UploadToContainerOptions>,
        archive_bytes: Vec<u8>,
    ) -> EngineFuture<'_, ()>;

    /// Create an exec session in a running container.
    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> EngineFuture<'_, CreateExecResults>;

    /// Start a previously created exec session.
    fn start_exec(
        &self,
        exec_id: &str,
        options: Option<StartExecOptions>,
    ) -> EngineFuture<'_, StartExecResults>;

    /// Inspect an exec session for running status and exit code.
    fn inspect_exec(&self, exec_id: &str) -> EngineFuture<'_, ExecInspectResponse>;

    /// Resize a running exec pseudo-terminal.
    fn resize_exec(&self, exec_id: &str, options: ResizeExecOptions) -> EngineFuture<'_, ()>;
}

impl EngineClient for Docker {
    fn ping(&self) -> EngineFuture<'_, ()> {
        Box::pin(async move { Self::ping(self).await.map(drop) })
    }

    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        body: ContainerCreateBody,
    ) -> EngineFuture<'_, ContainerCreateResponse> {
        Box::pin(async move { Self::create_container(self, options, body).await })
    }

    fn start_container(&self, container_id: &str) -> EngineFuture<'_, ()> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::start_container(self, &container_id_owned, None).await })
    }

    fn remove_container(&self, container_id: &str) -> EngineFuture<'_, ()> {
        let container_id_owned = String::from(container_id);
        let options = RemoveContainerOptionsBuilder::default().force(true).build();
        Box::pin(
            async move { Self::remove_container(self, &container_id_owned, Some(options)).await },
        )
    }

    fn upload_to_container(
        &self,
        container_id: &str,
        options: Option<UploadToContainerOptions>,
        archive_bytes: Vec<u8>,
    ) -> EngineFuture<'_, ()> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            Self::upload_to_container(
                self,
                &container_id_owned,
                options,
                body_full(archive_bytes.into()),
            )
            .await
        })
    }

    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> EngineFuture<'_, CreateExecResults> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::create_exec(self, &container_id_owned, options).await })
    }

    fn start_exec(
        &self,
        exec_id: &str,
        options: Option<StartExecOptions>,
    ) -> EngineFuture<'_, StartExecResults> {
        let exec_id_owned = String::from(exec_id);
        Box::pin(async move { Self::start_exec(self, &exec_id_owned, options).await })
    }

    fn inspect_exec(&self, exec_id: &str) -> EngineFuture<'_, ExecInspectResponse> {
        let exec_id_owned = String::from(exec_id);
        Box::pin(async move { Self::inspect_exec(self, &exec_id_owned).await })
    }

    fn resize_exec(&self, exec_id: &str, options: ResizeExecOptions) -> EngineFuture<'_, ()> {
        let exec_id_owned = String::from(exec_id);
        Box::pin(async move { Self::resize_exec(self, &exec_id_owned, options).await })
    }
}
