//! A sandbox backed by a long-running container.
//!
//! Booting creates and starts a container that idles on `sleep infinity` with
//! the workspace directory as its working directory. Filesystem operations are
//! carried out through exec sessions and tar uploads; teardown force-removes
//! the container.

use std::collections::HashMap;
use std::sync::Arc;

use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{CreateContainerOptionsBuilder, UploadToContainerOptionsBuilder};
use camino::{Utf8Path, Utf8PathBuf};
use uuid::Uuid;

use super::EngineConnector;
use super::archive::{build_file_archive, build_mount_archive};
use super::client::EngineClient;
use super::exec::{exec_failed, run_detached_async, spawn_attached_async};
use crate::engine::{
    BoxFuture, ProcessPipes, Sandbox, SandboxBooter, SandboxHandle, SpawnRequest,
};
use crate::error::{ConfigError, ContainerError, RepoboxError, Result, SandboxError};
use crate::workspace::MountTree;

const CONTAINER_NAME_PREFIX: &str = "repobox";
const MANAGED_BY_LABEL: &str = "io.repobox.managed-by";
const IDLE_COMMAND: [&str; 2] = ["sleep", "infinity"];

/// Settings applied to every sandbox container the booter creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSettings {
    image: String,
    workdir: Utf8PathBuf,
}

impl SandboxSettings {
    /// Create settings for `image` with the workspace rooted at `workdir`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when `image` is blank and
    /// `ConfigError::InvalidValue` when `workdir` is not absolute.
    pub fn new(image: &str, workdir: impl Into<Utf8PathBuf>) -> Result<Self> {
        let trimmed = image.trim();
        if trimmed.is_empty() {
            return Err(RepoboxError::from(ConfigError::MissingRequired {
                field: String::from("image"),
            }));
        }

        let workdir_path = workdir.into();
        if !workdir_path.is_absolute() {
            return Err(RepoboxError::from(ConfigError::InvalidValue {
                field: String::from("sandbox.workdir"),
                reason: format!("'{workdir_path}' must be an absolute path"),
            }));
        }

        Ok(Self {
            image: String::from(trimmed),
            workdir: workdir_path,
        })
    }

    /// Return the container image.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Return the workspace root inside the container.
    #[must_use]
    pub fn workdir(&self) -> &Utf8Path {
        &self.workdir
    }
}

/// Boots [`DockerSandbox`] instances through an engine client.
pub struct DockerSandboxBooter<C> {
    client: Arc<C>,
    settings: SandboxSettings,
}

impl<C: EngineClient + 'static> DockerSandboxBooter<C> {
    /// Create a booter that uses `client` for every engine call.
    #[must_use]
    pub const fn new(client: Arc<C>, settings: SandboxSettings) -> Self {
        Self { client, settings }
    }

    async fn boot_async(&self) -> Result<SandboxHandle> {
        EngineConnector::health_check_async(self.client.as_ref()).await?;

        let name = format!("{CONTAINER_NAME_PREFIX}-{}", Uuid::new_v4());
        let options = CreateContainerOptionsBuilder::new().name(&name).build();
        let container_id = self
            .client
            .create_container(Some(options), build_create_body(&self.settings))
            .await
            .map_err(|error| start_failed(format!("create failed: {error}")))?
            .id;

        if let Err(error) = self.client.start_container(&container_id).await {
            if let Err(remove_error) = self.client.remove_container(&container_id).await {
                tracing::warn!(
                    container_id = %container_id,
                    error = %remove_error,
                    "failed to remove container that did not start"
                );
            }
            return Err(start_failed(format!("start failed: {error}")));
        }

        tracing::info!(
            container_id = %container_id,
            image = %self.settings.image,
            "sandbox container started"
        );
        Ok(SandboxHandle::new(DockerSandbox {
            client: Arc::clone(&self.client),
            container_id,
            workdir: self.settings.workdir.clone(),
        }))
    }
}

impl<C: EngineClient + 'static> SandboxBooter for DockerSandboxBooter<C> {
    fn boot(&self) -> BoxFuture<'_, Result<SandboxHandle>> {
        Box::pin(self.boot_async())
    }
}

/// A running sandbox container.
pub struct DockerSandbox<C> {
    client: Arc<C>,
    container_id: String,
    workdir: Utf8PathBuf,
}

impl<C: EngineClient + 'static> DockerSandbox<C> {
    /// Wrap an already running container.
    #[must_use]
    pub fn new(client: Arc<C>, container_id: impl Into<String>, workdir: Utf8PathBuf) -> Self {
        Self {
            client,
            container_id: container_id.into(),
            workdir,
        }
    }

    async fn mkdir_async(&self, path: &str, recursive: bool) -> Result<()> {
        let target = self.workdir.join(path);
        let mut command = vec![String::from("mkdir")];
        if recursive {
            command.push(String::from("-p"));
        }
        command.push(String::from(target.as_str()));

        let exit_code = run_detached_async(self.client.as_ref(), &self.container_id, command).await?;
        if exit_code != 0 {
            return Err(exec_failed(
                &self.container_id,
                format!("mkdir '{target}' exited with status {exit_code}"),
            ));
        }
        Ok(())
    }

    async fn upload_async(&self, archive: std::io::Result<Vec<u8>>) -> Result<()> {
        let bytes = archive.map_err(|error| self.upload_failed(error.to_string()))?;
        let options = UploadToContainerOptionsBuilder::default()
            .path(self.workdir.as_str())
            .build();
        self.client
            .upload_to_container(&self.container_id, Some(options), bytes)
            .await
            .map_err(|error| self.upload_failed(error.to_string()))
    }

    fn upload_failed(&self, message: String) -> RepoboxError {
        RepoboxError::from(ContainerError::UploadFailed {
            container_id: self.container_id.clone(),
            message,
        })
    }
}

impl<C: EngineClient + 'static> Sandbox for DockerSandbox<C> {
    fn id(&self) -> &str {
        &self.container_id
    }

    fn mkdir(&self, path: &str, recursive: bool) -> BoxFuture<'_, Result<()>> {
        let path_owned = String::from(path);
        Box::pin(async move { self.mkdir_async(&path_owned, recursive).await })
    }

    fn write_file(&self, path: &str, contents: &[u8]) -> BoxFuture<'_, Result<()>> {
        let archive = build_file_archive(Utf8Path::new(path), contents);
        Box::pin(self.upload_async(archive))
    }

    fn mount(&self, tree: &MountTree) -> BoxFuture<'_, Result<()>> {
        if tree.is_empty() {
            return Box::pin(async { Ok(()) });
        }
        let archive = build_mount_archive(tree);
        Box::pin(self.upload_async(archive))
    }

    fn spawn(&self, request: &SpawnRequest) -> BoxFuture<'_, Result<ProcessPipes>> {
        let request_owned = request.clone();
        Box::pin(async move {
            spawn_attached_async(
                &self.client,
                &self.container_id,
                self.workdir.as_str(),
                &request_owned,
            )
            .await
        })
    }

    fn teardown(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.client
                .remove_container(&self.container_id)
                .await
                .map_err(|error| {
                    RepoboxError::from(SandboxError::TeardownFailed {
                        sandbox_id: self.container_id.clone(),
                        message: error.to_string(),
                    })
                })?;
            tracing::info!(container_id = %self.container_id, "sandbox container removed");
            Ok(())
        })
    }
}

fn build_create_body(settings: &SandboxSettings) -> ContainerCreateBody {
    ContainerCreateBody {
        image: Some(settings.image.clone()),
        cmd: Some(IDLE_COMMAND.iter().map(|part| String::from(*part)).collect()),
        working_dir: Some(String::from(settings.workdir.as_str())),
        labels: Some(HashMap::from([(
            String::from(MANAGED_BY_LABEL),
            String::from(CONTAINER_NAME_PREFIX),
        )])),
        ..ContainerCreateBody::default()
    }
}

fn start_failed(message: String) -> RepoboxError {
    RepoboxError::from(ContainerError::StartFailed { message })
}
