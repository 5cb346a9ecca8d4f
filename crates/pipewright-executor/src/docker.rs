//! Docker container client.

use async_trait::async_trait;
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, LogOutput,
    RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::{CommitContainerOptions, CreateImageOptions, PushImageOptions};
use bollard::models::HostConfig;
use futures::StreamExt;
use pipewright_core::container::{
    ContainerClient, ExecResult, ExecSpec, ImageRef, LogLine, LogStream, RegistryCredentials,
    TarStream,
};
use pipewright_core::{Error, GlobalOptions, Result, Session, generate_docker_id};
use std::path::Path;
use tracing::{debug, info, warn};

/// Keeps a session container alive until it is removed.
const IDLE_COMMAND: &str = "tail -f /dev/null";

/// Client for the local Docker daemon.
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect to the local Docker daemon.
    pub fn new() -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Create with a custom Docker client.
    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }

    fn container_name() -> Result<String> {
        Ok(format!("pipewright-{}", generate_docker_id()?))
    }

    /// Start an idle container from `image` with `project_dir` mounted at
    /// the guest source path.
    pub async fn start_session(
        &self,
        image: &str,
        project_dir: &Path,
        options: &GlobalOptions,
    ) -> Result<Session> {
        self.pull(image).await;

        let container_name = Self::container_name()?;
        let host_config = HostConfig {
            binds: Some(vec![source_bind(project_dir, options)?]),
            ..Default::default()
        };
        let config = Config {
            image: Some(image.to_string()),
            cmd: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                IDLE_COMMAND.to_string(),
            ]),
            working_dir: Some(options.source_path()),
            tty: Some(false),
            host_config: Some(host_config),
            ..Default::default()
        };
        let create_options = CreateContainerOptions {
            name: container_name.clone(),
            platform: None,
        };

        info!(container = %container_name, image = %image, "Creating session container");
        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to create container: {}", e)))?;

        self.docker
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to start container: {}", e)))?;

        Ok(Session::new(container.id))
    }

    /// Force-remove the session container.
    pub async fn end_session(&self, session: &Session) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_container(&session.container_id, Some(options))
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to remove container: {}", e)))?;

        info!(container = %session, "Removed session container");
        Ok(())
    }

    async fn pull(&self, image: &str) {
        info!(image = %image, "Pulling image");
        let create_image_options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut pull_stream = self
            .docker
            .create_image(Some(create_image_options), None, None);
        while let Some(result) = pull_stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!(status = %status, "Pull progress");
                    }
                }
                Err(e) => {
                    // a locally built image may not exist in any registry
                    warn!(error = %e, "Pull warning");
                }
            }
        }
    }
}

#[async_trait]
impl ContainerClient for DockerClient {
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Docker is not reachable: {}", e)))?;
        Ok(())
    }

    async fn exec(&self, container_id: &str, spec: ExecSpec) -> Result<ExecResult> {
        let options = CreateExecOptions {
            cmd: Some(spec.cmd),
            env: Some(spec.env),
            working_dir: spec.working_dir,
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(container_id, options)
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to create exec: {}", e)))?;

        let mut output = Vec::new();
        match self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to start exec: {}", e)))?
        {
            StartExecResults::Attached {
                output: mut stream, ..
            } => {
                while let Some(result) = stream.next().await {
                    match result {
                        Ok(chunk) => output.extend(log_lines(chunk)),
                        Err(e) => warn!(error = %e, "Exec output error"),
                    }
                }
            }
            StartExecResults::Detached => {}
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to inspect exec: {}", e)))?;

        Ok(ExecResult {
            exit_code: inspect.exit_code,
            output,
        })
    }

    async fn download(&self, container_id: &str, path: &str) -> Result<TarStream> {
        let options = DownloadFromContainerOptions {
            path: path.to_string(),
        };

        let stream = self
            .docker
            .download_from_container(container_id, Some(options))
            .map(|chunk| chunk.map_err(|e| Error::Extraction(e.to_string())));

        Ok(Box::pin(stream))
    }

    async fn commit(&self, container_id: &str, image: &ImageRef, message: &str) -> Result<()> {
        let options = CommitContainerOptions {
            container: container_id.to_string(),
            repo: image.repository.clone(),
            tag: image.tag.clone(),
            comment: message.to_string(),
            pause: true,
            ..Default::default()
        };

        let commit = self
            .docker
            .commit_container(options, Config::<String>::default())
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to commit container: {}", e)))?;

        debug!(image = %image, id = ?commit.id, "Committed container");
        Ok(())
    }

    async fn push(
        &self,
        image: &ImageRef,
        credentials: Option<&RegistryCredentials>,
    ) -> Result<()> {
        let options = PushImageOptions {
            tag: image.tag.clone(),
        };
        let credentials = credentials.map(|c| DockerCredentials {
            username: Some(c.username.clone()),
            password: Some(c.password.clone()),
            serveraddress: c.registry.clone(),
            ..Default::default()
        });

        let mut stream = self
            .docker
            .push_image(&image.repository, Some(options), credentials);
        while let Some(result) = stream.next().await {
            let info = result
                .map_err(|e| Error::ExecutionFailed(format!("Failed to push {}: {}", image, e)))?;
            if let Some(error) = info.error {
                return Err(Error::ExecutionFailed(format!(
                    "Failed to push {}: {}",
                    image, error
                )));
            }
            if let Some(status) = info.status {
                debug!(status = %status, "Push progress");
            }
        }

        info!(image = %image, "Pushed image");
        Ok(())
    }
}

/// `host:guest:rw` bind of the project directory onto the guest source root.
fn source_bind(project_dir: &Path, options: &GlobalOptions) -> Result<String> {
    let host = std::path::absolute(project_dir).map_err(|e| {
        Error::Configuration(format!(
            "cannot resolve project directory {}: {}",
            project_dir.display(),
            e
        ))
    })?;
    Ok(format!(
        "{}:{}:rw",
        host.display(),
        options.guest_path("source")
    ))
}

fn log_lines(chunk: LogOutput) -> Vec<LogLine> {
    let (stream, message) = match chunk {
        LogOutput::StdErr { message } => (LogStream::Stderr, message),
        LogOutput::StdOut { message }
        | LogOutput::Console { message }
        | LogOutput::StdIn { message } => (LogStream::Stdout, message),
    };
    String::from_utf8_lossy(&message)
        .lines()
        .map(|line| LogLine {
            stream,
            content: line.trim_end().to_string(),
        })
        .collect()
}
