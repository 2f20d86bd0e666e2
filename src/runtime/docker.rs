//! Docker-backed log access using bollard.

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{LogOutput, LogsOptions};
use futures::StreamExt;

use crate::error::LogError;
use crate::runtime::{ContainerRuntime, LogChunk, LogOptions, LogStream, short_id};

/// Connect to the local Docker daemon and make sure it answers.
pub async fn connect_docker() -> Result<Docker, LogError> {
    let docker =
        Docker::connect_with_local_defaults().map_err(|e| LogError::DockerNotAvailable {
            reason: e.to_string(),
        })?;

    docker
        .ping()
        .await
        .map_err(|e| LogError::DockerNotAvailable {
            reason: e.to_string(),
        })?;

    Ok(docker)
}

/// [`ContainerRuntime`] talking to a Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Wrap an existing client.
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connect with local defaults (`DOCKER_HOST` or the default socket).
    pub async fn connect() -> Result<Self, LogError> {
        let docker = connect_docker().await?;
        tracing::debug!("Connected to Docker daemon");
        Ok(Self { docker })
    }

    /// The underlying bollard client.
    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    fn logs_options(options: LogOptions) -> LogsOptions<String> {
        LogsOptions {
            follow: options.follow,
            stdout: options.stdout,
            stderr: options.stderr,
            tail: "all".to_string(),
            ..Default::default()
        }
    }
}

/// Map a bollard frame to a tagged chunk.
///
/// TTY containers deliver a single console stream, which counts as stdout.
/// Stdin echoes are not container output and are dropped.
fn to_chunk(output: LogOutput) -> Option<LogChunk> {
    match output {
        LogOutput::StdOut { message } | LogOutput::Console { message } => {
            Some(LogChunk::stdout(message))
        }
        LogOutput::StdErr { message } => Some(LogChunk::stderr(message)),
        LogOutput::StdIn { .. } => None,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn attach_logs(
        &self,
        container_id: &str,
        options: LogOptions,
    ) -> Result<LogStream, LogError> {
        tracing::trace!("{} attaching to logs", short_id(container_id));

        let container = container_id.to_string();
        let stream = self
            .docker
            .logs(container_id, Some(Self::logs_options(options)))
            .filter_map(move |item| {
                let result = match item {
                    Ok(output) => to_chunk(output).map(Ok),
                    Err(e) => Some(Err(LogError::Attach {
                        container: container.clone(),
                        reason: e.to_string(),
                    })),
                };
                futures::future::ready(result)
            });

        Ok(Box::pin(stream))
    }

    async fn current_log(
        &self,
        container_id: &str,
        options: LogOptions,
    ) -> Result<String, LogError> {
        let options = LogOptions {
            follow: false,
            ..options
        };
        let mut stream = self
            .docker
            .logs(container_id, Some(Self::logs_options(options)));

        let mut log = Vec::new();
        while let Some(item) = stream.next().await {
            let output = item.map_err(|e| LogError::Fetch {
                container: container_id.to_string(),
                reason: e.to_string(),
            })?;
            if let Some(chunk) = to_chunk(output) {
                log.extend_from_slice(&chunk.bytes);
            }
        }

        let log = String::from_utf8_lossy(&log).into_owned();
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                "{} full log: {}",
                short_id(container_id),
                log.replace('\n', "|")
            );
        }
        Ok(log)
    }
}
