//! Copies archives out of session containers onto the host.

use async_trait::async_trait;
use futures::StreamExt;
use pipewright_core::container::ContainerClient;
use pipewright_core::{Artifact, ArtifactCollector, Error, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Extracts artifacts through a [`ContainerClient`].
///
/// The archive is written to `artifact.host_path` as a tar file. An archive
/// with no bytes, or with nothing but directory entries, is removed again
/// and reported as [`Error::EmptyTarball`].
pub struct Artificer {
    client: Arc<dyn ContainerClient>,
}

impl Artificer {
    pub fn new(client: Arc<dyn ContainerClient>) -> Self {
        Self { client }
    }

    async fn download(&self, artifact: &Artifact) -> Result<u64> {
        if let Some(parent) = artifact.host_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                extraction(format!("cannot create {}", parent.display()), e)
            })?;
        }

        let mut stream = self
            .client
            .download(&artifact.container_id, &artifact.guest_path)
            .await?;
        let mut file = File::create(&artifact.host_path).await.map_err(|e| {
            extraction(format!("cannot create {}", artifact.host_path.display()), e)
        })?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| extraction("write failed".to_string(), e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| extraction("flush failed".to_string(), e))?;

        Ok(written)
    }
}

#[async_trait]
impl ArtifactCollector for Artificer {
    async fn collect(&self, artifact: &Artifact) -> Result<Artifact> {
        debug!(
            container = %artifact.container_id,
            guest_path = %artifact.guest_path,
            "Extracting artifact"
        );

        let written = match self.download(artifact).await {
            Ok(written) => written,
            Err(e) => {
                remove_partial(&artifact.host_path).await;
                return Err(e);
            }
        };

        let inspected = if written > 0 {
            let path = artifact.host_path.clone();
            tokio::task::spawn_blocking(move || archive_has_files(&path))
                .await
                .map_err(|e| Error::Internal(e.to_string()))
                .and_then(|r| r)
        } else {
            Ok(false)
        };
        let has_files = match inspected {
            Ok(has_files) => has_files,
            Err(e) => {
                remove_partial(&artifact.host_path).await;
                return Err(e);
            }
        };

        if !has_files {
            remove_partial(&artifact.host_path).await;
            return Err(Error::EmptyTarball);
        }

        info!(
            guest_path = %artifact.guest_path,
            host_path = %artifact.host_path.display(),
            bytes = written,
            "Extracted artifact"
        );
        Ok(artifact.clone())
    }
}

/// Whether the tar archive at `path` holds anything besides directories.
fn archive_has_files(path: &Path) -> Result<bool> {
    let file = std::fs::File::open(path)
        .map_err(|e| extraction(format!("cannot open {}", path.display()), e))?;
    let mut archive = tar::Archive::new(file);
    let entries = archive
        .entries()
        .map_err(|e| extraction("unreadable archive".to_string(), e))?;

    for entry in entries {
        let entry = entry.map_err(|e| extraction("unreadable archive entry".to_string(), e))?;
        if !entry.header().entry_type().is_dir() {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "No partial archive to remove");
    }
}

fn extraction(context: String, e: std::io::Error) -> Error {
    Error::Extraction(format!("{}: {}", context, e))
}
