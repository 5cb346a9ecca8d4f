//! Artifact records and the collection fallback policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::options::GlobalOptions;
use crate::pipeline::PipelineKind;
use crate::session::Session;
use crate::{Error, Result};

/// Host file name of the collected archive.
pub const ARTIFACT_FILE_NAME: &str = "build.tar";

/// Data copied from a container path to a host path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub container_id: String,
    /// Path inside the container.
    pub guest_path: String,
    /// Archive location on the host.
    pub host_path: PathBuf,
    pub application_id: String,
    /// Set when the artifact belongs to a deploy.
    pub deploy_id: Option<String>,
    /// Set when the artifact belongs to a build.
    pub build_id: Option<String>,
}

impl Artifact {
    /// Describe the archive of `guest_path` for this run.
    pub fn new(
        session: &Session,
        guest_path: impl Into<String>,
        options: &GlobalOptions,
        kind: PipelineKind,
    ) -> Self {
        let run_id = Some(kind.run_id(options).to_string());
        let (deploy_id, build_id) = match kind {
            PipelineKind::Deploy => (run_id, None),
            PipelineKind::Build => (None, run_id),
        };
        Self {
            container_id: session.container_id.clone(),
            guest_path: guest_path.into(),
            host_path: options.host_path(kind, ARTIFACT_FILE_NAME),
            application_id: options.application_id.clone(),
            deploy_id,
            build_id,
        }
    }
}

/// Copies an artifact out of its container.
#[async_trait]
pub trait ArtifactCollector: Send + Sync {
    /// Extract `artifact.guest_path` into `artifact.host_path`.
    ///
    /// Returns [`Error::EmptyTarball`] when the extraction worked but found
    /// nothing to keep.
    async fn collect(&self, artifact: &Artifact) -> Result<Artifact>;
}

/// Collect `primary`, falling back to `fallback` only when the primary path
/// was empty.
pub async fn collect_with_fallback(
    collector: &dyn ArtifactCollector,
    primary: &Artifact,
    fallback: &Artifact,
) -> Result<Artifact> {
    match collector.collect(primary).await {
        Err(Error::EmptyTarball) => {
            debug!(
                empty = %primary.guest_path,
                fallback = %fallback.guest_path,
                "Nothing to collect, trying fallback path"
            );
            collector.collect(fallback).await
        }
        result => result,
    }
}

/// Collect the run's output directory, or the whole source tree when the
/// output directory is empty.
pub async fn collect_artifact(
    collector: &dyn ArtifactCollector,
    session: &Session,
    options: &GlobalOptions,
    kind: PipelineKind,
) -> Result<Artifact> {
    let output = Artifact::new(session, options.guest_path("output"), options, kind);
    let source = Artifact::new(session, options.source_path(), options, kind);

    let artifact = collect_with_fallback(collector, &output, &source).await?;
    info!(
        container = %artifact.container_id,
        guest_path = %artifact.guest_path,
        host_path = %artifact.host_path.display(),
        "Collected artifact"
    );
    Ok(artifact)
}
