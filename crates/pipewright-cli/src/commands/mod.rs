//! CLI command implementations.

pub mod run;

use anyhow::{Context, Result};
use pipewright_config::pipeline::load_pipeline_file;
use pipewright_core::container::ContainerClient;
use pipewright_core::{GlobalOptions, PipelineKind, StepRegistry};
use pipewright_executor::DockerClient;
use std::path::Path;
use std::sync::Arc;

/// Parse the pipeline file and assemble both pipelines without running them.
pub fn validate(path: &Path) -> Result<()> {
    let file = load_pipeline_file(path)
        .with_context(|| format!("Failed to parse pipeline file: {}", path.display()))?;

    if file.image.is_none() {
        anyhow::bail!("{}: no `box` image declared", path.display());
    }

    let registry = StepRegistry::default();
    for kind in [PipelineKind::Build, PipelineKind::Deploy] {
        let pipeline = file
            .pipeline(kind)
            .assemble(kind, &registry, Arc::new(validation_options()))
            .with_context(|| format!("Invalid {} pipeline", kind))?;
        println!(
            "{}: {} steps, {} after-steps",
            kind,
            pipeline.steps().len(),
            pipeline.after_steps().len()
        );
    }

    println!("Configuration is valid");
    Ok(())
}

/// Placeholder identity so both kinds can assemble without a real run.
fn validation_options() -> GlobalOptions {
    GlobalOptions {
        build_id: "validate".to_string(),
        deploy_id: "validate".to_string(),
        ..Default::default()
    }
}

pub async fn ping() -> Result<()> {
    let client = DockerClient::new().context("Failed to connect to Docker")?;
    client.ping().await?;
    println!("Docker is reachable");
    Ok(())
}
