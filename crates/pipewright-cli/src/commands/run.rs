//! Local pipeline execution command.

use anyhow::{Context, Result};
use clap::Args;
use pipewright_config::pipeline::load_pipeline_file;
use pipewright_config::system::{AgentConfig, load_agent_config};
use pipewright_core::container::ContainerClient;
use pipewright_core::options::DEFAULT_GUEST_ROOT;
use pipewright_core::runner::{PipelineRunner, RunReport};
use pipewright_core::{
    Artifact, Environment, GlobalOptions, Pipeline, PipelineKind, Session, StepRegistry,
    generate_docker_id,
};
use pipewright_executor::{Artificer, DockerClient};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Project directory mounted into the container
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Project directory relative to the mounted source root
    #[arg(long, default_value = "")]
    pub source_dir: String,

    #[arg(long, env = "PIPEWRIGHT_APPLICATION_ID", default_value = "")]
    pub application_id: String,

    #[arg(long, env = "PIPEWRIGHT_APPLICATION_NAME", default_value = "")]
    pub application_name: String,

    #[arg(long, env = "PIPEWRIGHT_APPLICATION_OWNER_NAME", default_value = "")]
    pub owner_name: String,

    /// Build or deploy id; generated when absent
    #[arg(long)]
    pub run_id: Option<String>,

    /// Image tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Image commit message
    #[arg(long)]
    pub message: Option<String>,

    /// Web UI base URL, overriding the agent configuration
    #[arg(long)]
    pub base_url: Option<String>,
}

/// What `build` and `deploy` print on stdout.
#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    kind: PipelineKind,
    run_id: &'a str,
    docker_repo: String,
    docker_tag: String,
    report: &'a RunReport,
    artifact: Option<&'a Artifact>,
}

/// Run a pipeline of `kind` in a fresh Docker session.
pub async fn run(
    kind: PipelineKind,
    pipeline_file: &Path,
    agent_config: Option<&Path>,
    args: RunArgs,
) -> Result<()> {
    let file = load_pipeline_file(pipeline_file).with_context(|| {
        format!("Failed to parse pipeline file: {}", pipeline_file.display())
    })?;
    let agent = match agent_config {
        Some(path) => load_agent_config(path)
            .with_context(|| format!("Failed to parse agent config: {}", path.display()))?,
        None => AgentConfig::default(),
    };
    let image = file
        .image
        .clone()
        .with_context(|| format!("{}: no `box` image declared", pipeline_file.display()))?;

    let options = build_options(kind, &args, &agent, Environment::from_process())?;
    let pipeline = file
        .pipeline(kind)
        .assemble(kind, &StepRegistry::default(), Arc::new(options))
        .with_context(|| format!("Failed to assemble {} pipeline", kind))?;

    let client = Arc::new(DockerClient::new().context("Failed to connect to Docker")?);
    client.ping().await?;

    let session = client
        .start_session(&image, &args.project_dir, pipeline.options())
        .await?;
    let run_id = kind.run_id(pipeline.options());
    info!(kind = %kind, run_id = %run_id, container = %session, "Session started");

    let outcome = execute(client.clone(), &pipeline, &session).await;
    if let Err(e) = client.end_session(&session).await {
        warn!(container = %session, error = %e, "Failed to end session");
    }
    let (report, artifact) = outcome?;

    let summary = RunSummary {
        kind,
        run_id,
        docker_repo: pipeline.docker_repo(),
        docker_tag: pipeline.docker_tag(),
        report: &report,
        artifact: artifact.as_ref(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !report.success {
        anyhow::bail!("{} {} failed", kind, summary.run_id);
    }
    Ok(())
}

async fn execute(
    client: Arc<DockerClient>,
    pipeline: &Pipeline,
    session: &Session,
) -> Result<(RunReport, Option<Artifact>)> {
    let runner = PipelineRunner::new(client.clone());
    let report = runner.run(pipeline, session).await?;

    let artifact = if report.success {
        let artificer = Artificer::new(client);
        Some(pipeline.collect_artifact(&artificer, session).await?)
    } else {
        None
    };

    Ok((report, artifact))
}

/// Per-run options from the command line, agent config and process env.
fn build_options(
    kind: PipelineKind,
    args: &RunArgs,
    agent: &AgentConfig,
    host_env: Environment,
) -> Result<GlobalOptions> {
    let run_id = match &args.run_id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => generate_docker_id()?,
    };
    let (build_id, deploy_id) = match kind {
        PipelineKind::Build => (run_id, String::new()),
        PipelineKind::Deploy => (String::new(), run_id),
    };

    let defaults = GlobalOptions::default();
    Ok(GlobalOptions {
        application_id: args.application_id.clone(),
        application_name: args.application_name.clone(),
        application_owner_name: args.owner_name.clone(),
        deploy_id,
        build_id,
        base_url: args
            .base_url
            .clone()
            .or_else(|| agent.base_url.clone())
            .unwrap_or_default(),
        tag: args.tag.clone(),
        message: args.message.clone(),
        guest_root: agent
            .guest_root
            .clone()
            .unwrap_or_else(|| DEFAULT_GUEST_ROOT.to_string()),
        host_root: agent.host_root.clone().unwrap_or(defaults.host_root),
        source_dir: args.source_dir.clone(),
        host_env,
        mirror_env: agent.mirror_env(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_options_for_deploy() {
        let args = RunArgs {
            run_id: Some("d-7".to_string()),
            application_name: "web".to_string(),
            owner_name: "acme".to_string(),
            ..Default::default()
        };
        let agent = AgentConfig {
            host_root: Some(PathBuf::from("/var/lib/pipewright")),
            base_url: Some("https://ci.example.com/".to_string()),
            mirrors: vec![("registry".to_string(), "https://m.example.com".to_string())],
            ..Default::default()
        };
        let host_env = Environment::from_pairs([("X_TOKEN", "abc")]);

        let options = build_options(PipelineKind::Deploy, &args, &agent, host_env).unwrap();

        assert_eq!(options.deploy_id, "d-7");
        assert_eq!(options.build_id, "");
        assert_eq!(PipelineKind::Deploy.run_id(&options), "d-7");
        assert_eq!(options.base_url, "https://ci.example.com/");
        assert_eq!(options.guest_root, DEFAULT_GUEST_ROOT);
        assert_eq!(
            options.host_path(PipelineKind::Deploy, "build.tar"),
            PathBuf::from("/var/lib/pipewright/d-7/build.tar")
        );
        assert_eq!(
            options.mirror_env.get("PIPEWRIGHT_REGISTRY_MIRROR"),
            Some("https://m.example.com")
        );
        assert_eq!(options.host_env.get("X_TOKEN"), Some("abc"));
    }

    #[test]
    fn test_build_options_generates_run_id() {
        let options = build_options(
            PipelineKind::Build,
            &RunArgs::default(),
            &AgentConfig::default(),
            Environment::new(),
        )
        .unwrap();

        assert_eq!(options.build_id.len(), 64);
        assert!(options.deploy_id.is_empty());
    }

    #[test]
    fn test_base_url_flag_overrides_agent() {
        let args = RunArgs {
            run_id: Some("b-1".to_string()),
            base_url: Some("http://localhost:8080/".to_string()),
            ..Default::default()
        };
        let agent = AgentConfig {
            base_url: Some("https://ci.example.com/".to_string()),
            guest_root: Some("/ci".to_string()),
            ..Default::default()
        };

        let options =
            build_options(PipelineKind::Build, &args, &agent, Environment::new()).unwrap();

        assert_eq!(options.base_url, "http://localhost:8080/");
        assert_eq!(options.source_path(), "/ci/source");
    }
}
