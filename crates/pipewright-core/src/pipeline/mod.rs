//! Pipeline assembly.
//!
//! A [`RawPipeline`] holds the steps exactly as written. Assembly turns it
//! into a [`Pipeline`]: steps are built through the [`StepRegistry`], the
//! bootstrap step is put at the head of both the main and the after sequence,
//! and the pipeline environment is layered from the run options.

mod kind;

pub use kind::PipelineKind;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::artifact::{self, Artifact, ArtifactCollector};
use crate::environment::Environment;
use crate::options::GlobalOptions;
use crate::session::Session;
use crate::step::{InitStep, RawStep, Step, StepRegistry};
use crate::Result;

/// Steps as declared in a pipeline file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPipeline {
    pub raw_steps: Vec<RawStep>,
    pub raw_after_steps: Vec<RawStep>,
}

impl RawPipeline {
    /// Assemble a deploy pipeline with the built-in step kinds.
    pub fn to_deploy(&self, options: Arc<GlobalOptions>) -> Result<Pipeline> {
        self.assemble(PipelineKind::Deploy, &StepRegistry::default(), options)
    }

    /// Assemble a build pipeline with the built-in step kinds.
    pub fn to_build(&self, options: Arc<GlobalOptions>) -> Result<Pipeline> {
        self.assemble(PipelineKind::Build, &StepRegistry::default(), options)
    }

    /// Assemble a pipeline of `kind` using `registry` for user steps.
    ///
    /// Fails, without building anything partial, when the bootstrap step or
    /// any raw step cannot be constructed.
    pub fn assemble(
        &self,
        kind: PipelineKind,
        registry: &StepRegistry,
        options: Arc<GlobalOptions>,
    ) -> Result<Pipeline> {
        let init_step: Arc<dyn Step> = Arc::new(InitStep::new(&options, kind)?);

        let mut steps = vec![init_step.clone()];
        steps.extend(registry.build_all(&self.raw_steps, &options, kind)?);

        let mut after_steps = vec![init_step];
        after_steps.extend(registry.build_all(&self.raw_after_steps, &options, kind)?);

        let mut pipeline = Pipeline {
            kind,
            steps,
            after_steps,
            env: Environment::new(),
            options,
        };
        pipeline.init_env();
        Ok(pipeline)
    }
}

/// An assembled build or deploy.
#[derive(Debug)]
pub struct Pipeline {
    kind: PipelineKind,
    steps: Vec<Arc<dyn Step>>,
    after_steps: Vec<Arc<dyn Step>>,
    env: Environment,
    options: Arc<GlobalOptions>,
}

impl Pipeline {
    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Main steps; the first is always the bootstrap step.
    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    /// Steps run after the main steps; the first is always the bootstrap step.
    pub fn after_steps(&self) -> &[Arc<dyn Step>] {
        &self.after_steps
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn options(&self) -> &GlobalOptions {
        &self.options
    }

    /// Variables every pipeline gets, derived from the run options.
    pub fn common_env(&self) -> Vec<(String, String)> {
        let o = &self.options;
        let source = o.source_path();
        [
            ("CI", "true".to_string()),
            ("PIPEWRIGHT", "true".to_string()),
            ("PIPEWRIGHT_ROOT", source.clone()),
            ("PIPEWRIGHT_SOURCE_DIR", source),
            ("PIPEWRIGHT_OUTPUT_DIR", o.guest_path("output")),
            ("PIPEWRIGHT_REPORT_DIR", o.guest_path("report")),
            ("PIPEWRIGHT_CACHE_DIR", o.guest_path("cache")),
            ("PIPEWRIGHT_APPLICATION_ID", o.application_id.clone()),
            ("PIPEWRIGHT_APPLICATION_NAME", o.application_name.clone()),
            (
                "PIPEWRIGHT_APPLICATION_OWNER_NAME",
                o.application_owner_name.clone(),
            ),
            (
                "PIPEWRIGHT_APPLICATION_URL",
                format!("{}#application/{}", o.base_url, o.application_id),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    pub fn mirror_env(&self) -> Vec<(String, String)> {
        self.options.mirror_env.ordered()
    }

    /// Host variables forwarded with the `X_` prefix.
    pub fn passthru_env(&self) -> Vec<(String, String)> {
        self.options.host_env.passthru().ordered()
    }

    /// Host variables forwarded as hidden values with the `XXX_` prefix.
    pub fn hidden_passthru_env(&self) -> Vec<(String, String)> {
        self.options.host_env.hidden_passthru().ordered()
    }

    /// Layer the environment. Later layers win: identity variables override
    /// the common ones, mirrors override identity, passthrough overrides
    /// mirrors.
    fn init_env(&mut self) {
        let common = self.common_env();
        let identity = self.kind.identity_env(&self.options);
        let mirror = self.mirror_env();
        let passthru = self.passthru_env();
        let hidden = self.hidden_passthru_env();

        self.env.update(common);
        self.env.update(identity);
        self.env.update(mirror);
        self.env.update(passthru);
        self.env.update_hidden(hidden);
    }

    pub fn docker_repo(&self) -> String {
        self.kind.docker_repo(&self.options)
    }

    pub fn docker_tag(&self) -> String {
        self.kind.docker_tag(&self.options)
    }

    pub fn docker_message(&self) -> String {
        self.kind.docker_message(&self.options)
    }

    /// Collect the run's artifact from the session container.
    pub async fn collect_artifact(
        &self,
        collector: &dyn ArtifactCollector,
        session: &Session,
    ) -> Result<Artifact> {
        artifact::collect_artifact(collector, session, &self.options, self.kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::fake::ScriptedCollector;
    use crate::container::fake::RecordingClient;
    use crate::step::StepContext;
    use crate::environment::EnvMap;
    use crate::Error;

    fn options() -> GlobalOptions {
        GlobalOptions {
            application_id: "app-1".to_string(),
            application_name: "web".to_string(),
            application_owner_name: "acme".to_string(),
            deploy_id: "d-1".to_string(),
            base_url: "https://ci.example.com/".to_string(),
            ..Default::default()
        }
    }

    fn script(code: &str) -> RawStep {
        RawStep::new("script").with("code", code)
    }

    #[test]
    fn test_bootstrap_heads_both_sequences() {
        let raw = RawPipeline {
            raw_steps: vec![script("make"), script("make test")],
            raw_after_steps: vec![script("notify")],
        };
        let deploy = raw.to_deploy(Arc::new(options())).unwrap();

        assert_eq!(deploy.steps().len(), 3);
        assert_eq!(deploy.after_steps().len(), 2);
        assert_eq!(deploy.steps()[0].id(), "pipewright-init");
        assert!(Arc::ptr_eq(&deploy.steps()[0], &deploy.after_steps()[0]));
    }

    #[test]
    fn test_bootstrap_with_empty_raw_steps() {
        let deploy = RawPipeline::default()
            .to_deploy(Arc::new(options()))
            .unwrap();

        assert_eq!(deploy.steps().len(), 1);
        assert_eq!(deploy.after_steps().len(), 1);
        assert!(Arc::ptr_eq(&deploy.steps()[0], &deploy.after_steps()[0]));
    }

    #[test]
    fn test_invalid_main_step_fails() {
        let raw = RawPipeline {
            raw_steps: vec![script("make"), RawStep::new("bogus")],
            raw_after_steps: vec![],
        };
        let err = raw.to_deploy(Arc::new(options())).unwrap_err();
        assert!(matches!(err, Error::UnknownStep(_)));
    }

    #[test]
    fn test_invalid_after_step_fails() {
        let raw = RawPipeline {
            raw_steps: vec![script("make")],
            raw_after_steps: vec![RawStep::new("script")],
        };
        let err = raw.to_deploy(Arc::new(options())).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_missing_run_id_fails() {
        let options = GlobalOptions {
            deploy_id: String::new(),
            ..options()
        };
        let err = RawPipeline::default()
            .to_deploy(Arc::new(options))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_deploy_requires_deploy_id() {
        let options = GlobalOptions {
            deploy_id: String::new(),
            build_id: "b-1".to_string(),
            ..options()
        };
        let err = RawPipeline::default()
            .to_deploy(Arc::new(options))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_build_with_both_ids_uses_build_id() {
        let options = GlobalOptions {
            build_id: "b-1".to_string(),
            ..options()
        };
        let raw = RawPipeline {
            raw_steps: vec![RawStep::new("docker-push")],
            raw_after_steps: vec![],
        };
        let build = raw.to_build(Arc::new(options)).unwrap();

        assert_eq!(build.docker_tag(), "latest");
        assert_eq!(build.env().get("PIPEWRIGHT_BUILD_ID"), Some("b-1"));
        assert_eq!(build.env().get("PIPEWRIGHT_DEPLOY_ID"), None);

        // the push step names the image like the pipeline does
        let client = RecordingClient::default();
        let session = Session::new("c-1");
        build.steps()[1].init_env(build.env()).unwrap();
        let ctx = StepContext {
            client: &client,
            session: &session,
            env: build.env(),
            options: build.options(),
            main_passed: None,
        };
        build.steps()[1].execute(&ctx).await.unwrap();
        let pushes = client.pushes.lock().unwrap();
        assert_eq!(pushes[0].0.repository, build.docker_repo());
        assert_eq!(pushes[0].0.tag, build.docker_tag());
        drop(pushes);

        let collector = ScriptedCollector::new(vec![Ok(())]);
        let artifact = build.collect_artifact(&collector, &session).await.unwrap();
        assert_eq!(artifact.build_id.as_deref(), Some("b-1"));
        assert_eq!(
            artifact.host_path,
            std::path::PathBuf::from(".pipewright/b-1/build.tar")
        );
    }

    #[test]
    fn test_custom_registry() {
        let raw = RawPipeline {
            raw_steps: vec![script("make")],
            raw_after_steps: vec![],
        };
        let err = raw
            .assemble(PipelineKind::Deploy, &StepRegistry::empty(), Arc::new(options()))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownStep(kind) if kind == "script"));
    }

    #[test]
    fn test_deploy_environment() {
        let deploy = RawPipeline::default()
            .to_deploy(Arc::new(options()))
            .unwrap();
        let env = deploy.env();

        assert_eq!(env.get("DEPLOY"), Some("true"));
        assert_eq!(env.get("PIPEWRIGHT_DEPLOY_ID"), Some("d-1"));
        assert_eq!(
            env.get("PIPEWRIGHT_DEPLOY_URL"),
            Some("https://ci.example.com/#deploy/d-1")
        );
        assert_eq!(env.get("PIPEWRIGHT_OUTPUT_DIR"), Some("/pipeline/output"));
        assert_eq!(env.get("BUILD"), None);
    }

    #[test]
    fn test_build_environment() {
        let options = GlobalOptions {
            deploy_id: String::new(),
            build_id: "b-1".to_string(),
            ..options()
        };
        let build = RawPipeline::default().to_build(Arc::new(options)).unwrap();

        assert_eq!(build.kind(), PipelineKind::Build);
        assert_eq!(build.env().get("BUILD"), Some("true"));
        assert_eq!(build.env().get("PIPEWRIGHT_BUILD_ID"), Some("b-1"));
        assert_eq!(build.docker_repo(), "build-b-1");
    }

    #[test]
    fn test_layer_precedence() {
        let mut mirror_env = EnvMap::new();
        mirror_env.update([("REGISTRY_MIRROR", "https://mirror"), ("DEPLOY", "mirror")]);
        let options = GlobalOptions {
            mirror_env,
            host_env: Environment::from_entries([
                "X_REGISTRY_MIRROR=https://override",
                "X_CI=false",
                "XXX_TOKEN=s3cret",
                "HOME=/root",
            ]),
            ..options()
        };
        let deploy = RawPipeline::default()
            .to_deploy(Arc::new(options))
            .unwrap();
        let env = deploy.env();

        // passthrough overrides mirror
        assert_eq!(env.get("REGISTRY_MIRROR"), Some("https://override"));
        // mirror overrides identity
        assert_eq!(env.get("DEPLOY"), Some("mirror"));
        // passthrough overrides common
        assert_eq!(env.get("CI"), Some("false"));
        assert_eq!(env.get("HOME"), None);

        assert_eq!(env.get("TOKEN"), None);
        assert_eq!(env.get_hidden("TOKEN"), Some("s3cret"));

        // overridden names keep their first position
        let names: Vec<&str> = env.vars().names().collect();
        assert_eq!(names[0], "CI");
        assert_eq!(names.last(), Some(&"REGISTRY_MIRROR"));
    }

    #[test]
    fn test_common_env_layered_before_identity() {
        let deploy = RawPipeline::default()
            .to_deploy(Arc::new(options()))
            .unwrap();
        let names: Vec<&str> = deploy.env().vars().names().collect();
        let id_pos = names.iter().position(|n| *n == "PIPEWRIGHT_DEPLOY_ID");
        let common_pos = names.iter().position(|n| *n == "PIPEWRIGHT_APPLICATION_URL");
        assert!(common_pos < id_pos);
    }

    #[test]
    fn test_debug_hides_host_secrets() {
        let options = GlobalOptions {
            host_env: Environment::from_entries(["XXX_TOKEN=s3cret", "X_USER=robot"]),
            ..options()
        };
        let deploy = RawPipeline::default()
            .to_deploy(Arc::new(options))
            .unwrap();
        assert_eq!(deploy.env().get_hidden("TOKEN"), Some("s3cret"));

        let debug = format!("{:?}", deploy);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("TOKEN"));
    }

    #[test]
    fn test_naming() {
        let deploy = RawPipeline::default()
            .to_deploy(Arc::new(options()))
            .unwrap();
        assert_eq!(deploy.docker_repo(), "acme/web");
        assert_eq!(deploy.docker_tag(), "deploy-d-1");
        assert_eq!(deploy.docker_message(), "Build d-1");
    }

    #[tokio::test]
    async fn test_collect_artifact_fallback() {
        let deploy = RawPipeline::default()
            .to_deploy(Arc::new(options()))
            .unwrap();
        let collector = ScriptedCollector::new(vec![Err(Error::EmptyTarball), Ok(())]);

        let artifact = deploy
            .collect_artifact(&collector, &Session::new("c-1"))
            .await
            .unwrap();

        assert_eq!(artifact.guest_path, "/pipeline/source");
        assert_eq!(artifact.deploy_id.as_deref(), Some("d-1"));
    }
}
