//! Shell script steps.

use async_trait::async_trait;
use tracing::info;

use super::{RawStep, Step, StepContext, check_exit};
use crate::container::{ExecSpec, LogStream};
use crate::options::GlobalOptions;
use crate::{Error, Result};

/// Exported to after-steps: `passed` or `failed`.
pub const RESULT_VAR: &str = "PIPEWRIGHT_RESULT";

/// Runs `code` with `/bin/sh -c` in the project directory.
#[derive(Debug)]
pub struct ScriptStep {
    name: String,
    code: String,
    cwd: String,
}

impl ScriptStep {
    pub const KIND: &'static str = "script";

    pub fn new(raw: &RawStep, options: &GlobalOptions) -> Result<Self> {
        let code = raw
            .get("code")
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "script step '{}' requires code",
                    raw.display_name()
                ))
            })?;

        let source = options.source_path();
        let cwd = match raw.get("cwd") {
            Some(dir) if dir.starts_with('/') => dir.to_string(),
            Some(dir) => format!("{}/{}", source.trim_end_matches('/'), dir),
            None => source,
        };

        Ok(Self {
            name: raw.display_name().to_string(),
            code: code.to_string(),
            cwd,
        })
    }
}

#[async_trait]
impl Step for ScriptStep {
    fn id(&self) -> &str {
        Self::KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        let mut env = ctx.env.export();
        if let Some(passed) = ctx.main_passed {
            let result = if passed { "passed" } else { "failed" };
            env.push(format!("{}={}", RESULT_VAR, result));
        }

        let spec = ExecSpec {
            cmd: vec!["/bin/sh".to_string(), "-c".to_string(), self.code.clone()],
            env,
            working_dir: Some(self.cwd.clone()),
        };
        let result = ctx.client.exec(&ctx.session.container_id, spec).await?;

        for line in &result.output {
            let marker = match line.stream {
                LogStream::Stdout => " ",
                LogStream::Stderr => "!",
            };
            info!(step = %self.name, "{}{}", marker, line.content);
        }

        check_exit(&self.name, result.exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::fake::RecordingClient;
    use crate::environment::Environment;
    use crate::session::Session;

    #[test]
    fn test_requires_code() {
        let err = ScriptStep::new(&RawStep::new("script").with("code", "  "), &Default::default())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_working_directory() {
        let options = GlobalOptions::default();
        let step = ScriptStep::new(&RawStep::new("script").with("code", "ls"), &options).unwrap();
        assert_eq!(step.cwd, "/pipeline/source");

        let step = ScriptStep::new(
            &RawStep::new("script").with("code", "ls").with("cwd", "web"),
            &options,
        )
        .unwrap();
        assert_eq!(step.cwd, "/pipeline/source/web");

        let step = ScriptStep::new(
            &RawStep::new("script").with("code", "ls").with("cwd", "/tmp"),
            &options,
        )
        .unwrap();
        assert_eq!(step.cwd, "/tmp");
    }

    #[tokio::test]
    async fn test_execute_exports_environment() {
        let options = GlobalOptions::default();
        let step = ScriptStep::new(
            &RawStep::new("script").with_name("build").with("code", "make"),
            &options,
        )
        .unwrap();
        let client = RecordingClient::default();
        let session = Session::new("c-1");
        let mut env = Environment::new();
        env.update([("CI", "true")]);
        env.update_hidden([("TOKEN", "s3cret")]);
        let ctx = StepContext {
            client: &client,
            session: &session,
            env: &env,
            options: &options,
            main_passed: Some(false),
        };

        step.execute(&ctx).await.unwrap();

        let execs = client.execs.lock().unwrap();
        let spec = &execs[0].1;
        assert_eq!(spec.cmd, vec!["/bin/sh", "-c", "make"]);
        assert_eq!(
            spec.env,
            vec!["CI=true", "TOKEN=s3cret", "PIPEWRIGHT_RESULT=failed"]
        );
    }

    #[tokio::test]
    async fn test_execute_reports_exit_code() {
        let options = GlobalOptions::default();
        let step = ScriptStep::new(&RawStep::new("script").with("code", "exit 3"), &options)
            .unwrap();
        let client = RecordingClient::failing(3);
        let session = Session::new("c-1");
        let env = Environment::new();
        let ctx = StepContext {
            client: &client,
            session: &session,
            env: &env,
            options: &options,
            main_passed: None,
        };

        match step.execute(&ctx).await {
            Err(Error::StepFailed { step, message }) => {
                assert_eq!(step, "script");
                assert!(message.contains('3'));
            }
            other => panic!("Expected StepFailed, got {:?}", other),
        }
    }
}
