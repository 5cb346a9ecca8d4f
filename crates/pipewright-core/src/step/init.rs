//! The bootstrap step that runs before everything else.

use async_trait::async_trait;

use super::{Step, StepContext, check_exit};
use crate::container::ExecSpec;
use crate::options::GlobalOptions;
use crate::pipeline::PipelineKind;
use crate::{Error, Result};

pub const INIT_STEP_ID: &str = "pipewright-init";

/// Prepares the container directories every pipeline relies on.
#[derive(Debug)]
pub struct InitStep {
    output_path: String,
    report_path: String,
    cache_path: String,
}

impl InitStep {
    /// Fails when the guest root or the id of this `kind` of run is missing.
    pub fn new(options: &GlobalOptions, kind: PipelineKind) -> Result<Self> {
        if options.guest_root.trim().is_empty() {
            return Err(Error::Configuration(
                "guest root is required to initialize a pipeline".to_string(),
            ));
        }
        if kind.run_id(options).is_empty() {
            return Err(Error::Configuration(format!("a {} id is required", kind)));
        }

        Ok(Self {
            output_path: options.guest_path("output"),
            report_path: options.guest_path("report"),
            cache_path: options.guest_path("cache"),
        })
    }

    fn script(&self) -> String {
        format!(
            "mkdir -p \"{}\" \"{}\" \"{}\"",
            self.output_path, self.report_path, self.cache_path
        )
    }
}

#[async_trait]
impl Step for InitStep {
    fn id(&self) -> &str {
        INIT_STEP_ID
    }

    fn name(&self) -> &str {
        "setup environment"
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        let spec = ExecSpec {
            cmd: vec!["/bin/sh".to_string(), "-c".to_string(), self.script()],
            env: ctx.env.export(),
            working_dir: None,
        };
        let result = ctx.client.exec(&ctx.session.container_id, spec).await?;
        check_exit(self.name(), result.exit_code)
    }
}
