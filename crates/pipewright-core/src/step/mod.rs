//! Pipeline steps.
//!
//! A step is built from a [`RawStep`] by the [`StepRegistry`], initialized
//! once with the pipeline [`Environment`], and then executed against a
//! container session. Steps are shared as `Arc<dyn Step>`; the bootstrap step
//! appears at the head of both the main and the after sequence.

mod docker_push;
mod init;
mod registry;
mod script;

pub use docker_push::DockerPushStep;
pub use init::{INIT_STEP_ID, InitStep};
pub use registry::{StepFactory, StepRegistry, extra_raw_steps_to_steps};
pub use script::ScriptStep;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::container::ContainerClient;
use crate::environment::Environment;
use crate::options::GlobalOptions;
use crate::session::Session;
use crate::{Error, Result};

/// A step as written in the pipeline file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStep {
    /// Step kind, used to pick a factory (e.g. `script`).
    pub kind: String,
    /// Display name; defaults to the kind.
    pub name: Option<String>,
    /// Step-specific settings, in file order.
    pub config: IndexMap<String, String>,
}

impl RawStep {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }
}

/// Everything a step can see while it executes.
pub struct StepContext<'a> {
    pub client: &'a dyn ContainerClient,
    pub session: &'a Session,
    pub env: &'a Environment,
    pub options: &'a GlobalOptions,
    /// Whether the main steps passed; only set for after-steps.
    pub main_passed: Option<bool>,
}

/// A unit of pipeline work.
#[async_trait]
pub trait Step: Send + Sync + fmt::Debug {
    /// Step kind.
    fn id(&self) -> &str;

    /// Display name.
    fn name(&self) -> &str;

    /// Resolve configuration against the pipeline environment.
    fn init_env(&self, _env: &Environment) -> Result<()> {
        Ok(())
    }

    /// Run the step in the session container.
    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()>;
}

/// Turn an exec result into a step result.
pub(crate) fn check_exit(step: &str, exit_code: Option<i64>) -> Result<()> {
    match exit_code {
        Some(0) => Ok(()),
        Some(code) => Err(Error::StepFailed {
            step: step.to_string(),
            message: format!("exited with code {}", code),
        }),
        None => Err(Error::StepFailed {
            step: step.to_string(),
            message: "exit code unavailable".to_string(),
        }),
    }
}
