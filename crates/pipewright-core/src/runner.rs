//! Sequential step runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::container::ContainerClient;
use crate::pipeline::Pipeline;
use crate::session::Session;
use crate::step::{Step, StepContext};
use crate::Result;

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    Passed,
    Failed { message: String },
    /// Not run because an earlier step failed.
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub id: String,
    pub name: String,
    pub outcome: StepOutcome,
}

/// Result of running a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
    pub after_steps: Vec<StepReport>,
    /// Whether every main step passed.
    pub success: bool,
    /// Whether every after-step passed.
    pub after_success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs a pipeline's steps one at a time in a session container.
pub struct PipelineRunner {
    client: Arc<dyn ContainerClient>,
}

impl PipelineRunner {
    pub fn new(client: Arc<dyn ContainerClient>) -> Self {
        Self { client }
    }

    /// Initialize every step, run the main steps until one fails, then run
    /// the after-steps with the main result available.
    ///
    /// Step failures are recorded in the report; only initialization errors
    /// are returned.
    pub async fn run(&self, pipeline: &Pipeline, session: &Session) -> Result<RunReport> {
        let started_at = Utc::now();
        for step in pipeline.steps().iter().chain(pipeline.after_steps()) {
            step.init_env(pipeline.env())?;
        }

        let mut ctx = StepContext {
            client: self.client.as_ref(),
            session,
            env: pipeline.env(),
            options: pipeline.options(),
            main_passed: None,
        };

        info!(kind = %pipeline.kind(), container = %session, "Running steps");
        let (steps, success) = run_sequence(pipeline.steps(), &ctx).await;

        ctx.main_passed = Some(success);
        info!(kind = %pipeline.kind(), success, "Running after-steps");
        let (after_steps, after_success) = run_sequence(pipeline.after_steps(), &ctx).await;

        Ok(RunReport {
            steps,
            after_steps,
            success,
            after_success,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

async fn run_sequence(steps: &[Arc<dyn Step>], ctx: &StepContext<'_>) -> (Vec<StepReport>, bool) {
    let mut reports = Vec::with_capacity(steps.len());
    let mut passed = true;

    for step in steps {
        let outcome = if !passed {
            StepOutcome::Skipped
        } else {
            info!(step = %step.name(), "Step started");
            match step.execute(ctx).await {
                Ok(()) => {
                    info!(step = %step.name(), "Step passed");
                    StepOutcome::Passed
                }
                Err(e) => {
                    warn!(step = %step.name(), error = %e, "Step failed");
                    passed = false;
                    StepOutcome::Failed {
                        message: e.to_string(),
                    }
                }
            }
        };
        reports.push(StepReport {
            id: step.id().to_string(),
            name: step.name().to_string(),
            outcome,
        });
    }

    (reports, passed)
}
