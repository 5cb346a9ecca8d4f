//! Construction of steps from raw step specifications.

use std::collections::HashMap;
use std::sync::Arc;

use super::{DockerPushStep, RawStep, ScriptStep, Step};
use crate::options::GlobalOptions;
use crate::pipeline::PipelineKind;
use crate::{Error, Result};

/// Builds a step of one kind for a build or deploy pipeline.
pub type StepFactory = fn(&RawStep, &GlobalOptions, PipelineKind) -> Result<Arc<dyn Step>>;

/// Maps step kinds to their factories.
///
/// The bootstrap step is deliberately absent: it can only be added by the
/// pipeline assembler.
#[derive(Clone)]
pub struct StepRegistry {
    factories: HashMap<String, StepFactory>,
}

impl StepRegistry {
    /// A registry with no step kinds.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, factory: StepFactory) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Build a single step.
    pub fn build(
        &self,
        raw: &RawStep,
        options: &GlobalOptions,
        kind: PipelineKind,
    ) -> Result<Arc<dyn Step>> {
        let factory = self
            .factories
            .get(&raw.kind)
            .ok_or_else(|| Error::UnknownStep(raw.kind.clone()))?;
        factory(raw, options, kind)
    }

    /// Build every step in order, stopping at the first failure.
    pub fn build_all(
        &self,
        raw_steps: &[RawStep],
        options: &GlobalOptions,
        kind: PipelineKind,
    ) -> Result<Vec<Arc<dyn Step>>> {
        raw_steps
            .iter()
            .map(|raw| self.build(raw, options, kind))
            .collect()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ScriptStep::KIND, |raw, options, _kind| {
            Ok(Arc::new(ScriptStep::new(raw, options)?))
        });
        registry.register(DockerPushStep::KIND, |raw, options, kind| {
            Ok(Arc::new(DockerPushStep::new(raw, options, kind)?))
        });
        registry
    }
}

/// Build user steps with the built-in step kinds.
pub fn extra_raw_steps_to_steps(
    raw_steps: &[RawStep],
    options: &GlobalOptions,
    kind: PipelineKind,
) -> Result<Vec<Arc<dyn Step>>> {
    StepRegistry::default().build_all(raw_steps, options, kind)
}
