//! Pipeline file parsing.
//!
//! ```kdl
//! box "alpine:3.20"
//!
//! build {
//!     step "script" name="compile" {
//!         code "make"
//!     }
//! }
//!
//! after-build {
//!     step "script" code="echo done"
//! }
//!
//! deploy {
//!     step "docker-push" {
//!         username "$USERNAME"
//!         password "$PASSWORD"
//!     }
//! }
//! ```

use crate::node::{child_string_pairs, get_string_prop, require_string_arg, string_props};
use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use pipewright_core::pipeline::{PipelineKind, RawPipeline};
use pipewright_core::step::RawStep;
use std::path::Path;

/// Default pipeline file name.
pub const DEFAULT_PIPELINE_FILE: &str = "pipewright.kdl";

/// A parsed pipeline file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineFile {
    /// Container image the pipeline runs in.
    pub image: Option<String>,
    pub build: Option<RawPipeline>,
    pub deploy: Option<RawPipeline>,
}

impl PipelineFile {
    /// The raw steps for `kind`; empty when the file does not declare it.
    pub fn pipeline(&self, kind: PipelineKind) -> RawPipeline {
        let section = match kind {
            PipelineKind::Build => &self.build,
            PipelineKind::Deploy => &self.deploy,
        };
        section.clone().unwrap_or_default()
    }
}

/// Read and parse a pipeline file from disk.
pub fn load_pipeline_file(path: impl AsRef<Path>) -> ConfigResult<PipelineFile> {
    let content = std::fs::read_to_string(path)?;
    parse_pipeline_file(&content)
}

/// Parse a pipeline file from KDL text.
pub fn parse_pipeline_file(kdl: &str) -> ConfigResult<PipelineFile> {
    let doc: KdlDocument = kdl.parse()?;

    let mut file = PipelineFile::default();
    let mut seen: Vec<String> = Vec::new();

    for node in doc.nodes() {
        let name = node.name().value();
        if matches!(
            name,
            "box" | "build" | "after-build" | "deploy" | "after-deploy"
        ) {
            if seen.iter().any(|s| s == name) {
                return Err(ConfigError::Duplicate(name.to_string()));
            }
            seen.push(name.to_string());
        }

        match name {
            "box" => {
                file.image = Some(require_string_arg(node, "box image")?);
            }
            "build" => {
                file.build.get_or_insert_with(Default::default).raw_steps = parse_steps(node)?;
            }
            "after-build" => {
                file.build.get_or_insert_with(Default::default).raw_after_steps =
                    parse_steps(node)?;
            }
            "deploy" => {
                file.deploy.get_or_insert_with(Default::default).raw_steps = parse_steps(node)?;
            }
            "after-deploy" => {
                file.deploy.get_or_insert_with(Default::default).raw_after_steps =
                    parse_steps(node)?;
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(file)
}

fn parse_steps(section: &KdlNode) -> ConfigResult<Vec<RawStep>> {
    let Some(children) = section.children() else {
        return Ok(Vec::new());
    };

    children
        .nodes()
        .iter()
        .map(|node| {
            if node.name().value() != "step" {
                return Err(ConfigError::InvalidValue {
                    field: section.name().value().to_string(),
                    message: format!("unexpected node '{}'", node.name().value()),
                });
            }
            parse_step(node)
        })
        .collect()
}

fn parse_step(node: &KdlNode) -> ConfigResult<RawStep> {
    let kind = require_string_arg(node, "step kind")?;
    let mut step = RawStep::new(kind);
    step.name = get_string_prop(node, "name");

    let props = string_props(node)?
        .into_iter()
        .filter(|(key, _)| key != "name");
    for (key, value) in props.chain(child_string_pairs(node)?) {
        if step.config.contains_key(&key) {
            return Err(ConfigError::Duplicate(format!(
                "setting '{}' in step '{}'",
                key,
                step.display_name()
            )));
        }
        step.config.insert(key, value);
    }

    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let kdl = r#"
            box "alpine:3.20"

            build {
                step "script" name="compile" {
                    code "make"
                }
                step "script" code="make test"
            }

            after-build {
                step "script" {
                    code "echo done"
                }
            }

            deploy {
                step "docker-push" {
                    username "$USERNAME"
                    password "$PASSWORD"
                }
            }
        "#;

        let file = parse_pipeline_file(kdl).unwrap();
        assert_eq!(file.image.as_deref(), Some("alpine:3.20"));

        let build = file.pipeline(PipelineKind::Build);
        assert_eq!(build.raw_steps.len(), 2);
        assert_eq!(build.raw_steps[0].name.as_deref(), Some("compile"));
        assert_eq!(build.raw_steps[0].get("code"), Some("make"));
        assert_eq!(build.raw_steps[1].get("code"), Some("make test"));
        assert_eq!(build.raw_after_steps.len(), 1);

        let deploy = file.pipeline(PipelineKind::Deploy);
        assert_eq!(deploy.raw_steps[0].kind, "docker-push");
        assert_eq!(deploy.raw_steps[0].get("username"), Some("$USERNAME"));
        assert!(deploy.raw_after_steps.is_empty());
    }

    #[test]
    fn test_missing_section_is_empty() {
        let file = parse_pipeline_file(r#"box "alpine""#).unwrap();
        assert_eq!(file.deploy, None);
        assert_eq!(file.pipeline(PipelineKind::Deploy), RawPipeline::default());
    }

    #[test]
    fn test_step_without_kind() {
        let kdl = r#"
            build {
                step name="nameless"
            }
        "#;
        let err = parse_pipeline_file(kdl).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn test_unexpected_node_in_section() {
        let kdl = r#"
            deploy {
                stage "oops"
            }
        "#;
        let err = parse_pipeline_file(kdl).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_duplicate_section() {
        let kdl = r#"
            build {
            }
            build {
            }
        "#;
        let err = parse_pipeline_file(kdl).unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate(_)));
    }

    #[test]
    fn test_duplicate_setting() {
        let kdl = r#"
            build {
                step "script" code="a" {
                    code "b"
                }
            }
        "#;
        let err = parse_pipeline_file(kdl).unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate(_)));
    }

    #[test]
    fn test_invalid_kdl() {
        assert!(matches!(
            parse_pipeline_file("build {"),
            Err(ConfigError::Parse(_))
        ));
    }
}
