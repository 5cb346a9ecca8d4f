//! Build and deploy specific naming and identity variables.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::options::GlobalOptions;

/// Which kind of run a pipeline performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    #[display("build")]
    Build,
    #[display("deploy")]
    Deploy,
}

impl PipelineKind {
    /// The id of this kind of run.
    pub fn run_id(self, options: &GlobalOptions) -> &str {
        match self {
            PipelineKind::Build => &options.build_id,
            PipelineKind::Deploy => &options.deploy_id,
        }
    }

    /// Variables identifying the run, e.g. `DEPLOY=true` and its id and URL.
    pub fn identity_env(self, options: &GlobalOptions) -> Vec<(String, String)> {
        let (flag, id_var, url_var, fragment) = match self {
            PipelineKind::Build => ("BUILD", "PIPEWRIGHT_BUILD_ID", "PIPEWRIGHT_BUILD_URL", "build"),
            PipelineKind::Deploy => (
                "DEPLOY",
                "PIPEWRIGHT_DEPLOY_ID",
                "PIPEWRIGHT_DEPLOY_URL",
                "deploy",
            ),
        };
        let id = self.run_id(options);
        vec![
            (flag.to_string(), "true".to_string()),
            (id_var.to_string(), id.to_string()),
            (
                url_var.to_string(),
                format!("{}#{}/{}", options.base_url, fragment, id),
            ),
        ]
    }

    pub fn docker_repo(self, options: &GlobalOptions) -> String {
        match self {
            PipelineKind::Build => format!("build-{}", options.build_id),
            PipelineKind::Deploy => format!(
                "{}/{}",
                options.application_owner_name, options.application_name
            ),
        }
    }

    pub fn docker_tag(self, options: &GlobalOptions) -> String {
        if let Some(tag) = options.explicit_tag() {
            return tag.to_string();
        }
        match self {
            PipelineKind::Build => "latest".to_string(),
            PipelineKind::Deploy => format!("deploy-{}", options.deploy_id),
        }
    }

    pub fn docker_message(self, options: &GlobalOptions) -> String {
        match options.explicit_message() {
            Some(message) => message.to_string(),
            None => format!("Build {}", self.run_id(options)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> GlobalOptions {
        GlobalOptions {
            application_name: "web".to_string(),
            application_owner_name: "acme".to_string(),
            deploy_id: "d-7".to_string(),
            build_id: "b-3".to_string(),
            base_url: "https://ci.example.com/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_deploy_naming_defaults() {
        let options = options();
        let kind = PipelineKind::Deploy;
        assert_eq!(kind.docker_repo(&options), "acme/web");
        assert_eq!(kind.docker_tag(&options), "deploy-d-7");
        assert_eq!(kind.docker_message(&options), "Build d-7");
    }

    #[test]
    fn test_explicit_tag_and_message() {
        let options = GlobalOptions {
            tag: Some("v1.2".to_string()),
            message: Some("release".to_string()),
            ..options()
        };
        assert_eq!(PipelineKind::Deploy.docker_tag(&options), "v1.2");
        assert_eq!(PipelineKind::Deploy.docker_message(&options), "release");
        assert_eq!(PipelineKind::Build.docker_tag(&options), "v1.2");
    }

    #[test]
    fn test_build_naming_defaults() {
        let options = options();
        let kind = PipelineKind::Build;
        assert_eq!(kind.docker_repo(&options), "build-b-3");
        assert_eq!(kind.docker_tag(&options), "latest");
        assert_eq!(kind.docker_message(&options), "Build b-3");
    }

    #[test]
    fn test_identity_env() {
        let env = PipelineKind::Deploy.identity_env(&options());
        assert_eq!(
            env,
            vec![
                ("DEPLOY".to_string(), "true".to_string()),
                ("PIPEWRIGHT_DEPLOY_ID".to_string(), "d-7".to_string()),
                (
                    "PIPEWRIGHT_DEPLOY_URL".to_string(),
                    "https://ci.example.com/#deploy/d-7".to_string()
                ),
            ]
        );
    }
}
