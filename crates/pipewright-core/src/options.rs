//! Per-run options shared by assembly, steps and artifact collection.

use std::fmt;
use std::path::PathBuf;

use crate::environment::{EnvMap, Environment};
use crate::pipeline::PipelineKind;

/// Default root of pipeline paths inside the container.
pub const DEFAULT_GUEST_ROOT: &str = "/pipeline";

/// Identity, naming and path configuration for one run.
///
/// Built once by the caller and never mutated by the core.
#[derive(Clone)]
pub struct GlobalOptions {
    pub application_id: String,
    pub application_name: String,
    pub application_owner_name: String,
    /// Set for deploy runs.
    pub deploy_id: String,
    /// Set for build runs.
    pub build_id: String,
    /// Base URL of the web UI, used for build and deploy links.
    pub base_url: String,
    /// Explicit image tag.
    pub tag: Option<String>,
    /// Explicit image commit message.
    pub message: Option<String>,
    /// Root of pipeline paths inside the container.
    pub guest_root: String,
    /// Host directory that holds one working directory per run.
    pub host_root: PathBuf,
    /// Project directory relative to the guest source path.
    pub source_dir: String,
    /// Environment of the invoking process.
    pub host_env: Environment,
    /// Registry and package mirror variables.
    pub mirror_env: EnvMap,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            application_id: String::new(),
            application_name: String::new(),
            application_owner_name: String::new(),
            deploy_id: String::new(),
            build_id: String::new(),
            base_url: String::new(),
            tag: None,
            message: None,
            guest_root: DEFAULT_GUEST_ROOT.to_string(),
            host_root: PathBuf::from(".pipewright"),
            source_dir: String::new(),
            host_env: Environment::new(),
            mirror_env: EnvMap::new(),
        }
    }
}

impl fmt::Debug for GlobalOptions {
    // The host environment holds unprefixed `XXX_` secrets; only names are shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host_env: Vec<&str> = self
            .host_env
            .vars()
            .names()
            .chain(self.host_env.hidden().names())
            .collect();
        f.debug_struct("GlobalOptions")
            .field("application_id", &self.application_id)
            .field("application_name", &self.application_name)
            .field("application_owner_name", &self.application_owner_name)
            .field("deploy_id", &self.deploy_id)
            .field("build_id", &self.build_id)
            .field("base_url", &self.base_url)
            .field("tag", &self.tag)
            .field("message", &self.message)
            .field("guest_root", &self.guest_root)
            .field("host_root", &self.host_root)
            .field("source_dir", &self.source_dir)
            .field("host_env", &host_env)
            .field("mirror_env", &self.mirror_env)
            .finish()
    }
}

impl GlobalOptions {
    /// `name` under the guest root, e.g. `/pipeline/output`.
    pub fn guest_path(&self, name: &str) -> String {
        join_guest(&self.guest_root, name)
    }

    /// `name` under the host directory of this `kind` of run.
    ///
    /// The run id is part of the path, so concurrent runs never share a
    /// destination.
    pub fn host_path(&self, kind: PipelineKind, name: &str) -> PathBuf {
        self.host_root.join(kind.run_id(self)).join(name)
    }

    /// Where the project source lives inside the container.
    pub fn source_path(&self) -> String {
        let source = self.guest_path("source");
        if self.source_dir.is_empty() {
            source
        } else {
            join_guest(&source, &self.source_dir)
        }
    }

    /// The tag, if one was given and is non-empty.
    pub fn explicit_tag(&self) -> Option<&str> {
        self.tag.as_deref().filter(|t| !t.is_empty())
    }

    /// The message, if one was given and is non-empty.
    pub fn explicit_message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }
}

fn join_guest(root: &str, name: &str) -> String {
    let name = name.trim_matches('/');
    if name.is_empty() {
        return root.to_string();
    }
    format!("{}/{}", root.trim_end_matches('/'), name)
}
