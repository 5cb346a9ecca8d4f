//! Agent configuration parsing.
//!
//! ```kdl
//! host-root "/var/lib/pipewright"
//! guest-root "/pipeline"
//! base-url "https://ci.example.com/"
//! mirrors {
//!     registry "https://mirror.example.com"
//! }
//! ```

use crate::node::{child_string_pairs, require_string_arg};
use crate::{ConfigError, ConfigResult};
use kdl::KdlDocument;
use pipewright_core::environment::EnvMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Settings of the agent that runs pipelines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Host directory holding per-run working directories.
    pub host_root: Option<PathBuf>,
    /// Root of pipeline paths inside containers.
    pub guest_root: Option<String>,
    /// Base URL of the web UI.
    pub base_url: Option<String>,
    /// Mirror name to mirror URL, in file order.
    pub mirrors: Vec<(String, String)>,
}

impl AgentConfig {
    /// Mirror variables: `registry` becomes `PIPEWRIGHT_REGISTRY_MIRROR`.
    pub fn mirror_env(&self) -> EnvMap {
        self.mirrors
            .iter()
            .map(|(name, url)| {
                let name = name.replace('-', "_").to_uppercase();
                (format!("PIPEWRIGHT_{}_MIRROR", name), url.clone())
            })
            .collect()
    }
}

/// Read and parse agent configuration from disk.
pub fn load_agent_config(path: impl AsRef<Path>) -> ConfigResult<AgentConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_agent_config(&content)
}

/// Parse agent configuration from KDL text.
pub fn parse_agent_config(kdl: &str) -> ConfigResult<AgentConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = AgentConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "host-root" => {
                config.host_root = Some(PathBuf::from(require_string_arg(node, "host-root")?));
            }
            "guest-root" => {
                let root = require_string_arg(node, "guest-root")?;
                if !root.starts_with('/') {
                    return Err(ConfigError::InvalidValue {
                        field: "guest-root".to_string(),
                        message: format!("'{}' is not an absolute path", root),
                    });
                }
                config.guest_root = Some(root);
            }
            "base-url" => {
                let base_url = require_string_arg(node, "base-url")?;
                Url::parse(&base_url).map_err(|e| ConfigError::InvalidValue {
                    field: "base-url".to_string(),
                    message: e.to_string(),
                })?;
                config.base_url = Some(base_url);
            }
            "mirrors" => {
                for (name, url) in child_string_pairs(node)? {
                    if config.mirrors.iter().any(|(n, _)| *n == name) {
                        return Err(ConfigError::Duplicate(format!("mirror '{}'", name)));
                    }
                    config.mirrors.push((name, url));
                }
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(config)
}
