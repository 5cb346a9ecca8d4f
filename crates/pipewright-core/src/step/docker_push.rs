//! Commit the session container and push it to a registry.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::fmt;
use std::sync::RwLock;
use tracing::info;

use super::{RawStep, Step, StepContext};
use crate::container::{ImageRef, RegistryCredentials};
use crate::environment::Environment;
use crate::options::GlobalOptions;
use crate::pipeline::PipelineKind;
use crate::{Error, Result};

/// Settings after interpolation against the pipeline environment.
#[derive(Clone, Default, PartialEq, Eq)]
struct PushSettings {
    username: Option<String>,
    password: Option<String>,
    repository: String,
    tag: String,
    message: String,
    registry: Option<String>,
}

/// Pushes the container as an image.
///
/// `username` and `password` may reference pipeline variables (`$NAME`);
/// the password is looked up in the hidden environment first.
pub struct DockerPushStep {
    name: String,
    data: IndexMap<String, String>,
    defaults: PushSettings,
    settings: RwLock<Option<PushSettings>>,
}

impl DockerPushStep {
    pub const KIND: &'static str = "docker-push";

    pub fn new(raw: &RawStep, options: &GlobalOptions, kind: PipelineKind) -> Result<Self> {
        if raw.get("password").is_some() && raw.get("username").is_none() {
            return Err(Error::Configuration(format!(
                "step '{}' sets a password without a username",
                raw.display_name()
            )));
        }

        Ok(Self {
            name: raw.display_name().to_string(),
            data: raw.config.clone(),
            defaults: PushSettings {
                repository: kind.docker_repo(options),
                tag: kind.docker_tag(options),
                message: kind.docker_message(options),
                ..Default::default()
            },
            settings: RwLock::new(None),
        })
    }

    /// The resolved username; `None` before `init_env` or when unset.
    pub fn username(&self) -> Option<String> {
        self.resolved().ok().and_then(|s| s.username)
    }

    /// The resolved password; `None` before `init_env` or when unset.
    pub fn password(&self) -> Option<String> {
        self.resolved().ok().and_then(|s| s.password)
    }

    /// The image this step will push.
    pub fn image(&self) -> Result<ImageRef> {
        let settings = self.resolved()?;
        Ok(ImageRef {
            repository: settings.repository,
            tag: settings.tag,
        })
    }

    fn resolved(&self) -> Result<PushSettings> {
        let guard = self
            .settings
            .read()
            .map_err(|_| Error::Internal("docker-push settings lock poisoned".to_string()))?;
        guard
            .clone()
            .ok_or_else(|| Error::Internal(format!("step '{}' was not initialized", self.name)))
    }

    fn field(&self, env: &Environment, key: &str, sensitive: bool) -> Option<String> {
        self.data
            .get(key)
            .map(|value| env.interpolate(value, sensitive))
            .filter(|value| !value.is_empty())
    }
}

impl fmt::Debug for DockerPushStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerPushStep")
            .field("name", &self.name)
            .field("repository", &self.defaults.repository)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Step for DockerPushStep {
    fn id(&self) -> &str {
        Self::KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn init_env(&self, env: &Environment) -> Result<()> {
        let defaults = &self.defaults;
        let settings = PushSettings {
            username: self.field(env, "username", false),
            password: self.field(env, "password", true),
            repository: self
                .field(env, "repository", false)
                .unwrap_or_else(|| defaults.repository.clone()),
            tag: self
                .field(env, "tag", false)
                .unwrap_or_else(|| defaults.tag.clone()),
            message: self
                .field(env, "message", false)
                .unwrap_or_else(|| defaults.message.clone()),
            registry: self.field(env, "registry", false),
        };

        let mut guard = self
            .settings
            .write()
            .map_err(|_| Error::Internal("docker-push settings lock poisoned".to_string()))?;
        *guard = Some(settings);
        Ok(())
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        let settings = self.resolved()?;
        let image = ImageRef {
            repository: settings.repository,
            tag: settings.tag,
        };
        let credentials = match (settings.username, settings.password) {
            (Some(username), Some(password)) => Some(RegistryCredentials {
                username,
                password,
                registry: settings.registry,
            }),
            _ => None,
        };

        info!(step = %self.name, image = %image, "Committing container");
        ctx.client
            .commit(&ctx.session.container_id, &image, &settings.message)
            .await?;

        info!(step = %self.name, image = %image, "Pushing image");
        ctx.client.push(&image, credentials.as_ref()).await
    }
}
