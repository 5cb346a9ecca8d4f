//! Container client trait and its request/response types.
//!
//! The client is the only way the core touches a container: steps run
//! commands and push images through it, and the artificer downloads archives
//! through it.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Result;

/// A command to run inside a session container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecSpec {
    /// Command and arguments.
    pub cmd: Vec<String>,
    /// `NAME=value` environment entries.
    pub env: Vec<String>,
    /// Working directory inside the container.
    pub working_dir: Option<String>,
}

/// Outcome of an exec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    /// Exit code if the runtime reported one.
    pub exit_code: Option<i64>,
    pub output: Vec<LogLine>,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A line of output from an exec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub stream: LogStream,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// An image name split into repository and tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Credentials for pushing to a registry.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    /// Registry address; the runtime default when unset.
    pub registry: Option<String>,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .field("registry", &self.registry)
            .finish()
    }
}

/// Stream of raw tar archive chunks.
pub type TarStream = BoxStream<'static, Result<Bytes>>;

/// Trait for container runtimes.
#[async_trait]
pub trait ContainerClient: Send + Sync {
    /// Check that the runtime is reachable.
    async fn ping(&self) -> Result<()>;

    /// Run a command in a container and wait for it to finish.
    async fn exec(&self, container_id: &str, spec: ExecSpec) -> Result<ExecResult>;

    /// Stream a tar archive of `path` inside the container.
    ///
    /// A missing container or path is an [`Error::Extraction`](crate::Error).
    async fn download(&self, container_id: &str, path: &str) -> Result<TarStream>;

    /// Commit the container's filesystem as `image`.
    async fn commit(&self, container_id: &str, image: &ImageRef, message: &str) -> Result<()>;

    /// Push `image` to its registry.
    async fn push(
        &self,
        image: &ImageRef,
        credentials: Option<&RegistryCredentials>,
    ) -> Result<()>;
}
