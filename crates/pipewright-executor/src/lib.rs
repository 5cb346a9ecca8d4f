//! Container backends for Pipewright.
//!
//! Provides:
//! - [`DockerClient`]: session containers on the local Docker daemon
//! - [`Artificer`]: copies archives out of session containers

pub mod artificer;
pub mod docker;

pub use artificer::Artificer;
pub use docker::DockerClient;
