//! Container sessions.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Handle to the container a pipeline runs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{container_id}")]
pub struct Session {
    pub container_id: String,
}

impl Session {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
        }
    }
}
