//! Layered environment variables.
//!
//! An [`Environment`] keeps two insertion-ordered maps: the visible variables
//! that are exported to steps and a hidden map for secret values. Layers are
//! applied with [`Environment::update`] and [`Environment::update_hidden`];
//! the two maps are never merged.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use tracing::debug;

/// Host variables with this prefix are forwarded into pipelines.
pub const PASSTHRU_PREFIX: &str = "X_";

/// Host variables with this prefix are forwarded as hidden values.
pub const HIDDEN_PASSTHRU_PREFIX: &str = "XXX_";

/// An insertion-ordered set of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvMap(IndexMap<String, String>);

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `pairs` in order. Existing names keep their position and take the
    /// new value; unseen names are appended.
    pub fn update<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in pairs {
            self.0.insert(name.into(), value.into());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The variables as owned pairs, in insertion order.
    pub fn ordered(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// `NAME=value` strings, in insertion order.
    pub fn export(&self) -> Vec<String> {
        self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }

    /// Variables whose name starts with `prefix`, with the prefix removed.
    /// A name equal to the prefix is skipped.
    fn strip_prefix(&self, prefix: &str) -> EnvMap {
        self.0
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(prefix)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_string(), v.clone()))
            })
            .collect()
    }
}

impl FromIterator<(String, String)> for EnvMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut map = EnvMap::new();
        map.update(iter);
        map
    }
}

/// Visible variables plus a hidden map for secrets.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: EnvMap,
    hidden: EnvMap,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `NAME=value` entries. Entries without `=` are ignored.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pairs = entries.into_iter().filter_map(|entry| {
            entry
                .as_ref()
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
        });
        Self::from_pairs(pairs)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut env = Self::new();
        env.update(pairs);
        env
    }

    /// Capture the current process environment.
    pub fn from_process() -> Self {
        Self::from_os_pairs(std::env::vars_os())
    }

    /// Build from raw OS pairs, skipping any name or value that is not UTF-8.
    pub fn from_os_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let pairs = pairs.into_iter().filter_map(|(name, value)| {
            match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => Some((name, value)),
                (name, _) => {
                    debug!(name = ?name, "Skipping non UTF-8 host variable");
                    None
                }
            }
        });
        Self::from_pairs(pairs)
    }

    /// Apply a layer to the visible variables.
    pub fn update<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.update(pairs);
    }

    /// Apply a layer to the hidden variables.
    pub fn update_hidden<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.hidden.update(pairs);
    }

    /// Look up a visible variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name)
    }

    /// Look up a hidden variable.
    pub fn get_hidden(&self, name: &str) -> Option<&str> {
        self.hidden.get(name)
    }

    pub fn vars(&self) -> &EnvMap {
        &self.vars
    }

    pub fn hidden(&self) -> &EnvMap {
        &self.hidden
    }

    /// Visible variables named `X_NAME`, exposed as `NAME`.
    pub fn passthru(&self) -> EnvMap {
        self.vars.strip_prefix(PASSTHRU_PREFIX)
    }

    /// Visible variables named `XXX_NAME`, exposed as `NAME`.
    pub fn hidden_passthru(&self) -> EnvMap {
        self.vars.strip_prefix(HIDDEN_PASSTHRU_PREFIX)
    }

    /// Find `name` in either map. Sensitive lookups consult the hidden map
    /// first.
    pub fn resolve(&self, name: &str, sensitive: bool) -> Option<&str> {
        if sensitive {
            self.hidden.get(name).or_else(|| self.vars.get(name))
        } else {
            self.vars.get(name).or_else(|| self.hidden.get(name))
        }
    }

    /// Resolve a `$NAME` or `${NAME}` reference.
    ///
    /// The whole value must be a single reference; the name is matched
    /// exactly and the result is returned verbatim without further expansion.
    /// Values that are not references, or name an unknown variable, are
    /// returned unchanged.
    pub fn interpolate(&self, value: &str, sensitive: bool) -> String {
        let Some(reference) = value.strip_prefix('$') else {
            return value.to_string();
        };
        let name = reference
            .strip_prefix('{')
            .and_then(|r| r.strip_suffix('}'))
            .unwrap_or(reference);
        if name.is_empty() {
            return value.to_string();
        }
        self.resolve(name, sensitive)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string())
    }

    /// `NAME=value` strings for a container process: visible variables not
    /// shadowed by a hidden one, then the hidden variables.
    pub fn export(&self) -> Vec<String> {
        self.vars
            .iter()
            .filter(|(k, _)| !self.hidden.contains(k))
            .chain(self.hidden.iter())
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hidden: Vec<&str> = self.hidden.names().collect();
        f.debug_struct("Environment")
            .field("vars", &self.vars)
            .field("hidden", &hidden)
            .finish()
    }
}
