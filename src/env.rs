// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Environment views
//!
//! Credential probing and CI detection read ambient variables through
//! [`EnvView`] so tests can hand in a fixed map instead of touching the real
//! process environment.

use std::collections::HashMap;

/// Set when running inside any CI system
pub const CI: &str = "CI";
/// Set by GitLab runners
pub const GITLAB_CI: &str = "GITLAB_CI";
/// Short-lived job token issued by GitLab CI
pub const CI_JOB_TOKEN: &str = "CI_JOB_TOKEN";
/// Personal access token
pub const GITLAB_PAT: &str = "GITLAB_PAT";
/// PEM encoded private key for SSH clones
pub const SSH_PRIVATE_KEY: &str = "SSH_PRIVATE_KEY";
/// Abbreviated commit SHA exported by GitLab CI
pub const CI_COMMIT_SHORT_SHA: &str = "CI_COMMIT_SHORT_SHA";
/// Explicit tag override
pub const TAG_NAME: &str = "TAG_NAME";
/// Home directory
pub const HOME: &str = "HOME";

/// Read-only view over environment variables
pub trait EnvView: Send + Sync {
    /// Raw lookup
    fn var(&self, key: &str) -> Option<String>;

    /// Lookup that treats an empty value as absent
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.trim().is_empty())
    }

    /// Whether the variable holds a truthy value (`true`, `1`, `yes`)
    fn is_truthy(&self, key: &str) -> bool {
        self.var(key)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false)
    }

    /// Whether the process runs under CI
    fn in_ci(&self) -> bool {
        self.is_truthy(CI) || self.is_truthy(GITLAB_CI)
    }
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvView for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed set of variables
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from key/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

impl EnvView for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}
