// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Configuration files
//!
//! Non-secret settings can live in a YAML or TOML file. Tokens and keys are
//! not part of the schema; they come from flags or the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    with_branch, with_coverage, with_env, with_git_protocol, with_git_ref, with_git_user_email,
    with_git_user_name, with_go_version, with_image_name, with_image_tag, with_java_version,
    with_registry_user, with_skip_push, with_version, ConfigOption,
};
use crate::errors::PipelineError;

/// Settings read from `--config`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct ConfigFile {
    pub env: Option<String>,
    pub skip_push: Option<bool>,
    pub git: GitSection,
    pub registry: RegistrySection,
    pub toolchain: ToolchainSection,
    pub min_coverage: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitSection {
    pub repo: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub protocol: Option<String>,
    pub branch: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySection {
    pub url: Option<String>,
    pub user: Option<String>,
    pub image_name: Option<String>,
    pub image_tag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainSection {
    pub go_version: Option<String>,
    pub java_version: Option<String>,
    pub version: Option<String>,
}

impl ConfigFile {
    /// Load from disk; the extension picks the format
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, PipelineError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    pub fn from_toml(toml: &str) -> Result<Self, PipelineError> {
        toml::from_str(toml).map_err(Into::into)
    }

    /// Modifiers for every field the file sets, in a fixed order
    pub fn into_options(self) -> Vec<ConfigOption> {
        let mut options = Vec::new();
        let mut push = |value: Option<String>, make: fn(String) -> ConfigOption| {
            if let Some(value) = value {
                options.push(make(value));
            }
        };

        push(self.env, |v| with_env(v));
        push(self.git.git_ref, |v| with_git_ref(v));
        push(self.git.protocol, |v| with_git_protocol(v));
        push(self.git.branch, |v| with_branch(v));
        push(self.git.user_name, |v| with_git_user_name(v));
        push(self.git.user_email, |v| with_git_user_email(v));
        push(self.registry.user, |v| with_registry_user(v));
        push(self.registry.image_name, |v| with_image_name(v));
        push(self.registry.image_tag, |v| with_image_tag(v));
        push(self.toolchain.go_version, |v| with_go_version(v));
        push(self.toolchain.java_version, |v| with_java_version(v));
        push(self.toolchain.version, |v| with_version(v));

        if let Some(repo) = self.git.repo {
            options.push(ConfigOption::new(move |c| c.git_repo = repo));
        }
        if let Some(url) = self.registry.url {
            options.push(ConfigOption::new(move |c| c.registry_url = url));
        }
        if let Some(skip) = self.skip_push {
            options.push(with_skip_push(skip));
        }
        if let Some(min) = self.min_coverage {
            options.push(with_coverage(min));
        }

        options
    }
}
