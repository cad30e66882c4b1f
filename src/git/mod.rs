// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Repository cloning
//!
//! Two strategies materialize a remote repository as an engine directory:
//! [`HttpsCloner`] (token auth, bounded retries) and [`SshCloner`] (key auth,
//! single attempt). [`Cloner`] validates the options and picks one by
//! protocol.

mod credentials;
mod https;
mod repos;
mod ssh;

pub use credentials::{
    summarize, CredentialKind, CredentialResolver, Credentials, CI_TOKEN_USER, PAT_USER, SSH_USER,
};
pub use https::HttpsCloner;
pub use repos::{get_repo_url, RepoDescriptor, RepoTable};
pub use ssh::SshCloner;

use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::context::Context;
use crate::engine::{Container, Directory, Engine};
use crate::env::EnvView;
use crate::errors::{PipelineError, PipelineResult};

/// Identity used when the caller leaves the git user email empty
pub const DEFAULT_USER_EMAIL: &str = "ci@example.com";
/// Identity used when the caller leaves the git user name empty
pub const DEFAULT_USER_NAME: &str = "CI User";
/// Branch cloned when none is given
pub const DEFAULT_BRANCH: &str = "main";
/// `.netrc` host used when the repository URL has no recognizable host
pub const DEFAULT_GIT_HOST: &str = "gitlab.com";

/// Minimal image the clone containers start from
pub(crate) const GIT_BASE_IMAGE: &str = "alpine:3.20";

/// Everything needed to clone one repository
#[derive(Clone, Default, PartialEq, Eq)]
pub struct GitCloneOptions {
    /// Repository URL
    pub repo: String,
    pub branch: String,
    /// Destination directory name
    pub name: String,
    pub user_name: String,
    pub user_email: String,
    /// Private key overriding the environment for SSH clones
    pub ssh_key: Option<String>,
}

impl GitCloneOptions {
    pub fn new(repo: impl Into<String>, branch: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            branch: branch.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_identity(mut self, user_name: impl Into<String>, user_email: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self.user_email = user_email.into();
        self
    }

    /// Fail with `InvalidOptions` unless repo, branch and name are all set
    pub fn validate(&self) -> PipelineResult<()> {
        let missing: Vec<&str> = [
            ("repository", &self.repo),
            ("branch", &self.branch),
            ("name", &self.name),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| *field)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::InvalidOptions {
                reason: format!("missing {}", missing.join(", ")),
            })
        }
    }

    pub(crate) fn effective_email(&self) -> &str {
        non_empty_or(&self.user_email, DEFAULT_USER_EMAIL)
    }

    pub(crate) fn effective_name(&self) -> &str {
        non_empty_or(&self.user_name, DEFAULT_USER_NAME)
    }

    /// `git clone` arguments for this checkout
    pub(crate) fn clone_args(&self, depth: Option<u32>) -> Vec<String> {
        let mut args = vec!["git".to_string(), "clone".to_string()];
        if let Some(depth) = depth {
            args.push(format!("--depth={}", depth));
        }
        args.extend([
            "--branch".to_string(),
            self.branch.clone(),
            self.repo.clone(),
            self.name.clone(),
        ]);
        args
    }
}

impl fmt::Debug for GitCloneOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitCloneOptions")
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("name", &self.name)
            .field("user_name", &self.user_name)
            .field("user_email", &self.user_email)
            .field("ssh_key", &self.ssh_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// Clone transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Https,
    Ssh,
}

impl Protocol {
    /// `ssh` selects SSH; anything else selects HTTPS
    pub fn select(value: &str) -> Self {
        if value == "ssh" {
            Self::Ssh
        } else {
            Self::Https
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Ssh => "ssh",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Materializes a repository as an engine directory
#[async_trait]
pub trait CloneStrategy: Send + Sync {
    async fn clone_repo(
        &self,
        ctx: &Context,
        engine: &dyn Engine,
        options: &GitCloneOptions,
    ) -> PipelineResult<Directory>;
}

/// Validating dispatcher over the HTTPS and SSH strategies
pub struct Cloner {
    protocol: Protocol,
    https: HttpsCloner,
    ssh: SshCloner,
}

impl Cloner {
    pub fn new(env: Arc<dyn EnvView>, protocol: &str) -> Self {
        Self {
            protocol: Protocol::select(protocol),
            https: HttpsCloner::new(env.clone()),
            ssh: SshCloner::new(env),
        }
    }

    /// Replace the HTTPS strategy (timeouts, retries, TLS)
    pub fn with_https(mut self, https: HttpsCloner) -> Self {
        self.https = https;
        self
    }

    pub fn with_ssh(mut self, ssh: SshCloner) -> Self {
        self.ssh = ssh;
        self
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }
}

#[async_trait]
impl CloneStrategy for Cloner {
    async fn clone_repo(
        &self,
        ctx: &Context,
        engine: &dyn Engine,
        options: &GitCloneOptions,
    ) -> PipelineResult<Directory> {
        options.validate()?;

        match self.protocol {
            Protocol::Ssh => self.ssh.clone_repo(ctx, engine, options).await,
            Protocol::Https => self.https.clone_repo(ctx, engine, options).await,
        }
    }
}

/// Validate `options` and clone over the strategy `protocol` selects
pub async fn clone_repo(
    ctx: &Context,
    engine: &dyn Engine,
    env: Arc<dyn EnvView>,
    options: &GitCloneOptions,
    protocol: &str,
) -> PipelineResult<Directory> {
    Cloner::new(env, protocol)
        .clone_repo(ctx, engine, options)
        .await
}

/// Configure the global git identity inside a clone container
pub(crate) fn with_identity(container: Container, options: &GitCloneOptions) -> Container {
    container
        .with_exec(&["git", "config", "--global", "user.email", options.effective_email()])
        .with_exec(&["git", "config", "--global", "user.name", options.effective_name()])
}

static HOST_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z+]+://)?(?:[^@/]+@)?([A-Za-z0-9.-]+)(?::\d+)?[:/]").ok()
});

/// Host part of an HTTPS or scp-style repository URL
pub fn repo_host(url: &str) -> Option<String> {
    HOST_PATTERN
        .as_ref()
        .and_then(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|host| host.contains('.') || host == "localhost")
}
