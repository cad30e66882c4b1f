// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! HTTPS clone strategy
//!
//! Authenticates with a `.netrc` built from the resolved credentials and
//! retries transient failures a bounded number of times.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    repo_host, with_identity, CloneStrategy, CredentialResolver, GitCloneOptions, DEFAULT_BRANCH,
    DEFAULT_GIT_HOST, DEFAULT_USER_EMAIL, DEFAULT_USER_NAME, GIT_BASE_IMAGE,
};
use crate::context::Context;
use crate::engine::{Container, Directory, Engine};
use crate::env::EnvView;
use crate::errors::{PipelineError, PipelineResult};

/// Where clones land inside the container
const CLONE_ROOT: &str = "/src";

/// HTTPS clone strategy
#[derive(Clone)]
pub struct HttpsCloner {
    env: Arc<dyn EnvView>,
    /// Overall deadline for the clone, derived from the caller's context
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub shallow: bool,
    pub depth: u32,
    /// Verify TLS certificates of the remote
    pub tls_verify: bool,
}

impl HttpsCloner {
    pub fn new(env: Arc<dyn EnvView>) -> Self {
        Self {
            env,
            timeout: Duration::from_secs(5 * 60),
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            shallow: true,
            depth: 1,
            tls_verify: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_depth(mut self, depth: Option<u32>) -> Self {
        match depth {
            Some(depth) => {
                self.shallow = true;
                self.depth = depth;
            }
            None => self.shallow = false,
        }
        self
    }

    pub fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Fill in branch and identity defaults
    fn normalize(options: &GitCloneOptions) -> PipelineResult<GitCloneOptions> {
        if options.repo.trim().is_empty() {
            return Err(PipelineError::InvalidOptions {
                reason: "missing repository".to_string(),
            });
        }

        let mut options = options.clone();
        if options.branch.trim().is_empty() {
            options.branch = DEFAULT_BRANCH.to_string();
        }
        if options.user_email.trim().is_empty() {
            options.user_email = DEFAULT_USER_EMAIL.to_string();
        }
        if options.user_name.trim().is_empty() {
            options.user_name = DEFAULT_USER_NAME.to_string();
        }
        Ok(options)
    }

    /// Container with git installed, credentials wired and identity set
    async fn prepare(
        &self,
        ctx: &Context,
        engine: &dyn Engine,
        options: &GitCloneOptions,
    ) -> PipelineResult<Container> {
        let credentials = CredentialResolver::new(self.env.clone()).resolve();
        credentials.validate()?;
        info!("Cloning {} with credentials {}", options.repo, credentials.summary());

        let mut container = Container::new(GIT_BASE_IMAGE)
            .with_exec(&["apk", "add", "--no-cache", "git", "ca-certificates"]);

        if !credentials.is_anonymous() {
            let host = repo_host(&options.repo).unwrap_or_else(|| DEFAULT_GIT_HOST.to_string());
            let netrc = format!(
                "machine {} login {} password {}\n",
                host,
                credentials.user,
                credentials.secret()
            );
            let secret = ctx.guard(engine.set_secret("git-netrc", &netrc)).await?;

            container = container
                .with_secret_file("/root/.netrc", &secret, 0o600)
                .with_env("HOME", "/root")
                .with_exec(&["git", "config", "--global", "credential.helper", "store"]);
        }

        if !self.tls_verify {
            warn!("TLS verification disabled for {}", options.repo);
            container = container.with_exec(&["git", "config", "--global", "http.sslVerify", "false"]);
        }

        Ok(with_identity(container, options).with_workdir(CLONE_ROOT))
    }

    /// One clone attempt: run the clone, then require a non-empty checkout
    async fn attempt(
        &self,
        ctx: &Context,
        engine: &dyn Engine,
        container: &Container,
        target: &str,
    ) -> PipelineResult<Directory> {
        let dir = ctx.guard(engine.directory(container, target)).await?;
        let entries = ctx.guard(engine.entries(&dir)).await?;

        if entries.is_empty() {
            return Err(PipelineError::EmptyClone {
                path: target.to_string(),
            });
        }

        debug!("Clone produced {} top-level entries", entries.len());
        Ok(dir)
    }
}

#[async_trait]
impl CloneStrategy for HttpsCloner {
    async fn clone_repo(
        &self,
        ctx: &Context,
        engine: &dyn Engine,
        options: &GitCloneOptions,
    ) -> PipelineResult<Directory> {
        let options = Self::normalize(options)?;
        let ctx = ctx.with_timeout(self.timeout);

        let depth = self.shallow.then_some(self.depth);
        let container = self
            .prepare(&ctx, engine, &options)
            .await?
            .with_exec(&options.clone_args(depth));
        let target = format!("{}/{}", CLONE_ROOT, options.name);

        retry(&ctx, self.max_retries, self.retry_delay, || {
            self.attempt(&ctx, engine, &container, &target)
        })
        .await
    }
}

/// Run `op` up to `max_attempts` times, sleeping `delay` between attempts.
/// Cancellation ends the loop immediately.
pub(crate) async fn retry<T, F, Fut>(
    ctx: &Context,
    max_attempts: u32,
    delay: Duration,
    mut op: F,
) -> PipelineResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = PipelineResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!("Clone attempt {}/{} failed: {}", attempt, max_attempts, e);
                last_error = Some(e);
            }
        }

        if attempt < max_attempts {
            ctx.sleep(delay).await?;
        }
    }

    Err(PipelineError::CloneFailed {
        attempts: max_attempts,
        cause: Box::new(last_error.unwrap_or_else(|| PipelineError::InvalidOptions {
            reason: "no clone attempt was made".to_string(),
        })),
    })
}
