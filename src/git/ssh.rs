// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! SSH clone strategy
//!
//! Single attempt: key and host-key problems do not fix themselves on retry.

use async_trait::async_trait;
use directories::BaseDirs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::{with_identity, CloneStrategy, GitCloneOptions, GIT_BASE_IMAGE};
use crate::context::Context;
use crate::engine::{Container, Directory, Engine};
use crate::env::{self, EnvView};
use crate::errors::{PipelineError, PipelineResult};

const CLONE_ROOT: &str = "/src";
const KEY_PATH_IN_CONTAINER: &str = "/root/.ssh/id_rsa";
const SSH_COMMAND: &str = "ssh -i /root/.ssh/id_rsa -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null";

/// SSH clone strategy
#[derive(Clone)]
pub struct SshCloner {
    env: Arc<dyn EnvView>,
    key_path: Option<PathBuf>,
}

impl SshCloner {
    pub fn new(env: Arc<dyn EnvView>) -> Self {
        Self {
            env,
            key_path: None,
        }
    }

    /// Read the fallback key from `path` instead of `~/.ssh/id_rsa`
    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// On-disk location checked when no key is passed in
    pub fn default_key_path(&self) -> PathBuf {
        if let Some(path) = &self.key_path {
            return path.clone();
        }

        let home = self
            .env
            .non_empty(env::HOME)
            .map(PathBuf::from)
            .or_else(|| BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()))
            .unwrap_or_default();
        home.join(".ssh").join("id_rsa")
    }

    /// Key from the options, then `SSH_PRIVATE_KEY`, then the key file
    async fn load_key(&self, options: &GitCloneOptions) -> PipelineResult<String> {
        if let Some(key) = options.ssh_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.clone());
        }

        if let Some(key) = self.env.non_empty(env::SSH_PRIVATE_KEY) {
            return Ok(key);
        }

        let path = self.default_key_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(key) if !key.trim().is_empty() => {
                debug!("Using SSH key from {}", path.display());
                Ok(key)
            }
            _ => Err(PipelineError::MissingKey { path }),
        }
    }
}

#[async_trait]
impl CloneStrategy for SshCloner {
    async fn clone_repo(
        &self,
        ctx: &Context,
        engine: &dyn Engine,
        options: &GitCloneOptions,
    ) -> PipelineResult<Directory> {
        let key = self.load_key(options).await?;
        let secret = ctx.guard(engine.set_secret("ssh-key", &key)).await?;
        info!("Cloning {} over SSH", options.repo);

        let container = Container::new(GIT_BASE_IMAGE)
            .with_exec(&["apk", "add", "--no-cache", "git", "openssh-client"])
            .with_secret_file(KEY_PATH_IN_CONTAINER, &secret, 0o600)
            .with_env("GIT_SSH_COMMAND", SSH_COMMAND);

        let container = with_identity(container, options)
            .with_workdir(CLONE_ROOT)
            .with_exec(&options.clone_args(Some(1)));

        let target = format!("{}/{}", CLONE_ROOT, options.name);
        let dir = ctx.guard(engine.directory(&container, &target)).await?;
        let entries = ctx.guard(engine.entries(&dir)).await?;

        if entries.is_empty() {
            return Err(PipelineError::CloneFailed {
                attempts: 1,
                cause: Box::new(PipelineError::EmptyClone { path: target }),
            });
        }

        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ContainerOp, MemoryEngine};
    use crate::env::MapEnv;
    use crate::git::clone_repo;

    fn options() -> GitCloneOptions {
        GitCloneOptions::new("git@gitlab.com:syntegrity/go-kit.git", "main", "go-kit")
    }

    #[tokio::test]
    async fn test_missing_key_without_env_or_file() {
        let home = tempfile::tempdir().unwrap();
        let env: Arc<dyn EnvView> = Arc::new(MapEnv::from_pairs([(
            "HOME",
            home.path().to_string_lossy().to_string(),
        )]));
        let engine = MemoryEngine::new();

        let err = clone_repo(
            &Context::new(),
            &engine,
            env,
            &GitCloneOptions::new("u", "b", "n"),
            "ssh",
        )
        .await
        .unwrap_err();

        match err {
            PipelineError::MissingKey { path } => {
                assert_eq!(path, home.path().join(".ssh").join("id_rsa"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(engine.evaluated().is_empty());
    }

    #[tokio::test]
    async fn test_key_from_environment_is_mounted() {
        let env = MapEnv::from_pairs([("SSH_PRIVATE_KEY", "-----BEGIN KEY-----")]);
        let engine = MemoryEngine::new().with_entries("/src/go-kit", &["go.mod"]);

        let dir = SshCloner::new(Arc::new(env))
            .clone_repo(&Context::new(), &engine, &options())
            .await
            .unwrap();

        assert_eq!(dir.path.to_str(), Some("/src/go-kit"));
        assert_eq!(engine.secret_value("ssh-key").as_deref(), Some("-----BEGIN KEY-----"));

        let container = &engine.evaluated()[0];
        assert!(container.ops().iter().any(|op| matches!(
            op,
            ContainerOp::SecretFile { path, permissions: 0o600, .. } if path == "/root/.ssh/id_rsa"
        )));
        assert!(container.ops().iter().any(|op| matches!(
            op,
            ContainerOp::Env { key, value } if key == "GIT_SSH_COMMAND" && value.contains("StrictHostKeyChecking=no")
        )));
        assert_eq!(
            container.execs().last().map(|args| args.join(" ")),
            Some("git clone --depth=1 --branch main git@gitlab.com:syntegrity/go-kit.git go-kit".to_string())
        );
    }

    #[tokio::test]
    async fn test_key_file_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("deploy_key");
        std::fs::write(&key_path, "file-key").unwrap();

        let engine = MemoryEngine::new().with_entries("/src/go-kit", &["go.mod"]);
        SshCloner::new(Arc::new(MapEnv::new()))
            .with_key_path(&key_path)
            .clone_repo(&Context::new(), &engine, &options())
            .await
            .unwrap();

        assert_eq!(engine.secret_value("ssh-key").as_deref(), Some("file-key"));
    }

    #[tokio::test]
    async fn test_option_key_overrides_environment() {
        let env = MapEnv::from_pairs([("SSH_PRIVATE_KEY", "env-key")]);
        let engine = MemoryEngine::new().with_entries("/src/go-kit", &["go.mod"]);
        let mut options = options();
        options.ssh_key = Some("option-key".into());

        SshCloner::new(Arc::new(env))
            .clone_repo(&Context::new(), &engine, &options)
            .await
            .unwrap();

        assert_eq!(engine.secret_value("ssh-key").as_deref(), Some("option-key"));
    }

    #[tokio::test]
    async fn test_empty_checkout_fails_once() {
        let env = MapEnv::from_pairs([("SSH_PRIVATE_KEY", "k")]);
        let engine = MemoryEngine::new();

        let err = SshCloner::new(Arc::new(env))
            .clone_repo(&Context::new(), &engine, &options())
            .await
            .unwrap_err();

        match err {
            PipelineError::CloneFailed { attempts, cause } => {
                assert_eq!(attempts, 1);
                assert_eq!(cause.kind(), "EmptyClone");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.evaluated().len(), 1);
    }
}
