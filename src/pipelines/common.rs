// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Working tree shared by the built-in pipelines

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::context::Context;
use crate::engine::{Directory, Engine};
use crate::errors::{PipelineError, PipelineResult};
use crate::git::{CloneStrategy, GitCloneOptions};
use crate::pipeline::Step;

use super::TagSource;

/// Host subtrees never mounted into containers
pub const HOST_EXCLUDES: [&str; 4] = ["node_modules", ".git", ".cache", ".syntegrity"];

/// The source a pipeline operates on after Setup
pub struct SourceTree {
    config: Arc<Config>,
    cloner: Option<Arc<dyn CloneStrategy>>,
    host_dir: PathBuf,
    source: Option<Directory>,
}

impl SourceTree {
    pub fn new(config: Arc<Config>, cloner: Option<Arc<dyn CloneStrategy>>, host_dir: &Path) -> Self {
        Self {
            config,
            cloner,
            host_dir: host_dir.to_path_buf(),
            source: None,
        }
    }

    /// Clone through the attached strategy, or adopt the host directory.
    /// A second call returns the tree from the first.
    pub async fn setup(&mut self, ctx: &Context, engine: &dyn Engine) -> PipelineResult<Directory> {
        if let Some(source) = &self.source {
            return Ok(source.clone());
        }

        let source = match &self.cloner {
            Some(cloner) => cloner.clone_repo(ctx, engine, &self.clone_options()).await?,
            None => {
                info!("Using host directory {}", self.host_dir.display());
                ctx.guard(engine.host_directory(&self.host_dir, &HOST_EXCLUDES))
                    .await?
            }
        };

        self.source = Some(source.clone());
        Ok(source)
    }

    /// Working tree, or `NotSetUp` for `step`
    pub fn require(&self, step: Step) -> PipelineResult<&Directory> {
        self.source
            .as_ref()
            .ok_or_else(|| PipelineError::not_set_up(step))
    }

    /// Host directory adopted when no clone strategy is attached
    pub fn host_dir(&self) -> &Path {
        &self.host_dir
    }

    /// Tree whose HEAD names a release. A clone must exist already; the
    /// host checkout is mounted on demand with its `.git`, which Setup
    /// leaves out.
    pub fn tag_source(&self, step: Step) -> PipelineResult<TagSource<'_>> {
        match &self.cloner {
            Some(_) => self.require(step).map(TagSource::Tree),
            None => Ok(TagSource::Host(&self.host_dir)),
        }
    }

    /// Clone options derived from the configuration
    pub fn clone_options(&self) -> GitCloneOptions {
        let config = &self.config;
        let mut options = GitCloneOptions::new(
            config.git_repo.clone(),
            config.git_ref.clone(),
            repo_dir_name(&config.git_repo),
        )
        .with_identity(config.git_user_name.clone(), config.git_user_email.clone());

        if !config.ssh_private_key.is_empty() {
            options.ssh_key = Some(config.ssh_private_key.clone());
        }
        options
    }
}

/// Last path segment of a repository URL without `.git`
pub(crate) fn repo_dir_name(repo: &str) -> String {
    let trimmed = repo.trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{with_git_repo, with_git_user_name, with_ssh_private_key};
    use crate::engine::MemoryEngine;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Remembers every request and answers with `/src/<name>`
    #[derive(Default)]
    struct RecordingClone {
        calls: Mutex<Vec<GitCloneOptions>>,
    }

    #[async_trait]
    impl CloneStrategy for RecordingClone {
        async fn clone_repo(
            &self,
            _ctx: &Context,
            _engine: &dyn Engine,
            options: &GitCloneOptions,
        ) -> PipelineResult<Directory> {
            self.calls.lock().unwrap().push(options.clone());
            Ok(Directory::new(format!("/src/{}", options.name)))
        }
    }

    #[test]
    fn test_repo_dir_name() {
        assert_eq!(repo_dir_name("https://gitlab.com/syntegrity/go-kit.git"), "go-kit");
        assert_eq!(repo_dir_name("git@gitlab.com:syntegrity/docker-go.git"), "docker-go");
        assert_eq!(repo_dir_name("git@host:solo.git"), "solo");
        assert_eq!(repo_dir_name("https://example.com/a/b/"), "b");
    }

    #[test]
    fn test_clone_options_follow_config() {
        let config = Arc::new(Config::build([
            with_git_repo("https://gitlab.com/syntegrity/go-kit.git", "release"),
            with_ssh_private_key("k"),
        ]));
        let options = SourceTree::new(config, None, Path::new(".")).clone_options();

        assert_eq!(options.branch, "release");
        assert_eq!(options.name, "go-kit");
        assert_eq!(options.ssh_key.as_deref(), Some("k"));
    }

    #[tokio::test]
    async fn test_host_directory_excludes_vendored_trees() {
        let engine = MemoryEngine::new();
        let mut tree = SourceTree::new(Arc::new(Config::default()), None, Path::new("/work"));

        assert!(tree.require(Step::Build).is_err());
        let dir = tree.setup(&Context::new(), &engine).await.unwrap();

        assert_eq!(dir.path, PathBuf::from("/work"));
        assert!(dir.exclude.contains(&"node_modules".to_string()));
        assert!(dir.exclude.contains(&".git".to_string()));
        assert!(tree.require(Step::Build).is_ok());
    }

    #[tokio::test]
    async fn test_setup_clones_through_attached_strategy() {
        let recorder = Arc::new(RecordingClone::default());
        let config = Arc::new(Config::build([
            with_git_repo("git@gitlab.com:syntegrity/docker-go.git", "release/1.2"),
            with_git_user_name("ci-bot"),
        ]));
        let mut tree = SourceTree::new(config, Some(recorder.clone()), Path::new("/host"));
        let engine = MemoryEngine::new();
        let ctx = Context::new();

        assert_eq!(tree.tag_source(Step::Tag).unwrap_err().kind(), "NotSetUp");

        let dir = tree.setup(&ctx, &engine).await.unwrap();
        assert_eq!(dir.path, PathBuf::from("/src/docker-go"));
        assert!(dir.exclude.is_empty());

        let again = tree.setup(&ctx, &engine).await.unwrap();
        assert_eq!(again, dir);

        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].repo, "git@gitlab.com:syntegrity/docker-go.git");
        assert_eq!(calls[0].branch, "release/1.2");
        assert_eq!(calls[0].name, "docker-go");
        assert_eq!(calls[0].user_name, "ci-bot");

        assert_eq!(tree.require(Step::Build).unwrap(), &dir);
        match tree.tag_source(Step::Tag).unwrap() {
            TagSource::Tree(tagged) => assert_eq!(tagged, &dir),
            other => panic!("unexpected tag source: {other:?}"),
        }
    }

    #[test]
    fn test_host_tree_is_tagged_from_the_host_checkout() {
        let tree = SourceTree::new(Arc::new(Config::default()), None, Path::new("/work"));
        match tree.tag_source(Step::Tag).unwrap() {
            TagSource::Host(path) => assert_eq!(path, Path::new("/work")),
            other => panic!("unexpected tag source: {other:?}"),
        }
    }
}
