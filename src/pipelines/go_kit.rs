// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! `go-kit`: Go library pipeline
//!
//! Setup checks out the tree and gates its coverage once. Test runs the
//! suite again after Build and re-applies the gate.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{generate_tag, GoTestRunner, SourceTree, GO_KIT};
use crate::config::Config;
use crate::context::Context;
use crate::engine::Engine;
use crate::env::EnvView;
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::{Pipeline, Step};

pub struct GoKitPipeline {
    engine: Arc<dyn Engine>,
    config: Arc<Config>,
    env: Arc<dyn EnvView>,
    tree: SourceTree,
    coverage: Option<f64>,
    tag: Option<String>,
}

impl GoKitPipeline {
    pub fn new(
        engine: Arc<dyn Engine>,
        config: Arc<Config>,
        env: Arc<dyn EnvView>,
        tree: SourceTree,
    ) -> Self {
        Self {
            engine,
            config,
            env,
            tree,
            coverage: None,
            tag: None,
        }
    }

    /// Total coverage measured by the last Setup or Test
    pub fn coverage(&self) -> Option<f64> {
        self.coverage
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

#[async_trait]
impl Pipeline for GoKitPipeline {
    fn name(&self) -> &str {
        GO_KIT
    }

    async fn setup(&mut self, ctx: &Context) -> PipelineResult<()> {
        if self.coverage.is_some() {
            return Ok(());
        }

        let source = self.tree.setup(ctx, self.engine.as_ref()).await?;
        let coverage = GoTestRunner::new(&self.config)
            .run(ctx, self.engine.as_ref(), &source)
            .await?;
        self.coverage = Some(coverage);
        Ok(())
    }

    async fn build(&mut self, ctx: &Context) -> PipelineResult<()> {
        let source = self.tree.require(Step::Build)?;
        let container = GoTestRunner::new(&self.config)
            .container(ctx, self.engine.as_ref(), source)
            .await?
            .with_exec(&["go", "build", "./..."]);

        ctx.guard(self.engine.stdout(&container)).await?;
        info!("go build succeeded");
        Ok(())
    }

    async fn test(&mut self, ctx: &Context) -> PipelineResult<()> {
        let source = self.tree.require(Step::Test)?;
        let coverage = GoTestRunner::new(&self.config)
            .run(ctx, self.engine.as_ref(), source)
            .await?;
        self.coverage = Some(coverage);
        Ok(())
    }

    async fn package(&mut self, _ctx: &Context) -> PipelineResult<()> {
        Err(PipelineError::unimplemented(GO_KIT, Step::Package))
    }

    async fn tag(&mut self, ctx: &Context) -> PipelineResult<()> {
        let source = self.tree.tag_source(Step::Tag)?;
        let tag = generate_tag(
            ctx,
            self.engine.as_ref(),
            self.env.as_ref(),
            source,
            self.tree.host_dir(),
        )
        .await?;
        self.tag = Some(tag);
        Ok(())
    }

    async fn push(&mut self, _ctx: &Context) -> PipelineResult<()> {
        Err(PipelineError::unimplemented(GO_KIT, Step::Push))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::with_coverage;
    use crate::engine::MemoryEngine;
    use crate::env::MapEnv;
    use std::path::Path;

    fn pipeline(engine: Arc<MemoryEngine>, config: Config) -> GoKitPipeline {
        let config = Arc::new(config);
        let tree = SourceTree::new(config.clone(), None, Path::new("/work"));
        GoKitPipeline::new(engine, config, Arc::new(MapEnv::new()), tree)
    }

    #[tokio::test]
    async fn test_steps_need_setup() {
        let engine = Arc::new(MemoryEngine::new());
        let mut pipeline = pipeline(engine.clone(), Config::default());

        let err = pipeline.test(&Context::new()).await.unwrap_err();
        assert_eq!(err.kind(), "NotSetUp");
        let err = pipeline.build(&Context::new()).await.unwrap_err();
        assert_eq!(err.kind(), "NotSetUp");
        assert!(engine.evaluated().is_empty());
    }

    #[tokio::test]
    async fn test_setup_gates_coverage_once() {
        let engine = Arc::new(
            MemoryEngine::new().with_file("/tmp/coverage.txt", "total:\t(statements)\t87.5%\n"),
        );
        let mut pipeline = pipeline(engine.clone(), Config::build([with_coverage(85.0)]));
        let ctx = Context::new();

        pipeline.setup(&ctx).await.unwrap();
        assert_eq!(pipeline.coverage(), Some(87.5));
        assert_eq!(engine.evaluated().len(), 1);

        pipeline.setup(&ctx).await.unwrap();
        assert_eq!(engine.evaluated().len(), 1);

        pipeline.test(&ctx).await.unwrap();
        assert_eq!(engine.evaluated().len(), 2);
    }

    #[tokio::test]
    async fn test_setup_fails_below_minimum() {
        let engine = Arc::new(
            MemoryEngine::new().with_file("/tmp/coverage.txt", "total: (statements) 40.0%"),
        );
        let mut pipeline = pipeline(engine, Config::build([with_coverage(85.0)]));

        let err = pipeline.setup(&Context::new()).await.unwrap_err();
        assert_eq!(err.kind(), "CoverageBelow");
        assert_eq!(pipeline.coverage(), None);
    }

    #[tokio::test]
    async fn test_build_runs_go_build() {
        let engine = Arc::new(
            MemoryEngine::new().with_file("/tmp/coverage.txt", "total: (statements) 100.0%"),
        );
        let mut pipeline = pipeline(engine.clone(), Config::default());
        let ctx = Context::new();

        pipeline.setup(&ctx).await.unwrap();
        pipeline.build(&ctx).await.unwrap();

        let container = &engine.evaluated()[1];
        assert_eq!(container.execs().last().map(|a| a.join(" ")), Some("go build ./...".into()));
    }

    #[tokio::test]
    async fn test_package_and_push_are_unimplemented() {
        let mut pipeline = pipeline(Arc::new(MemoryEngine::new()), Config::default());
        let ctx = Context::new();

        assert_eq!(pipeline.package(&ctx).await.unwrap_err().kind(), "Unimplemented");
        assert_eq!(pipeline.push(&ctx).await.unwrap_err().kind(), "Unimplemented");
    }

    #[tokio::test]
    async fn test_tag_writes_tag_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MemoryEngine::new());
        let config = Arc::new(Config::default());
        let tree = SourceTree::new(config.clone(), None, dir.path());
        let env = Arc::new(MapEnv::from_pairs([("TAG_NAME", "v2.0.0")]));
        let mut pipeline = GoKitPipeline::new(engine, config, env, tree);

        pipeline.tag(&Context::new()).await.unwrap();

        assert_eq!(pipeline.tag_name(), Some("v2.0.0"));
        assert!(dir.path().join(".tag_name").exists());
    }
}
