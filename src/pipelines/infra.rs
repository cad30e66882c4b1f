// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! `syntegrity-infra`: infrastructure repository
//!
//! Setup clones the repository and gates its coverage in the same call.
//! Build, Test and Package have nothing to do.

use async_trait::async_trait;
use std::sync::Arc;

use super::{GoTestRunner, SourceTree, INFRA};
use crate::config::Config;
use crate::context::Context;
use crate::engine::Engine;
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::{Pipeline, Step};

pub struct InfraPipeline {
    engine: Arc<dyn Engine>,
    config: Arc<Config>,
    tree: SourceTree,
    coverage: Option<f64>,
}

impl InfraPipeline {
    pub fn new(engine: Arc<dyn Engine>, config: Arc<Config>, tree: SourceTree) -> Self {
        Self {
            engine,
            config,
            tree,
            coverage: None,
        }
    }

    pub fn coverage(&self) -> Option<f64> {
        self.coverage
    }
}

#[async_trait]
impl Pipeline for InfraPipeline {
    fn name(&self) -> &str {
        INFRA
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

    async fn build(&mut self, _ctx: &Context) -> PipelineResult<()> {
        Ok(())
    }

    async fn test(&mut self, _ctx: &Context) -> PipelineResult<()> {
        Ok(())
    }

    async fn package(&mut self, _ctx: &Context) -> PipelineResult<()> {
        Ok(())
    }

    async fn tag(&mut self, _ctx: &Context) -> PipelineResult<()> {
        Err(PipelineError::unimplemented(INFRA, Step::Tag))
    }

    async fn push(&mut self, _ctx: &Context) -> PipelineResult<()> {
        Err(PipelineError::unimplemented(INFRA, Step::Push))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::with_coverage;
    use crate::engine::MemoryEngine;
    use std::path::Path;

    fn pipeline(engine: Arc<MemoryEngine>, min: f64) -> InfraPipeline {
        let config = Arc::new(Config::build([with_coverage(min)]));
        let tree = SourceTree::new(config.clone(), None, Path::new("/infra"));
        InfraPipeline::new(engine, config, tree)
    }

    #[tokio::test]
    async fn test_setup_fuses_checkout_and_coverage() {
        let engine = Arc::new(
            MemoryEngine::new().with_file("/tmp/coverage.txt", "total: (statements) 92.0%"),
        );
        let mut pipeline = pipeline(engine.clone(), 90.0);
        let ctx = Context::new();

        pipeline.setup(&ctx).await.unwrap();
        assert_eq!(pipeline.coverage(), Some(92.0));
        assert_eq!(engine.evaluated().len(), 1);

        pipeline.setup(&ctx).await.unwrap();
        assert_eq!(engine.evaluated().len(), 1);
    }

    #[tokio::test]
    async fn test_setup_fails_below_minimum() {
        let engine = Arc::new(
            MemoryEngine::new().with_file("/tmp/coverage.txt", "total: (statements) 50.0%"),
        );
        let err = pipeline(engine, 90.0).setup(&Context::new()).await.unwrap_err();
        assert_eq!(err.kind(), "CoverageBelow");
    }

    #[tokio::test]
    async fn test_no_op_and_unimplemented_steps() {
        let mut pipeline = pipeline(Arc::new(MemoryEngine::new()), 0.0);
        let ctx = Context::new();

        assert!(pipeline.build(&ctx).await.is_ok());
        assert!(pipeline.test(&ctx).await.is_ok());
        assert!(pipeline.package(&ctx).await.is_ok());
        assert_eq!(pipeline.tag(&ctx).await.unwrap_err().kind(), "Unimplemented");
        assert_eq!(pipeline.push(&ctx).await.unwrap_err().kind(), "Unimplemented");
    }
}
