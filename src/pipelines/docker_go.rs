// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! `docker-go`: Go service built and shipped as a container image

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{GoTestRunner, SourceTree, DOCKER_GO};
use crate::config::Config;
use crate::context::Context;
use crate::engine::{Engine, Image};
use crate::env::{self, EnvView};
use crate::errors::{PipelineError, PipelineResult};
use crate::git::CI_TOKEN_USER;
use crate::pipeline::{Hook, Pipeline, Step};

/// Tag used when neither the configuration nor CI provides one
const FALLBACK_TAG: &str = "dev";

pub struct DockerGoPipeline {
    engine: Arc<dyn Engine>,
    config: Arc<Config>,
    env: Arc<dyn EnvView>,
    tree: SourceTree,
    image: Option<Image>,
    image_tag: Option<String>,
    registry_path: Option<String>,
    published: Option<String>,
}

impl DockerGoPipeline {
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
            image: None,
            image_tag: None,
            registry_path: None,
            published: None,
        }
    }

    /// Use an image built elsewhere
    pub fn set_image(&mut self, image: Image) {
        self.image = Some(image);
    }

    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    /// `(registry path, tag)` resolved by Tag
    pub fn target(&self) -> Option<(&str, &str)> {
        Some((self.registry_path.as_deref()?, self.image_tag.as_deref()?))
    }

    /// Reference returned by the last successful Push
    pub fn published(&self) -> Option<&str> {
        self.published.as_deref()
    }

    fn resolve_tag(&self) -> String {
        if !self.config.image_tag.is_empty() {
            return self.config.image_tag.clone();
        }
        if let Some(sha) = self.env.non_empty(env::CI_COMMIT_SHORT_SHA) {
            return sha;
        }
        warn!("No image tag configured and no commit SHA available; using '{}'", FALLBACK_TAG);
        FALLBACK_TAG.to_string()
    }

    fn registry_path(&self) -> String {
        let repository = if self.config.image_name.is_empty() {
            DOCKER_GO
        } else {
            self.config.image_name.as_str()
        };
        format!("{}/{}", self.config.registry_url.trim_end_matches('/'), repository)
    }

    /// Username and secret value for the registry
    fn registry_credentials(&self) -> PipelineResult<(String, String)> {
        if self.env.is_truthy(env::CI) {
            let token = self
                .env
                .non_empty(env::CI_JOB_TOKEN)
                .ok_or_else(|| PipelineError::MissingToken {
                    variable: env::CI_JOB_TOKEN.to_string(),
                })?;
            return Ok((CI_TOKEN_USER.to_string(), token));
        }

        if self.config.registry_user.is_empty() {
            return Err(PipelineError::invalid_config("registry user"));
        }
        if self.config.registry_token.is_empty() {
            return Err(PipelineError::invalid_config("registry token"));
        }
        Ok((self.config.registry_user.clone(), self.config.registry_token.clone()))
    }
}

#[async_trait]
impl Pipeline for DockerGoPipeline {
    fn name(&self) -> &str {
        DOCKER_GO
    }

    async fn setup(&mut self, ctx: &Context) -> PipelineResult<()> {
        self.tree.setup(ctx, self.engine.as_ref()).await?;
        Ok(())
    }

    async fn build(&mut self, ctx: &Context) -> PipelineResult<()> {
        let source = self.tree.require(Step::Build)?.clone();

        let entries = ctx.guard(self.engine.entries(&source)).await?;
        debug!("Build context: {}", entries.join(", "));

        let image = ctx.guard(self.engine.build_image(&source)).await?;
        info!("Built image {}", image.id);
        self.image = Some(image);
        Ok(())
    }

    async fn test(&mut self, ctx: &Context) -> PipelineResult<()> {
        let source = self.tree.require(Step::Test)?;
        GoTestRunner::new(&self.config)
            .run(ctx, self.engine.as_ref(), source)
            .await?;
        Ok(())
    }

    async fn package(&mut self, _ctx: &Context) -> PipelineResult<()> {
        Err(PipelineError::unimplemented(DOCKER_GO, Step::Package))
    }

    async fn tag(&mut self, _ctx: &Context) -> PipelineResult<()> {
        if self.image.is_none() {
            return Err(PipelineError::no_image(Step::Tag));
        }

        let tag = self.resolve_tag();
        let path = self.registry_path();

        if self.config.branch_name.is_empty() {
            return Err(PipelineError::invalid_config("branch"));
        }
        if self.config.registry_url.is_empty() {
            return Err(PipelineError::invalid_config("registry"));
        }
        if tag.is_empty() {
            return Err(PipelineError::invalid_config("image tag"));
        }

        info!("Tagged image as {}:{}", path, tag);
        self.image_tag = Some(tag);
        self.registry_path = Some(path);
        Ok(())
    }

    async fn push(&mut self, ctx: &Context) -> PipelineResult<()> {
        let image = self.image.clone().ok_or_else(|| PipelineError::no_image(Step::Push))?;
        let (path, tag) = self
            .target()
            .map(|(path, tag)| (path.to_string(), tag.to_string()))
            .ok_or_else(|| PipelineError::invalid_config("image tag"))?;

        let (user, token) = self.registry_credentials()?;
        let secret = ctx.guard(self.engine.set_secret("registry-password", &token)).await?;
        let image = image.with_registry_auth(user, secret);

        let address = format!("{}:{}", path, tag);
        let reference = ctx
            .guard(async {
                self.engine
                    .publish(&image, &address)
                    .await
                    .map_err(|cause| PipelineError::PublishFailed {
                        address: address.clone(),
                        cause,
                    })
            })
            .await?;

        info!("Published {}", reference);
        self.published = Some(reference);
        Ok(())
    }

    fn before_step(&self, _ctx: &Context, step: Step) -> Option<Hook> {
        if step != Step::Push {
            return None;
        }
        let in_ci = self.env.is_truthy(env::CI);
        Some(Box::new(move || {
            debug!(
                "Registry auth mode: {}",
                if in_ci { "CI job token" } else { "configured user" }
            );
            Ok(())
        }))
    }

    fn after_step(&self, _ctx: &Context, step: Step) -> Option<Hook> {
        if step != Step::Build {
            return None;
        }
        let image = self.image.as_ref().map(|image| image.id.clone());
        Some(Box::new(move || {
            if let Some(id) = image {
                debug!("Image ready for tagging: {}", id);
            }
            Ok(())
        }))
    }
}
