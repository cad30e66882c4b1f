// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Built-in pipelines
//!
//! - `go-kit`: Go library. Setup (checkout plus coverage gate), Build, Test
//!   and Tag.
//! - `docker-go`: Go service shipped as a container image. Everything but Package.
//! - `syntegrity-infra`: infrastructure repository. Setup clones and gates
//!   coverage in one go; Build, Test and Package do nothing.

mod common;
mod docker_go;
mod go_kit;
mod gotest;
mod infra;
mod tag;

pub use common::{SourceTree, HOST_EXCLUDES};
pub use docker_go::DockerGoPipeline;
pub use go_kit::GoKitPipeline;
pub use gotest::{parse_total_coverage, GoTestRunner, DEFAULT_GO_VERSION};
pub use infra::InfraPipeline;
pub use tag::{generate_tag, write_tag_file, TagSource, TAG_FILE};

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::env::EnvView;
use crate::git::{CloneStrategy, Cloner, HttpsCloner};
use crate::pipeline::{Pipeline, Registry};

pub const GO_KIT: &str = "go-kit";
pub const DOCKER_GO: &str = "docker-go";
pub const INFRA: &str = "syntegrity-infra";

/// Host-side dependencies handed to the built-in pipelines
#[derive(Clone)]
pub struct PipelineDeps {
    pub env: Arc<dyn EnvView>,
    /// Host directory used as the working tree when no repository is
    /// configured, and where `.tag_name` is written
    pub workdir: PathBuf,
    /// Verify TLS certificates on HTTPS clones
    pub tls_verify: bool,
}

impl PipelineDeps {
    pub fn new(env: Arc<dyn EnvView>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            env,
            workdir: workdir.into(),
            tls_verify: true,
        }
    }

    pub fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Clone strategy for `config`, or `None` when no repository is set
    pub fn cloner(&self, config: &Config) -> Option<Arc<dyn CloneStrategy>> {
        if config.git_repo.trim().is_empty() {
            return None;
        }

        let https = HttpsCloner::new(self.env.clone()).with_tls_verify(self.tls_verify);
        let cloner = Cloner::new(self.env.clone(), &config.git_protocol).with_https(https);
        Some(Arc::new(cloner))
    }
}

/// Register `go-kit`, `docker-go` and `syntegrity-infra`
pub fn register_builtin(registry: &mut Registry, deps: PipelineDeps) {
    let d = deps.clone();
    registry.register(GO_KIT, move |engine, config| {
        let tree = SourceTree::new(config.clone(), d.cloner(&config), &d.workdir);
        Box::new(GoKitPipeline::new(engine, config, d.env.clone(), tree)) as Box<dyn Pipeline>
    });

    let d = deps.clone();
    registry.register(DOCKER_GO, move |engine, config| {
        let tree = SourceTree::new(config.clone(), d.cloner(&config), &d.workdir);
        Box::new(DockerGoPipeline::new(engine, config, d.env.clone(), tree)) as Box<dyn Pipeline>
    });

    registry.register(INFRA, move |engine, config| {
        let tree = SourceTree::new(config.clone(), deps.cloner(&config), &deps.workdir);
        Box::new(InfraPipeline::new(engine, config, tree)) as Box<dyn Pipeline>
    });
}
