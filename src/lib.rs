// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! # syntegrity - CI Pipeline Orchestrator
//!
//! `syntegrity` runs build pipelines for Go libraries, Go services and
//! infrastructure repositories through a container engine.
//!
//! ## Features
//!
//! - **Fixed lifecycle** - Setup, Build, Test, Package, Tag, Push, with hooks
//! - **Repository cloning** - HTTPS with token credentials and retries, or SSH
//! - **Coverage gate** - Fail the run below a minimum total coverage
//! - **Image publishing** - Build, tag and push container images
//!
//! ## Quick Start
//!
//! ```bash
//! # Show the registered pipelines
//! syntegrity list
//!
//! # Clone go-kit and run its pipeline
//! syntegrity run go-kit --repo go-kit --coverage 80
//!
//! # Build and tag an image without publishing it
//! syntegrity run docker-go --skip-push --image-tag 1.2.3
//! ```
//!
//! ## Library use
//!
//! ```no_run
//! use std::sync::Arc;
//! use syntegrity_ci::config::{with_coverage, Config};
//! use syntegrity_ci::engine::DockerEngine;
//! use syntegrity_ci::env::ProcessEnv;
//! use syntegrity_ci::pipeline::{LifecycleDriver, Registry, RunPlan};
//! use syntegrity_ci::pipelines::{register_builtin, PipelineDeps};
//! use syntegrity_ci::Context;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = Registry::new();
//! register_builtin(&mut registry, PipelineDeps::new(Arc::new(ProcessEnv), "."));
//!
//! let config = Arc::new(Config::build([with_coverage(80.0)]));
//! let mut pipeline = registry.get("go-kit", Arc::new(DockerEngine::connect()?), config.clone())?;
//!
//! let report = LifecycleDriver::new(RunPlan::from_config(&config))
//!     .run(&Context::new(), pipeline.as_mut())
//!     .await?;
//! println!("completed {:?}", report.completed);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod env;
pub mod errors;
pub mod git;
pub mod pipeline;
pub mod pipelines;
pub mod utils;

// Re-export commonly used types
pub use config::{Config, ConfigOption};
pub use context::Context;
pub use engine::Engine;
pub use errors::{PipelineError, PipelineResult};
pub use pipeline::{LifecycleDriver, Pipeline, Registry, Step};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
