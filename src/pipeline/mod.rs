// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Pipeline lifecycle
//!
//! Every pipeline exposes the same six steps, run strictly in the order
//! Setup, Build, Test, Package, Tag, Push. Callers may stop early or skip
//! steps but never interleave them. Optional hooks run around each step.

mod driver;
mod registry;

pub use driver::{LifecycleDriver, RunPlan, RunReport};
pub use registry::{PipelineFactory, Registry};

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::context::Context;
use crate::errors::{PipelineError, PipelineResult};

/// Lifecycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Step {
    Setup,
    Build,
    Test,
    Package,
    Tag,
    Push,
}

impl Step {
    /// All steps in execution order
    pub const ALL: [Step; 6] = [
        Step::Setup,
        Step::Build,
        Step::Test,
        Step::Package,
        Step::Tag,
        Step::Push,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Setup => "Setup",
            Step::Build => "Build",
            Step::Test => "Test",
            Step::Package => "Package",
            Step::Tag => "Tag",
            Step::Push => "Push",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PipelineError::ParseError {
                reason: format!("unknown step '{}'", s),
            })
    }
}

/// Callable run before or after a step
pub type Hook = Box<dyn FnOnce() -> PipelineResult<()> + Send>;

/// The lifecycle contract every pipeline implements
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Stable identifier
    fn name(&self) -> &str;

    /// Prepare working state; idempotent within a run
    async fn setup(&mut self, ctx: &Context) -> PipelineResult<()>;

    /// Produce the primary artifact
    async fn build(&mut self, ctx: &Context) -> PipelineResult<()>;

    /// Run tests and enforce quality gates
    async fn test(&mut self, ctx: &Context) -> PipelineResult<()>;

    async fn package(&mut self, ctx: &Context) -> PipelineResult<()>;

    /// Assign the final identifier to the artifact
    async fn tag(&mut self, ctx: &Context) -> PipelineResult<()>;

    /// Publish the tagged artifact
    async fn push(&mut self, ctx: &Context) -> PipelineResult<()>;

    fn before_step(&self, _ctx: &Context, _step: Step) -> Option<Hook> {
        None
    }

    fn after_step(&self, _ctx: &Context, _step: Step) -> Option<Hook> {
        None
    }

    /// Run one step by name
    async fn run_step(&mut self, ctx: &Context, step: Step) -> PipelineResult<()> {
        match step {
            Step::Setup => self.setup(ctx).await,
            Step::Build => self.build(ctx).await,
            Step::Test => self.test(ctx).await,
            Step::Package => self.package(ctx).await,
            Step::Tag => self.tag(ctx).await,
            Step::Push => self.push(ctx).await,
        }
    }
}
