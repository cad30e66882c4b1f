// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Lifecycle driver
//!
//! Runs the planned steps of one pipeline in lifecycle order, with hooks
//! around each step, and stops at the first failure.

use std::time::{Duration, Instant};

use colored::Colorize;
use serde::Serialize;
use tracing::{debug, warn};

use super::{Pipeline, Step};
use crate::config::Config;
use crate::context::Context;
use crate::errors::{PipelineError, PipelineResult};
use crate::utils::StepProgress;

/// Steps selected for a run, always in lifecycle order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    steps: Vec<Step>,
}

impl RunPlan {
    /// Every step
    pub fn all() -> Self {
        Self {
            steps: Step::ALL.to_vec(),
        }
    }

    /// Exactly `steps`, reordered into lifecycle order and deduplicated
    pub fn only(steps: &[Step]) -> Self {
        let mut steps = steps.to_vec();
        steps.sort();
        steps.dedup();
        Self { steps }
    }

    /// Plan implied by the run flags: `only_test` and `only_build` keep
    /// Setup plus their step, `skip_push` drops Push
    pub fn from_config(config: &Config) -> Self {
        let mut selected = match (config.only_test, config.only_build) {
            (true, true) => vec![Step::Setup, Step::Build, Step::Test],
            (true, false) => vec![Step::Setup, Step::Test],
            (false, true) => vec![Step::Setup, Step::Build],
            (false, false) => Step::ALL.to_vec(),
        };

        if config.skip_push {
            selected.retain(|step| *step != Step::Push);
        }

        Self::only(&selected)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn contains(&self, step: Step) -> bool {
        self.steps.contains(&step)
    }
}

impl Default for RunPlan {
    fn default() -> Self {
        Self::all()
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    pub completed: Vec<Step>,
    /// Steps the pipeline does not implement
    pub skipped: Vec<Step>,
    pub duration: Duration,
}

/// Runs a [`RunPlan`] against a pipeline
#[derive(Debug, Clone, Default)]
pub struct LifecycleDriver {
    plan: RunPlan,
    show_progress: bool,
}

impl LifecycleDriver {
    pub fn new(plan: RunPlan) -> Self {
        Self {
            plan,
            show_progress: false,
        }
    }

    /// Print per-step progress lines to the terminal
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// Run every planned step.
    ///
    /// `before_step` completes before the step starts; `after_step` runs once
    /// the step has finished, also when it failed. An `Unimplemented` step is
    /// recorded as skipped. Any other failure ends the run with `StepFailed`.
    pub async fn run(&self, ctx: &Context, pipeline: &mut dyn Pipeline) -> PipelineResult<RunReport> {
        let start = Instant::now();
        let name = pipeline.name().to_string();
        let mut progress = StepProgress::new(self.show_progress);
        let mut completed = Vec::new();
        let mut skipped = Vec::new();

        if self.show_progress {
            self.print_plan(&name);
        }

        for &step in self.plan.steps() {
            let step_start = Instant::now();
            progress.start(step);

            let outcome = self.run_one(ctx, pipeline, step).await;
            match outcome {
                Ok(()) => {
                    progress.complete(step, step_start.elapsed());
                    completed.push(step);
                }
                Err(PipelineError::Unimplemented { .. }) => {
                    warn!("Pipeline '{}' does not implement {}; skipping", name, step);
                    progress.skip(step);
                    skipped.push(step);
                }
                Err(e) => {
                    progress.fail(step, e.kind());
                    if self.show_progress {
                        println!();
                        println!(
                            "{}",
                            format!("Pipeline failed after {:.2}s", start.elapsed().as_secs_f64()).red()
                        );
                    }
                    return Err(PipelineError::StepFailed {
                        step: step.to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }

        let duration = start.elapsed();
        if self.show_progress {
            println!();
            println!(
                "{}",
                format!("Pipeline completed successfully in {:.2}s", duration.as_secs_f64()).green()
            );
        }

        Ok(RunReport {
            pipeline: name,
            completed,
            skipped,
            duration,
        })
    }

    async fn run_one(&self, ctx: &Context, pipeline: &mut dyn Pipeline, step: Step) -> PipelineResult<()> {
        ctx.check()?;

        if let Some(hook) = pipeline.before_step(ctx, step) {
            debug!("Running before-{} hook", step);
            hook()?;
        }

        let result = pipeline.run_step(ctx, step).await;

        if let Some(hook) = pipeline.after_step(ctx, step) {
            debug!("Running after-{} hook", step);
            let after = hook();
            if result.is_ok() {
                after?;
            } else if let Err(e) = after {
                warn!("after-{} hook failed: {}", step, e);
            }
        }

        result
    }

    fn print_plan(&self, name: &str) {
        let steps = self.plan.steps();
        println!();
        println!("{}: {}", "Pipeline".bold(), name);
        println!("{}", "═".repeat(50));
        println!(
            "Execution plan ({} step{}): {}",
            steps.len(),
            if steps.len() == 1 { "" } else { "s" },
            steps
                .iter()
                .map(Step::as_str)
                .collect::<Vec<_>>()
                .join(" → ")
        );
        println!();
    }
}
