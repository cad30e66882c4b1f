// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Run command - execute a pipeline

use miette::Result;
use std::sync::Arc;
use tracing::warn;

use super::RunArgs;
use crate::config::{Config, ConfigFile};
use crate::context::Context;
use crate::engine::DockerEngine;
use crate::env::{EnvView, ProcessEnv};
use crate::errors::{PipelineError, RecoverySuggestion};
use crate::git::{Protocol, RepoTable};
use crate::pipeline::{LifecycleDriver, Registry, RunPlan};
use crate::pipelines::{register_builtin, PipelineDeps};
use crate::utils::{print_error, print_info, print_warning};

/// Run the named pipeline
pub async fn run(mut args: RunArgs, verbose: bool) -> Result<()> {
    let name = std::mem::take(&mut args.pipeline);
    let repo = args.repo.take();
    let config_path = args.config.take();
    let insecure = args.insecure_git;

    // File first so flags override it
    let mut options = Vec::new();
    if let Some(path) = &config_path {
        options.extend(ConfigFile::from_file(path)?.into_options());
    }
    options.extend(args.into_options(verbose));
    let mut config = Config::build(options);

    if let Some(repo) = repo {
        let protocol = Protocol::select(&config.git_protocol);
        let table = RepoTable::builtin();
        let url = table.url(&repo, protocol.as_str()).ok_or_else(|| {
            miette::miette!(
                "Unknown repository: {}\n\nKnown repositories: {}",
                repo,
                table.names().collect::<Vec<_>>().join(", ")
            )
        })?;
        config.git_repo = url.to_string();
    }
    let config = Arc::new(config);

    let working_dir = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;

    let env: Arc<dyn EnvView> = Arc::new(ProcessEnv);
    let mut registry = Registry::new();
    register_builtin(
        &mut registry,
        PipelineDeps::new(env, &working_dir).with_tls_verify(!insecure),
    );

    // Unknown names are reported before docker is required
    if !registry.contains(&name) {
        let error = PipelineError::NotFound {
            name,
            available: registry.list().join(", "),
        };
        report_failure(&error);
        return Err(error.into());
    }

    if insecure {
        print_warning("TLS certificate verification is disabled for HTTPS clones");
    }

    let engine = DockerEngine::connect().map_err(|e| {
        miette::miette!(
            "Failed to start the container engine: {}\n\n\
             Install docker and make sure the daemon is running.",
            e
        )
    })?;
    if verbose {
        match engine.version().await {
            Ok(version) => print_info(&format!(
                "docker {} ({})",
                version,
                engine.binary().display()
            )),
            Err(e) => print_warning(&format!("docker daemon did not answer: {}", e)),
        }
    }

    let mut pipeline = registry.get(&name, Arc::new(engine), config.clone())?;

    let ctx = Context::new();
    let token = ctx.token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the running step");
            token.cancel();
        }
    });

    let driver = LifecycleDriver::new(RunPlan::from_config(&config)).with_progress(true);
    match driver.run(&ctx, pipeline.as_mut()).await {
        Ok(report) => {
            if !report.skipped.is_empty() {
                let skipped: Vec<&str> = report.skipped.iter().map(|s| s.as_str()).collect();
                print_info(&format!(
                    "{} does not implement: {}",
                    report.pipeline,
                    skipped.join(", ")
                ));
            }
            Ok(())
        }
        Err(e) => {
            report_failure(&e);
            Err(miette::miette!("Pipeline '{}' failed", name))
        }
    }
}

/// Print the failure line and, when one applies, how to recover
fn report_failure(error: &PipelineError) {
    eprintln!();
    match error {
        PipelineError::StepFailed { step, source } => {
            print_error(&format!("step {} failed: {}", step, source.kind()));
            eprintln!("    {}", source);
        }
        other => print_error(&other.to_string()),
    }

    if let Some(suggestion) = RecoverySuggestion::for_error(error) {
        eprintln!();
        eprint!("{}", suggestion);
    }
}
