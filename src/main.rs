// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! syntegrity - CI Pipeline Orchestrator
//!
//! Build, test, tag and publish through a container engine.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use syntegrity_ci::cli::{Cli, Commands};
use syntegrity_ci::env::ProcessEnv;
use syntegrity_ci::utils::should_use_colors;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "syntegrity_ci=debug"
    } else {
        "syntegrity_ci=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    colored::control::set_override(should_use_colors(&ProcessEnv));

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Run(args) => syntegrity_ci::cli::run::run(args, cli.verbose).await,
        Commands::List { format } => syntegrity_ci::cli::list::run(format, cli.verbose).await,
        Commands::Repo { name, protocol } => {
            syntegrity_ci::cli::repo::run(name, protocol, cli.verbose).await
        }
        Commands::Tag => syntegrity_ci::cli::tag::run(cli.verbose).await,
    }
}
