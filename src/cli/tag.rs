// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Tag command - generate the release tag for the current directory

use miette::Result;

use crate::context::Context;
use crate::engine::DockerEngine;
use crate::env::{self, EnvView, ProcessEnv};
use crate::pipelines::{generate_tag, write_tag_file, TagSource, TAG_FILE};
use crate::utils::{create_spinner, print_success};

pub async fn run(verbose: bool) -> Result<()> {
    let working_dir = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
    let env = ProcessEnv;

    // Only the short sha needs the engine
    let tag = match env.non_empty(env::TAG_NAME) {
        Some(tag) => {
            write_tag_file(&working_dir, &tag).await?;
            tag
        }
        None => {
            let engine = DockerEngine::connect().map_err(|e| {
                miette::miette!(
                    "Failed to start the container engine: {}\n\n\
                     Set TAG_NAME or install docker to derive the tag from HEAD.",
                    e
                )
            })?;

            let spinner = create_spinner("Reading HEAD...");
            let source = TagSource::Host(&working_dir);
            let result = generate_tag(&Context::new(), &engine, &env, source, &working_dir).await;
            spinner.finish_and_clear();
            result?
        }
    };

    print_success(&format!("{} written to {}", tag, TAG_FILE));
    if verbose {
        println!("{}", working_dir.join(TAG_FILE).display());
    }

    Ok(())
}
