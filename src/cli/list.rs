// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! List command - show registered pipelines

use miette::{IntoDiagnostic, Result};
use std::sync::Arc;

use super::OutputFormat;
use crate::env::ProcessEnv;
use crate::pipeline::Registry;
use crate::pipelines::{register_builtin, PipelineDeps};
use crate::utils::{bold, print_bullet, print_header};

/// Print the registered pipeline names
pub async fn run(format: OutputFormat, _verbose: bool) -> Result<()> {
    let mut registry = Registry::new();
    register_builtin(&mut registry, PipelineDeps::new(Arc::new(ProcessEnv), "."));
    let names = registry.list();

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&names).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            print_header("Pipelines");
            for name in &names {
                print_bullet(&bold(name).to_string());
            }
        }
    }

    Ok(())
}
