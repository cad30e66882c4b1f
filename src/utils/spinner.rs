// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Progress indicators
//!
//! Spinners for single long-running engine calls and per-step status lines
//! for lifecycle runs.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::pipeline::Step;

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.blue} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Status lines for lifecycle steps
///
/// Disabled instances only count; nothing is printed.
#[derive(Debug)]
pub struct StepProgress {
    enabled: bool,
    finished: usize,
}

impl StepProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            finished: 0,
        }
    }

    pub fn start(&mut self, step: Step) {
        if self.enabled {
            println!("  {} {}...", "→".blue(), step);
        }
    }

    pub fn complete(&mut self, step: Step, elapsed: Duration) {
        if self.enabled {
            println!(
                "\x1b[1A\x1b[2K  {} {} ({:.2}s)",
                "✓".green(),
                step.as_str().bold(),
                elapsed.as_secs_f64()
            );
        }
        self.finished += 1;
    }

    pub fn fail(&mut self, step: Step, kind: &str) {
        if self.enabled {
            println!(
                "\x1b[1A\x1b[2K  {} {} - {}",
                "✗".red(),
                step.as_str().bold(),
                kind.dimmed()
            );
        }
        self.finished += 1;
    }

    pub fn skip(&mut self, step: Step) {
        if self.enabled {
            println!(
                "\x1b[1A\x1b[2K  {} {} (not implemented)",
                "○".dimmed(),
                step.as_str().dimmed()
            );
        }
        self.finished += 1;
    }

    /// Steps that reached a final state
    pub fn finished(&self) -> usize {
        self.finished
    }
}
