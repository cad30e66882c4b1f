// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Terminal color utilities
//!
//! Provides consistent color schemes across the CLI.

use colored::Colorize;

use crate::env::EnvView;

/// Style for emphasized/bold text
pub fn bold(msg: &str) -> colored::ColoredString {
    msg.bold()
}

/// Style for code/commands
pub fn code(msg: &str) -> colored::ColoredString {
    msg.cyan()
}

/// Colors are off when `NO_COLOR` is set or no terminal is attached
pub fn should_use_colors(env: &dyn EnvView) -> bool {
    if env.var("NO_COLOR").is_some() {
        return false;
    }

    env.var("TERM").is_some_and(|term| term != "dumb")
}

/// Print a styled header
pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "═".repeat(title.len().max(40)));
}

/// Print a bullet point
pub fn print_bullet(content: &str) {
    println!("  • {}", content);
}

/// Print a success check
pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

/// Print an error cross
pub fn print_error(msg: &str) {
    eprintln!("  {} {}", "✗".red(), msg);
}

/// Print a warning
pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠".yellow(), msg);
}

/// Print an info item
pub fn print_info(msg: &str) {
    println!("  {} {}", "→".blue(), msg);
}
