// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Repo command - look up a known repository URL

use miette::Result;

use crate::git::{get_repo_url, RepoTable};
use crate::utils::code;

pub async fn run(name: String, protocol: String, verbose: bool) -> Result<()> {
    match get_repo_url(&name, &protocol) {
        Some(url) if verbose => println!("{} ({}): {}", name, protocol, code(url)),
        Some(url) => println!("{}", url),
        None => {
            return Err(miette::miette!(
                "Unknown repository: {}\n\nKnown repositories: {}",
                name,
                RepoTable::builtin().names().collect::<Vec<_>>().join(", ")
            ))
        }
    }

    Ok(())
}
