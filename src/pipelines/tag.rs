// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Tag generation
//!
//! The tag is `TAG_NAME` when set, otherwise `v-<short sha>` of the working
//! tree's HEAD. Either way it is written to `.tag_name` in the host directory
//! for later jobs.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::context::Context;
use crate::engine::{Container, Directory, Engine};
use crate::env::{self, EnvView};
use crate::errors::{PipelineError, PipelineResult};
use crate::git::GIT_BASE_IMAGE;

/// File the generated tag is persisted to
pub const TAG_FILE: &str = ".tag_name";

/// Tree whose HEAD names the release
#[derive(Debug, Clone, Copy)]
pub enum TagSource<'a> {
    /// A directory already held by the engine, such as a fresh clone
    Tree(&'a Directory),
    /// A host checkout, mounted with its `.git` only when the sha is needed
    Host(&'a Path),
}

/// Resolve the tag for `source` and write it to `out_dir/.tag_name`
pub async fn generate_tag(
    ctx: &Context,
    engine: &dyn Engine,
    env: &dyn EnvView,
    source: TagSource<'_>,
    out_dir: &Path,
) -> PipelineResult<String> {
    let tag = match env.non_empty(env::TAG_NAME) {
        Some(tag) => tag,
        None => format!("v-{}", short_head(ctx, engine, source).await?),
    };

    write_tag_file(out_dir, &tag).await?;
    info!("Generated tag {}", tag);
    Ok(tag)
}

/// `git rev-parse --short HEAD` run against `source`
async fn short_head(ctx: &Context, engine: &dyn Engine, source: TagSource<'_>) -> PipelineResult<String> {
    let source = match source {
        TagSource::Tree(dir) => dir.clone(),
        TagSource::Host(path) => ctx.guard(engine.host_directory(path, &[])).await?,
    };
    let container = Container::new(GIT_BASE_IMAGE)
        .with_exec(&["apk", "add", "--no-cache", "git"])
        .with_directory("/src", &source)
        .with_workdir("/src")
        .with_exec(&["git", "config", "--global", "--add", "safe.directory", "/src"])
        .with_exec(&["git", "rev-parse", "--short", "HEAD"]);

    let sha = ctx.guard(engine.stdout(&container)).await?.trim().to_string();
    if sha.is_empty() {
        return Err(PipelineError::ParseError {
            reason: "git rev-parse returned no commit".to_string(),
        });
    }
    Ok(sha)
}

/// Write `tag` to `dir/.tag_name` with mode 0644
pub async fn write_tag_file(dir: &Path, tag: &str) -> PipelineResult<PathBuf> {
    let path = dir.join(TAG_FILE);
    let write_error = |e: std::io::Error| PipelineError::FileWriteError {
        path: path.clone(),
        error: e.to_string(),
    };

    tokio::fs::write(&path, tag).await.map_err(write_error)?;
    set_mode(&path).await.map_err(write_error)?;
    Ok(path)
}

#[cfg(unix)]
async fn set_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
