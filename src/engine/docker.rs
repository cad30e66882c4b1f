// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Docker engine binding
//!
//! Evaluates [`Container`] values with the `docker` CLI:
//! - each evaluation is one `docker run --rm` with a generated `sh` script
//! - cache volumes become named volumes (`syntegrity-<name>`)
//! - secrets are staged in a private scratch directory (mode 0600)
//!   and copied into place by the script
//! - directories are exported through a bind-mounted scratch directory

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{CacheVolume, Container, ContainerOp, Directory, Engine, Image, Secret};
use crate::errors::{EngineError, EngineResult};

const STAGING_MOUNT: &str = "/.syntegrity/staged";
const EXPORT_MOUNT: &str = "/.syntegrity/export";

/// Production engine backed by the docker CLI
pub struct DockerEngine {
    /// Path to the docker binary
    docker_bin: PathBuf,
    /// Staged files, secrets and exported directories
    scratch: TempDir,
    secrets: Mutex<HashMap<String, String>>,
    counter: AtomicU64,
}

/// Arguments and script for one `docker run`
struct RunPlan {
    args: Vec<String>,
    script: Vec<String>,
}

impl DockerEngine {
    /// Locate docker and prepare a scratch directory
    pub fn connect() -> EngineResult<Self> {
        let docker_bin = which::which("docker")
            .map_err(|_| EngineError::new("connect", "docker not found in PATH"))?;
        let scratch = tempfile::Builder::new()
            .prefix("syntegrity-")
            .tempdir()
            .map_err(|e| EngineError::new("connect", e.to_string()))?;

        info!("Using docker at {}", docker_bin.display());

        Ok(Self {
            docker_bin,
            scratch,
            secrets: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        })
    }

    /// The underlying docker binary, for callers that need the raw runtime
    pub fn binary(&self) -> &Path {
        &self.docker_bin
    }

    /// Check that the docker daemon answers
    pub async fn version(&self) -> EngineResult<String> {
        let output = self
            .docker(&["version", "--format", "{{.Server.Version}}"], None)
            .await?;
        Ok(output.trim().to_string())
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    fn secret_value(&self, name: &str) -> EngineResult<String> {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::new("secret", format!("unknown secret '{}'", name)))
    }

    /// Run docker with `args`, optionally feeding `stdin`, returning stdout
    async fn docker(&self, args: &[&str], stdin: Option<&str>) -> EngineResult<String> {
        let operation = args.first().copied().unwrap_or("docker").to_string();

        let mut cmd = Command::new(&self.docker_bin);
        cmd.args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::new(&operation, e.to_string()))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .await
                .map_err(|e| EngineError::new(&operation, e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| EngineError::new(&operation, e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stderr.trim().is_empty() {
            debug!("docker {} stderr: {}", operation, stderr.trim());
        }

        if output.status.success() {
            Ok(stdout)
        } else {
            let exit_code = output.status.code().unwrap_or(-1);
            Err(EngineError::new(
                operation,
                format!("exit code {}: {}", exit_code, stderr.trim()),
            ))
        }
    }

    /// Write `contents` into the scratch directory with mode 0600
    fn stage(&self, contents: &str) -> EngineResult<(PathBuf, String)> {
        let staged_dir = self.scratch.path().join("staged");
        std::fs::create_dir_all(&staged_dir)
            .map_err(|e| EngineError::new("stage", e.to_string()))?;

        let name = format!("file-{}", self.next_id());
        let path = staged_dir.join(&name);
        std::fs::write(&path, contents).map_err(|e| EngineError::new("stage", e.to_string()))?;
        restrict_permissions(&path)?;

        Ok((staged_dir, format!("{}/{}", STAGING_MOUNT, name)))
    }

    /// Host path to bind mount for `dir`, copying when excludes apply
    fn mount_source(&self, dir: &Directory) -> EngineResult<PathBuf> {
        if dir.exclude.is_empty() {
            return Ok(dir.path.clone());
        }

        let patterns = compile_patterns(&dir.exclude)?;
        let target = self
            .scratch
            .path()
            .join(format!("context-{}", self.next_id()));
        copy_filtered(&dir.path, &dir.path, &target, &patterns)
            .map_err(|e| EngineError::new("mount", e.to_string()))?;
        Ok(target)
    }

    /// Translate a container into docker arguments and a shell script.
    /// With `final_stdout` unset every exec writes to stderr.
    fn plan(&self, container: &Container, final_stdout: bool) -> EngineResult<RunPlan> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--entrypoint".into(),
            "/bin/sh".into(),
        ];
        let mut script = vec!["set -e".to_string()];
        let mut staged_mounted = false;

        let execs = container.execs().len();
        let mut seen_execs = 0;

        for op in container.ops() {
            match op {
                ContainerOp::Env { key, value } => {
                    script.push(format!("export {}={}", key, quote(value)));
                }
                ContainerOp::Workdir(path) => {
                    script.push(format!("mkdir -p {0} && cd {0}", quote(path)));
                }
                ContainerOp::MountDirectory { path, source } => {
                    let host = self.mount_source(source)?;
                    args.push("-v".into());
                    args.push(format!("{}:{}", host.display(), path));
                }
                ContainerOp::MountCache { path, cache } => {
                    args.push("-v".into());
                    args.push(format!("syntegrity-{}:{}", cache.name, path));
                }
                ContainerOp::SecretFile {
                    path,
                    secret,
                    permissions,
                } => {
                    let value = self.secret_value(secret.name())?;
                    let (dir, staged) = self.stage(&value)?;
                    if !staged_mounted {
                        args.push("-v".into());
                        args.push(format!("{}:{}:ro", dir.display(), STAGING_MOUNT));
                        staged_mounted = true;
                    }
                    script.push(install_file(&staged, path, *permissions));
                }
                ContainerOp::Exec {
                    args: exec,
                    redirect_stdout,
                } => {
                    seen_execs += 1;
                    let line = exec.iter().map(|a| quote(a)).collect::<Vec<_>>().join(" ");
                    let line = match redirect_stdout {
                        Some(target) => format!("{} > {}", line, quote(target)),
                        // Only the final exec writes to stdout
                        None if seen_execs < execs || !final_stdout => format!("{} 1>&2", line),
                        None => line,
                    };
                    script.push(line);
                }
            }
        }

        Ok(RunPlan { args, script })
    }

    async fn evaluate(&self, container: &Container, mut plan: RunPlan) -> EngineResult<String> {
        plan.args.push(container.image().to_string());
        plan.args.push("-c".into());
        plan.args.push(plan.script.join("\n"));

        debug!(
            "Evaluating container from {} ({} ops)",
            container.image(),
            container.ops().len()
        );

        let args: Vec<&str> = plan.args.iter().map(String::as_str).collect();
        self.docker(&args, None).await
    }
}

#[async_trait]
impl Engine for DockerEngine {
    async fn host_directory(&self, path: &Path, exclude: &[&str]) -> EngineResult<Directory> {
        let path = path
            .canonicalize()
            .map_err(|e| EngineError::new("host", format!("{}: {}", path.display(), e)))?;
        Ok(Directory::new(path).with_exclude(exclude))
    }

    async fn entries(&self, dir: &Directory) -> EngineResult<Vec<String>> {
        let patterns = compile_patterns(&dir.exclude)?;
        let mut names = Vec::new();

        let mut read = tokio::fs::read_dir(&dir.path)
            .await
            .map_err(|e| EngineError::new("entries", e.to_string()))?;
        while let Some(entry) = read
            .next_entry()
            .await
            .map_err(|e| EngineError::new("entries", e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_excluded(Path::new(&name), &patterns) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    async fn stdout(&self, container: &Container) -> EngineResult<String> {
        let plan = self.plan(container, true)?;
        self.evaluate(container, plan).await
    }

    async fn directory(&self, container: &Container, path: &str) -> EngineResult<Directory> {
        let export = self
            .scratch
            .path()
            .join(format!("export-{}", self.next_id()));
        std::fs::create_dir_all(&export).map_err(|e| EngineError::new("export", e.to_string()))?;

        let mut plan = self.plan(container, false)?;
        plan.args.push("-v".into());
        plan.args.push(format!("{}:{}", export.display(), EXPORT_MOUNT));
        plan.script
            .push(format!("cp -a {}/. {}/", quote(path), EXPORT_MOUNT));

        self.evaluate(container, plan).await?;
        Ok(Directory::new(export))
    }

    async fn file_contents(&self, container: &Container, path: &str) -> EngineResult<String> {
        let mut plan = self.plan(container, false)?;
        plan.script.push(format!("cat {}", quote(path)));
        self.evaluate(container, plan).await
    }

    async fn build_image(&self, context: &Directory) -> EngineResult<Image> {
        let source = self.mount_source(context)?;
        let source = source.to_string_lossy().to_string();
        let id = self.docker(&["build", "--quiet", &source], None).await?;
        let id = id.trim().to_string();

        info!("Built image {}", id);
        Ok(Image::new(id))
    }

    async fn set_secret(&self, name: &str, value: &str) -> EngineResult<Secret> {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());
        Ok(Secret::new(name))
    }

    async fn cache_volume(&self, name: &str) -> EngineResult<CacheVolume> {
        let volume = format!("syntegrity-{}", name);
        self.docker(&["volume", "create", &volume], None).await?;
        Ok(CacheVolume {
            name: name.to_string(),
        })
    }

    async fn publish(&self, image: &Image, address: &str) -> EngineResult<String> {
        if let Some(ref auth) = image.auth {
            let password = self.secret_value(auth.secret.name())?;
            let host = registry_host(address);
            self.docker(
                &["login", host, "--username", &auth.username, "--password-stdin"],
                Some(&password),
            )
            .await?;
        }

        self.docker(&["tag", &image.id, address], None).await?;
        self.docker(&["push", address], None).await?;

        info!("Published {}", address);
        Ok(address.to_string())
    }
}

/// Registry host part of an image reference
fn registry_host(address: &str) -> &str {
    address.split('/').next().unwrap_or(address)
}

/// Single-quote a value for `sh`
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn install_file(staged: &str, path: &str, permissions: u32) -> String {
    format!(
        "mkdir -p \"$(dirname {1})\" && cp {0} {1} && chmod {2:o} {1}",
        quote(staged),
        quote(path),
        permissions
    )
}

fn compile_patterns(patterns: &[String]) -> EngineResult<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| EngineError::new("exclude", format!("{}: {}", p, e)))
        })
        .collect()
}

/// Whether a path relative to the directory root matches any exclude
fn is_excluded(relative: &Path, patterns: &[glob::Pattern]) -> bool {
    patterns.iter().any(|p| {
        p.matches_path(relative)
            || relative
                .components()
                .next()
                .map(|first| p.matches(&first.as_os_str().to_string_lossy()))
                .unwrap_or(false)
    })
}

fn copy_filtered(
    root: &Path,
    from: &Path,
    to: &Path,
    patterns: &[glob::Pattern],
) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;

    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(&path);

        if is_excluded(relative, patterns) {
            continue;
        }

        let target = to.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_filtered(root, &path, &target, patterns)?;
        } else if file_type.is_file() {
            std::fs::copy(&path, &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> EngineResult<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| EngineError::new("stage", e.to_string()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> EngineResult<()> {
    Ok(())
}
