// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Container engine capability
//!
//! Pipelines never talk to a container runtime directly. They describe
//! containers as immutable [`Container`] values and hand them to an
//! [`Engine`], which evaluates them. [`DockerEngine`] is the production
//! binding; [`MemoryEngine`] is an in-memory stand-in for tests.

mod docker;
mod memory;

pub use docker::DockerEngine;
pub use memory::MemoryEngine;

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::EngineResult;

/// Directory handle owned by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    /// Location the engine resolves the directory from
    pub path: PathBuf,
    /// Glob patterns excluded from the directory
    pub exclude: Vec<String>,
}

impl Directory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            exclude: vec![],
        }
    }

    pub fn with_exclude(mut self, exclude: &[&str]) -> Self {
        self.exclude = exclude.iter().map(|p| p.to_string()).collect();
        self
    }
}

/// Named persistent volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVolume {
    pub name: String,
}

/// Opaque reference to a value held in the engine's secret store
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    name: String,
}

impl Secret {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", self.name)
    }
}

/// Username and secret used when publishing an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    pub username: String,
    pub secret: Secret,
}

/// Built image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Engine specific image identifier
    pub id: String,
    pub auth: Option<RegistryAuth>,
}

impl Image {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            auth: None,
        }
    }

    /// Attach registry credentials used by `publish`
    pub fn with_registry_auth(mut self, username: impl Into<String>, secret: Secret) -> Self {
        self.auth = Some(RegistryAuth {
            username: username.into(),
            secret,
        });
        self
    }
}

/// A single transformation recorded on a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerOp {
    Env {
        key: String,
        value: String,
    },
    Workdir(String),
    MountDirectory {
        path: String,
        source: Directory,
    },
    MountCache {
        path: String,
        cache: CacheVolume,
    },
    SecretFile {
        path: String,
        secret: Secret,
        permissions: u32,
    },
    Exec {
        args: Vec<String>,
        redirect_stdout: Option<String>,
    },
}

/// Immutable container description
///
/// Every `with_*` call returns a new container with one more operation
/// appended; nothing runs until an [`Engine`] evaluates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    image: String,
    ops: Vec<ContainerOp>,
}

impl Container {
    /// Start from a base image
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ops: vec![],
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn ops(&self) -> &[ContainerOp] {
        &self.ops
    }

    fn push(mut self, op: ContainerOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn with_env(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(ContainerOp::Env {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn with_workdir(self, path: impl Into<String>) -> Self {
        self.push(ContainerOp::Workdir(path.into()))
    }

    pub fn with_directory(self, path: impl Into<String>, source: &Directory) -> Self {
        self.push(ContainerOp::MountDirectory {
            path: path.into(),
            source: source.clone(),
        })
    }

    pub fn with_cache(self, path: impl Into<String>, cache: &CacheVolume) -> Self {
        self.push(ContainerOp::MountCache {
            path: path.into(),
            cache: cache.clone(),
        })
    }

    /// Materialize a registered secret as a file
    pub fn with_secret_file(self, path: impl Into<String>, secret: &Secret, permissions: u32) -> Self {
        self.push(ContainerOp::SecretFile {
            path: path.into(),
            secret: secret.clone(),
            permissions,
        })
    }

    pub fn with_exec<S: AsRef<str>>(self, args: &[S]) -> Self {
        self.push(ContainerOp::Exec {
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            redirect_stdout: None,
        })
    }

    /// Execute and write stdout to a file inside the container
    pub fn with_exec_redirect<S: AsRef<str>>(self, args: &[S], stdout_path: impl Into<String>) -> Self {
        self.push(ContainerOp::Exec {
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            redirect_stdout: Some(stdout_path.into()),
        })
    }

    /// Arguments of every recorded exec, in order
    pub fn execs(&self) -> Vec<&[String]> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                ContainerOp::Exec { args, .. } => Some(args.as_slice()),
                _ => None,
            })
            .collect()
    }
}

/// Operations the pipelines need from a container engine
#[async_trait]
pub trait Engine: Send + Sync {
    /// Directory handle for a host path, minus paths matching `exclude`
    async fn host_directory(&self, path: &Path, exclude: &[&str]) -> EngineResult<Directory>;

    /// Top level entry names of a directory
    async fn entries(&self, dir: &Directory) -> EngineResult<Vec<String>>;

    /// Evaluate the container and return the stdout of its last exec
    async fn stdout(&self, container: &Container) -> EngineResult<String>;

    /// Evaluate the container and return a directory from inside it
    async fn directory(&self, container: &Container, path: &str) -> EngineResult<Directory>;

    /// Evaluate the container and read a file from inside it
    async fn file_contents(&self, container: &Container, path: &str) -> EngineResult<String>;

    /// Build an image from a directory holding a Dockerfile
    async fn build_image(&self, context: &Directory) -> EngineResult<Image>;

    /// Store a secret and return its handle
    async fn set_secret(&self, name: &str, value: &str) -> EngineResult<Secret>;

    /// Allocate or look up a named cache volume
    async fn cache_volume(&self, name: &str) -> EngineResult<CacheVolume>;

    /// Publish an image under `address`, returning the published reference
    async fn publish(&self, image: &Image, address: &str) -> EngineResult<String>;
}
