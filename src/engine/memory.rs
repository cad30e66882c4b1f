// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! In-memory engine
//!
//! Records every evaluated container, secret and publish, and replays
//! scripted results. Nothing is executed.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CacheVolume, Container, Directory, Engine, Image, Secret};
use crate::errors::{EngineError, EngineResult};

#[derive(Default)]
struct MemoryState {
    entries: HashMap<PathBuf, Vec<String>>,
    stdout: VecDeque<EngineResult<String>>,
    directories: VecDeque<EngineResult<Directory>>,
    files: HashMap<String, String>,
    secrets: HashMap<String, String>,
    caches: Vec<String>,
    evaluated: Vec<Container>,
    built: Vec<Directory>,
    published: Vec<(String, Image)>,
    publish_failure: Option<String>,
}

/// Engine stand-in for tests
#[derive(Default)]
pub struct MemoryEngine {
    state: Mutex<MemoryState>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entries reported for a directory path
    pub fn with_entries<S: AsRef<str>>(self, path: impl Into<PathBuf>, entries: &[S]) -> Self {
        self.state().entries.insert(
            path.into(),
            entries.iter().map(|e| e.as_ref().to_string()).collect(),
        );
        self
    }

    /// Contents returned by `file_contents` for `path`
    pub fn with_file(self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.state().files.insert(path.into(), contents.into());
        self
    }

    /// Queue the next `stdout` result; an empty queue yields `Ok("")`
    pub fn push_stdout(&self, result: EngineResult<String>) {
        self.state().stdout.push_back(result);
    }

    /// Queue the next `directory` result; an empty queue echoes the path
    pub fn push_directory(&self, result: EngineResult<Directory>) {
        self.state().directories.push_back(result);
    }

    /// Make every `publish` fail with `message`
    pub fn fail_publish(&self, message: impl Into<String>) {
        self.state().publish_failure = Some(message.into());
    }

    /// Containers evaluated so far, in order
    pub fn evaluated(&self) -> Vec<Container> {
        self.state().evaluated.clone()
    }

    /// Directories passed to `build_image`
    pub fn built(&self) -> Vec<Directory> {
        self.state().built.clone()
    }

    /// `(address, image)` pairs published so far
    pub fn published(&self) -> Vec<(String, Image)> {
        self.state().published.clone()
    }

    /// Value stored for a secret name
    pub fn secret_value(&self, name: &str) -> Option<String> {
        self.state().secrets.get(name).cloned()
    }

    pub fn cache_names(&self) -> Vec<String> {
        self.state().caches.clone()
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn host_directory(&self, path: &Path, exclude: &[&str]) -> EngineResult<Directory> {
        Ok(Directory::new(path).with_exclude(exclude))
    }

    async fn entries(&self, dir: &Directory) -> EngineResult<Vec<String>> {
        let state = self.state();
        let entries = state.entries.get(&dir.path).cloned().unwrap_or_default();
        Ok(entries
            .into_iter()
            .filter(|e| !dir.exclude.iter().any(|x| x == e))
            .collect())
    }

    async fn stdout(&self, container: &Container) -> EngineResult<String> {
        let mut state = self.state();
        state.evaluated.push(container.clone());
        state.stdout.pop_front().unwrap_or_else(|| Ok(String::new()))
    }

    async fn directory(&self, container: &Container, path: &str) -> EngineResult<Directory> {
        let mut state = self.state();
        state.evaluated.push(container.clone());
        state
            .directories
            .pop_front()
            .unwrap_or_else(|| Ok(Directory::new(path)))
    }

    async fn file_contents(&self, container: &Container, path: &str) -> EngineResult<String> {
        let mut state = self.state();
        state.evaluated.push(container.clone());
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::new("file", format!("no such file: {}", path)))
    }

    async fn build_image(&self, context: &Directory) -> EngineResult<Image> {
        let mut state = self.state();
        state.built.push(context.clone());
        Ok(Image::new(format!("sha256:memory{}", state.built.len())))
    }

    async fn set_secret(&self, name: &str, value: &str) -> EngineResult<Secret> {
        self.state()
            .secrets
            .insert(name.to_string(), value.to_string());
        Ok(Secret::new(name))
    }

    async fn cache_volume(&self, name: &str) -> EngineResult<CacheVolume> {
        let mut state = self.state();
        if !state.caches.iter().any(|c| c == name) {
            state.caches.push(name.to_string());
        }
        Ok(CacheVolume {
            name: name.to_string(),
        })
    }

    async fn publish(&self, image: &Image, address: &str) -> EngineResult<String> {
        let mut state = self.state();
        if let Some(ref message) = state.publish_failure {
            return Err(EngineError::new("publish", message.clone()));
        }
        state.published.push((address.to_string(), image.clone()));
        Ok(format!("{}@{}", address, image.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_stdout_then_default() {
        let engine = MemoryEngine::new();
        engine.push_stdout(Err(EngineError::new("run", "boom")));

        let container = Container::new("alpine:3.20").with_exec(&["true"]);
        assert!(engine.stdout(&container).await.is_err());
        assert_eq!(engine.stdout(&container).await.unwrap(), "");
        assert_eq!(engine.evaluated().len(), 2);
    }

    #[tokio::test]
    async fn test_entries_honour_excludes() {
        let engine = MemoryEngine::new().with_entries("/src", &["main.go", ".git", "node_modules"]);
        let dir = engine
            .host_directory(Path::new("/src"), &[".git", "node_modules"])
            .await
            .unwrap();

        assert_eq!(engine.entries(&dir).await.unwrap(), vec!["main.go"]);
    }
}
