// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Pipeline registry
//!
//! Maps pipeline names to factories. Each registry is independent; there is
//! no process-wide instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Pipeline;
use crate::config::Config;
use crate::engine::Engine;
use crate::errors::{PipelineError, PipelineResult};

/// Builds a pipeline for one invocation
pub type PipelineFactory = Arc<dyn Fn(Arc<dyn Engine>, Arc<Config>) -> Box<dyn Pipeline> + Send + Sync>;

/// Name to factory mapping
#[derive(Clone, Default)]
pub struct Registry {
    factories: HashMap<String, PipelineFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a factory; a later registration under the same name replaces
    /// the earlier one
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Arc<dyn Engine>, Arc<Config>) -> Box<dyn Pipeline> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Instantiate the pipeline registered as `name`
    pub fn get(
        &self,
        name: &str,
        engine: Arc<dyn Engine>,
        config: Arc<Config>,
    ) -> PipelineResult<Box<dyn Pipeline>> {
        let factory = self.factories.get(name).ok_or_else(|| PipelineError::NotFound {
            name: name.to_string(),
            available: self.list().join(", "),
        })?;

        Ok(factory(engine, config))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("pipelines", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::engine::MemoryEngine;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Named(&'static str);

    #[async_trait]
    impl Pipeline for Named {
        fn name(&self) -> &str {
            self.0
        }
        async fn setup(&mut self, _ctx: &Context) -> PipelineResult<()> {
            Ok(())
        }
        async fn build(&mut self, _ctx: &Context) -> PipelineResult<()> {
            Ok(())
        }
        async fn test(&mut self, _ctx: &Context) -> PipelineResult<()> {
            Ok(())
        }
        async fn package(&mut self, _ctx: &Context) -> PipelineResult<()> {
            Ok(())
        }
        async fn tag(&mut self, _ctx: &Context) -> PipelineResult<()> {
            Ok(())
        }
        async fn push(&mut self, _ctx: &Context) -> PipelineResult<()> {
            Ok(())
        }
    }

    fn deps() -> (Arc<dyn Engine>, Arc<Config>) {
        (Arc::new(MemoryEngine::new()), Arc::new(Config::default()))
    }

    #[test]
    fn test_last_registration_wins() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();

        let counter = first.clone();
        registry.register("x", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(Named("first")) as Box<dyn Pipeline>
        });
        let counter = second.clone();
        registry.register("x", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(Named("second")) as Box<dyn Pipeline>
        });

        let (engine, config) = deps();
        let pipeline = registry.get("x", engine, config).unwrap();

        assert_eq!(pipeline.name(), "second");
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_name() {
        let mut registry = Registry::new();
        registry.register("a", |_, _| Box::new(Named("a")) as Box<dyn Pipeline>);

        let (engine, config) = deps();
        match registry.get("b", engine, config) {
            Err(PipelineError::NotFound { name, available }) => {
                assert_eq!(name, "b");
                assert_eq!(available, "a");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected NotFound"),
        }
    }

    #[test]
    fn test_registries_are_independent() {
        let mut one = Registry::new();
        one.register("a", |_, _| Box::new(Named("a")) as Box<dyn Pipeline>);
        let two = Registry::new();

        assert!(one.contains("a"));
        assert!(two.list().is_empty());
    }
}
