// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Go test runner and coverage gate

use tracing::{debug, info};

use crate::config::Config;
use crate::context::Context;
use crate::engine::{Container, Directory, Engine};
use crate::errors::{PipelineError, PipelineResult};

/// Toolchain used when the configuration leaves `go_version` empty
pub const DEFAULT_GO_VERSION: &str = "1.22";

const SOURCE_MOUNT: &str = "/src";
const COVERAGE_REPORT: &str = "/tmp/coverage.txt";

/// Runs `go test` with coverage inside a Go toolchain container
#[derive(Debug, Clone, PartialEq)]
pub struct GoTestRunner {
    go_version: String,
    min_coverage: f64,
    test_command: Vec<String>,
}

impl GoTestRunner {
    pub fn new(config: &Config) -> Self {
        let go_version = if config.go_version.trim().is_empty() {
            DEFAULT_GO_VERSION.to_string()
        } else {
            config.go_version.clone()
        };

        Self {
            go_version,
            min_coverage: config.min_coverage,
            test_command: ["go", "test", "-coverprofile=coverage.out", "./..."]
                .map(String::from)
                .to_vec(),
        }
    }

    pub fn image(&self) -> String {
        format!("golang:{}", self.go_version)
    }

    /// Toolchain container with the source and both Go caches mounted
    pub async fn container(
        &self,
        ctx: &Context,
        engine: &dyn Engine,
        source: &Directory,
    ) -> PipelineResult<Container> {
        let mod_cache = ctx.guard(engine.cache_volume("go-mod-cache")).await?;
        let build_cache = ctx.guard(engine.cache_volume("go-build-cache")).await?;

        Ok(Container::new(self.image())
            .with_directory(SOURCE_MOUNT, source)
            .with_cache("/go/pkg/mod", &mod_cache)
            .with_cache("/root/.cache/go-build", &build_cache)
            .with_workdir(SOURCE_MOUNT))
    }

    /// Run the tests and return total coverage; fails `CoverageBelow` when
    /// it is under the configured minimum
    pub async fn run(&self, ctx: &Context, engine: &dyn Engine, source: &Directory) -> PipelineResult<f64> {
        info!("Running Go tests with {}", self.image());

        let container = self
            .container(ctx, engine, source)
            .await?
            .with_exec(&self.test_command)
            .with_exec_redirect(&["go", "tool", "cover", "-func=coverage.out"], COVERAGE_REPORT);

        let report = ctx
            .guard(engine.file_contents(&container, COVERAGE_REPORT))
            .await?;
        let coverage = parse_total_coverage(&report)?;
        debug!("Total coverage {:.1}% (minimum {:.1}%)", coverage, self.min_coverage);

        if coverage < self.min_coverage {
            return Err(PipelineError::CoverageBelow {
                actual: coverage,
                minimum: self.min_coverage,
            });
        }

        info!("Coverage {:.1}% meets the minimum of {:.1}%", coverage, self.min_coverage);
        Ok(coverage)
    }
}

/// Percentage from the last `total:` line of `go tool cover -func` output
pub fn parse_total_coverage(report: &str) -> PipelineResult<f64> {
    let line = report
        .lines()
        .map(str::trim)
        .rfind(|line| line.starts_with("total:"))
        .ok_or_else(|| PipelineError::ParseError {
            reason: "no 'total:' line in coverage report".to_string(),
        })?;

    let token = line.split_whitespace().last().unwrap_or_default();
    let number = token.strip_suffix('%').unwrap_or(token);

    let value = number.parse::<f64>().map_err(|e| PipelineError::ParseError {
        reason: format!("invalid coverage value '{}': {}", token, e),
    })?;
    if !value.is_finite() {
        return Err(PipelineError::ParseError {
            reason: format!("invalid coverage value '{}'", token),
        });
    }
    Ok(value)
}
