// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Error types for pipeline runs
//!
//! Every lifecycle operation fails with a [`PipelineError`]. Each variant maps
//! to one stable error kind (see [`PipelineError::kind`]) and carries a
//! diagnostic code and help text so the CLI can tell users what to do next.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::git::CredentialKind;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for container engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure reported by the container engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("engine operation '{operation}' failed: {message}")]
pub struct EngineError {
    /// Operation that failed (`run`, `build`, `publish`, ...)
    pub operation: String,
    /// Engine supplied cause
    pub message: String,
}

impl EngineError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Reasons a credential record is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{kind} credentials expired at {expired_at}")]
    Expired { kind: CredentialKind, expired_at: String },

    #[error("{kind} credentials are missing the {field} field")]
    MissingField {
        kind: CredentialKind,
        field: &'static str,
    },

    #[error("unknown credential variant '{kind}'")]
    UnknownVariant { kind: String },
}

/// Main error type for pipeline runs
#[derive(Error, Debug, Diagnostic)]
pub enum PipelineError {
    // ─────────────────────────────────────────────────────────────────────────
    // Clone Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid clone options: {reason}")]
    #[diagnostic(
        code(syntegrity::invalid_options),
        help("A clone needs a repository URL, a branch and a destination name")
    )]
    InvalidOptions { reason: String },

    #[error("Credential error: {0}")]
    #[diagnostic(
        code(syntegrity::credential_error),
        help("Provide CI_JOB_TOKEN (with CI=true), GITLAB_PAT or SSH_PRIVATE_KEY")
    )]
    Credential(#[from] CredentialError),

    #[error("No SSH private key found (checked SSH_PRIVATE_KEY and {path})")]
    #[diagnostic(
        code(syntegrity::missing_key),
        help("Export SSH_PRIVATE_KEY or place a key at ~/.ssh/id_rsa")
    )]
    MissingKey { path: PathBuf },

    #[error("Clone failed after {attempts} attempt(s): {cause}")]
    #[diagnostic(code(syntegrity::clone_failed))]
    CloneFailed {
        attempts: u32,
        #[source]
        cause: Box<PipelineError>,
    },

    #[error("Repository cloned into '{path}' but the directory is empty")]
    #[diagnostic(code(syntegrity::empty_clone))]
    EmptyClone { path: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Step '{step}' needs a working tree but Setup has not produced one")]
    #[diagnostic(code(syntegrity::not_set_up), help("Run the Setup step first"))]
    NotSetUp { step: String },

    #[error("Step '{step}' needs an image but Build has not produced one")]
    #[diagnostic(code(syntegrity::no_image), help("Run the Build step first"))]
    NoImage { step: String },

    #[error("Coverage {actual:.1}% is below the required minimum {minimum:.1}%")]
    #[diagnostic(
        code(syntegrity::coverage_below),
        help("Add tests or lower the threshold with --coverage")
    )]
    CoverageBelow { actual: f64, minimum: f64 },

    #[error("Could not parse coverage report: {reason}")]
    #[diagnostic(code(syntegrity::parse_error))]
    ParseError { reason: String },

    #[error("Step '{step}' is not implemented by pipeline '{pipeline}'")]
    #[diagnostic(code(syntegrity::unimplemented))]
    Unimplemented { pipeline: String, step: String },

    #[error("Step '{step}' failed: {source}")]
    #[diagnostic(code(syntegrity::step_failed))]
    StepFailed {
        step: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Operation cancelled: {reason}")]
    #[diagnostic(code(syntegrity::cancelled))]
    Cancelled { reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Registry / Publish Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline '{name}' not found")]
    #[diagnostic(
        code(syntegrity::not_found),
        help("Available pipelines: {available}")
    )]
    NotFound { name: String, available: String },

    #[error("Publishing to '{address}' failed: {cause}")]
    #[diagnostic(code(syntegrity::publish_failed))]
    PublishFailed {
        address: String,
        #[source]
        cause: EngineError,
    },

    #[error("Missing token: {variable} is not set")]
    #[diagnostic(code(syntegrity::missing_token))]
    MissingToken { variable: String },

    #[error("Invalid configuration: {field} must not be empty")]
    #[diagnostic(code(syntegrity::invalid_config))]
    InvalidConfig { field: String },

    #[error(transparent)]
    #[diagnostic(code(syntegrity::engine_error))]
    Engine(#[from] EngineError),

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(syntegrity::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(syntegrity::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(syntegrity::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(syntegrity::yaml_error))]
    Yaml { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(syntegrity::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl PipelineError {
    /// Error for a step a pipeline does not provide
    pub fn unimplemented(pipeline: &str, step: impl ToString) -> Self {
        Self::Unimplemented {
            pipeline: pipeline.to_string(),
            step: step.to_string(),
        }
    }

    pub fn not_set_up(step: impl ToString) -> Self {
        Self::NotSetUp {
            step: step.to_string(),
        }
    }

    pub fn no_image(step: impl ToString) -> Self {
        Self::NoImage {
            step: step.to_string(),
        }
    }

    pub fn invalid_config(field: &str) -> Self {
        Self::InvalidConfig {
            field: field.to_string(),
        }
    }

    /// Stable kind tag, used in user-facing failure lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidOptions { .. } => "InvalidOptions",
            Self::Credential(_) => "CredentialError",
            Self::MissingKey { .. } => "MissingKey",
            Self::CloneFailed { .. } => "CloneFailed",
            Self::EmptyClone { .. } => "EmptyClone",
            Self::NotSetUp { .. } => "NotSetUp",
            Self::NoImage { .. } => "NoImage",
            Self::CoverageBelow { .. } => "CoverageBelow",
            Self::ParseError { .. } => "ParseError",
            Self::Unimplemented { .. } => "Unimplemented",
            Self::StepFailed { source, .. } => source.kind(),
            Self::Cancelled { .. } => "Cancelled",
            Self::NotFound { .. } => "NotFound",
            Self::PublishFailed { .. } => "PublishFailed",
            Self::MissingToken { .. } => "MissingToken",
            Self::InvalidConfig { .. } => "InvalidConfig",
            Self::Engine(_) => "EngineError",
            Self::FileReadError { .. } | Self::FileWriteError { .. } | Self::Io { .. } => "IoError",
            Self::Yaml { .. } | Self::Toml { .. } => "ConfigFileError",
        }
    }

    /// Whether this error stems from the cancellation token or a deadline
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::StepFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failed_reports_inner_kind() {
        let err = PipelineError::StepFailed {
            step: "Test".into(),
            source: Box::new(PipelineError::CoverageBelow {
                actual: 80.0,
                minimum: 85.0,
            }),
        };

        assert_eq!(err.kind(), "CoverageBelow");
        assert!(err.to_string().contains("80.0%"));
    }

    #[test]
    fn test_clone_failed_keeps_cause() {
        let err = PipelineError::CloneFailed {
            attempts: 3,
            cause: Box::new(EngineError::new("run", "network unreachable").into()),
        };

        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("engine operation 'run' failed: network unreachable")
        );
    }

    #[test]
    fn test_cancelled_is_detected_through_step_wrapper() {
        let err = PipelineError::StepFailed {
            step: "Setup".into(),
            source: Box::new(PipelineError::Cancelled {
                reason: "deadline exceeded".into(),
            }),
        };
        assert!(err.is_cancelled());
    }
}
