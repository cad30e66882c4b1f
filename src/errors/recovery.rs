// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from a failed pipeline run.

use super::PipelineError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &PipelineError) -> Option<Self> {
        match error {
            PipelineError::StepFailed { source, .. } => Self::for_error(source),
            PipelineError::CloneFailed { cause, .. } => Self::for_error(cause),
            PipelineError::MissingKey { .. } => Some(Self::provide_ssh_key()),
            PipelineError::Credential(_) => Some(Self::provide_credentials()),
            PipelineError::MissingToken { variable } => Some(Self::provide_token(variable)),
            PipelineError::CoverageBelow { actual, minimum } => {
                Some(Self::raise_coverage(*actual, *minimum))
            }
            PipelineError::NotFound { available, .. } => Some(Self::pick_pipeline(available)),
            PipelineError::InvalidConfig { field } => Some(Self::fill_config(field)),
            _ => None,
        }
    }

    /// Suggest providing an SSH key
    pub fn provide_ssh_key() -> Self {
        Self {
            action: "Provide an SSH private key".into(),
            steps: vec![
                "The SSH clone strategy reads SSH_PRIVATE_KEY first".into(),
                "It falls back to ~/.ssh/id_rsa".into(),
            ],
            commands: vec![
                "export SSH_PRIVATE_KEY=\"$(cat ~/.ssh/id_rsa)\"".into(),
                "".into(),
                "# Or clone over HTTPS instead:".into(),
                "syntegrity run <pipeline> --git-protocol https".into(),
            ],
        }
    }

    /// Suggest providing clone credentials
    pub fn provide_credentials() -> Self {
        Self {
            action: "Provide valid git credentials".into(),
            steps: vec![
                "Credentials are probed in this order:".into(),
                "  • CI=true with CI_JOB_TOKEN".into(),
                "  • GITLAB_PAT".into(),
                "  • SSH_PRIVATE_KEY".into(),
            ],
            commands: vec!["export GITLAB_PAT=<personal access token>".into()],
        }
    }

    /// Suggest setting a missing token variable
    pub fn provide_token(variable: &str) -> Self {
        Self {
            action: format!("Set {}", variable),
            steps: vec![format!(
                "{} is required to authenticate against the registry in CI",
                variable
            )],
            commands: vec![],
        }
    }

    /// Suggest fixing a coverage gate failure
    pub fn raise_coverage(actual: f64, minimum: f64) -> Self {
        Self {
            action: "Raise test coverage".into(),
            steps: vec![
                format!("Measured {:.1}%, required {:.1}%", actual, minimum),
                "Add tests or lower the threshold".into(),
            ],
            commands: vec![format!(
                "syntegrity run <pipeline> --coverage {:.1}",
                actual
            )],
        }
    }

    /// Suggest a registered pipeline name
    pub fn pick_pipeline(available: &str) -> Self {
        Self {
            action: "Use a registered pipeline".into(),
            steps: vec![format!("Registered pipelines: {}", available)],
            commands: vec!["syntegrity list".into()],
        }
    }

    /// Suggest filling a required configuration field
    pub fn fill_config(field: &str) -> Self {
        let flag = match field {
            "branch" => "--branch <name>",
            "registry" => "--registry <url>",
            "registry user" => "--registry-user <user>",
            "registry token" => "--registry-token <token>",
            "image tag" => "--image-tag <tag>",
            _ => "--config <file>",
        };

        Self {
            action: format!("Set the {}", field),
            steps: vec![format!("'{}' is required at this step", field)],
            commands: vec![format!("syntegrity run <pipeline> {}", flag)],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_unwraps_step_failure() {
        let err = PipelineError::StepFailed {
            step: "Setup".into(),
            source: Box::new(PipelineError::MissingKey {
                path: "/root/.ssh/id_rsa".into(),
            }),
        };

        let suggestion = RecoverySuggestion::for_error(&err).unwrap();
        assert_eq!(suggestion.action, "Provide an SSH private key");
    }

    #[test]
    fn test_no_suggestion_for_cancellation() {
        let err = PipelineError::Cancelled {
            reason: "interrupted".into(),
        };
        assert!(RecoverySuggestion::for_error(&err).is_none());
    }
}
