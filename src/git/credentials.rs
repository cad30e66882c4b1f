// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Clone credentials
//!
//! [`CredentialResolver`] probes the environment in trust order:
//! short-lived CI job tokens, then personal access tokens, then SSH keys,
//! then anonymous access. Secrets never leave [`Credentials`] through
//! `Debug` or `Display`; both print the summary only.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::env::{self, EnvView};
use crate::errors::CredentialError;

/// User GitLab expects alongside a CI job token
pub const CI_TOKEN_USER: &str = "gitlab-ci-token";
/// User GitLab expects alongside a personal access token
pub const PAT_USER: &str = "oauth2";
/// User for SSH remotes
pub const SSH_USER: &str = "git";

/// Credential variant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    Ci,
    Pat,
    Ssh,
    Anonymous,
    /// A tag this crate does not know how to use
    Unknown(String),
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ci => write!(f, "CI"),
            Self::Pat => write!(f, "PAT"),
            Self::Ssh => write!(f, "SSH"),
            Self::Anonymous => write!(f, "ANONYMOUS"),
            Self::Unknown(tag) => write!(f, "{}", tag),
        }
    }
}

impl FromStr for CredentialKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CI" => Self::Ci,
            "PAT" => Self::Pat,
            "SSH" => Self::Ssh,
            "ANONYMOUS" => Self::Anonymous,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// Resolved clone credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub kind: CredentialKind,
    pub user: String,
    secret: String,
    pub expires_at: DateTime<Utc>,
}

impl Credentials {
    pub fn new(
        kind: CredentialKind,
        user: impl Into<String>,
        secret: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            user: user.into(),
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn anonymous(expires_at: DateTime<Utc>) -> Self {
        Self::new(CredentialKind::Anonymous, "", "", expires_at)
    }

    /// Secret material (token or private key)
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn is_anonymous(&self) -> bool {
        self.kind == CredentialKind::Anonymous
    }

    /// Validate against the current time
    pub fn validate(&self) -> Result<(), CredentialError> {
        self.validate_at(Utc::now())
    }

    /// Validate against `now`
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), CredentialError> {
        if self.expires_at < now {
            return Err(CredentialError::Expired {
                kind: self.kind.clone(),
                expired_at: self.expires_at.to_rfc3339(),
            });
        }

        let missing = |field: &'static str| CredentialError::MissingField {
            kind: self.kind.clone(),
            field,
        };

        match &self.kind {
            CredentialKind::Ci | CredentialKind::Pat => {
                if self.user.is_empty() {
                    return Err(missing("user"));
                }
                if self.secret.is_empty() {
                    return Err(missing("secret"));
                }
                Ok(())
            }
            CredentialKind::Ssh => {
                if self.secret.is_empty() {
                    return Err(missing("secret"));
                }
                Ok(())
            }
            CredentialKind::Anonymous => Ok(()),
            CredentialKind::Unknown(tag) => Err(CredentialError::UnknownVariant { kind: tag.clone() }),
        }
    }

    /// Log-safe form: `{variant, user, expiry}`
    pub fn summary(&self) -> String {
        format!(
            "{{{}, {}, {}}}",
            self.kind,
            self.user,
            self.expires_at.to_rfc3339()
        )
    }
}

/// Summary of an optional credential record, `<nil>` when absent
pub fn summarize(credentials: Option<&Credentials>) -> String {
    credentials
        .map(Credentials::summary)
        .unwrap_or_else(|| "<nil>".to_string())
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("kind", &self.kind)
            .field("user", &self.user)
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Probes the environment for clone credentials
#[derive(Clone)]
pub struct CredentialResolver {
    env: Arc<dyn EnvView>,
}

impl CredentialResolver {
    pub fn new(env: Arc<dyn EnvView>) -> Self {
        Self { env }
    }

    pub fn resolve(&self) -> Credentials {
        self.resolve_at(Utc::now())
    }

    /// First satisfied probe wins
    pub fn resolve_at(&self, now: DateTime<Utc>) -> Credentials {
        if self.env.is_truthy(env::CI) {
            if let Some(token) = self.env.non_empty(env::CI_JOB_TOKEN) {
                return Credentials::new(
                    CredentialKind::Ci,
                    CI_TOKEN_USER,
                    token,
                    now + Duration::hours(1),
                );
            }
        }

        if let Some(token) = self.env.non_empty(env::GITLAB_PAT) {
            return Credentials::new(CredentialKind::Pat, PAT_USER, token, now + Duration::hours(24));
        }

        if let Some(key) = self.env.non_empty(env::SSH_PRIVATE_KEY) {
            return Credentials::new(CredentialKind::Ssh, SSH_USER, key, now + Duration::hours(24));
        }

        warn!("No git credentials found; falling back to anonymous access");
        Credentials::anonymous(now + Duration::hours(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;

    fn resolver(pairs: &[(&str, &str)]) -> CredentialResolver {
        CredentialResolver::new(Arc::new(MapEnv::from_pairs(pairs.iter().copied())))
    }

    #[test]
    fn test_ci_token_wins() {
        let creds = resolver(&[("CI", "true"), ("CI_JOB_TOKEN", "t"), ("GITLAB_PAT", "p")]).resolve();
        assert_eq!(creds.kind, CredentialKind::Ci);
        assert_eq!(creds.user, "gitlab-ci-token");
        assert_eq!(creds.secret(), "t");
    }

    #[test]
    fn test_ci_flag_without_token_falls_through_to_pat() {
        let creds = resolver(&[("CI", "true"), ("GITLAB_PAT", "p")]).resolve();
        assert_eq!(creds.kind, CredentialKind::Pat);
        assert_eq!(creds.user, "oauth2");
        assert_eq!(creds.secret(), "p");
    }

    #[test]
    fn test_job_token_without_ci_flag_is_ignored() {
        let creds = resolver(&[("CI_JOB_TOKEN", "t")]).resolve();
        assert!(creds.is_anonymous());
    }

    #[test]
    fn test_ssh_key_after_pat() {
        let creds = resolver(&[("SSH_PRIVATE_KEY", "k")]).resolve();
        assert_eq!(creds.kind, CredentialKind::Ssh);
        assert_eq!(creds.user, "git");
        assert_eq!(creds.secret(), "k");
    }

    #[test]
    fn test_anonymous_when_nothing_set() {
        let now = Utc::now();
        let creds = resolver(&[]).resolve_at(now);
        assert_eq!(creds.kind, CredentialKind::Anonymous);
        assert!(creds.user.is_empty());
        assert!(creds.secret().is_empty());
        assert_eq!(creds.expires_at, now + Duration::hours(1));
    }

    #[test]
    fn test_expiry_windows() {
        let now = Utc::now();
        let ci = resolver(&[("CI", "1"), ("CI_JOB_TOKEN", "t")]).resolve_at(now);
        let pat = resolver(&[("GITLAB_PAT", "p")]).resolve_at(now);
        assert_eq!(ci.expires_at, now + Duration::hours(1));
        assert_eq!(pat.expires_at, now + Duration::hours(24));
    }

    #[test]
    fn test_expired_always_fails_expired() {
        let past = Utc::now() - Duration::minutes(5);
        for kind in [
            CredentialKind::Ci,
            CredentialKind::Pat,
            CredentialKind::Ssh,
            CredentialKind::Anonymous,
            CredentialKind::Unknown("OIDC".into()),
        ] {
            let creds = Credentials::new(kind, "", "", past);
            assert!(matches!(creds.validate(), Err(CredentialError::Expired { .. })));
        }
    }

    #[test]
    fn test_missing_fields() {
        let later = Utc::now() + Duration::hours(1);
        let cases = [
            Credentials::new(CredentialKind::Ci, "", "t", later),
            Credentials::new(CredentialKind::Ci, "u", "", later),
            Credentials::new(CredentialKind::Pat, "", "p", later),
            Credentials::new(CredentialKind::Pat, "u", "", later),
            Credentials::new(CredentialKind::Ssh, "git", "", later),
        ];

        for creds in cases {
            assert!(
                matches!(creds.validate(), Err(CredentialError::MissingField { .. })),
                "{:?} should be rejected",
                creds
            );
        }
    }

    #[test]
    fn test_unknown_variant() {
        let later = Utc::now() + Duration::hours(1);
        let kind: CredentialKind = "OIDC".parse().unwrap();
        let creds = Credentials::new(kind, "u", "s", later);
        assert_eq!(
            creds.validate(),
            Err(CredentialError::UnknownVariant { kind: "OIDC".into() })
        );
    }

    #[test]
    fn test_valid_records_pass() {
        let later = Utc::now() + Duration::hours(1);
        assert!(Credentials::new(CredentialKind::Pat, "oauth2", "p", later).validate().is_ok());
        assert!(Credentials::new(CredentialKind::Ssh, "git", "k", later).validate().is_ok());
        assert!(Credentials::anonymous(later).validate().is_ok());
    }

    #[test]
    fn test_summary_never_contains_secret() {
        let later = Utc::now() + Duration::hours(1);
        let creds = Credentials::new(CredentialKind::Pat, "oauth2", "glpat-supersecret", later);

        for rendered in [creds.summary(), creds.to_string(), format!("{:?}", creds)] {
            assert!(!rendered.contains("glpat-supersecret"));
        }
        assert!(creds.summary().starts_with("{PAT, oauth2, "));
    }

    #[test]
    fn test_summary_of_nothing() {
        assert_eq!(summarize(None), "<nil>");
    }
}
