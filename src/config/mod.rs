// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Run configuration
//!
//! A [`Config`] starts from defaults and is shaped by a sequence of
//! [`ConfigOption`] modifiers; later modifiers for the same field win.
//! Nothing is validated here. The clone and publish steps check the fields
//! they need when they run.

mod file;

pub use file::ConfigFile;

use std::fmt;

/// Settings shared by every pipeline of one invocation
#[derive(Clone, PartialEq)]
pub struct Config {
    /// Environment label (`dev`, `staging`, ...)
    pub env: String,
    pub skip_push: bool,
    pub only_test: bool,
    pub only_build: bool,
    pub verbose: bool,

    pub git_repo: String,
    /// Git reference checked out by Setup
    pub git_ref: String,
    /// `ssh` or `https`
    pub git_protocol: String,
    pub commit_sha: String,
    pub branch_name: String,
    pub build_tag: String,
    pub version: String,
    pub git_user_name: String,
    pub git_user_email: String,

    pub registry_url: String,
    pub registry_user: String,
    pub registry_token: String,
    pub image_name: String,
    pub image_tag: String,

    pub go_version: String,
    pub java_version: String,

    pub token: String,
    pub ssh_private_key: String,

    /// Minimum coverage percent enforced by the Go test runner
    pub min_coverage: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: "dev".to_string(),
            skip_push: false,
            only_test: false,
            only_build: false,
            verbose: false,
            git_repo: String::new(),
            git_ref: "main".to_string(),
            git_protocol: String::new(),
            commit_sha: String::new(),
            branch_name: String::new(),
            build_tag: String::new(),
            version: String::new(),
            git_user_name: String::new(),
            git_user_email: String::new(),
            registry_url: String::new(),
            registry_user: String::new(),
            registry_token: String::new(),
            image_name: String::new(),
            image_tag: String::new(),
            go_version: String::new(),
            java_version: String::new(),
            token: String::new(),
            ssh_private_key: String::new(),
            min_coverage: 0.0,
        }
    }
}

impl Config {
    /// Apply `options` in order on top of the defaults
    pub fn build(options: impl IntoIterator<Item = ConfigOption>) -> Self {
        let mut config = Self::default();
        for option in options {
            option.apply(&mut config);
        }
        config
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("env", &self.env)
            .field("skip_push", &self.skip_push)
            .field("only_test", &self.only_test)
            .field("only_build", &self.only_build)
            .field("verbose", &self.verbose)
            .field("git_repo", &self.git_repo)
            .field("git_ref", &self.git_ref)
            .field("git_protocol", &self.git_protocol)
            .field("commit_sha", &self.commit_sha)
            .field("branch_name", &self.branch_name)
            .field("build_tag", &self.build_tag)
            .field("version", &self.version)
            .field("git_user_name", &self.git_user_name)
            .field("git_user_email", &self.git_user_email)
            .field("registry_url", &self.registry_url)
            .field("registry_user", &self.registry_user)
            .field("registry_token", &redact(&self.registry_token))
            .field("image_name", &self.image_name)
            .field("image_tag", &self.image_tag)
            .field("go_version", &self.go_version)
            .field("java_version", &self.java_version)
            .field("token", &redact(&self.token))
            .field("ssh_private_key", &redact(&self.ssh_private_key))
            .field("min_coverage", &self.min_coverage)
            .finish()
    }
}

/// Single-field modifier applied by [`Config::build`]
pub struct ConfigOption(Box<dyn FnOnce(&mut Config) + Send>);

impl ConfigOption {
    pub fn new(apply: impl FnOnce(&mut Config) + Send + 'static) -> Self {
        Self(Box::new(apply))
    }

    pub fn apply(self, config: &mut Config) {
        (self.0)(config)
    }
}

impl fmt::Debug for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConfigOption")
    }
}

macro_rules! string_option {
    ($(#[$doc:meta])* $name:ident => $field:ident) => {
        $(#[$doc])*
        pub fn $name(value: impl Into<String>) -> ConfigOption {
            let value = value.into();
            ConfigOption::new(move |c| c.$field = value)
        }
    };
}

macro_rules! flag_option {
    ($(#[$doc:meta])* $name:ident => $field:ident) => {
        $(#[$doc])*
        pub fn $name(value: bool) -> ConfigOption {
            ConfigOption::new(move |c| c.$field = value)
        }
    };
}

string_option!(
    /// Environment label
    with_env => env
);
flag_option!(with_skip_push => skip_push);
flag_option!(
    /// Run only Setup and Test
    with_only_test => only_test
);
flag_option!(
    /// Run only Setup and Build
    with_only_build => only_build
);
flag_option!(with_verbose => verbose);
string_option!(with_registry_user => registry_user);
string_option!(with_build_tag => build_tag);
string_option!(with_commit_sha => commit_sha);
string_option!(with_branch => branch_name);
string_option!(
    /// `ssh` or `https`
    with_git_protocol => git_protocol
);
string_option!(with_git_ref => git_ref);
string_option!(with_token => token);
string_option!(with_go_version => go_version);
string_option!(with_java_version => java_version);
string_option!(with_ssh_private_key => ssh_private_key);
string_option!(with_git_user_email => git_user_email);
string_option!(with_git_user_name => git_user_name);
string_option!(with_image_name => image_name);
string_option!(with_image_tag => image_tag);
string_option!(with_version => version);

/// Registry URL and token
pub fn with_registry(url: impl Into<String>, token: impl Into<String>) -> ConfigOption {
    let (url, token) = (url.into(), token.into());
    ConfigOption::new(move |c| {
        c.registry_url = url;
        c.registry_token = token;
    })
}

/// Repository URL and the reference to check out
pub fn with_git_repo(repo: impl Into<String>, git_ref: impl Into<String>) -> ConfigOption {
    let (repo, git_ref) = (repo.into(), git_ref.into());
    ConfigOption::new(move |c| {
        c.git_repo = repo;
        c.git_ref = git_ref;
    })
}

/// Minimum coverage percent
pub fn with_coverage(min: f64) -> ConfigOption {
    ConfigOption::new(move |c| c.min_coverage = min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::build(Vec::<ConfigOption>::new());
        assert_eq!(config.env, "dev");
        assert_eq!(config.git_ref, "main");
        assert!(config.git_repo.is_empty());
        assert!(config.registry_url.is_empty());
        assert!(!config.skip_push);
        assert_eq!(config.min_coverage, 0.0);
    }

    #[test]
    fn test_later_options_override_earlier() {
        let config = Config::build([
            with_env("prod"),
            with_coverage(85.0),
            with_git_repo("r", "main"),
            with_git_ref("release"),
            with_env("staging"),
        ]);

        assert_eq!(config.env, "staging");
        assert_eq!(config.min_coverage, 85.0);
        assert_eq!(config.git_repo, "r");
        assert_eq!(config.git_ref, "release");
    }

    #[test]
    fn test_staging_configuration() {
        let config = Config::build([
            with_env("staging"),
            with_skip_push(true),
            with_verbose(true),
            with_registry("r", "t"),
            with_branch("b"),
            with_coverage(90.0),
            with_go_version("1.21"),
        ]);

        assert_eq!(config.env, "staging");
        assert!(config.skip_push);
        assert!(config.verbose);
        assert_eq!(config.registry_url, "r");
        assert_eq!(config.registry_token, "t");
        assert_eq!(config.branch_name, "b");
        assert_eq!(config.min_coverage, 90.0);
        assert_eq!(config.go_version, "1.21");
        assert_eq!(config.git_ref, "main");

        assert!(!config.only_test);
        assert!(!config.only_build);
        assert!(config.git_repo.is_empty());
        assert!(config.image_tag.is_empty());
    }

    #[test]
    fn test_every_string_option_last_one_wins() {
        type Field = fn(&Config) -> &str;
        let cases: [(&str, fn(String) -> ConfigOption, Field); 18] = [
            ("env", |v| with_env(v), |c| c.env.as_str()),
            ("registry_user", |v| with_registry_user(v), |c| c.registry_user.as_str()),
            ("build_tag", |v| with_build_tag(v), |c| c.build_tag.as_str()),
            ("commit_sha", |v| with_commit_sha(v), |c| c.commit_sha.as_str()),
            ("branch_name", |v| with_branch(v), |c| c.branch_name.as_str()),
            ("git_protocol", |v| with_git_protocol(v), |c| c.git_protocol.as_str()),
            ("git_ref", |v| with_git_ref(v), |c| c.git_ref.as_str()),
            ("token", |v| with_token(v), |c| c.token.as_str()),
            ("go_version", |v| with_go_version(v), |c| c.go_version.as_str()),
            ("java_version", |v| with_java_version(v), |c| c.java_version.as_str()),
            ("ssh_private_key", |v| with_ssh_private_key(v), |c| c.ssh_private_key.as_str()),
            ("git_user_email", |v| with_git_user_email(v), |c| c.git_user_email.as_str()),
            ("git_user_name", |v| with_git_user_name(v), |c| c.git_user_name.as_str()),
            ("image_name", |v| with_image_name(v), |c| c.image_name.as_str()),
            ("image_tag", |v| with_image_tag(v), |c| c.image_tag.as_str()),
            ("version", |v| with_version(v), |c| c.version.as_str()),
            ("registry_url", |v| with_registry(v, "t"), |c| c.registry_url.as_str()),
            ("git_repo", |v| with_git_repo(v, "main"), |c| c.git_repo.as_str()),
        ];

        for (name, make, field) in cases {
            let config = Config::build([make("first".to_string()), make("second".to_string())]);
            assert_eq!(field(&config), "second", "{name}");
        }
    }

    #[test]
    fn test_every_flag_option_last_one_wins() {
        type Flag = fn(&Config) -> bool;
        let cases: [(&str, fn(bool) -> ConfigOption, Flag); 4] = [
            ("skip_push", with_skip_push, |c| c.skip_push),
            ("only_test", with_only_test, |c| c.only_test),
            ("only_build", with_only_build, |c| c.only_build),
            ("verbose", with_verbose, |c| c.verbose),
        ];

        for (name, make, flag) in cases {
            assert!(flag(&Config::build([make(false), make(true)])), "{name}");
            assert!(!flag(&Config::build([make(true), make(false)])), "{name}");
        }
        assert_eq!(Config::build([with_coverage(10.0), with_coverage(70.0)]).min_coverage, 70.0);
    }

    #[test]
    fn test_registry_sets_url_and_token() {
        let config = Config::build([
            with_registry("registry.gitlab.com/syntegrity", "tok"),
            with_registry_user("deployer"),
        ]);
        assert_eq!(config.registry_url, "registry.gitlab.com/syntegrity");
        assert_eq!(config.registry_token, "tok");
        assert_eq!(config.registry_user, "deployer");
    }

    #[test]
    fn test_build_does_not_validate() {
        let config = Config::build([with_git_protocol("carrier-pigeon"), with_coverage(-5.0)]);
        assert_eq!(config.git_protocol, "carrier-pigeon");
        assert_eq!(config.min_coverage, -5.0);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::build([
            with_token("glpat-123"),
            with_registry("r", "registry-secret"),
            with_ssh_private_key("-----BEGIN"),
        ]);
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("glpat-123"));
        assert!(!rendered.contains("registry-secret"));
        assert!(!rendered.contains("BEGIN"));
    }
}
