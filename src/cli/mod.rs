// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for syntegrity.

pub mod list;
pub mod repo;
pub mod run;
pub mod tag;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{
    with_branch, with_build_tag, with_commit_sha, with_coverage, with_env, with_git_protocol,
    with_git_ref, with_git_user_email, with_git_user_name, with_go_version, with_image_name,
    with_image_tag, with_java_version, with_only_build, with_only_test, with_registry_user,
    with_skip_push, with_ssh_private_key, with_token, with_verbose, with_version, ConfigOption,
};

/// CI pipeline orchestrator
///
/// Build, test, tag and publish through a container engine.
#[derive(Parser, Debug)]
#[clap(
    name = "syntegrity",
    version,
    about = "CI pipeline orchestrator for Go libraries, Go services and infrastructure repositories",
    long_about = None,
    after_help = "Examples:\n\
        syntegrity list                          Show registered pipelines\n\
        syntegrity run go-kit --repo go-kit      Clone and run the go-kit pipeline\n\
        syntegrity run docker-go --skip-push     Build and tag without publishing\n\
        syntegrity repo docker-go --protocol ssh Print a repository URL\n\
        syntegrity tag                           Write .tag_name for the current tree\n\n\
        See 'syntegrity <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a pipeline
    Run(RunArgs),

    /// List registered pipelines
    List {
        /// Output format
        #[clap(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the URL of a known repository
    Repo {
        /// Repository name (go-kit, docker-go)
        name: String,

        /// Clone protocol
        #[clap(short, long, default_value = "https", value_parser = ["https", "ssh"])]
        protocol: String,
    },

    /// Generate the release tag and write it to .tag_name
    Tag,
}

/// Flags of `syntegrity run`
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Pipeline name
    pub pipeline: String,

    /// Configuration file (.yaml, .yml or .toml) applied before the flags
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Deployment environment
    #[clap(short, long)]
    pub env: Option<String>,

    /// Stop before publishing
    #[clap(long)]
    pub skip_push: bool,

    /// Run Setup and Test only
    #[clap(long)]
    pub only_test: bool,

    /// Run Setup and Build only
    #[clap(long)]
    pub only_build: bool,

    /// Known repository to clone (see `syntegrity repo`)
    #[clap(long, value_name = "NAME", conflicts_with = "git_repo")]
    pub repo: Option<String>,

    /// Repository URL to clone
    #[clap(long, value_name = "URL")]
    pub git_repo: Option<String>,

    /// Branch or ref to clone
    #[clap(long, value_name = "REF")]
    pub git_ref: Option<String>,

    /// Clone protocol [default: https]
    #[clap(long, value_parser = ["https", "ssh"])]
    pub git_protocol: Option<String>,

    /// Skip TLS certificate verification on HTTPS clones
    #[clap(long)]
    pub insecure_git: bool,

    /// Branch being built
    #[clap(long)]
    pub branch: Option<String>,

    /// Commit being built
    #[clap(long, env = "CI_COMMIT_SHA")]
    pub commit_sha: Option<String>,

    #[clap(long)]
    pub build_tag: Option<String>,

    /// Release version
    #[clap(long, value_name = "VERSION")]
    pub release_version: Option<String>,

    /// Container registry host and namespace
    #[clap(long, value_name = "URL")]
    pub registry: Option<String>,

    #[clap(long, value_name = "USER")]
    pub registry_user: Option<String>,

    #[clap(long, env = "REGISTRY_TOKEN", hide_env_values = true)]
    pub registry_token: Option<String>,

    /// Image name under the registry (defaults to the pipeline name)
    #[clap(long)]
    pub image_name: Option<String>,

    /// Image tag (defaults to CI_COMMIT_SHORT_SHA)
    #[clap(long)]
    pub image_tag: Option<String>,

    /// Go toolchain version
    #[clap(long)]
    pub go_version: Option<String>,

    #[clap(long)]
    pub java_version: Option<String>,

    /// Minimum total coverage in percent
    #[clap(long, value_name = "PERCENT")]
    pub coverage: Option<f64>,

    /// Access token kept in the configuration. Clones authenticate from
    /// CI_JOB_TOKEN, GITLAB_PAT or SSH_PRIVATE_KEY instead.
    #[clap(long, hide = true)]
    pub token: Option<String>,

    /// Private key for SSH clones
    #[clap(long, env = "SSH_PRIVATE_KEY", hide_env_values = true)]
    pub ssh_private_key: Option<String>,

    #[clap(long)]
    pub git_user_name: Option<String>,

    #[clap(long)]
    pub git_user_email: Option<String>,
}

impl RunArgs {
    /// Configuration modifiers for every flag that was given.
    ///
    /// `--repo` is not included: it names a table entry whose URL depends on
    /// the final protocol, so the caller resolves it after building.
    pub fn into_options(self, verbose: bool) -> Vec<ConfigOption> {
        let mut options = Vec::new();
        let mut push = |value: Option<String>, make: fn(String) -> ConfigOption| {
            if let Some(value) = value {
                options.push(make(value));
            }
        };

        push(self.env, |v| with_env(v));
        push(self.git_ref, |v| with_git_ref(v));
        push(self.git_protocol, |v| with_git_protocol(v));
        push(self.branch, |v| with_branch(v));
        push(self.commit_sha, |v| with_commit_sha(v));
        push(self.build_tag, |v| with_build_tag(v));
        push(self.release_version, |v| with_version(v));
        push(self.registry_user, |v| with_registry_user(v));
        push(self.image_name, |v| with_image_name(v));
        push(self.image_tag, |v| with_image_tag(v));
        push(self.go_version, |v| with_go_version(v));
        push(self.java_version, |v| with_java_version(v));
        push(self.token, |v| with_token(v));
        push(self.ssh_private_key, |v| with_ssh_private_key(v));
        push(self.git_user_name, |v| with_git_user_name(v));
        push(self.git_user_email, |v| with_git_user_email(v));

        if let Some(repo) = self.git_repo {
            options.push(ConfigOption::new(move |c| c.git_repo = repo));
        }
        if let Some(url) = self.registry {
            options.push(ConfigOption::new(move |c| c.registry_url = url));
        }
        if let Some(token) = self.registry_token {
            options.push(ConfigOption::new(move |c| c.registry_token = token));
        }
        if let Some(min) = self.coverage {
            options.push(with_coverage(min));
        }

        // Flags only ever switch these on; a config file may have set them.
        if self.skip_push {
            options.push(with_skip_push(true));
        }
        if self.only_test {
            options.push(with_only_test(true));
        }
        if self.only_build {
            options.push(with_only_build(true));
        }
        if verbose {
            options.push(with_verbose(true));
        }

        options
    }
}

/// Output format for the list command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> RunArgs {
        let mut argv = vec!["syntegrity", "run"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::Run(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_run_flags_become_config() {
        let args = parse(&[
            "docker-go",
            "--skip-push",
            "--git-repo",
            "https://gitlab.com/syntegrity/docker-go.git",
            "--git-ref",
            "release",
            "--registry",
            "registry.gitlab.com/syntegrity",
            "--image-tag",
            "1.0.0",
            "--coverage",
            "85",
        ]);
        assert_eq!(args.pipeline, "docker-go");

        let config = Config::build(args.into_options(false));
        assert!(config.skip_push);
        assert_eq!(config.git_repo, "https://gitlab.com/syntegrity/docker-go.git");
        assert_eq!(config.git_ref, "release");
        assert!(config.git_protocol.is_empty());
        assert_eq!(config.registry_url, "registry.gitlab.com/syntegrity");
        assert_eq!(config.image_tag, "1.0.0");
        assert_eq!(config.min_coverage, 85.0);
    }

    #[test]
    fn test_repo_is_left_to_the_caller() {
        let args = parse(&["go-kit", "--repo", "go-kit", "--git-protocol", "ssh", "-v"]);
        assert_eq!(args.repo.as_deref(), Some("go-kit"));

        let config = Config::build(args.into_options(true));
        assert!(config.git_repo.is_empty());
        assert_eq!(config.git_protocol, "ssh");
        assert!(config.verbose);
        assert_eq!(config.git_ref, "main");
    }

    #[test]
    fn test_repo_conflicts_with_git_repo() {
        let result = Cli::try_parse_from([
            "syntegrity",
            "run",
            "go-kit",
            "--repo",
            "go-kit",
            "--git-repo",
            "https://example.com/x.git",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_token_flag_reads_no_environment() {
        let cli = Cli::command();
        let run = cli
            .get_subcommands()
            .find(|c| c.get_name() == "run")
            .expect("run subcommand");
        let token = run
            .get_arguments()
            .find(|a| a.get_id() == "token")
            .expect("token argument");
        assert!(token.get_env().is_none());

        let config = Config::build(parse(&["go-kit", "--token", "glpat-1"]).into_options(false));
        assert_eq!(config.token, "glpat-1");
    }

    #[test]
    fn test_output_format() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
