// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Known repositories
//!
//! The bundled table is frozen after first use. Callers that need extra
//! entries build their own [`RepoTable`] with [`RepoTable::register`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// HTTPS and SSH URLs of one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoDescriptor {
    pub https: String,
    pub ssh: String,
}

impl RepoDescriptor {
    /// Descriptor for a project under the syntegrity GitLab group
    pub fn syntegrity(name: &str) -> Self {
        Self {
            https: format!("https://gitlab.com/syntegrity/{}.git", name),
            ssh: format!("git@gitlab.com:syntegrity/{}.git", name),
        }
    }

    /// URL for `protocol`; only the exact strings `ssh` and `https` match
    pub fn url(&self, protocol: &str) -> Option<&str> {
        match protocol {
            "ssh" => Some(&self.ssh),
            "https" => Some(&self.https),
            _ => None,
        }
    }
}

/// Name to descriptor mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoTable {
    repos: BTreeMap<String, RepoDescriptor>,
}

static BUILTIN: LazyLock<RepoTable> = LazyLock::new(|| {
    RepoTable::default()
        .register("go-kit", RepoDescriptor::syntegrity("go-kit"))
        .register("docker-go", RepoDescriptor::syntegrity("docker-go"))
});

impl RepoTable {
    /// The bundled, read-only table
    pub fn builtin() -> &'static RepoTable {
        &BUILTIN
    }

    /// Return a table with `name` added or replaced
    pub fn register(mut self, name: impl Into<String>, descriptor: RepoDescriptor) -> Self {
        self.repos.insert(name.into(), descriptor);
        self
    }

    /// Copy of the descriptor for `name`
    pub fn get(&self, name: &str) -> Option<RepoDescriptor> {
        self.repos.get(name).cloned()
    }

    pub fn url(&self, name: &str, protocol: &str) -> Option<&str> {
        self.repos.get(name).and_then(|d| d.url(protocol))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.repos.keys().map(String::as_str)
    }
}

/// Look up a bundled repository URL; `None` for unknown names or protocols
pub fn get_repo_url(name: &str, protocol: &str) -> Option<&'static str> {
    RepoTable::builtin().url(name, protocol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_urls() {
        assert_eq!(
            get_repo_url("go-kit", "https"),
            Some("https://gitlab.com/syntegrity/go-kit.git")
        );
        assert_eq!(
            get_repo_url("go-kit", "ssh"),
            Some("git@gitlab.com:syntegrity/go-kit.git")
        );
        assert_eq!(
            get_repo_url("docker-go", "ssh"),
            Some("git@gitlab.com:syntegrity/docker-go.git")
        );
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        for protocol in ["", "HTTPS", "SSH", "ftp"] {
            assert_eq!(get_repo_url("go-kit", protocol), None, "protocol {:?}", protocol);
        }
        assert_eq!(get_repo_url("Go-Kit", "https"), None);
        assert_eq!(get_repo_url("unknown", "https"), None);
    }

    #[test]
    fn test_mutating_a_copy_leaves_table_alone() {
        let mut copy = RepoTable::builtin().get("go-kit").unwrap();
        copy.https = "https://example.com/fork.git".into();

        let shadow = RepoTable::builtin().clone().register("go-kit", copy);
        assert_eq!(
            shadow.url("go-kit", "https"),
            Some("https://example.com/fork.git")
        );
        assert_eq!(
            get_repo_url("go-kit", "https"),
            Some("https://gitlab.com/syntegrity/go-kit.git")
        );
    }
}
