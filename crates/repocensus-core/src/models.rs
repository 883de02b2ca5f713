use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File category holding Dockerfiles found at the root or during deep search.
pub const CATEGORY_DOCKERFILE: &str = "dockerfile";
/// File category holding dependency manifests and lockfiles.
pub const CATEGORY_DEPENDENCIES: &str = "dependencies";

/// Catalog metadata for one repository, as returned by the org listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoMeta {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub language: Option<String>,
    /// Repository size in KB.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub pushed_at: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub license: Option<License>,
}

impl RepoMeta {
    /// Owner login derived from `full_name`.
    pub fn owner(&self) -> &str {
        self.full_name
            .split_once('/')
            .map(|(owner, _)| owner)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub spdx_id: Option<String>,
}

/// One fetched file. `content` is empty when only the path was recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn path_only(path: impl Into<String>) -> Self {
        Self::new(path, String::new())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityFlags {
    pub has_security_md: bool,
    pub has_dependabot: bool,
    pub has_codeql: bool,
}

/// Association between a manifest and the lockfile found next to it.
/// An empty `lockfile_path` means no lockfile exists in that directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockfilePairing {
    pub ecosystem: String,
    pub manifest_path: String,
    pub lockfile_path: String,
}

/// Full analysis record for one repository, assembled during a single crawl pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoEntry {
    pub repo: RepoMeta,
    pub default_branch: Option<String>,
    /// Language name to byte count.
    pub languages: BTreeMap<String, u64>,
    /// Category to files, see [`CATEGORY_DOCKERFILE`] and [`CATEGORY_DEPENDENCIES`].
    pub files: BTreeMap<String, Vec<FileEntry>>,
    pub ci_configs: Vec<FileEntry>,
    pub sbom: Option<serde_json::Value>,
    pub readme: String,
    pub security: SecurityFlags,
    pub lockfile_pairings: Vec<LockfilePairing>,
    pub has_complete_lockfiles: bool,
}

impl RepoEntry {
    pub fn new(repo: RepoMeta) -> Self {
        Self {
            repo,
            ..Default::default()
        }
    }

    pub fn add_file(&mut self, category: &str, file: FileEntry) {
        self.files.entry(category.to_string()).or_default().push(file);
    }

    pub fn files_in(&self, category: &str) -> &[FileEntry] {
        self.files.get(category).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn dockerfiles(&self) -> &[FileEntry] {
        self.files_in(CATEGORY_DOCKERFILE)
    }

    pub fn dependency_files(&self) -> &[FileEntry] {
        self.files_in(CATEGORY_DEPENDENCIES)
    }

    /// Every known file path across all categories, in insertion order.
    pub fn all_file_paths(&self) -> Vec<String> {
        self.files
            .values()
            .flatten()
            .map(|f| f.path.clone())
            .collect()
    }
}
