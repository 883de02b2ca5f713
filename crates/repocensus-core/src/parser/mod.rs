pub mod cargo;
pub mod composer;
pub mod gemfile;
pub mod gomod;
pub mod gradle;
pub mod gradle_kts;
pub mod maven;
pub mod npm;
pub mod pip;
pub mod pnpm;
pub mod pyproject;
pub mod yarn;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Marker for a version that references a variable which could not be resolved.
pub const UNPARSED_VERSION: &str = "unparsed-version";

/// Package ecosystem that produced a dependency. Each variant maps to one parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EcosystemType {
    Npm,
    Go,
    Maven,
    Gradle,
    GradleKts,
    Gem,
    Cargo,
    Pip,
    Pyproject,
    Pnpm,
    Composer,
    Yarn,
}

impl EcosystemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Go => "go",
            Self::Maven => "maven",
            Self::Gradle => "gradle",
            Self::GradleKts => "gradle-kts",
            Self::Gem => "gem",
            Self::Cargo => "cargo",
            Self::Pip => "pip",
            Self::Pyproject => "pyproject",
            Self::Pnpm => "pnpm",
            Self::Composer => "composer",
            Self::Yarn => "yarn",
        }
    }
}

impl fmt::Display for EcosystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// Namespace (npm scope, Maven groupId, Go module prefix); empty when the ecosystem has none.
    pub group: String,
    pub version: String,
    pub ecosystem: EcosystemType,
    pub source_path: String,
}

impl Dependency {
    pub fn new(
        ecosystem: EcosystemType,
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        source_path: &str,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            version: version.into(),
            ecosystem,
            source_path: source_path.to_string(),
        }
    }
}

pub type ParseFileFn = fn(&str, &[u8]) -> Result<Vec<Dependency>>;
pub type ParseRepoFn = fn(&BTreeMap<String, Vec<u8>>) -> Result<Vec<Dependency>>;

/// One registered manifest parser.
///
/// `parse_repo` is only set for ecosystems whose files reference each other
/// (Maven properties); everything else is parsed file by file.
#[derive(Clone, Copy)]
pub struct ParserDescriptor {
    pub ecosystem: EcosystemType,
    pub can_parse: fn(&str) -> bool,
    pub parse_file: ParseFileFn,
    pub parse_repo: Option<ParseRepoFn>,
}

impl fmt::Debug for ParserDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserDescriptor")
            .field("ecosystem", &self.ecosystem)
            .field("repo_level", &self.parse_repo.is_some())
            .finish()
    }
}

/// Registry in dispatch order.
pub const PARSERS: &[ParserDescriptor] = &[
    npm::DESCRIPTOR,
    gomod::DESCRIPTOR,
    maven::DESCRIPTOR,
    gradle::DESCRIPTOR,
    gradle_kts::DESCRIPTOR,
    gemfile::DESCRIPTOR,
    cargo::DESCRIPTOR,
    pip::DESCRIPTOR,
    pyproject::DESCRIPTOR,
    pnpm::DESCRIPTOR,
    composer::DESCRIPTOR,
    yarn::DESCRIPTOR,
];

/// Find the parser for a single file path.
pub fn parser_for(path: &str) -> Option<&'static ParserDescriptor> {
    PARSERS.iter().find(|p| (p.can_parse)(path))
}

/// Parse every file in `files` that some registered parser claims.
///
/// Per parser, the repo-level method runs first when present; if it fails the
/// files are parsed individually and any file that fails is skipped.
pub fn parse_repository(files: &BTreeMap<String, Vec<u8>>) -> Vec<Dependency> {
    let mut deps = Vec::new();

    for parser in PARSERS {
        let matched: BTreeMap<String, Vec<u8>> = files
            .iter()
            .filter(|(path, _)| (parser.can_parse)(path))
            .map(|(path, content)| (path.clone(), content.clone()))
            .collect();
        if matched.is_empty() {
            continue;
        }

        if let Some(parse_repo) = parser.parse_repo {
            match parse_repo(&matched) {
                Ok(found) => {
                    deps.extend(found);
                    continue;
                }
                Err(e) => debug!(
                    ecosystem = %parser.ecosystem,
                    error = %e,
                    "repo-level parse failed, falling back to per-file parsing"
                ),
            }
        }

        for (path, content) in &matched {
            match (parser.parse_file)(path, content) {
                Ok(found) => deps.extend(found),
                Err(e) => warn!(
                    ecosystem = %parser.ecosystem,
                    path = path.as_str(),
                    error = %e,
                    "skipping unparseable manifest"
                ),
            }
        }
    }

    deps
}

/// Base filename of a `/`-separated repository path.
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Replace every reference captured by `pattern` (group 1 holds the key) with its
/// value. Any reference missing from `vars`, or an empty result, yields
/// [`UNPARSED_VERSION`].
pub(crate) fn interpolate(
    raw: &str,
    pattern: &Regex,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    let mut resolved = String::with_capacity(raw.len());
    let mut last = 0;

    for caps in pattern.captures_iter(raw) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        match lookup(key.as_str()) {
            Some(value) => {
                resolved.push_str(&raw[last..whole.start()]);
                resolved.push_str(&value);
                last = whole.end();
            }
            None => return UNPARSED_VERSION.to_string(),
        }
    }
    resolved.push_str(&raw[last..]);

    if resolved.trim().is_empty() {
        UNPARSED_VERSION.to_string()
    } else {
        resolved
    }
}
