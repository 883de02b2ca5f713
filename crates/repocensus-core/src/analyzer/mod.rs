pub mod dockerfile;
pub mod lockfile;
pub mod report;

use crate::models::{FileEntry, RepoEntry};
use crate::parser;
use report::{DockerfileReport, RepoInventory};
use std::collections::BTreeMap;

/// Run every static analyzer over a crawled repository.
pub fn analyze(entry: &RepoEntry) -> RepoInventory {
    analyze_files(entry.dependency_files(), entry.dockerfiles(), entry.sbom.as_ref())
}

/// Run the analyzers over loose files. Path-only dependency entries are skipped.
pub fn analyze_files(
    dependency_files: &[FileEntry],
    dockerfiles: &[FileEntry],
    sbom: Option<&serde_json::Value>,
) -> RepoInventory {
    let manifests: BTreeMap<String, Vec<u8>> = dependency_files
        .iter()
        .filter(|f| !f.content.is_empty())
        .map(|f| (f.path.clone(), f.content.as_bytes().to_vec()))
        .collect();

    let dockerfiles = dockerfiles
        .iter()
        .map(|f| DockerfileReport {
            path: f.path.clone(),
            analysis: dockerfile::analyze_dockerfile(&f.content),
        })
        .collect();

    RepoInventory {
        dependencies: parser::parse_repository(&manifests),
        dockerfiles,
        sbom_packages: sbom.map(crate::sbom::extract_packages).unwrap_or_default(),
    }
}
