//! Decides how far past the repository root a crawl looks for manifests.

use crate::analyzer::lockfile::{is_dependency_file, is_ignored_path, is_manifest_file};
use crate::models::RepoEntry;
use crate::providers::repos::TreeItem;

/// Languages whose projects commonly nest build roots below the repository root.
pub const POLYGLOT_LANGUAGES: &[&str] = &["Go", "Java", "Python", "JavaScript", "TypeScript", "Rust"];

const MATRIX_MARKER: &str = "matrix:";

/// Which recursive search, if any, a repository gets after the detail query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepSearch {
    Skip,
    /// Full tree, with Dockerfile and manifest contents.
    Monorepo,
    /// Full tree, dependency paths only.
    ShallowManifests,
}

/// No root Dockerfile, plus a polyglot language, a CI build matrix, or security tooling.
pub fn is_monorepo_candidate(entry: &RepoEntry) -> bool {
    if !entry.dockerfiles().is_empty() {
        return false;
    }
    let polyglot = entry
        .languages
        .keys()
        .any(|lang| POLYGLOT_LANGUAGES.contains(&lang.as_str()));
    let matrix = entry
        .ci_configs
        .iter()
        .any(|ci| ci.content.contains(MATRIX_MARKER));
    polyglot || matrix || entry.security.has_codeql || entry.security.has_dependabot
}

pub fn should_search_deep_for_manifests(entry: &RepoEntry) -> bool {
    entry.dependency_files().is_empty() && !entry.languages.is_empty()
}

/// At most one path is taken; the monorepo check runs first.
pub fn choose_deep_search(entry: &RepoEntry) -> DeepSearch {
    if is_monorepo_candidate(entry) {
        DeepSearch::Monorepo
    } else if should_search_deep_for_manifests(entry) {
        DeepSearch::ShallowManifests
    } else {
        DeepSearch::Skip
    }
}

/// Paths selected from a recursive tree listing.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeepSearchPlan {
    /// Fetched; dropped on failure.
    pub dockerfiles: Vec<String>,
    /// Fetched; kept with empty content on failure.
    pub manifests: Vec<String>,
    pub paths_only: Vec<String>,
}

/// Select nested blobs worth recording. Root entries were already covered by the detail query,
/// and vendored directories never hold first-party manifests.
pub fn plan_deep_search(tree: &[TreeItem], mode: DeepSearch) -> DeepSearchPlan {
    let mut plan = DeepSearchPlan::default();
    if mode == DeepSearch::Skip {
        return plan;
    }

    for item in tree {
        if item.kind != "blob" || item.size.unwrap_or(0) == 0 {
            continue;
        }
        let path = item.path.as_str();
        if !path.contains('/') || is_ignored_path(path) {
            continue;
        }

        if is_dependency_file(path) {
            if mode == DeepSearch::Monorepo && is_manifest_file(path) {
                plan.manifests.push(path.to_string());
            } else {
                plan.paths_only.push(path.to_string());
            }
        } else if mode == DeepSearch::Monorepo && path.to_lowercase().contains("dockerfile") {
            // Any segment may carry the name, as in `deploy/dockerfiles/api`.
            plan.dockerfiles.push(path.to_string());
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileEntry, RepoMeta, CATEGORY_DEPENDENCIES, CATEGORY_DOCKERFILE};

    fn entry() -> RepoEntry {
        RepoEntry::new(RepoMeta::default())
    }

    fn blob(path: &str, size: u64) -> TreeItem {
        TreeItem {
            path: path.to_string(),
            kind: "blob".to_string(),
            size: Some(size),
        }
    }

    #[test]
    fn test_polyglot_without_root_dockerfile_is_monorepo() {
        let mut e = entry();
        e.languages.insert("Go".to_string(), 100);
        assert_eq!(choose_deep_search(&e), DeepSearch::Monorepo);
    }

    #[test]
    fn test_root_dockerfile_blocks_monorepo() {
        let mut e = entry();
        e.languages.insert("Go".to_string(), 100);
        e.add_file(CATEGORY_DOCKERFILE, FileEntry::new("Dockerfile", "FROM golang"));
        assert!(!is_monorepo_candidate(&e));
        // No root manifest yet, so the shallow search still applies.
        assert_eq!(choose_deep_search(&e), DeepSearch::ShallowManifests);
    }

    #[test]
    fn test_ci_matrix_triggers_monorepo() {
        let mut e = entry();
        e.languages.insert("Elixir".to_string(), 10);
        e.ci_configs.push(FileEntry::new(
            ".github/workflows/ci.yml",
            "strategy:\n  matrix:\n    otp: [25, 26]",
        ));
        assert!(is_monorepo_candidate(&e));
    }

    #[test]
    fn test_security_tooling_triggers_monorepo() {
        let mut e = entry();
        e.security.has_dependabot = true;
        assert_eq!(choose_deep_search(&e), DeepSearch::Monorepo);
    }

    #[test]
    fn test_shallow_requires_languages_and_no_root_manifest() {
        let mut e = entry();
        assert_eq!(choose_deep_search(&e), DeepSearch::Skip);

        e.languages.insert("Shell".to_string(), 20);
        assert_eq!(choose_deep_search(&e), DeepSearch::ShallowManifests);

        e.add_file(CATEGORY_DEPENDENCIES, FileEntry::new("go.mod", "module x"));
        assert_eq!(choose_deep_search(&e), DeepSearch::Skip);
    }

    #[test]
    fn test_plan_monorepo() {
        let tree = vec![
            blob("package.json", 10),
            blob("services/api/Dockerfile", 40),
            blob("services/api/go.mod", 30),
            blob("services/api/go.sum", 300),
            blob("web/package.json", 20),
            blob("web/node_modules/left-pad/package.json", 5),
            blob("docs/empty/requirements.txt", 0),
            blob("deploy/dockerfiles/api", 10),
            blob("deploy/dockerfiles/package.json", 12),
            TreeItem {
                path: "services/api".to_string(),
                kind: "tree".to_string(),
                size: None,
            },
        ];
        let plan = plan_deep_search(&tree, DeepSearch::Monorepo);
        assert_eq!(
            plan.dockerfiles,
            vec!["services/api/Dockerfile", "deploy/dockerfiles/api"]
        );
        assert_eq!(
            plan.manifests,
            vec!["services/api/go.mod", "web/package.json", "deploy/dockerfiles/package.json"]
        );
        assert_eq!(plan.paths_only, vec!["services/api/go.sum"]);
    }

    #[test]
    fn test_plan_shallow_is_paths_only() {
        let tree = vec![
            blob("services/api/Dockerfile", 40),
            blob("services/api/go.mod", 30),
            blob("services/api/go.sum", 300),
        ];
        let plan = plan_deep_search(&tree, DeepSearch::ShallowManifests);
        assert!(plan.dockerfiles.is_empty());
        assert!(plan.manifests.is_empty());
        assert_eq!(plan.paths_only, vec!["services/api/go.mod", "services/api/go.sum"]);
    }

    #[test]
    fn test_plan_skip_is_empty() {
        let plan = plan_deep_search(&[blob("a/go.mod", 1)], DeepSearch::Skip);
        assert_eq!(plan, DeepSearchPlan::default());
    }
}
