use crate::analyzer::lockfile::is_dependency_file;
use crate::models::{FileEntry, RepoEntry, SecurityFlags, CATEGORY_DEPENDENCIES, CATEGORY_DOCKERFILE};
use serde::{Deserialize, Serialize};

/// Single round trip for everything the crawl needs from the default branch.
pub const REPO_DETAIL_QUERY: &str = r#"
query RepoDetail($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    defaultBranchRef { name }
    README: object(expression: "HEAD:README.md") { ... on Blob { text } }
    SECURITY: object(expression: "HEAD:SECURITY.md") { ... on Blob { text } }
    dependabot: object(expression: "HEAD:.github/dependabot.yml") { ... on Blob { text } }
    codeql: object(expression: "HEAD:.github/codeql.yml") { ... on Blob { text } }
    workflows: object(expression: "HEAD:.github/workflows") {
      ... on Tree { entries { name object { ... on Blob { text } } } }
    }
    dependencies: object(expression: "HEAD:") {
      ... on Tree { entries { name object { ... on Blob { text } } } }
    }
    languages(first: 10) { edges { size node { name } } }
  }
}
"#;

#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a> {
    pub query: &'a str,
    pub variables: RepoVariables<'a>,
}

#[derive(Debug, Serialize)]
pub struct RepoVariables<'a> {
    pub owner: &'a str,
    pub name: &'a str,
}

impl<'a> GraphQlRequest<'a> {
    pub fn repo_detail(owner: &'a str, name: &'a str) -> Self {
        Self {
            query: REPO_DETAIL_QUERY,
            variables: RepoVariables { owner, name },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<RepoData>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepoData {
    #[serde(default)]
    pub repository: Option<RepositoryNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryNode {
    #[serde(default)]
    pub default_branch_ref: Option<BranchRef>,
    #[serde(default, rename = "README")]
    pub readme: Option<BlobNode>,
    #[serde(default, rename = "SECURITY")]
    pub security: Option<BlobNode>,
    #[serde(default)]
    pub dependabot: Option<BlobNode>,
    #[serde(default)]
    pub codeql: Option<BlobNode>,
    #[serde(default)]
    pub workflows: Option<TreeNode>,
    #[serde(default)]
    pub dependencies: Option<TreeNode>,
    #[serde(default)]
    pub languages: Option<LanguageConnection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchRef {
    pub name: String,
}

/// A git object fragment. `text` is absent for binary blobs and non-blob objects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlobNode {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub entries: Vec<TreeEntryNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntryNode {
    pub name: String,
    #[serde(default)]
    pub object: Option<BlobNode>,
}

impl TreeEntryNode {
    fn text(&self) -> &str {
        self.object
            .as_ref()
            .and_then(|o| o.text.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanguageConnection {
    #[serde(default)]
    pub edges: Vec<LanguageEdge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageEdge {
    #[serde(default)]
    pub size: u64,
    pub node: Option<LanguageNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageNode {
    #[serde(default)]
    pub name: String,
}

impl RepositoryNode {
    /// Copy the queried fields into `entry`.
    pub fn apply_to(&self, entry: &mut RepoEntry) {
        entry.default_branch = self.default_branch_ref.as_ref().map(|b| b.name.clone());
        entry.readme = self
            .readme
            .as_ref()
            .and_then(|b| b.text.clone())
            .unwrap_or_default();
        entry.security = SecurityFlags {
            has_security_md: self.security.is_some(),
            has_dependabot: self.dependabot.is_some(),
            has_codeql: self.codeql.is_some(),
        };

        if let Some(languages) = &self.languages {
            for edge in &languages.edges {
                let Some(node) = &edge.node else { continue };
                if !node.name.is_empty() && edge.size > 0 {
                    entry.languages.insert(node.name.clone(), edge.size);
                }
            }
        }

        if let Some(workflows) = &self.workflows {
            entry.ci_configs.extend(
                workflows
                    .entries
                    .iter()
                    .filter(|e| !e.text().is_empty())
                    .map(|e| FileEntry::new(format!(".github/workflows/{}", e.name), e.text())),
            );
        }

        if let Some(root) = &self.dependencies {
            for item in &root.entries {
                if item.name.to_lowercase().contains("dockerfile") {
                    if !item.text().is_empty() {
                        entry.add_file(CATEGORY_DOCKERFILE, FileEntry::new(&item.name, item.text()));
                    }
                } else if is_dependency_file(&item.name) {
                    // Lockfiles may be binary or too large for inline text; the path still matters.
                    entry.add_file(CATEGORY_DEPENDENCIES, FileEntry::new(&item.name, item.text()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepoMeta;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "data": {
                "repository": {
                    "defaultBranchRef": {"name": "main"},
                    "README": {"text": "# API"},
                    "SECURITY": {"text": "report to security@acme.test"},
                    "dependabot": null,
                    "codeql": null,
                    "workflows": {
                        "entries": [
                            {"name": "ci.yml", "object": {"text": "jobs:\n  test:\n    strategy:\n      matrix:\n        go: [1.21]"}},
                            {"name": "empty.yml", "object": {"text": ""}}
                        ]
                    },
                    "dependencies": {
                        "entries": [
                            {"name": "Dockerfile", "object": {"text": "FROM golang:1.21"}},
                            {"name": "go.mod", "object": {"text": "module x"}},
                            {"name": "bun.lockb", "object": {"text": null}},
                            {"name": "src", "object": {}},
                            {"name": "README.md", "object": {"text": "# API"}}
                        ]
                    },
                    "languages": {
                        "edges": [
                            {"size": 1200, "node": {"name": "Go"}},
                            {"size": 0, "node": {"name": "Shell"}},
                            {"size": 50, "node": {"name": ""}}
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn test_decode_and_apply() {
        let response: GraphQlResponse = serde_json::from_value(sample()).unwrap();
        let node = response.data.unwrap().repository.unwrap();
        let mut entry = RepoEntry::new(RepoMeta::default());
        node.apply_to(&mut entry);

        assert_eq!(entry.default_branch.as_deref(), Some("main"));
        assert_eq!(entry.readme, "# API");
        assert!(entry.security.has_security_md);
        assert!(!entry.security.has_dependabot);
        assert_eq!(entry.languages.len(), 1);
        assert_eq!(entry.languages["Go"], 1200);
        assert_eq!(entry.ci_configs.len(), 1);
        assert_eq!(entry.ci_configs[0].path, ".github/workflows/ci.yml");
        assert_eq!(entry.dockerfiles().len(), 1);
        let deps: Vec<&str> = entry.dependency_files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(deps, vec!["go.mod", "bun.lockb"]);
    }

    #[test]
    fn test_missing_repository_and_errors() {
        let response: GraphQlResponse = serde_json::from_value(json!({
            "data": {"repository": null},
            "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to a Repository"}]
        }))
        .unwrap();
        assert!(response.data.unwrap().repository.is_none());
        assert_eq!(response.errors[0].kind.as_deref(), Some("NOT_FOUND"));
    }

    #[test]
    fn test_request_uses_variables() {
        let body = serde_json::to_value(GraphQlRequest::repo_detail("acme", "api")).unwrap();
        assert_eq!(body["variables"]["owner"], "acme");
        assert_eq!(body["variables"]["name"], "api");
        assert!(body["query"].as_str().unwrap().contains("languages(first: 10)"));
    }
}
