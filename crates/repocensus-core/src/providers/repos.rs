use crate::analyzer::lockfile::{detect_lockfile_pairings, has_complete_lockfiles};
use crate::crawl::heuristics::{choose_deep_search, plan_deep_search, DeepSearch};
use crate::crawl::RepoSource;
use crate::error::ApiError;
use crate::models::{FileEntry, RepoEntry, RepoMeta, CATEGORY_DEPENDENCIES, CATEGORY_DOCKERFILE};
use crate::providers::github_api::RateLimitedClient;
use crate::providers::graphql::{GraphQlRequest, GraphQlResponse};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Method, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

const PER_PAGE: u32 = 100;

/// One entry of a recursive git tree listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeItem {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

/// Repository source backed by the GitHub REST and GraphQL APIs.
pub struct GitHubRepoSource {
    client: RateLimitedClient,
    org: String,
    fetch_sbom: bool,
}

impl GitHubRepoSource {
    pub fn new(client: RateLimitedClient, org: impl Into<String>, fetch_sbom: bool) -> Self {
        Self {
            client,
            org: org.into(),
            fetch_sbom,
        }
    }

    pub fn client(&self) -> &RateLimitedClient {
        &self.client
    }

    /// One page of the organization's repositories, 100 per page, 1-based.
    pub async fn repos_page(&self, page: u32) -> Result<Vec<RepoMeta>, ApiError> {
        let url = self.client.url(&format!(
            "/orgs/{}/repos?per_page={}&type=all&page={}",
            self.org, PER_PAGE, page
        ));
        self.client.request(Method::GET, &url, None).await
    }

    /// Every repository of the organization, in listing order.
    pub async fn list_all(&self) -> Result<Vec<RepoMeta>, ApiError> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let repos = self.repos_page(page).await?;
            if repos.is_empty() {
                break;
            }
            debug!(page, count = repos.len(), "fetched repository page");
            all.extend(repos);
            page += 1;
        }
        Ok(all)
    }

    /// Query-based detail fetch. `Ok(None)` when the response has no repository node.
    pub async fn fetch_detail(&self, meta: &RepoMeta) -> Result<Option<RepoEntry>, ApiError> {
        let url = self.client.url("/graphql");
        let body = serde_json::to_value(GraphQlRequest::repo_detail(meta.owner(), &meta.name))
            .map_err(|source| ApiError::Decode {
                url: url.clone(),
                source,
            })?;
        let response: GraphQlResponse = self.client.request(Method::POST, &url, Some(&body)).await?;

        for error in &response.errors {
            warn!(
                repo = %meta.full_name,
                kind = error.kind.as_deref().unwrap_or("unknown"),
                message = %error.message,
                "GraphQL response contained errors"
            );
        }

        let Some(node) = response.data.and_then(|d| d.repository) else {
            return Ok(None);
        };
        let mut entry = RepoEntry::new(meta.clone());
        node.apply_to(&mut entry);
        Ok(Some(entry))
    }

    /// Dependency-graph SBOM. Absence and failures both yield `None`.
    pub async fn fetch_sbom(&self, meta: &RepoMeta) -> Option<serde_json::Value> {
        let url = self
            .client
            .url(&format!("/repos/{}/dependency-graph/sbom", meta.full_name));
        match self.client.request_optional(Method::GET, &url, None).await {
            Ok(found) => found,
            Err(e) => {
                warn!(repo = %meta.full_name, error = %e, "SBOM fetch failed");
                None
            }
        }
    }

    pub async fn fetch_tree(&self, meta: &RepoMeta) -> Result<Vec<TreeItem>, ApiError> {
        let url = self
            .client
            .url(&format!("/repos/{}/git/trees/HEAD?recursive=1", meta.full_name));
        let response: TreeResponse = self.client.request(Method::GET, &url, None).await?;
        if response.truncated {
            warn!(
                repo = %meta.full_name,
                entries = response.tree.len(),
                "recursive tree listing was truncated"
            );
        }
        Ok(response.tree)
    }

    /// File content at `path` on the default branch, base64-decoded when needed.
    pub async fn fetch_content(&self, meta: &RepoMeta, path: &str) -> Result<String, ApiError> {
        let url = self.contents_url(meta, path)?;
        let response: ContentResponse = self.client.request(Method::GET, &url, None).await?;
        decode_content(&response).map_err(|reason| ApiError::Content { url, reason })
    }

    fn contents_url(&self, meta: &RepoMeta, path: &str) -> Result<String, ApiError> {
        let base = self
            .client
            .url(&format!("/repos/{}/contents/", meta.full_name));
        let mut url = Url::parse(&base).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(base.clone()))?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url.to_string())
    }

    async fn deep_search(&self, entry: &mut RepoEntry, mode: DeepSearch) {
        let meta = entry.repo.clone();
        let tree = match self.fetch_tree(&meta).await {
            Ok(tree) => tree,
            Err(e) => {
                warn!(repo = %meta.full_name, error = %e, "tree fetch failed, keeping root-level files only");
                return;
            }
        };

        let plan = plan_deep_search(&tree, mode);
        info!(
            repo = %meta.full_name,
            mode = ?mode,
            dockerfiles = plan.dockerfiles.len(),
            manifests = plan.manifests.len(),
            paths_only = plan.paths_only.len(),
            "deep search"
        );

        for path in plan.dockerfiles {
            match self.fetch_content(&meta, &path).await {
                Ok(content) if !content.is_empty() => {
                    entry.add_file(CATEGORY_DOCKERFILE, FileEntry::new(path, content));
                }
                Ok(_) => {}
                Err(e) => warn!(repo = %meta.full_name, path = %path, error = %e, "Dockerfile fetch failed"),
            }
        }

        for path in plan.manifests {
            let content = match self.fetch_content(&meta, &path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(repo = %meta.full_name, path = %path, error = %e, "manifest fetch failed, keeping path");
                    String::new()
                }
            };
            entry.add_file(CATEGORY_DEPENDENCIES, FileEntry::new(path, content));
        }

        for path in plan.paths_only {
            entry.add_file(CATEGORY_DEPENDENCIES, FileEntry::path_only(path));
        }
    }
}

#[async_trait]
impl RepoSource for GitHubRepoSource {
    async fn list_page(&self, page: u32) -> Result<Vec<RepoMeta>, ApiError> {
        self.repos_page(page).await
    }

    async fn fetch_repo(&self, meta: &RepoMeta) -> Result<Option<RepoEntry>, ApiError> {
        let Some(mut entry) = self.fetch_detail(meta).await? else {
            return Ok(None);
        };

        if self.fetch_sbom {
            entry.sbom = self.fetch_sbom(meta).await;
        }

        let mode = choose_deep_search(&entry);
        if mode != DeepSearch::Skip {
            self.deep_search(&mut entry, mode).await;
        }

        entry.lockfile_pairings = detect_lockfile_pairings(&entry.all_file_paths());
        entry.has_complete_lockfiles = has_complete_lockfiles(&entry.lockfile_pairings);
        Ok(Some(entry))
    }
}

fn decode_content(response: &ContentResponse) -> Result<String, String> {
    match response.encoding.as_deref() {
        Some("base64") => {
            let compact: String = response
                .content
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map_err(|e| format!("invalid base64 content: {}", e))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Ok(response.content.clone()),
    }
}
