use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Settings for one crawl run.
///
/// Loaded from an optional TOML file, then overridden by environment
/// variables, then by CLI flags.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub org: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub github_app: Option<GitHubAppConfig>,
    /// Maximum number of repositories fetched and imported at once.
    pub parallelism: usize,
    pub debug: bool,
    /// Number of repositories processed before a debug run stops listing.
    pub debug_repo_cap: usize,
    pub skip_archived: bool,
    pub sbom: bool,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub max_rate_limit_retries: u32,
    pub max_rate_limit_wait_secs: u64,
}

/// GitHub App credentials for the installation-token flow.
#[derive(Clone, Serialize, Deserialize)]
pub struct GitHubAppConfig {
    pub app_id: u64,
    pub installation_id: u64,
    #[serde(default, skip_serializing)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            org: String::new(),
            token: None,
            github_app: None,
            parallelism: 1,
            debug: false,
            debug_repo_cap: 10,
            skip_archived: true,
            sbom: false,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
            max_rate_limit_retries: 5,
            max_rate_limit_wait_secs: 3900,
        }
    }
}

impl fmt::Debug for CrawlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlConfig")
            .field("org", &self.org)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("github_app", &self.github_app)
            .field("parallelism", &self.parallelism)
            .field("debug", &self.debug)
            .field("debug_repo_cap", &self.debug_repo_cap)
            .field("skip_archived", &self.skip_archived)
            .field("sbom", &self.sbom)
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .field("max_rate_limit_wait_secs", &self.max_rate_limit_wait_secs)
            .finish()
    }
}

impl fmt::Debug for GitHubAppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubAppConfig")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("private_key_path", &self.private_key_path)
            .finish()
    }
}

impl CrawlConfig {
    /// Load from a TOML file and apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides read through `lookup`, keyed by environment variable name.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(org) = lookup("GITHUB_ORG").filter(|v| !v.is_empty()) {
            self.org = org;
        }
        if let Some(token) = lookup("GITHUB_TOKEN").filter(|v| !v.is_empty()) {
            self.token = Some(token);
        }
        if let Some(v) = lookup("REPOCENSUS_DEBUG") {
            self.debug = v == "true";
        }
        if let Some(v) = lookup("REPOCENSUS_INCLUDE_ARCHIVED") {
            self.skip_archived = v != "true";
        }
        if let Some(v) = lookup("REPOCENSUS_SBOM") {
            self.sbom = v == "true";
        }
        if let Some(v) = lookup("REPOCENSUS_PARALLELISM") {
            match v.parse::<usize>() {
                Ok(n) if n > 0 => self.parallelism = n,
                _ => warn!(
                    env_key = "REPOCENSUS_PARALLELISM",
                    value = v.as_str(),
                    "expected a positive integer, keeping {}",
                    self.parallelism
                ),
            }
        }

        let app_id = lookup("GITHUB_APP_ID").and_then(|v| parse_id("GITHUB_APP_ID", &v));
        let installation_id = lookup("GITHUB_APP_INSTALLATION_ID")
            .and_then(|v| parse_id("GITHUB_APP_INSTALLATION_ID", &v));
        if let (Some(app_id), Some(installation_id)) = (app_id, installation_id) {
            let mut app = self.github_app.take().unwrap_or(GitHubAppConfig {
                app_id,
                installation_id,
                private_key: None,
                private_key_path: None,
            });
            app.app_id = app_id;
            app.installation_id = installation_id;
            if let Some(key) = lookup("GITHUB_APP_PRIVATE_KEY").filter(|v| !v.is_empty()) {
                app.private_key = Some(key);
            }
            if let Some(path) = lookup("GITHUB_APP_PRIVATE_KEY_PATH").filter(|v| !v.is_empty()) {
                app.private_key_path = Some(PathBuf::from(path));
            }
            self.github_app = Some(app);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.org.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "org".to_string(),
            });
        }
        if self.parallelism == 0 {
            return Err(ConfigError::Invalid {
                field: "parallelism".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        match &self.github_app {
            Some(app) => {
                if app.private_key.is_none() && app.private_key_path.is_none() {
                    return Err(ConfigError::Missing {
                        field: "github_app.private_key".to_string(),
                    });
                }
            }
            None => {
                if self.token.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::Missing {
                        field: "token".to_string(),
                    });
                }
            }
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api_base_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_rate_limit_wait(&self) -> Duration {
        Duration::from_secs(self.max_rate_limit_wait_secs)
    }

    /// Repository cap for debug runs, `None` outside debug mode.
    pub fn repo_cap(&self) -> Option<usize> {
        self.debug.then_some(self.debug_repo_cap)
    }
}

impl GitHubAppConfig {
    /// PEM-encoded private key, inline or read from `private_key_path`.
    pub fn private_key_pem(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.private_key {
            return Ok(key.clone());
        }
        match &self.private_key_path {
            Some(path) => Ok(std::fs::read_to_string(path)?),
            None => Err(ConfigError::Missing {
                field: "github_app.private_key".to_string(),
            }),
        }
    }
}

fn parse_id(env_key: &str, value: &str) -> Option<u64> {
    match value.trim().parse::<u64>() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(env_key, value, "failed to parse numeric id, ignoring");
            None
        }
    }
}
