pub mod analyzer;
pub mod config;
pub mod crawl;
pub mod discovery;
pub mod error;
pub mod models;
pub mod parser;
pub mod providers;
pub mod sbom;

pub use analyzer::report::{DockerfileReport, RepoInventory};
pub use config::CrawlConfig;
pub use crawl::sink::{ImportSink, JsonLinesSink};
pub use crawl::{CrawlOptions, CrawlSummary, Orchestrator, RepoSource};
pub use error::{ApiError, ConfigError, CrawlError};
pub use models::{FileEntry, LockfilePairing, RepoEntry, RepoMeta};
pub use parser::{Dependency, EcosystemType};
pub use providers::{ApiCallCounter, GitHubRepoSource, RateLimitedClient};
