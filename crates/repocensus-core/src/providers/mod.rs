pub mod auth;
pub mod github_api;
pub mod graphql;
pub mod repos;

pub use auth::{Credentials, GitHubAppAuth};
pub use github_api::{ApiCallCounter, RateLimitedClient};
pub use repos::GitHubRepoSource;
