//! Bounded-concurrency crawl over an organization's repositories.
//!
//! Listing pages are fetched in order. Each repository then runs as one unit
//! (detail fetch, deep search, import) holding a semaphore permit. Fetch
//! failures skip the repository; the first import failure cancels the run and
//! is returned once every outstanding unit has finished.

pub mod heuristics;
pub mod sink;

use crate::config::CrawlConfig;
use crate::error::{ApiError, CrawlError};
use crate::models::{RepoEntry, RepoMeta};
use crate::providers::github_api::ApiCallCounter;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use sink::ImportSink;

/// Imports between progress checkpoints.
pub const CHECKPOINT_INTERVAL: u64 = 25;

/// Where repositories come from.
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// One 1-based listing page. An empty page ends the listing.
    async fn list_page(&self, page: u32) -> Result<Vec<RepoMeta>, ApiError>;

    /// Detail for one repository. `Ok(None)` means the repository has vanished or is inaccessible.
    async fn fetch_repo(&self, meta: &RepoMeta) -> Result<Option<RepoEntry>, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlOptions {
    pub parallelism: usize,
    pub skip_archived: bool,
    /// Stop listing once this many repositories were dispatched.
    pub repo_cap: Option<usize>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            parallelism: 1,
            skip_archived: true,
            repo_cap: None,
        }
    }
}

impl From<&CrawlConfig> for CrawlOptions {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            parallelism: config.parallelism.max(1),
            skip_archived: config.skip_archived,
            repo_cap: config.repo_cap(),
        }
    }
}

/// Outcome counts of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrawlSummary {
    pub pages: u32,
    pub listed: usize,
    pub dispatched: usize,
    pub skipped_archived: usize,
    pub skipped_missing: usize,
    pub fetch_failures: usize,
    pub imported: u64,
    pub api_calls: u64,
    pub capped: bool,
    pub cancelled: bool,
    pub duration_secs: f64,
}

#[derive(Debug, Default)]
struct UnitStats {
    skipped_missing: AtomicUsize,
    fetch_failures: AtomicUsize,
    imported: AtomicU64,
}

pub struct Orchestrator<S, K> {
    source: Arc<S>,
    sink: Arc<K>,
    options: CrawlOptions,
    counter: Arc<ApiCallCounter>,
    cancel: CancellationToken,
}

impl<S, K> Orchestrator<S, K>
where
    S: RepoSource + 'static,
    K: ImportSink + 'static,
{
    pub fn new(
        source: Arc<S>,
        sink: Arc<K>,
        options: CrawlOptions,
        counter: Arc<ApiCallCounter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            sink,
            options,
            counter,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Crawl every listed repository.
    ///
    /// Returns the first import error, or the listing error that ended the run,
    /// only after all dispatched units have completed.
    pub async fn run(&self) -> Result<CrawlSummary, CrawlError> {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.options.parallelism.max(1)));
        let sequence = Arc::new(AtomicU64::new(0));
        let stats = Arc::new(UnitStats::default());
        let mut units: JoinSet<Result<(), CrawlError>> = JoinSet::new();
        let mut first_error: Option<CrawlError> = None;
        let mut listing_error: Option<CrawlError> = None;
        let mut summary = CrawlSummary::default();

        let mut page = 1u32;
        'listing: loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let repos = match self.source.list_page(page).await {
                Ok(repos) => repos,
                Err(ApiError::Cancelled) => break,
                Err(source) => {
                    listing_error = Some(CrawlError::Listing { page, source });
                    break;
                }
            };
            if repos.is_empty() {
                break;
            }
            summary.pages = page;
            summary.listed += repos.len();
            info!(page, count = repos.len(), api_calls = self.counter.get(), "listed repositories");

            for meta in repos {
                if self.options.skip_archived && meta.archived {
                    debug!(repo = %meta.full_name, "skipping archived repository");
                    summary.skipped_archived += 1;
                    continue;
                }
                if let Some(cap) = self.options.repo_cap {
                    if summary.dispatched >= cap {
                        info!(cap, "debug repository cap reached, stopping listing");
                        summary.capped = true;
                        break 'listing;
                    }
                }

                let permit = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
                };
                let Some(permit) = permit else {
                    break 'listing;
                };

                summary.dispatched += 1;
                let unit = Unit {
                    source: Arc::clone(&self.source),
                    sink: Arc::clone(&self.sink),
                    counter: Arc::clone(&self.counter),
                    cancel: self.cancel.clone(),
                    sequence: Arc::clone(&sequence),
                    stats: Arc::clone(&stats),
                };
                units.spawn(async move {
                    let _permit = permit;
                    unit.process(meta).await
                });

                while let Some(joined) = units.try_join_next() {
                    record_outcome(joined, &mut first_error);
                }
            }
            page += 1;
        }

        while let Some(joined) = units.join_next().await {
            record_outcome(joined, &mut first_error);
        }

        summary.skipped_missing = stats.skipped_missing.load(Ordering::Relaxed);
        summary.fetch_failures = stats.fetch_failures.load(Ordering::Relaxed);
        summary.imported = stats.imported.load(Ordering::Relaxed);
        summary.api_calls = self.counter.get();
        summary.cancelled = self.cancel.is_cancelled();
        summary.duration_secs = started.elapsed().as_secs_f64();

        if let Some(err) = first_error.or(listing_error) {
            warn!(error = %err, imported = summary.imported, "crawl stopped");
            return Err(err);
        }
        info!(
            listed = summary.listed,
            imported = summary.imported,
            skipped_archived = summary.skipped_archived,
            skipped_missing = summary.skipped_missing,
            fetch_failures = summary.fetch_failures,
            api_calls = summary.api_calls,
            "crawl finished"
        );
        Ok(summary)
    }
}

fn record_outcome(joined: Result<Result<(), CrawlError>, JoinError>, first_error: &mut Option<CrawlError>) {
    let outcome = joined.unwrap_or_else(|e| Err(CrawlError::Worker(e.to_string())));
    if let Err(err) = outcome {
        if first_error.is_none() {
            *first_error = Some(err);
        } else {
            debug!(error = %err, "additional unit failure after the first");
        }
    }
}

/// Shared handles one repository unit needs.
struct Unit<S, K> {
    source: Arc<S>,
    sink: Arc<K>,
    counter: Arc<ApiCallCounter>,
    cancel: CancellationToken,
    sequence: Arc<AtomicU64>,
    stats: Arc<UnitStats>,
}

impl<S: RepoSource, K: ImportSink> Unit<S, K> {
    async fn process(self, meta: RepoMeta) -> Result<(), CrawlError> {
        let entry = match self.source.fetch_repo(&meta).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                warn!(repo = %meta.full_name, "repository not returned by detail query, skipping");
                self.stats.skipped_missing.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            Err(ApiError::Cancelled) => return Ok(()),
            Err(e) => {
                warn!(repo = %meta.full_name, error = %e, "failed to fetch repository, skipping");
                self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        };

        if self.cancel.is_cancelled() {
            return Ok(());
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        if let Err(source) = self.sink.import(sequence, entry).await {
            self.cancel.cancel();
            return Err(CrawlError::Import {
                repo: meta.full_name,
                source,
            });
        }

        let imported = self.stats.imported.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(repo = %meta.full_name, sequence, "imported repository");
        if imported % CHECKPOINT_INTERVAL == 0 {
            info!(imported, api_calls = self.counter.get(), "checkpoint");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    fn meta(id: u64, archived: bool) -> RepoMeta {
        RepoMeta {
            id,
            name: format!("r{}", id),
            full_name: format!("acme/r{}", id),
            archived,
            ..Default::default()
        }
    }

    /// Pages of fixed repositories; ids listed in `fail` error, ids in `missing` return None.
    #[derive(Default)]
    struct FakeSource {
        pages: Vec<Vec<RepoMeta>>,
        fail: HashSet<u64>,
        missing: HashSet<u64>,
        page_requests: AtomicUsize,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl RepoSource for FakeSource {
        async fn list_page(&self, page: u32) -> Result<Vec<RepoMeta>, ApiError> {
            self.page_requests.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages.get(page as usize - 1).cloned().unwrap_or_default())
        }

        async fn fetch_repo(&self, meta: &RepoMeta) -> Result<Option<RepoEntry>, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail.contains(&meta.id) {
                return Err(ApiError::Status {
                    status: 502,
                    url: meta.full_name.clone(),
                    body: String::new(),
                });
            }
            if self.missing.contains(&meta.id) {
                return Ok(None);
            }
            Ok(Some(RepoEntry::new(meta.clone())))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        imported: Mutex<Vec<(u64, String)>>,
        fail_on: Option<u64>,
    }

    #[async_trait]
    impl ImportSink for RecordingSink {
        async fn import(&self, sequence: u64, entry: RepoEntry) -> anyhow::Result<()> {
            if self.fail_on == Some(entry.repo.id) {
                return Err(anyhow!("disk full"));
            }
            self.imported
                .lock()
                .unwrap()
                .push((sequence, entry.repo.full_name));
            Ok(())
        }
    }

    fn orchestrator(
        source: FakeSource,
        sink: RecordingSink,
        options: CrawlOptions,
    ) -> Orchestrator<FakeSource, RecordingSink> {
        Orchestrator::new(
            Arc::new(source),
            Arc::new(sink),
            options,
            Arc::new(ApiCallCounter::new()),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_skips_archived_and_assigns_sequences() {
        let source = FakeSource {
            pages: vec![vec![meta(1, false), meta(2, true)], vec![meta(3, false)]],
            ..Default::default()
        };
        let orch = orchestrator(source, RecordingSink::default(), CrawlOptions::default());
        let summary = orch.run().await.unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.listed, 3);
        assert_eq!(summary.skipped_archived, 1);
        assert_eq!(summary.imported, 2);
        assert_eq!(orch.source.page_requests.load(Ordering::SeqCst), 3);

        let mut sequences: Vec<u64> = orch.sink.imported.lock().unwrap().iter().map(|(s, _)| *s).collect();
        sequences.sort_unstable();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_include_archived() {
        let source = FakeSource {
            pages: vec![vec![meta(1, true)]],
            ..Default::default()
        };
        let options = CrawlOptions {
            skip_archived: false,
            ..Default::default()
        };
        let summary = orchestrator(source, RecordingSink::default(), options).run().await.unwrap();
        assert_eq!(summary.imported, 1);
    }

    #[tokio::test]
    async fn test_fetch_errors_are_skipped() {
        let source = FakeSource {
            pages: vec![vec![meta(1, false), meta(2, false), meta(3, false)]],
            fail: HashSet::from([2]),
            missing: HashSet::from([3]),
            ..Default::default()
        };
        let options = CrawlOptions {
            parallelism: 3,
            ..Default::default()
        };
        let summary = orchestrator(source, RecordingSink::default(), options).run().await.unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.fetch_failures, 1);
        assert_eq!(summary.skipped_missing, 1);
    }

    #[tokio::test]
    async fn test_import_error_is_returned_and_cancels() {
        let source = FakeSource {
            pages: vec![vec![meta(1, false), meta(2, false)], vec![meta(3, false)]],
            ..Default::default()
        };
        let sink = RecordingSink {
            fail_on: Some(1),
            ..Default::default()
        };
        let orch = orchestrator(source, sink, CrawlOptions::default());
        let err = orch.run().await.unwrap_err();

        match err {
            CrawlError::Import { repo, source } => {
                assert_eq!(repo, "acme/r1");
                assert!(source.to_string().contains("disk full"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(orch.cancel_token().is_cancelled());
        // Parallelism 1: the failing unit finishes before the next permit is granted.
        assert_eq!(orch.source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_debug_cap_stops_listing() {
        let source = FakeSource {
            pages: vec![(1..=5).map(|i| meta(i, false)).collect(), vec![meta(6, false)]],
            ..Default::default()
        };
        let options = CrawlOptions {
            parallelism: 2,
            repo_cap: Some(3),
            ..Default::default()
        };
        let orch = orchestrator(source, RecordingSink::default(), options);
        let summary = orch.run().await.unwrap();
        assert!(summary.capped);
        assert_eq!(summary.imported, 3);
        assert_eq!(orch.source.page_requests.load(Ordering::SeqCst), 1);
    }

    struct FailingListing;

    #[async_trait]
    impl RepoSource for FailingListing {
        async fn list_page(&self, page: u32) -> Result<Vec<RepoMeta>, ApiError> {
            if page == 1 {
                Ok(vec![meta(1, false)])
            } else {
                Err(ApiError::Status {
                    status: 500,
                    url: "/orgs/acme/repos".to_string(),
                    body: String::new(),
                })
            }
        }

        async fn fetch_repo(&self, meta: &RepoMeta) -> Result<Option<RepoEntry>, ApiError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(Some(RepoEntry::new(meta.clone())))
        }
    }

    #[tokio::test]
    async fn test_listing_error_waits_for_outstanding_units() {
        let sink = Arc::new(RecordingSink::default());
        let orch = Orchestrator::new(
            Arc::new(FailingListing),
            Arc::clone(&sink),
            CrawlOptions {
                parallelism: 4,
                ..Default::default()
            },
            Arc::new(ApiCallCounter::new()),
            CancellationToken::new(),
        );
        let err = orch.run().await.unwrap_err();
        assert!(matches!(err, CrawlError::Listing { page: 2, .. }));
        assert_eq!(sink.imported.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_dispatches_nothing() {
        let source = FakeSource {
            pages: vec![vec![meta(1, false)]],
            ..Default::default()
        };
        let orch = orchestrator(source, RecordingSink::default(), CrawlOptions::default());
        orch.cancel_token().cancel();
        let summary = orch.run().await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.dispatched, 0);
    }

    #[test]
    fn test_options_from_config() {
        let config = CrawlConfig {
            parallelism: 4,
            debug: true,
            skip_archived: false,
            ..Default::default()
        };
        let options = CrawlOptions::from(&config);
        assert_eq!(options.parallelism, 4);
        assert_eq!(options.repo_cap, Some(10));
        assert!(!options.skip_archived);
    }
}
