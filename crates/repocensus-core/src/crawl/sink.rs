use crate::analyzer::{self, report::RepoInventory};
use crate::models::{RepoEntry, RepoMeta};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Destination for fully fetched repositories.
///
/// Implementations are shared by every worker; a returned error is fatal to the run.
#[async_trait]
pub trait ImportSink: Send + Sync {
    async fn import(&self, sequence: u64, entry: RepoEntry) -> Result<()>;
}

#[derive(Serialize)]
struct ImportRecord<'a> {
    sequence: u64,
    entry: &'a RepoEntry,
    inventory: &'a RepoInventory,
}

/// Appends one JSON object per imported repository to a file.
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    /// Create or truncate the output file.
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)
            .await
            .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Open for appending, keeping earlier records.
    pub async fn append(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open output file '{}'", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ImportSink for JsonLinesSink {
    async fn import(&self, sequence: u64, entry: RepoEntry) -> Result<()> {
        let inventory = analyzer::analyze(&entry);
        let record = ImportRecord {
            sequence,
            entry: &entry,
            inventory: &inventory,
        };
        let mut line = serde_json::to_vec(&record)
            .with_context(|| format!("Failed to serialize {}", entry.repo.full_name))?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        let committed = file
            .seek(SeekFrom::End(0))
            .await
            .context("Failed to locate end of output file")?;
        if let Err(e) = write_line(&mut file, &line).await {
            warn!(repo = %entry.repo.full_name, error = %e, "write failed, rolling back partial record");
            truncate_to(&mut file, committed)
                .await
                .context("Failed to roll back partial record")?;
            return Err(e).with_context(|| {
                format!("Failed to write {} to '{}'", entry.repo.full_name, self.path.display())
            });
        }
        Ok(())
    }
}

async fn write_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line).await?;
    file.flush().await
}

/// Drop anything written past `len`, leaving the file ending on a complete record.
async fn truncate_to(file: &mut File, len: u64) -> std::io::Result<()> {
    file.set_len(len).await?;
    file.seek(SeekFrom::Start(len)).await?;
    Ok(())
}

/// File name of the raw repository listing for `org`.
pub fn repo_dump_file_name(org: &str) -> String {
    format!("{}_repos_raw_dump.json", org)
}

/// Write the raw listing as a pretty JSON array into `dir`.
pub fn store_repo_dump(dir: &Path, org: &str, repos: &[RepoMeta]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory '{}'", dir.display()))?;
    let path = dir.join(repo_dump_file_name(org));
    let json = serde_json::to_string_pretty(repos).context("Failed to serialize repository list")?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    info!(path = %path.display(), repos = repos.len(), "stored repository list");
    Ok(path)
}
