use crate::analyzer::{self, lockfile, report::RepoInventory};
use crate::models::{FileEntry, LockfilePairing};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Files above this size are recorded by path only.
const MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;

/// Dependency files and Dockerfiles found in a local checkout.
#[derive(Debug, Clone, Default)]
pub struct LocalCheckout {
    pub dependency_files: Vec<FileEntry>,
    pub dockerfiles: Vec<FileEntry>,
}

impl LocalCheckout {
    pub fn file_paths(&self) -> Vec<String> {
        self.dependency_files
            .iter()
            .chain(self.dockerfiles.iter())
            .map(|f| f.path.clone())
            .collect()
    }
}

/// Offline analysis of a directory tree.
#[derive(Debug, Clone, Serialize)]
pub struct LocalReport {
    pub root: String,
    pub dependency_files: Vec<String>,
    pub lockfile_pairings: Vec<LockfilePairing>,
    pub has_complete_lockfiles: bool,
    pub inventory: RepoInventory,
}

/// Walk `root` up to `max_depth` directory levels, skipping `.git` and vendored directories.
pub fn discover_checkout(root: &Path, max_depth: usize) -> Result<LocalCheckout> {
    if !root.exists() {
        anyhow::bail!("Path '{}' does not exist", root.display());
    }
    if !root.is_dir() {
        anyhow::bail!("'{}' is not a directory", root.display());
    }

    let mut checkout = LocalCheckout::default();
    walk_dirs(root, root, 0, max_depth, &mut checkout)?;
    checkout.dependency_files.sort_by(|a, b| a.path.cmp(&b.path));
    checkout.dockerfiles.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(checkout)
}

/// Discover and analyze a checkout the same way a crawled repository is analyzed.
pub fn analyze_checkout(root: &Path, max_depth: usize) -> Result<LocalReport> {
    let checkout = discover_checkout(root, max_depth)?;
    let pairings = lockfile::detect_lockfile_pairings(&checkout.file_paths());
    let inventory = analyzer::analyze_files(&checkout.dependency_files, &checkout.dockerfiles, None);

    Ok(LocalReport {
        root: root.display().to_string(),
        dependency_files: checkout.dependency_files.iter().map(|f| f.path.clone()).collect(),
        has_complete_lockfiles: lockfile::has_complete_lockfiles(&pairings),
        lockfile_pairings: pairings,
        inventory,
    })
}

fn walk_dirs(
    root: &Path,
    current: &Path,
    depth: usize,
    max_depth: usize,
    checkout: &mut LocalCheckout,
) -> Result<()> {
    let entries = std::fs::read_dir(current)
        .with_context(|| format!("Failed to read directory '{}'", current.display()))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if name_str == ".git" || lockfile::IGNORED_DIRS.contains(&&*name_str) {
                continue;
            }
            if depth + 1 < max_depth {
                walk_dirs(root, &path, depth + 1, max_depth, checkout)?;
            }
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let relative = relative_path(root, &path);
        if name_str.to_lowercase().contains("dockerfile") {
            if let Some(content) = read_small(&path, entry.metadata()?.len())? {
                checkout.dockerfiles.push(FileEntry::new(relative, content));
            }
        } else if lockfile::is_dependency_file(&relative) {
            let file = match read_small(&path, entry.metadata()?.len())? {
                Some(content) => FileEntry::new(relative, content),
                None => FileEntry::path_only(relative),
            };
            checkout.dependency_files.push(file);
        }
    }

    Ok(())
}

/// `/`-separated path of `path` below `root`.
fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_small(path: &Path, len: u64) -> Result<Option<String>> {
    if len > MAX_FILE_BYTES {
        debug!(path = %path.display(), len, "file too large, recording path only");
        return Ok(None);
    }
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}
