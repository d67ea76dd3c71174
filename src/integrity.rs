use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use git2::{Repository, Status, StatusOptions};

/// Source-control state of the audited tree. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integrity {
    Clean,
    /// Porcelain-style `XY path` lines, one per changed or untracked path.
    Dirty(Vec<String>),
    /// Status could not be determined (not a repository, error, timeout).
    Unavailable(String),
}

pub async fn check_integrity(root: &Path, limit: Duration) -> Integrity {
    let root = root.to_path_buf();
    bounded_status(limit, move || changed_paths(&root)).await
}

async fn bounded_status<F>(limit: Duration, status: F) -> Integrity
where
    F: FnOnce() -> Result<Vec<String>> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(status);
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(Ok(lines))) if lines.is_empty() => Integrity::Clean,
        Ok(Ok(Ok(lines))) => Integrity::Dirty(lines),
        Ok(Ok(Err(err))) => {
            tracing::warn!("integrity: git status failed: {:#}", err);
            Integrity::Unavailable(err.to_string())
        }
        Ok(Err(join)) => {
            Integrity::Unavailable(format!("git status task join error: {}", join))
        }
        Err(_) => {
            tracing::warn!(?limit, "integrity: git status timed out");
            Integrity::Unavailable(format!(
                "git status did not finish within {}s",
                limit.as_secs()
            ))
        }
    }
}

fn changed_paths(root: &Path) -> Result<Vec<String>> {
    let repo = Repository::discover(root)?;
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts))?;
    let lines = statuses
        .iter()
        .filter(|entry| !entry.status().is_empty() && !entry.status().contains(Status::IGNORED))
        .map(|entry| {
            let path = entry.path().unwrap_or("<non-utf8 path>");
            format!("{} {}", porcelain_code(entry.status()), path)
        })
        .collect();
    Ok(lines)
}

/// Two-column status code in the shape `git status --porcelain` prints.
fn porcelain_code(status: Status) -> String {
    if status.contains(Status::WT_NEW) && !status.intersects(index_bits()) {
        return "??".to_string();
    }
    if status.contains(Status::CONFLICTED) {
        return "UU".to_string();
    }
    let index = if status.contains(Status::INDEX_NEW) {
        'A'
    } else if status.contains(Status::INDEX_MODIFIED) {
        'M'
    } else if status.contains(Status::INDEX_DELETED) {
        'D'
    } else if status.contains(Status::INDEX_RENAMED) {
        'R'
    } else if status.contains(Status::INDEX_TYPECHANGE) {
        'T'
    } else {
        ' '
    };
    let worktree = if status.contains(Status::WT_MODIFIED) {
        'M'
    } else if status.contains(Status::WT_DELETED) {
        'D'
    } else if status.contains(Status::WT_RENAMED) {
        'R'
    } else if status.contains(Status::WT_TYPECHANGE) {
        'T'
    } else {
        ' '
    };
    format!("{}{}", index, worktree)
}

fn index_bits() -> Status {
    Status::INDEX_NEW
        | Status::INDEX_MODIFIED
        | Status::INDEX_DELETED
        | Status::INDEX_RENAMED
        | Status::INDEX_TYPECHANGE
}
