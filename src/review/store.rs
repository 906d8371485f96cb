// SPDX-License-Identifier: MIT
//! Pending review context store.
//!
//! Single slot, process-wide: the chat agent's last finished run, held so a
//! later code-review handoff can pick up the temp project and the modified
//! files.  Latest wins on overwrite; writes for the same temp project merge
//! their modified-file sets (a multi-turn chat session accumulates changes).
//!
//! Expiry is a lazily-checked timestamp compared at read time — there is no
//! background timer to race against.  Timestamps use `tokio::time::Instant`
//! so tests can pause and advance the clock.  Temp-project cleanup is
//! best-effort everywhere: failures are logged, never propagated.

use crate::review::packages::{determine_affected_packages, ProjectDescriptor};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default time a pending review context stays retrievable.
pub const DEFAULT_REVIEW_TTL: Duration = Duration::from_secs(30 * 60);

/// Where the chat agent ran: the active project and, when inside a
/// multi-package workspace, the workspace root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionContext {
    pub project_path: String,
    pub workspace_path: Option<String>,
}

/// Everything the review handoff needs from a finished chat agent run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingReviewContext {
    /// Temp copy of the project the agent edited.
    pub temp_project_path: String,
    /// Files the agent modified, relative to the project root.  Set
    /// semantics: deduplicated across accumulations.
    pub modified_files: Vec<String>,
    pub ctx: ExecutionContext,
    /// Packages of the surrounding workspace.
    pub projects: Vec<ProjectDescriptor>,
    /// Whether the temp project should be deleted when this context is
    /// superseded, expires, or the host shuts down.
    pub should_cleanup: bool,
    /// Chat message that produced this run, if any.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Resolved absolute package paths affected by `modified_files`.
    /// Recomputed on every store.
    #[serde(default)]
    pub affected_package_paths: Vec<String>,
    #[serde(skip, default = "Instant::now")]
    pub stored_at: Instant,
}

/// Process-wide single-slot store.  All mutation goes through the RwLock;
/// reads re-check expiry because the event loop may have suspended between
/// the write and the read.
pub struct ReviewStore {
    slot: RwLock<Option<PendingReviewContext>>,
    ttl: Duration,
}

impl Default for ReviewStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_REVIEW_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
        }
    }

    /// Store a context, superseding any previous one.
    ///
    /// Same temp project as the current slot: the modified-file sets merge
    /// as a union before affected packages are recomputed.  Different temp
    /// project: the superseded temp project is cleaned up best-effort first.
    /// The expiry clock restarts either way.
    pub async fn set(&self, mut incoming: PendingReviewContext) {
        let mut slot = self.slot.write().await;
        if let Some(prev) = slot.take() {
            if prev.temp_project_path == incoming.temp_project_path {
                let mut merged = prev.modified_files;
                for file in &incoming.modified_files {
                    if !merged.iter().any(|f| f == file) {
                        merged.push(file.clone());
                    }
                }
                incoming.modified_files = merged;
            } else if prev.should_cleanup {
                cleanup_temp_project(&prev.temp_project_path).await;
            }
        }
        incoming.affected_package_paths = determine_affected_packages(
            &incoming.modified_files,
            &incoming.projects,
            &incoming.ctx.project_path,
            incoming.ctx.workspace_path.as_deref(),
        );
        incoming.stored_at = Instant::now();
        debug!(
            temp_project = %incoming.temp_project_path,
            modified = incoming.modified_files.len(),
            affected = incoming.affected_package_paths.len(),
            "pending review context stored"
        );
        *slot = Some(incoming);
    }

    /// Return the pending context, or `None` if the slot is empty or the
    /// context has outlived its TTL (in which case it is cleaned up and
    /// cleared before returning).
    pub async fn get(&self) -> Option<PendingReviewContext> {
        {
            let slot = self.slot.read().await;
            match slot.as_ref() {
                None => return None,
                Some(ctx) if ctx.stored_at.elapsed() < self.ttl => return Some(ctx.clone()),
                Some(_) => {}
            }
        }
        // Expired — re-check under the write lock (another caller may have
        // replaced the slot while we waited).
        let mut slot = self.slot.write().await;
        if let Some(ctx) = slot.as_ref() {
            if ctx.stored_at.elapsed() < self.ttl {
                return Some(ctx.clone());
            }
            info!(temp_project = %ctx.temp_project_path, "pending review context expired");
            let expired = slot.take();
            drop(slot);
            if let Some(ctx) = expired {
                if ctx.should_cleanup {
                    cleanup_temp_project(&ctx.temp_project_path).await;
                }
            }
        }
        None
    }

    /// Clear the slot without touching the temp project.
    pub async fn clear(&self) {
        *self.slot.write().await = None;
    }

    /// Forced cleanup at host teardown, regardless of age.
    pub async fn cleanup_on_deactivate(&self) {
        let taken = self.slot.write().await.take();
        if let Some(ctx) = taken {
            if ctx.should_cleanup {
                cleanup_temp_project(&ctx.temp_project_path).await;
            }
        }
    }
}

/// Delete a superseded/expired temp project.  Advisory only — a failure is
/// logged and swallowed.
async fn cleanup_temp_project(path: &str) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => debug!(path = %path, "temp project cleaned up"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path, err = %e, "temp project cleanup failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(temp: &str, files: &[&str]) -> PendingReviewContext {
        PendingReviewContext {
            temp_project_path: temp.to_string(),
            modified_files: files.iter().map(|s| s.to_string()).collect(),
            ctx: ExecutionContext {
                project_path: "/proj".to_string(),
                workspace_path: None,
            },
            projects: vec![],
            should_cleanup: false,
            message_id: None,
            affected_package_paths: vec![],
            stored_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_latest_wins() {
        let store = ReviewStore::new();
        store.set(ctx("/tmp/a", &["x.src"])).await;
        store.set(ctx("/tmp/b", &["y.src"])).await;
        let got = store.get().await.unwrap();
        assert_eq!(got.temp_project_path, "/tmp/b");
        assert_eq!(got.modified_files, vec!["y.src".to_string()]);
    }

    #[tokio::test]
    async fn test_same_temp_project_merges_files() {
        let store = ReviewStore::new();
        store.set(ctx("/tmp/a", &["a.src", "b.src"])).await;
        store.set(ctx("/tmp/a", &["b.src", "c.src"])).await;
        let got = store.get().await.unwrap();
        let mut files = got.modified_files.clone();
        files.sort();
        assert_eq!(files, vec!["a.src", "b.src", "c.src"]);
        assert_eq!(got.modified_files.len(), 3, "no duplicates");
    }

    #[tokio::test]
    async fn test_clear_leaves_nothing() {
        let store = ReviewStore::new();
        store.set(ctx("/tmp/a", &["x.src"])).await;
        store.clear().await;
        assert!(store.get().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_boundary() {
        let store = ReviewStore::new();
        store.set(ctx("/tmp/a", &["x.src"])).await;

        tokio::time::advance(Duration::from_secs(29 * 60)).await;
        assert!(store.get().await.is_some(), "still live at 29 minutes");

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(store.get().await.is_none(), "expired at 30 minutes");
        // Expiry cleared the slot for good.
        assert!(store.get().await.is_none());
    }

    #[tokio::test]
    async fn test_superseded_temp_project_is_removed() {
        let dir = tempfile::TempDir::new().unwrap();
        let temp_a = dir.path().join("run-a");
        std::fs::create_dir_all(&temp_a).unwrap();

        let store = ReviewStore::new();
        let mut first = ctx(temp_a.to_str().unwrap(), &["x.src"]);
        first.should_cleanup = true;
        store.set(first).await;
        store.set(ctx("/tmp/other", &["y.src"])).await;

        assert!(!temp_a.exists(), "superseded temp project deleted");
    }

    #[tokio::test]
    async fn test_affected_packages_recomputed_on_set() {
        let store = ReviewStore::new();
        let mut c = ctx("/tmp/a", &["svc/main.src"]);
        c.ctx.workspace_path = Some("/ws".to_string());
        c.projects = vec![
            ProjectDescriptor {
                package_path: "".to_string(),
                project_path: "/ws".to_string(),
            },
            ProjectDescriptor {
                package_path: "svc".to_string(),
                project_path: "/ws/svc".to_string(),
            },
        ];
        store.set(c).await;
        let got = store.get().await.unwrap();
        assert_eq!(got.affected_package_paths, vec!["/ws/svc".to_string()]);
    }
}
