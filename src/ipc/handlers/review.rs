//! RPC handlers for the pending review context store.
//!
//! Exposes:
//!   `review.setContext`       — record the chat agent's last finished run
//!   `review.getContext`       — retrieve it (None after the TTL elapses)
//!   `review.clearContext`     — drop the slot without touching the temp dir
//!   `review.affectedPackages` — run package determination standalone

use crate::review::{determine_affected_packages, PendingReviewContext, ProjectDescriptor};
use crate::HostContext;
use anyhow::Result;
use serde_json::{json, Value};

/// Params: a full pending review context (camelCase fields).
///
/// Returns the affected package paths computed for the stored context —
/// already merged with any previous store for the same temp project.
pub async fn set_context(params: Value, ctx: &HostContext) -> Result<Value> {
    let incoming: PendingReviewContext = serde_json::from_value(params)?;
    ctx.review.set(incoming).await;
    // Re-read to report the post-merge result.
    let stored = ctx.review.get().await;
    Ok(json!({
        "affectedPackagePaths": stored
            .map(|c| c.affected_package_paths)
            .unwrap_or_default(),
    }))
}

pub async fn get_context(_params: Value, ctx: &HostContext) -> Result<Value> {
    match ctx.review.get().await {
        Some(context) => Ok(json!({ "context": context })),
        None => Ok(json!({ "context": null })),
    }
}

pub async fn clear_context(_params: Value, ctx: &HostContext) -> Result<Value> {
    ctx.review.clear().await;
    Ok(json!({ "ok": true }))
}

/// `review.affectedPackages` — package determination without storing anything.
///
/// Params: `{ modifiedFiles: [...], projects: [...], activeProjectPath,
/// workspacePath? }`
pub async fn affected_packages(params: Value, _ctx: &HostContext) -> Result<Value> {
    let modified_files: Vec<String> =
        serde_json::from_value(params.get("modifiedFiles").cloned().unwrap_or(json!([])))?;
    let projects: Vec<ProjectDescriptor> =
        serde_json::from_value(params.get("projects").cloned().unwrap_or(json!([])))?;
    let active_project_path = params
        .get("activeProjectPath")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing field: activeProjectPath"))?;
    let workspace_path = params.get("workspacePath").and_then(Value::as_str);

    let affected = determine_affected_packages(
        &modified_files,
        &projects,
        active_project_path,
        workspace_path,
    );
    Ok(json!({ "affectedPackagePaths": affected }))
}
