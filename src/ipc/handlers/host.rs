//! RPC handlers for host-level introspection.
//!
//! Exposes:
//!   `host.ping`   — liveness check
//!   `host.status` — version, uptime, registered webviews

use crate::HostContext;
use anyhow::Result;
use serde_json::{json, Value};

/// `host.ping` — returns immediately; used by clients to probe liveness.
pub async fn ping(_params: Value, _ctx: &HostContext) -> Result<Value> {
    Ok(json!({
        "pong": true,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `host.status` — a snapshot of the host's moving parts.
///
/// Returns: `{ version, uptime, port, registeredWebviews, activeApprovals,
/// pendingReview }`
pub async fn status(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": ctx.started_at.elapsed().as_secs(),
        "port": ctx.config.port,
        "registeredWebviews": ctx.router.subscriber_count().await,
        "activeApprovals": ctx.approvals.has_active_approvals().await,
        "pendingReview": ctx.review.get().await.is_some(),
    }))
}
