//! RPC handlers for the approval view workflow.
//!
//! Exposes:
//!   `approval.registerInline` — track an approval rendered in the chat
//!   `approval.openPopup`      — open an approval view (popup or main)
//!   `approval.popupClosed`    — the user dismissed the popup
//!   `approval.reopenPopup`    — re-show a closed approval view
//!   `approval.cleanup`        — the approval was resolved; drop its record
//!   `approval.cleanupAll`     — drop every record
//!   `approval.list` / `approval.get` / `approval.hasActive`
//!
//! Ghost records (ids the manager has never seen, or already dropped) are
//! answered with `{ found: false }`, never an error — cleanup paths race
//! with user dismissal by design of the UI.

use crate::approval::ApprovalType;
use crate::machine::view::ViewLocation;
use crate::HostContext;
use anyhow::Result;
use serde_json::{json, Value};

fn sv<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(|v| v.as_str())
}

fn request_id(params: &Value) -> Result<&str> {
    sv(params, "requestId").ok_or_else(|| anyhow::anyhow!("missing field: requestId"))
}

fn approval_type(params: &Value) -> Result<ApprovalType> {
    let raw = sv(params, "approvalType")
        .ok_or_else(|| anyhow::anyhow!("missing field: approvalType"))?;
    ApprovalType::from_str(raw)
        .ok_or_else(|| anyhow::anyhow!("invalid type: unknown approvalType '{raw}'"))
}

/// Params: `{ requestId, approvalType }`
pub async fn register_inline(params: Value, ctx: &HostContext) -> Result<Value> {
    let id = request_id(&params)?;
    let approval_type = approval_type(&params)?;
    ctx.approvals.register_inline_approval(id, approval_type).await;
    Ok(json!({ "requestId": id }))
}

/// Params: `{ requestId, approvalType, location: {...}, isAutoOpened? }`
pub async fn open_popup(params: Value, ctx: &HostContext) -> Result<Value> {
    let id = request_id(&params)?.to_string();
    let approval_type = approval_type(&params)?;
    let location: ViewLocation =
        serde_json::from_value(params.get("location").cloned().unwrap_or(json!({})))?;
    let is_auto_opened = params
        .get("isAutoOpened")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    ctx.approvals
        .open_approval_view_popup(&id, approval_type, location, is_auto_opened)
        .await;
    let record = ctx.approvals.get_view(&id).await;
    Ok(serde_json::to_value(record)?)
}

/// Params: `{ requestId }`
pub async fn popup_closed(params: Value, ctx: &HostContext) -> Result<Value> {
    let id = request_id(&params)?;
    ctx.approvals.handle_popup_closed(id).await;
    Ok(json!({ "requestId": id }))
}

/// Params: `{ requestId }`
pub async fn reopen_popup(params: Value, ctx: &HostContext) -> Result<Value> {
    let id = request_id(&params)?;
    ctx.approvals.reopen_approval_view_popup(id).await;
    match ctx.approvals.get_view(id).await {
        Some(record) => Ok(serde_json::to_value(record)?),
        None => Ok(json!({ "found": false })),
    }
}

/// Params: `{ requestId, clearMetadata? }` — `clearMetadata` defaults to true.
pub async fn cleanup(params: Value, ctx: &HostContext) -> Result<Value> {
    let id = request_id(&params)?;
    let clear_metadata = params
        .get("clearMetadata")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let found = ctx.approvals.get_view(id).await.is_some();
    ctx.approvals.cleanup_view(id, clear_metadata).await;
    Ok(json!({ "requestId": id, "found": found }))
}

pub async fn cleanup_all(_params: Value, ctx: &HostContext) -> Result<Value> {
    ctx.approvals.cleanup_all_views().await;
    Ok(json!({ "ok": true }))
}

pub async fn list(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(json!({ "approvals": ctx.approvals.list().await }))
}

/// Params: `{ requestId }`
pub async fn get(params: Value, ctx: &HostContext) -> Result<Value> {
    let id = request_id(&params)?;
    match ctx.approvals.get_view(id).await {
        Some(record) => Ok(serde_json::to_value(record)?),
        None => Ok(json!({ "found": false })),
    }
}

pub async fn has_active(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(json!({ "active": ctx.approvals.has_active_approvals().await }))
}
