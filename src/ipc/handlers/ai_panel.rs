//! RPC handlers for the AI panel authentication machine.
//!
//! Exposes:
//!   `aiPanel.initialize` — start the machine (restores a stored credential)
//!   `aiPanel.getState`   — current state value
//!   `aiPanel.getContext` — login method, account, error
//!   `aiPanel.login`      — run a credential exchange to completion
//!   `aiPanel.signOut`    — clear stored credentials

use crate::machine::ai_panel::{AiPanelEvent, LoginMethod};
use crate::HostContext;
use anyhow::Result;
use serde_json::{json, Value};

pub async fn initialize(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(ctx.ai_panel.initialize().await.to_value())
}

pub async fn get_state(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(ctx.ai_panel.state().await)
}

pub async fn get_context(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(serde_json::to_value(ctx.ai_panel.context().await)?)
}

/// `aiPanel.login` — start a credential exchange.
///
/// Params: `{ loginMethod: "sso" | "apiKey" | "awsBedrock", credentials: {...} }`
///
/// The exchange runs to completion before this returns: the response
/// snapshot is always a settled state (`authenticated` or `disabled`).
pub async fn login(params: Value, ctx: &HostContext) -> Result<Value> {
    let method_str = params
        .get("loginMethod")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing field: loginMethod"))?;
    let method = LoginMethod::from_str(method_str)
        .ok_or_else(|| anyhow::anyhow!("invalid type: unknown loginMethod '{method_str}'"))?;
    let credentials = params.get("credentials").cloned().unwrap_or(json!({}));

    Ok(ctx
        .ai_panel
        .send_event(AiPanelEvent::StartLogin {
            method,
            credentials,
        })
        .await
        .to_value())
}

pub async fn sign_out(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(ctx.ai_panel.send_event(AiPanelEvent::SignOut).await.to_value())
}

pub async fn disposed(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(ctx.ai_panel.send_event(AiPanelEvent::Dispose).await.to_value())
}
