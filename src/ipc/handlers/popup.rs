//! RPC handlers for the popup visualizer machine.

use crate::machine::popup::PopupEvent;
use crate::machine::view::ViewLocation;
use crate::HostContext;
use anyhow::Result;
use serde_json::Value;

fn location(params: Value) -> Result<ViewLocation> {
    Ok(serde_json::from_value(params)?)
}

pub async fn initialize(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(ctx.popup.initialize().await.to_value())
}

pub async fn get_context(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(serde_json::to_value(ctx.popup.context().await)?)
}

pub async fn get_state(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(ctx.popup.state().await)
}

pub async fn open_view(params: Value, ctx: &HostContext) -> Result<Value> {
    let loc = location(params)?;
    Ok(ctx.popup.send_event(PopupEvent::OpenView(loc)).await.to_value())
}

pub async fn reopen_view(params: Value, ctx: &HostContext) -> Result<Value> {
    let loc = location(params)?;
    Ok(ctx
        .popup
        .send_event(PopupEvent::ReopenView(loc))
        .await
        .to_value())
}

/// `popup.notifyView` — one-shot: pushes the location at the main
/// visualizer webview and settles back in `ready` before responding.
pub async fn notify_view(params: Value, ctx: &HostContext) -> Result<Value> {
    let loc = location(params)?;
    Ok(ctx
        .popup
        .send_event(PopupEvent::NotifyView(loc))
        .await
        .to_value())
}

pub async fn update_view(params: Value, ctx: &HostContext) -> Result<Value> {
    let loc = location(params)?;
    Ok(ctx
        .popup
        .send_event(PopupEvent::ViewUpdate(loc))
        .await
        .to_value())
}

pub async fn close_view(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(ctx.popup.send_event(PopupEvent::CloseView).await.to_value())
}

pub async fn disposed(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(ctx.popup.send_event(PopupEvent::Dispose).await.to_value())
}
