//! RPC handlers for the main visualizer machine.
//!
//! Exposes:
//!   `visualizer.initialize`  — start the machine, return the first snapshot
//!   `visualizer.getContext`  — current view location
//!   `visualizer.getState`    — current state value
//!   `visualizer.openView`    — navigate to a view
//!   `visualizer.updateView`  — refine the open view in place
//!   `visualizer.closeView`   — back to the default screen
//!   `visualizer.disposed`    — the owning webview panel was torn down

use crate::machine::view::ViewLocation;
use crate::machine::visualizer::VisualizerEvent;
use crate::HostContext;
use anyhow::Result;
use serde_json::Value;

fn location(params: Value) -> Result<ViewLocation> {
    Ok(serde_json::from_value(params)?)
}

pub async fn initialize(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(ctx.visualizer.initialize().await.to_value())
}

pub async fn get_context(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(serde_json::to_value(ctx.visualizer.context().await)?)
}

pub async fn get_state(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(ctx.visualizer.state().await)
}

/// Params: a view location (camelCase fields, all optional).
pub async fn open_view(params: Value, ctx: &HostContext) -> Result<Value> {
    let loc = location(params)?;
    Ok(ctx
        .visualizer
        .send_event(VisualizerEvent::OpenView(loc))
        .await
        .to_value())
}

pub async fn update_view(params: Value, ctx: &HostContext) -> Result<Value> {
    let loc = location(params)?;
    Ok(ctx
        .visualizer
        .send_event(VisualizerEvent::ViewUpdate(loc))
        .await
        .to_value())
}

pub async fn close_view(_params: Value, ctx: &HostContext) -> Result<Value> {
    Ok(ctx
        .visualizer
        .send_event(VisualizerEvent::CloseView)
        .await
        .to_value())
}

/// `visualizer.disposed` — the panel is gone.  Every approval placement
/// referencing it is now stale, so the approval manager is told first, then
/// the machine resets.
pub async fn disposed(_params: Value, ctx: &HostContext) -> Result<Value> {
    ctx.approvals.on_visualizer_closed().await;
    Ok(ctx
        .visualizer
        .send_event(VisualizerEvent::Dispose)
        .await
        .to_value())
}
