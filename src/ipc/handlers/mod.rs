//! RPC method handlers, grouped by feature.
//!
//! Every handler has the same shape: `async fn(params: Value, ctx:
//! &HostContext) -> Result<Value>`.  Errors bubble up to the dispatcher,
//! which maps them to JSON-RPC error codes.

pub mod ai_panel;
pub mod approval;
pub mod host;
pub mod popup;
pub mod review;
pub mod visualizer;
