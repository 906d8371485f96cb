// SPDX-License-Identifier: MIT
//! Targeted notification fan-out.
//!
//! The daemon pushes JSON-RPC notifications to webviews through an explicit
//! registry of live subscribers keyed by webview type.  There is no
//! broadcast-to-all primitive: every send names its target, and a send with
//! no matching subscriber is silently dropped (fire-and-forget).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace};

/// Well-known webview type tags.
pub mod webview_type {
    pub const VISUALIZER: &str = "visualizer";
    pub const POPUP: &str = "popup";
    pub const AI_PANEL: &str = "ai-panel";
    pub const CHAT: &str = "chat";
}

/// Where a notification is delivered.  Serialized as
/// `{"type":"webview","webviewType":"..."}` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum NotificationTarget {
    #[serde(rename = "webview", rename_all = "camelCase")]
    Webview { webview_type: String },
}

impl NotificationTarget {
    pub fn webview(webview_type: impl Into<String>) -> Self {
        Self::Webview {
            webview_type: webview_type.into(),
        }
    }

    pub fn webview_type(&self) -> &str {
        match self {
            Self::Webview { webview_type } => webview_type,
        }
    }
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<String>,
}

/// Registry of live webview subscribers and the targeted send primitive.
#[derive(Default)]
pub struct NotificationRouter {
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a sender to a webview type and return its subscription id.
    ///
    /// Multiple webviews may register the same type; a send to that type
    /// reaches all of them.
    pub async fn register(&self, webview_type: &str, tx: mpsc::UnboundedSender<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .await
            .entry(webview_type.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        debug!(webview_type = %webview_type, id = id, "webview registered");
        id
    }

    /// Remove a subscriber on disconnect.
    pub async fn unregister(&self, webview_type: &str, id: u64) {
        let mut subs = self.subscribers.write().await;
        if let Some(list) = subs.get_mut(webview_type) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                subs.remove(webview_type);
            }
        }
        debug!(webview_type = %webview_type, id = id, "webview unregistered");
    }

    /// True if at least one live webview of this type is registered.
    pub async fn has_subscriber(&self, webview_type: &str) -> bool {
        self.subscribers
            .read()
            .await
            .get(webview_type)
            .is_some_and(|l| !l.is_empty())
    }

    /// Total number of registered webviews across all types.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.values().map(Vec::len).sum()
    }

    /// Push a JSON-RPC notification to every webview matching the target.
    ///
    /// Fire-and-forget: no acknowledgement, and closed subscribers are pruned
    /// rather than reported.
    pub async fn send(&self, method: &str, target: &NotificationTarget, params: Value) {
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        })
        .to_string();

        let mut subs = self.subscribers.write().await;
        let Some(list) = subs.get_mut(target.webview_type()) else {
            trace!(method = %method, target = %target.webview_type(), "notification dropped — no subscriber");
            return;
        };
        list.retain(|s| s.tx.send(message.clone()).is_ok());
        if list.is_empty() {
            subs.remove(target.webview_type());
        }
    }
}
