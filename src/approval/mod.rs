// SPDX-License-Identifier: MIT
//! Approval view manager.
//!
//! Tracks where each outstanding approval request is being displayed —
//! inline in the chat, as a popup view, or as the main view — and keeps the
//! chat overlay in sync: the overlay is visible exactly when at least one
//! approval is still open.  One instance per host process, owned by the
//! `HostContext`; tests reset state by building a fresh one.
//!
//! Operations on unknown request ids are logged no-ops, never errors — the
//! UI can dismiss a view while the backend completion is still in flight.

use crate::ipc::event::{webview_type, NotificationRouter, NotificationTarget};
use crate::machine::popup::{PopupEvent, PopupMachine};
use crate::machine::view::{ViewKind, ViewLocation};
use crate::machine::visualizer::{VisualizerEvent, VisualizerMachine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

// ─── Record types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalType {
    Configuration,
    Task,
    Plan,
    ConnectorSpec,
}

impl ApprovalType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "configuration" => Some(Self::Configuration),
            "task" => Some(Self::Task),
            "plan" => Some(Self::Plan),
            "connectorSpec" => Some(Self::ConnectorSpec),
            _ => None,
        }
    }
}

/// How an approval is being displayed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalViewType {
    /// Rendered inside the chat itself — no view placement to track.
    Inline,
    Popup,
    Main,
}

/// One outstanding approval request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRecord {
    pub request_id: String,
    pub view_type: ApprovalViewType,
    pub approval_type: ApprovalType,
    /// View kind shown for this approval; inline records never carry one.
    pub machine_view: Option<ViewKind>,
    pub is_auto_opened: bool,
    /// Whether a main visualizer panel existed when the view was opened.
    pub had_existing_visualizer: bool,
    pub timestamp: String,
    pub is_closed: bool,
    pub project_path: Option<String>,
    pub agent_metadata: Option<Value>,
}

/// Chat overlay message for each approval type.
fn overlay_message(approval_type: ApprovalType) -> &'static str {
    match approval_type {
        ApprovalType::Configuration => "Review the configuration before the agent continues",
        ApprovalType::Task => "A task is awaiting your approval",
        ApprovalType::Plan => "A plan is awaiting your approval",
        ApprovalType::ConnectorSpec => "A connector specification is awaiting your approval",
    }
}

// ─── Manager ─────────────────────────────────────────────────────────────────

pub struct ApprovalViewManager {
    records: RwLock<HashMap<String, ApprovalRecord>>,
    router: Arc<NotificationRouter>,
    visualizer: Arc<VisualizerMachine>,
    popup: Arc<PopupMachine>,
    overlay_visible: AtomicBool,
}

impl ApprovalViewManager {
    pub fn new(
        router: Arc<NotificationRouter>,
        visualizer: Arc<VisualizerMachine>,
        popup: Arc<PopupMachine>,
    ) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            router,
            visualizer,
            popup,
            overlay_visible: AtomicBool::new(false),
        }
    }

    /// Record an approval rendered inline in the chat.  No view is opened
    /// and no overlay is shown — the chat renders the request itself.
    pub async fn register_inline_approval(&self, request_id: &str, approval_type: ApprovalType) {
        let record = ApprovalRecord {
            request_id: request_id.to_string(),
            view_type: ApprovalViewType::Inline,
            approval_type,
            machine_view: None,
            is_auto_opened: false,
            had_existing_visualizer: false,
            timestamp: chrono::Utc::now().to_rfc3339(),
            is_closed: false,
            project_path: None,
            agent_metadata: None,
        };
        self.records
            .write()
            .await
            .insert(request_id.to_string(), record);
        info!(request_id = %request_id, "inline approval registered");
    }

    /// Open an approval view.  Routed through the popup machine when a main
    /// visualizer panel already exists (so the user's current view is not
    /// displaced), through the main machine otherwise.  Always shows the
    /// chat overlay.
    pub async fn open_approval_view_popup(
        &self,
        request_id: &str,
        approval_type: ApprovalType,
        location: ViewLocation,
        is_auto_opened: bool,
    ) {
        let had_existing_visualizer = self
            .router
            .has_subscriber(webview_type::VISUALIZER)
            .await;

        let view_type = if had_existing_visualizer {
            self.popup
                .send_event(PopupEvent::OpenView(location.clone()))
                .await;
            ApprovalViewType::Popup
        } else {
            self.visualizer
                .send_event(VisualizerEvent::OpenView(location.clone()))
                .await;
            ApprovalViewType::Main
        };

        let record = ApprovalRecord {
            request_id: request_id.to_string(),
            view_type,
            approval_type,
            machine_view: location.view.clone(),
            is_auto_opened,
            had_existing_visualizer,
            timestamp: chrono::Utc::now().to_rfc3339(),
            is_closed: false,
            project_path: location.project_path.clone(),
            agent_metadata: location.agent_metadata.clone(),
        };
        self.records
            .write()
            .await
            .insert(request_id.to_string(), record);
        info!(
            request_id = %request_id,
            view_type = ?view_type,
            "approval view opened"
        );
        self.show_overlay(request_id, approval_type).await;
    }

    /// The user closed the popup.  Marks the record closed; hides the
    /// overlay when nothing else is pending; and when the approval had no
    /// pre-existing visualizer, navigates the main view back to the package
    /// overview so the user is not left on a now-meaningless view.
    ///
    /// Inline records carry no placement, so a close for one is ignored.
    pub async fn handle_popup_closed(&self, request_id: &str) {
        let record = {
            let mut records = self.records.write().await;
            let Some(record) = records.get_mut(request_id) else {
                debug!(request_id = %request_id, "popup closed for unknown approval — ignoring");
                return;
            };
            if record.view_type == ApprovalViewType::Inline {
                debug!(request_id = %request_id, "popup closed for inline approval — ignoring");
                return;
            }
            record.is_closed = true;
            record.clone()
        };
        if !self.has_active_approvals().await {
            self.hide_overlay().await;
        }
        if !record.had_existing_visualizer {
            self.visualizer
                .send_event(VisualizerEvent::OpenView(ViewLocation::package_overview(
                    record.project_path.clone(),
                )))
                .await;
        }
    }

    /// Re-show a previously closed approval view using its saved placement
    /// metadata, recomputing popup-vs-main for the current panel layout.
    /// Logs and returns without action when the record is missing, inline,
    /// or lacks saved placement.
    pub async fn reopen_approval_view_popup(&self, request_id: &str) {
        let saved = {
            let records = self.records.read().await;
            let Some(record) = records.get(request_id) else {
                warn!(request_id = %request_id, "cannot reopen — approval not found");
                return;
            };
            if record.view_type == ApprovalViewType::Inline {
                warn!(request_id = %request_id, "cannot reopen — approval is inline");
                return;
            }
            let (Some(view), Some(project_path)) =
                (record.machine_view.clone(), record.project_path.clone())
            else {
                warn!(request_id = %request_id, "cannot reopen — no saved placement metadata");
                return;
            };
            (view, project_path, record.approval_type, record.agent_metadata.clone())
        };
        let (view, project_path, approval_type, agent_metadata) = saved;

        let location = ViewLocation {
            view: Some(view),
            project_path: Some(project_path),
            agent_metadata,
            ..ViewLocation::default()
        };
        let had_existing_visualizer = self
            .router
            .has_subscriber(webview_type::VISUALIZER)
            .await;
        let view_type = if had_existing_visualizer {
            self.popup
                .send_event(PopupEvent::ReopenView(location))
                .await;
            ApprovalViewType::Popup
        } else {
            self.visualizer
                .send_event(VisualizerEvent::OpenView(location))
                .await;
            ApprovalViewType::Main
        };

        {
            let mut records = self.records.write().await;
            if let Some(record) = records.get_mut(request_id) {
                record.view_type = view_type;
                record.had_existing_visualizer = had_existing_visualizer;
                record.is_closed = false;
            }
        }
        info!(request_id = %request_id, view_type = ?view_type, "approval view reopened");
        self.show_overlay(request_id, approval_type).await;
    }

    /// Remove one approval record.  With `clear_metadata`, also clears the
    /// underlying machine view first: closes the popup when it still shows
    /// this approval's view, or navigates the main view back to the package
    /// overview.  Calling twice with the same id is a safe no-op.
    pub async fn cleanup_view(&self, request_id: &str, clear_metadata: bool) {
        let removed = self.records.write().await.remove(request_id);
        let Some(record) = removed else {
            debug!(request_id = %request_id, "cleanup for unknown approval — ignoring");
            return;
        };
        if clear_metadata {
            self.clear_machine_view(&record).await;
        }
        self.sync_overlay().await;
        info!(request_id = %request_id, "approval view cleaned up");
    }

    /// Remove every record, clearing machine views along the way, and hide
    /// the overlay.
    pub async fn cleanup_all_views(&self) {
        let records: Vec<ApprovalRecord> =
            self.records.write().await.drain().map(|(_, r)| r).collect();
        for record in &records {
            self.clear_machine_view(record).await;
        }
        self.hide_overlay().await;
        info!(count = records.len(), "all approval views cleaned up");
    }

    /// The main visualizer panel was torn down.  Every placement is gone, so
    /// mark everything closed and hide the overlay unconditionally.
    pub async fn on_visualizer_closed(&self) {
        let mut records = self.records.write().await;
        for record in records.values_mut() {
            record.is_closed = true;
        }
        drop(records);
        self.hide_overlay().await;
        debug!("visualizer closed — all approvals marked closed");
    }

    /// True iff any record is still open.  Drives overlay visibility.
    pub async fn has_active_approvals(&self) -> bool {
        self.records.read().await.values().any(|r| !r.is_closed)
    }

    pub async fn get_view(&self, request_id: &str) -> Option<ApprovalRecord> {
        self.records.read().await.get(request_id).cloned()
    }

    pub async fn list(&self) -> Vec<ApprovalRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Current overlay visibility as last pushed to the chat webview.
    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible.load(Ordering::SeqCst)
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    async fn clear_machine_view(&self, record: &ApprovalRecord) {
        match record.view_type {
            ApprovalViewType::Popup => {
                // Only close the popup if it still shows this approval's
                // view — the user may have navigated elsewhere already.
                if self.popup.context().await.view == record.machine_view {
                    self.popup.send_event(PopupEvent::CloseView).await;
                }
            }
            ApprovalViewType::Main => {
                self.visualizer
                    .send_event(VisualizerEvent::OpenView(ViewLocation::package_overview(
                        record.project_path.clone(),
                    )))
                    .await;
            }
            ApprovalViewType::Inline => {}
        }
    }

    async fn show_overlay(&self, request_id: &str, approval_type: ApprovalType) {
        self.overlay_visible.store(true, Ordering::SeqCst);
        self.router
            .send(
                "chat.showApprovalOverlay",
                &NotificationTarget::webview(webview_type::CHAT),
                json!({
                    "requestId": request_id,
                    "approvalType": approval_type,
                    "message": overlay_message(approval_type),
                }),
            )
            .await;
    }

    async fn hide_overlay(&self) {
        self.overlay_visible.store(false, Ordering::SeqCst);
        self.router
            .send(
                "chat.hideApprovalOverlay",
                &NotificationTarget::webview(webview_type::CHAT),
                Value::Null,
            )
            .await;
    }

    /// Re-derive overlay visibility from the registry after a removal.
    async fn sync_overlay(&self) {
        if !self.has_active_approvals().await {
            self.hide_overlay().await;
        }
    }
}
