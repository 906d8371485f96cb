// SPDX-License-Identifier: MIT
//! vizd — view-coordination host for a visual editor toolchain.
//!
//! The host sits between an editor extension and its webview panels: it
//! owns the view state machines (main visualizer, popup visualizer, AI
//! panel), routes targeted notifications to registered webviews, tracks
//! approval views, and holds the pending review context handed from the
//! chat agent to the code reviewer.  Everything is exposed over JSON-RPC 2.0
//! on a local WebSocket.

pub mod approval;
pub mod config;
pub mod ipc;
pub mod machine;
pub mod review;
pub mod secrets;

use crate::approval::ApprovalViewManager;
use crate::config::HostConfig;
use crate::ipc::event::NotificationRouter;
use crate::machine::ai_panel::{AiPanelMachine, CredentialService};
use crate::machine::popup::PopupMachine;
use crate::machine::visualizer::VisualizerMachine;
use crate::review::ReviewStore;
use crate::secrets::SecretStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared state for the whole host.  One instance, wrapped in an `Arc`,
/// threaded through every RPC handler.
pub struct HostContext {
    pub config: HostConfig,
    pub router: Arc<NotificationRouter>,
    pub visualizer: Arc<VisualizerMachine>,
    pub popup: Arc<PopupMachine>,
    pub ai_panel: Arc<AiPanelMachine>,
    pub approvals: Arc<ApprovalViewManager>,
    pub review: Arc<ReviewStore>,
    pub secrets: Arc<SecretStore>,
    pub started_at: std::time::Instant,
    /// Connection token; empty disables the auth challenge.
    pub auth_token: String,
    shutdown_done: AtomicBool,
}

impl HostContext {
    pub fn new(
        config: HostConfig,
        credential_service: Arc<dyn CredentialService>,
        auth_token: String,
    ) -> Self {
        let router = Arc::new(NotificationRouter::new());
        let secrets = Arc::new(SecretStore::new(&config.data_dir));
        let visualizer = Arc::new(VisualizerMachine::new(
            router.clone(),
            config.project_path.clone(),
        ));
        let popup = Arc::new(PopupMachine::new(
            router.clone(),
            config.project_path.clone(),
        ));
        let ai_panel = Arc::new(AiPanelMachine::new(
            router.clone(),
            secrets.clone(),
            credential_service,
            config.ai_enabled,
        ));
        let approvals = Arc::new(ApprovalViewManager::new(
            router.clone(),
            visualizer.clone(),
            popup.clone(),
        ));
        let review = Arc::new(ReviewStore::with_ttl(config.review_ttl()));

        Self {
            config,
            router,
            visualizer,
            popup,
            ai_panel,
            approvals,
            review,
            secrets,
            started_at: std::time::Instant::now(),
            auth_token,
            shutdown_done: AtomicBool::new(false),
        }
    }

    /// Teardown hook, safe to call more than once.  Releases the pending
    /// review context's temp project.
    pub async fn shutdown(&self) {
        if self.shutdown_done.swap(true, Ordering::SeqCst) {
            return;
        }
        self.review.cleanup_on_deactivate().await;
    }
}
