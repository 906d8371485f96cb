//! Cross-machine integration tests: the popup's cross-webview notify, the
//! dispose/reinitialize cycle, and the AI panel login flow through the
//! shared host context.

mod common;

use common::make_test_ctx;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use vizd::ipc::event::webview_type;
use vizd::machine::ai_panel::{AiPanelEvent, LoginMethod};
use vizd::machine::popup::PopupEvent;
use vizd::machine::view::{ViewKind, ViewLocation};
use vizd::machine::visualizer::VisualizerEvent;

fn flow_view() -> ViewLocation {
    ViewLocation {
        view: Some(ViewKind::FlowDiagram),
        document_uri: Some("file:///proj/main.src".to_string()),
        ..ViewLocation::default()
    }
}

#[tokio::test]
async fn test_popup_notify_reaches_visualizer_webview_only() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir, 0);
    ctx.popup.initialize().await;

    let (viz_tx, mut viz_rx) = mpsc::unbounded_channel();
    let (popup_tx, mut popup_rx) = mpsc::unbounded_channel();
    ctx.router.register(webview_type::VISUALIZER, viz_tx).await;
    ctx.router.register(webview_type::POPUP, popup_tx).await;

    let snap = ctx.popup.send_event(PopupEvent::NotifyView(flow_view())).await;
    assert_eq!(snap.state, json!("ready"), "notify is one-shot");

    // The visualizer webview got the cross-webview notification.
    let mut saw_notification = false;
    while let Ok(msg) = viz_rx.try_recv() {
        let v: Value = serde_json::from_str(&msg).unwrap();
        if v["method"] == "popup.viewNotification" {
            assert_eq!(v["params"]["view"], "flowDiagram");
            saw_notification = true;
        }
    }
    assert!(saw_notification);

    // The popup webview saw only its own state changes.
    while let Ok(msg) = popup_rx.try_recv() {
        let v: Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["method"], "popup.stateChanged");
    }
}

#[tokio::test]
async fn test_state_changes_are_pushed_to_owning_webview() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir, 0);

    let (tx, mut rx) = mpsc::unbounded_channel();
    ctx.router.register(webview_type::VISUALIZER, tx).await;

    ctx.visualizer.initialize().await;
    ctx.visualizer
        .send_event(VisualizerEvent::OpenView(flow_view()))
        .await;

    let mut states = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        let v: Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["method"], "visualizer.stateChanged");
        states.push(v["params"]["state"].clone());
    }
    assert_eq!(states, vec![json!("ready"), json!({"open": "active"})]);
}

#[tokio::test]
async fn test_dispose_and_reinitialize_cycle() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir, 0);

    ctx.visualizer.initialize().await;
    ctx.visualizer
        .send_event(VisualizerEvent::OpenView(flow_view()))
        .await;
    let snap = ctx.visualizer.send_event(VisualizerEvent::Dispose).await;
    assert_eq!(snap.state, json!("initialize"));

    // Events while disposed are dropped.
    let snap = ctx
        .visualizer
        .send_event(VisualizerEvent::OpenView(flow_view()))
        .await;
    assert_eq!(snap.state, json!("initialize"));

    // A fresh initialize brings the machine back to ready.
    let snap = ctx.visualizer.initialize().await;
    assert_eq!(snap.state, json!("ready"));
    assert!(snap.context.view.is_none());
}

#[tokio::test]
async fn test_ai_login_and_sign_out_through_context() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir, 0);

    let snap = ctx.ai_panel.initialize().await;
    assert_eq!(snap.state, json!("unauthenticated"));

    let snap = ctx
        .ai_panel
        .send_event(AiPanelEvent::StartLogin {
            method: LoginMethod::ApiKey,
            credentials: json!({"apiKey": "sk-test-1", "account": "me@example.com"}),
        })
        .await;
    assert_eq!(snap.state, json!("authenticated"));
    assert_eq!(snap.context.account.as_deref(), Some("me@example.com"));

    // The credential survives a restart of the machine.
    let ctx2 = make_test_ctx(&dir, 0);
    let snap = ctx2.ai_panel.initialize().await;
    assert_eq!(snap.state, json!("authenticated"));

    let snap = ctx2.ai_panel.send_event(AiPanelEvent::SignOut).await;
    assert_eq!(snap.state, json!("unauthenticated"));

    // And after sign-out, a third start finds nothing.
    let ctx3 = make_test_ctx(&dir, 0);
    let snap = ctx3.ai_panel.initialize().await;
    assert_eq!(snap.state, json!("unauthenticated"));
}

#[tokio::test]
async fn test_ai_state_changes_reach_ai_panel_webview() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir, 0);

    let (tx, mut rx) = mpsc::unbounded_channel();
    ctx.router.register(webview_type::AI_PANEL, tx).await;

    ctx.ai_panel.initialize().await;
    ctx.ai_panel
        .send_event(AiPanelEvent::StartLogin {
            method: LoginMethod::Sso,
            credentials: json!({"token": "sso-token"}),
        })
        .await;

    let mut states = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        let v: Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["method"], "aiPanel.stateChanged");
        states.push(v["params"]["state"].clone());
    }
    // unauthenticated → authenticating.ssoFlow → authenticated
    assert_eq!(
        states,
        vec![
            json!("unauthenticated"),
            json!({"authenticating": "ssoFlow"}),
            json!("authenticated"),
        ]
    );
}
