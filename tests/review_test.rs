//! Integration tests for the pending review context handoff, exercised
//! through the RPC handlers.

mod common;

use common::make_test_ctx;
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use vizd::ipc::handlers::review;
use vizd::review::{ExecutionContext, PendingReviewContext, ReviewStore};

fn set_params(temp: &str, files: &[&str]) -> Value {
    json!({
        "tempProjectPath": temp,
        "modifiedFiles": files,
        "ctx": { "projectPath": "/ws/app", "workspacePath": "/ws" },
        "projects": [
            { "packagePath": "", "projectPath": "/ws" },
            { "packagePath": "app", "projectPath": "/ws/app" },
            { "packagePath": "lib", "projectPath": "/ws/lib" },
        ],
        "shouldCleanup": false,
    })
}

#[tokio::test]
async fn test_set_then_get_round_trip() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir, 0);

    let result = review::set_context(set_params("/tmp/run-1", &["app/main.src"]), &ctx)
        .await
        .unwrap();
    assert_eq!(result["affectedPackagePaths"], json!(["/ws/app"]));

    let result = review::get_context(Value::Null, &ctx).await.unwrap();
    assert_eq!(result["context"]["tempProjectPath"], "/tmp/run-1");
    assert_eq!(result["context"]["modifiedFiles"], json!(["app/main.src"]));
}

#[tokio::test]
async fn test_accumulation_merges_file_sets() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir, 0);

    review::set_context(set_params("/tmp/run-1", &["app/a.src", "app/b.src"]), &ctx)
        .await
        .unwrap();
    let result = review::set_context(set_params("/tmp/run-1", &["app/b.src", "lib/c.src"]), &ctx)
        .await
        .unwrap();

    // Affected packages reflect the merged file set.
    assert_eq!(result["affectedPackagePaths"], json!(["/ws/app", "/ws/lib"]));

    let got = review::get_context(Value::Null, &ctx).await.unwrap();
    let files: Vec<String> =
        serde_json::from_value(got["context"]["modifiedFiles"].clone()).unwrap();
    assert_eq!(files.len(), 3, "b.src stored once despite appearing twice");
}

#[tokio::test]
async fn test_different_temp_project_supersedes() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir, 0);

    review::set_context(set_params("/tmp/run-1", &["app/a.src"]), &ctx)
        .await
        .unwrap();
    review::set_context(set_params("/tmp/run-2", &["lib/c.src"]), &ctx)
        .await
        .unwrap();

    let got = review::get_context(Value::Null, &ctx).await.unwrap();
    assert_eq!(got["context"]["tempProjectPath"], "/tmp/run-2");
    assert_eq!(got["context"]["modifiedFiles"], json!(["lib/c.src"]));
}

#[tokio::test]
async fn test_clear_context() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir, 0);

    review::set_context(set_params("/tmp/run-1", &["app/a.src"]), &ctx)
        .await
        .unwrap();
    review::clear_context(Value::Null, &ctx).await.unwrap();
    let got = review::get_context(Value::Null, &ctx).await.unwrap();
    assert!(got["context"].is_null());
}

#[tokio::test]
async fn test_affected_packages_single_project_short_circuit() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir, 0);

    let result = review::affected_packages(
        json!({
            "modifiedFiles": ["src/main.src"],
            "projects": [{ "packagePath": "", "projectPath": "/proj" }],
            "activeProjectPath": "/proj",
        }),
        &ctx,
    )
    .await
    .unwrap();
    assert_eq!(result["affectedPackagePaths"], json!(["/proj"]));
}

#[tokio::test]
async fn test_affected_packages_requires_active_project() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir, 0);

    let err = review::affected_packages(json!({ "modifiedFiles": [] }), &ctx)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing field"));
}

#[tokio::test(start_paused = true)]
async fn test_context_expires_after_ttl() {
    let store = ReviewStore::with_ttl(Duration::from_secs(60));
    store
        .set(PendingReviewContext {
            temp_project_path: "/tmp/run-1".to_string(),
            modified_files: vec!["a.src".to_string()],
            ctx: ExecutionContext {
                project_path: "/proj".to_string(),
                workspace_path: None,
            },
            projects: vec![],
            should_cleanup: false,
            message_id: Some("msg-1".to_string()),
            affected_package_paths: vec![],
            stored_at: tokio::time::Instant::now(),
        })
        .await;

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(store.get().await.is_some());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(store.get().await.is_none());
}

#[tokio::test]
async fn test_shutdown_cleans_temp_project() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir, 0);

    let temp = dir.path().join("agent-run");
    std::fs::create_dir_all(&temp).unwrap();

    let mut params = set_params(temp.to_str().unwrap(), &["app/a.src"]);
    params["shouldCleanup"] = json!(true);
    review::set_context(params, &ctx).await.unwrap();

    ctx.shutdown().await;
    assert!(!temp.exists(), "temp project removed on shutdown");
    // Shutdown twice is safe.
    ctx.shutdown().await;
}
