//! Shared helpers for integration tests.

use std::sync::Arc;
use tempfile::TempDir;
use vizd::config::HostConfig;
use vizd::machine::ai_panel::TokenCredentialService;
use vizd::HostContext;

/// Find a free local port by binding to port 0.
pub fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Build a HostContext rooted in a temp data dir, with no auth challenge.
pub fn make_test_ctx(dir: &TempDir, port: u16) -> Arc<HostContext> {
    make_test_ctx_with_token(dir, port, String::new())
}

pub fn make_test_ctx_with_token(dir: &TempDir, port: u16, auth_token: String) -> Arc<HostContext> {
    let config = HostConfig::new(
        Some(port),
        Some(dir.path().to_path_buf()),
        Some("error".to_string()),
        None,
    );
    Arc::new(HostContext::new(
        config,
        Arc::new(TokenCredentialService),
        auth_token,
    ))
}
