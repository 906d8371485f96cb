//! Connection token for the local WebSocket port.
//!
//! The host listens on loopback only, but any process on the machine could
//! still connect and drive the webview machines.  The editor extension is
//! handed a shared secret through the filesystem instead: a token file in
//! the data directory, readable only by the owning user, which every client
//! must present in its `host.auth` call before other methods are accepted.

use anyhow::Result;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

const TOKEN_FILE: &str = "auth_token";

/// Read the connection token from `{data_dir}/auth_token`, minting one on
/// first start.  An existing-but-empty file is treated as absent and
/// replaced.
pub fn get_or_create_token(data_dir: &Path) -> Result<String> {
    let path = data_dir.join(TOKEN_FILE);

    if let Ok(existing) = std::fs::read_to_string(&path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    let token = Uuid::new_v4().simple().to_string();
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(&path, &token)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }
    info!(path = %path.display(), "connection token created");

    Ok(token)
}

/// Check a token presented in `host.auth`.  An empty expected token never
/// matches — it means the challenge is disabled and this should not be
/// reached at all.
pub fn validate_token(supplied: &str, expected: &str) -> bool {
    !expected.is_empty() && supplied == expected
}
