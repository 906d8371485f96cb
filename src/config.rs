use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4310;
const DEFAULT_REVIEW_TTL_MINUTES: u64 = 30;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// WebSocket server port (default: 4310).
    port: Option<u16>,
    /// Log level filter string, e.g. "debug", "info,vizd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Bind address for the WebSocket server (default: "127.0.0.1").
    bind_address: Option<String>,
    /// Project opened by default when a visualizer starts with no location.
    project_path: Option<String>,
    /// Minutes a pending review context stays retrievable (default: 30).
    review_ttl_minutes: Option<u64>,
    /// Override the AI backend base URL.
    ai_base_url: Option<String>,
    /// Enable the AI panel and its login flows (default: true).
    ai_enabled: Option<bool>,
    /// Require the connection token on every WebSocket client (default: true).
    auth_enabled: Option<bool>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── HostConfig ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Bind address for the WebSocket server (VIZD_BIND env var, default: "127.0.0.1").
    pub bind_address: String,
    /// Project opened by default (VIZD_PROJECT_PATH env var). None = no project.
    pub project_path: Option<String>,
    /// Pending review context lifetime in minutes (0 is treated as the default).
    pub review_ttl_minutes: u64,
    /// AI backend base URL (VIZD_AI_URL env var).
    pub ai_base_url: String,
    /// Whether the AI panel is enabled; when false it stays in `disabled`.
    pub ai_enabled: bool,
    /// Whether WebSocket clients must present the connection token.
    pub auth_enabled: bool,
}

const DEFAULT_AI_BASE_URL: &str = "https://api.vizd.dev";

impl HostConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("VIZD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let bind_address = bind_address
            .or(std::env::var("VIZD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let project_path = std::env::var("VIZD_PROJECT_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.project_path);

        let review_ttl_minutes = toml
            .review_ttl_minutes
            .filter(|&m| m > 0)
            .unwrap_or(DEFAULT_REVIEW_TTL_MINUTES);

        let ai_base_url = std::env::var("VIZD_AI_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.ai_base_url)
            .unwrap_or_else(|| DEFAULT_AI_BASE_URL.to_string());

        let ai_enabled = toml.ai_enabled.unwrap_or(true);
        let auth_enabled = toml.auth_enabled.unwrap_or(true);

        Self {
            port,
            data_dir,
            log,
            log_format,
            bind_address,
            project_path,
            review_ttl_minutes,
            ai_base_url,
            ai_enabled,
            auth_enabled,
        }
    }

    pub fn review_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.review_ttl_minutes * 60)
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/vizd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("vizd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/vizd or ~/.local/share/vizd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("vizd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local").join("share").join("vizd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\vizd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("vizd");
        }
    }
    // Fallback
    PathBuf::from(".vizd")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "port = 5000\nlog = \"debug\"\nreview_ttl_minutes = 5\nai_enabled = false\n",
        )
        .unwrap();
        let cfg = HostConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.log, "debug");
        assert_eq!(cfg.review_ttl_minutes, 5);
        assert!(!cfg.ai_enabled);
        assert!(cfg.auth_enabled);
    }

    #[test]
    fn test_cli_beats_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "port = 5000\n").unwrap();
        let cfg = HostConfig::new(Some(6000), Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.port, 6000);
    }

    #[test]
    fn test_defaults_without_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = HostConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.bind_address, "127.0.0.1");
        assert_eq!(cfg.review_ttl_minutes, 30);
        assert!(cfg.ai_enabled);
    }

    #[test]
    fn test_zero_ttl_falls_back_to_default() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "review_ttl_minutes = 0\n").unwrap();
        let cfg = HostConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.review_ttl_minutes, 30);
    }

    #[test]
    fn test_malformed_toml_is_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "port = \"not a number").unwrap();
        let cfg = HostConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.port, DEFAULT_PORT);
    }
}
