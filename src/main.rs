use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use vizd::config::HostConfig;
use vizd::machine::ai_panel::TokenCredentialService;
use vizd::{ipc, HostContext};

#[derive(Parser)]
#[command(
    name = "vizd",
    about = "vizd — view-coordination host for the visual editor",
    version
)]
struct Args {
    /// JSON-RPC WebSocket server port
    #[arg(long, env = "VIZD_PORT")]
    port: Option<u16>,

    /// Data directory for config, secrets, and the auth token
    #[arg(long, env = "VIZD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "VIZD_LOG")]
    log: Option<String>,

    /// Bind address for the WebSocket server (default: 127.0.0.1)
    #[arg(long, env = "VIZD_BIND")]
    bind_address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = HostConfig::new(args.port, args.data_dir, args.log, args.bind_address);

    // Init once — must happen before any tracing calls.
    setup_logging(&config.log, &config.log_format);

    std::fs::create_dir_all(&config.data_dir)?;

    // One-time move of credentials stored under pre-rename keys.
    vizd::secrets::SecretStore::new(&config.data_dir).migrate_legacy_keys();

    let auth_token = if config.auth_enabled {
        ipc::auth::get_or_create_token(&config.data_dir)?
    } else {
        String::new()
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.port,
        data_dir = %config.data_dir.display(),
        ai_enabled = config.ai_enabled,
        "starting vizd"
    );

    let ctx = Arc::new(HostContext::new(
        config,
        Arc::new(TokenCredentialService),
        auth_token,
    ));

    let result = ipc::run(ctx.clone()).await;
    ctx.shutdown().await;
    result
}

/// Initialize the tracing subscriber.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
fn setup_logging(log_level: &str, log_format: &str) {
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
    }
}
