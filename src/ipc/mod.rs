pub mod auth;
pub mod event;
pub mod handlers;

use crate::ipc::event::webview_type;
use crate::HostContext;
use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

// ─── JSON-RPC 2.0 types ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RpcRequest {
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

#[derive(Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Serialize)]
struct RpcError {
    code: i32,
    message: String,
}

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;
const UNAUTHORIZED: i32 = -32004;

// ─── Server ──────────────────────────────────────────────────────────────────

pub async fn run(ctx: Arc<HostContext>) -> Result<()> {
    let addr = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "IPC server listening (WebSocket + HTTP health on same port)");

    // Graceful shutdown: resolve on SIGTERM (Unix) or Ctrl-C (all platforms).
    // Pinned so we can use it in the select! loop without moving.
    let shutdown = make_shutdown_future();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("shutdown signal received — stopping IPC server");
                break;
            }

            conn = listener.accept() => {
                let (stream, peer) = match conn {
                    Ok(c) => c,
                    Err(e) => {
                        error!(err = %e, "accept error");
                        continue;
                    }
                };
                debug!(peer = %peer, "new connection");
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, ctx).await {
                        warn!(peer = %peer, err = %e, "connection error");
                    }
                });
            }
        }
    }

    info!("IPC server stopped");
    Ok(())
}

/// Respond to an HTTP `GET /health` request with a JSON status document.
///
/// The host shares one port for both WebSocket (JSON-RPC) and a plain HTTP
/// health endpoint so clients can check liveness without a WS library.
async fn handle_health_check(mut stream: tokio::net::TcpStream, ctx: &HostContext) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Consume the request (we don't inspect it — any GET /health is fine).
    let mut req_buf = vec![0u8; 2048];
    let _ = stream.read(&mut req_buf).await;

    let body = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": ctx.started_at.elapsed().as_secs(),
        "registeredWebviews": ctx.router.subscriber_count().await,
        "port": ctx.config.port,
    });
    let body_str = body.to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body_str.len(),
        body_str
    );
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

/// Returns a future that resolves when a shutdown signal is received.
///
/// On Unix we listen for SIGTERM *and* Ctrl-C.
/// On other platforms we listen for Ctrl-C only.
async fn make_shutdown_future() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

/// A connection's registration in the notification router, undone on
/// disconnect.
struct Registration {
    webview_type: String,
    id: u64,
}

async fn handle_connection(stream: tokio::net::TcpStream, ctx: Arc<HostContext>) -> Result<()> {
    // Peek at the first bytes to distinguish HTTP health checks from
    // WebSocket upgrades.  Both share the same port; only "GET /health" is
    // answered as plain HTTP, everything else falls through to the WS
    // handshake.
    let mut peek_buf = [0u8; 12];
    let n = stream.peek(&mut peek_buf).await.unwrap_or(0);
    if n >= 11 && &peek_buf[..11] == b"GET /health" {
        return handle_health_check(stream, &ctx).await;
    }

    let ws = accept_async(stream).await?;
    let (mut sink, mut stream) = ws.split();

    // ── Auth challenge ───────────────────────────────────────────────────────
    // The first message from every client must be a `host.auth` RPC call
    // carrying the correct token.  This prevents other local processes from
    // connecting to the host and issuing arbitrary RPC commands.
    //
    // Token is stored at {data_dir}/auth_token with mode 0600.  The editor
    // extension reads this file and sends it here on every connect.
    if ctx.config.auth_enabled && !ctx.auth_token.is_empty() {
        let first = tokio::time::timeout(std::time::Duration::from_secs(10), stream.next()).await;

        let text = match first {
            Ok(Some(Ok(Message::Text(t)))) => t,
            // Timeout, connection closed, or non-text frame — reject silently.
            _ => return Ok(()),
        };

        let req: RpcRequest = match serde_json::from_str(&text) {
            Ok(r) => r,
            Err(_) => {
                let _ = sink
                    .send(Message::Text(error_response(
                        Value::Null,
                        PARSE_ERROR,
                        "Parse error",
                    )))
                    .await;
                return Ok(());
            }
        };

        let id = req.id.clone().unwrap_or(Value::Null);

        if req.method != "host.auth" {
            let _ = sink
                .send(Message::Text(error_response(
                    id,
                    UNAUTHORIZED,
                    "Unauthorized — send host.auth first",
                )))
                .await;
            return Ok(());
        }

        let provided = req
            .params
            .as_ref()
            .and_then(|p| p.get("token"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        if !auth::validate_token(provided, &ctx.auth_token) {
            let _ = sink
                .send(Message::Text(error_response(
                    id,
                    UNAUTHORIZED,
                    "Unauthorized — invalid token",
                )))
                .await;
            return Ok(());
        }

        // Auth success — send the RPC response and continue.
        let resp = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": { "authenticated": true }
        });
        let _ = sink.send(Message::Text(resp.to_string())).await;
        debug!("client authenticated");
    }

    // Per-connection notification channel.  `webview.register` binds it to a
    // webview type in the router; pushed notifications arrive here and are
    // forwarded over the socket.
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<String>();
    let mut registration: Option<Registration> = None;

    loop {
        tokio::select! {
            // Incoming message from client
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = if let Some(reg) =
                            try_register(&text, &ctx, &notify_tx, &mut registration).await
                        {
                            reg
                        } else {
                            dispatch_text(&text, &ctx).await
                        };
                        if let Err(e) = sink.send(Message::Text(response)).await {
                            warn!(err = %e, "send error");
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(err = %e, "ws error");
                        break;
                    }
                    _ => {}
                }
            }
            // Outgoing targeted notification
            note = notify_rx.recv() => {
                match note {
                    Some(json) => {
                        if let Err(e) = sink.send(Message::Text(json)).await {
                            warn!(err = %e, "notification send error");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    if let Some(reg) = registration {
        on_webview_disconnect(&ctx, &reg).await;
    }
    Ok(())
}

/// Handle `webview.register` in the connection loop, where the connection's
/// notification sender is in scope.  Returns `None` for every other method.
///
/// Re-registering replaces the previous binding for this connection.
async fn try_register(
    text: &str,
    ctx: &HostContext,
    notify_tx: &mpsc::UnboundedSender<String>,
    registration: &mut Option<Registration>,
) -> Option<String> {
    let req: RpcRequest = serde_json::from_str(text).ok()?;
    if req.method != "webview.register" {
        return None;
    }
    let id = req.id.unwrap_or(Value::Null);

    let webview_type = match req
        .params
        .as_ref()
        .and_then(|p| p.get("webviewType"))
        .and_then(Value::as_str)
    {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => {
            return Some(error_response(
                id,
                INVALID_PARAMS,
                "Invalid params: missing field: webviewType",
            ))
        }
    };

    if let Some(prev) = registration.take() {
        ctx.router.unregister(&prev.webview_type, prev.id).await;
    }
    let sub_id = ctx.router.register(&webview_type, notify_tx.clone()).await;
    *registration = Some(Registration {
        webview_type: webview_type.clone(),
        id: sub_id,
    });

    let resp = RpcResponse {
        jsonrpc: "2.0",
        id,
        result: Some(serde_json::json!({ "webviewType": webview_type })),
        error: None,
    };
    Some(serde_json::to_string(&resp).unwrap_or_default())
}

/// A registered webview's socket dropped.  The router binding goes away and
/// the corresponding machine is told its panel is gone.
async fn on_webview_disconnect(ctx: &HostContext, reg: &Registration) {
    ctx.router.unregister(&reg.webview_type, reg.id).await;
    match reg.webview_type.as_str() {
        webview_type::VISUALIZER => {
            ctx.approvals.on_visualizer_closed().await;
            ctx.visualizer
                .send_event(crate::machine::visualizer::VisualizerEvent::Dispose)
                .await;
        }
        webview_type::POPUP => {
            ctx.popup
                .send_event(crate::machine::popup::PopupEvent::Dispose)
                .await;
        }
        webview_type::AI_PANEL => {
            ctx.ai_panel
                .send_event(crate::machine::ai_panel::AiPanelEvent::Dispose)
                .await;
        }
        _ => {}
    }
    debug!(webview_type = %reg.webview_type, "webview disconnected");
}

pub(crate) async fn dispatch_text(text: &str, ctx: &HostContext) -> String {
    // Parse
    let req: RpcRequest = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(_) => {
            return error_response(Value::Null, PARSE_ERROR, "Parse error");
        }
    };

    // Validate jsonrpc field
    if req.jsonrpc != "2.0" {
        return error_response(
            req.id.unwrap_or(Value::Null),
            INVALID_REQUEST,
            "Invalid Request",
        );
    }

    let id = req.id.unwrap_or(Value::Null);
    let params = req.params.unwrap_or(Value::Null);

    debug!(method = %req.method, "rpc dispatch");

    let result = dispatch(&req.method, params, ctx).await;

    match result {
        Ok(value) => {
            let resp = RpcResponse {
                jsonrpc: "2.0",
                id,
                result: Some(value),
                error: None,
            };
            serde_json::to_string(&resp).unwrap_or_default()
        }
        Err(e) => {
            // Map specific errors to RPC codes
            let (code, msg) = classify_error(&e);
            error_response(id, code, &msg)
        }
    }
}

async fn dispatch(method: &str, params: Value, ctx: &HostContext) -> anyhow::Result<Value> {
    match method {
        "host.ping" => handlers::host::ping(params, ctx).await,
        "host.status" => handlers::host::status(params, ctx).await,
        "visualizer.initialize" => handlers::visualizer::initialize(params, ctx).await,
        "visualizer.getContext" => handlers::visualizer::get_context(params, ctx).await,
        "visualizer.getState" => handlers::visualizer::get_state(params, ctx).await,
        "visualizer.openView" => handlers::visualizer::open_view(params, ctx).await,
        "visualizer.updateView" => handlers::visualizer::update_view(params, ctx).await,
        "visualizer.closeView" => handlers::visualizer::close_view(params, ctx).await,
        "visualizer.disposed" => handlers::visualizer::disposed(params, ctx).await,
        "popup.initialize" => handlers::popup::initialize(params, ctx).await,
        "popup.getContext" => handlers::popup::get_context(params, ctx).await,
        "popup.getState" => handlers::popup::get_state(params, ctx).await,
        "popup.openView" => handlers::popup::open_view(params, ctx).await,
        "popup.reopenView" => handlers::popup::reopen_view(params, ctx).await,
        "popup.notifyView" => handlers::popup::notify_view(params, ctx).await,
        "popup.updateView" => handlers::popup::update_view(params, ctx).await,
        "popup.closeView" => handlers::popup::close_view(params, ctx).await,
        "popup.disposed" => handlers::popup::disposed(params, ctx).await,
        "aiPanel.initialize" => handlers::ai_panel::initialize(params, ctx).await,
        "aiPanel.getState" => handlers::ai_panel::get_state(params, ctx).await,
        "aiPanel.getContext" => handlers::ai_panel::get_context(params, ctx).await,
        "aiPanel.login" => handlers::ai_panel::login(params, ctx).await,
        "aiPanel.signOut" => handlers::ai_panel::sign_out(params, ctx).await,
        "aiPanel.disposed" => handlers::ai_panel::disposed(params, ctx).await,
        "approval.registerInline" => handlers::approval::register_inline(params, ctx).await,
        "approval.openPopup" => handlers::approval::open_popup(params, ctx).await,
        "approval.popupClosed" => handlers::approval::popup_closed(params, ctx).await,
        "approval.reopenPopup" => handlers::approval::reopen_popup(params, ctx).await,
        "approval.cleanup" => handlers::approval::cleanup(params, ctx).await,
        "approval.cleanupAll" => handlers::approval::cleanup_all(params, ctx).await,
        "approval.list" => handlers::approval::list(params, ctx).await,
        "approval.get" => handlers::approval::get(params, ctx).await,
        "approval.hasActive" => handlers::approval::has_active(params, ctx).await,
        "review.setContext" => handlers::review::set_context(params, ctx).await,
        "review.getContext" => handlers::review::get_context(params, ctx).await,
        "review.clearContext" => handlers::review::clear_context(params, ctx).await,
        "review.affectedPackages" => handlers::review::affected_packages(params, ctx).await,
        _ => Err(anyhow::anyhow!("METHOD_NOT_FOUND:{}", method)),
    }
}

fn classify_error(e: &anyhow::Error) -> (i32, String) {
    let msg = e.to_string();
    if msg.starts_with("METHOD_NOT_FOUND:") {
        return (METHOD_NOT_FOUND, "Method not found".to_string());
    }
    if msg.contains("missing field") || msg.contains("invalid type") {
        return (INVALID_PARAMS, format!("Invalid params: {}", msg));
    }
    (INTERNAL_ERROR, msg)
}

fn error_response(id: Value, code: i32, message: &str) -> String {
    let resp = RpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(RpcError {
            code,
            message: message.to_string(),
        }),
    };
    serde_json::to_string(&resp).unwrap_or_default()
}
