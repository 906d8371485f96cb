// SPDX-License-Identifier: MIT
//! AI panel authentication state machine.
//!
//! `initialize → {authenticated | unauthenticated | disabled}`, with a
//! composite `authenticating.{ssoFlow | apiKeyFlow | awsBedrockFlow}` state
//! while a credential exchange is in flight.  The flow branch is re-derived
//! from the context's selected login method on every entry into the
//! composite state — switching credential types mid-flow cannot leave a
//! stale sub-flow.
//!
//! The credential exchange itself is an invoked service behind the
//! [`CredentialService`] trait.  It runs to completion before the machine
//! settles: success lands in `authenticated` (and persists the secret),
//! failure lands in `disabled` carrying the error message.  Nothing in this
//! path unwinds into the caller.

use crate::ipc::event::{webview_type, NotificationRouter, NotificationTarget};
use crate::machine::Snapshot;
use crate::secrets::{self, SecretStore};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

// ─── Login methods and the credential service seam ───────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoginMethod {
    Sso,
    ApiKey,
    AwsBedrock,
}

impl LoginMethod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sso" => Some(Self::Sso),
            "apiKey" => Some(Self::ApiKey),
            "awsBedrock" => Some(Self::AwsBedrock),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sso => "sso",
            Self::ApiKey => "apiKey",
            Self::AwsBedrock => "awsBedrock",
        }
    }

    /// Secret key the exchanged credential is persisted under.
    fn secret_key(self) -> &'static str {
        match self {
            Self::ApiKey => secrets::API_KEY_KEY,
            Self::Sso | Self::AwsBedrock => secrets::ACCESS_TOKEN_KEY,
        }
    }
}

/// Outcome of a successful credential exchange.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub account: String,
    pub secret: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("login cancelled by user")]
    Cancelled,
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}

/// The external credential exchange.  The real backend lives outside this
/// process; tests substitute a mock.
#[async_trait]
pub trait CredentialService: Send + Sync {
    async fn authenticate(
        &self,
        method: LoginMethod,
        credentials: &Value,
    ) -> Result<AuthOutcome, AuthError>;
}

/// Default service: accepts credentials already obtained by the external
/// flow (an API key, or a token from the browser SSO / cloud-provider
/// handoff) and validates their shape.  No network calls are made here.
pub struct TokenCredentialService;

#[async_trait]
impl CredentialService for TokenCredentialService {
    async fn authenticate(
        &self,
        method: LoginMethod,
        credentials: &Value,
    ) -> Result<AuthOutcome, AuthError> {
        let field = match method {
            LoginMethod::ApiKey => "apiKey",
            LoginMethod::Sso | LoginMethod::AwsBedrock => "token",
        };
        let secret = credentials
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::InvalidCredentials(format!("missing field: {field}")))?;
        let account = credentials
            .get("account")
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();
        Ok(AuthOutcome {
            account,
            secret: secret.to_string(),
        })
    }
}

// ─── States, events, context ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiPanelState {
    Init,
    Unauthenticated,
    Authenticating(LoginMethod),
    Authenticated,
    Disabled,
}

impl AiPanelState {
    pub fn to_wire(self) -> Value {
        match self {
            Self::Init => json!("initialize"),
            Self::Unauthenticated => json!("unauthenticated"),
            Self::Authenticating(LoginMethod::Sso) => json!({"authenticating": "ssoFlow"}),
            Self::Authenticating(LoginMethod::ApiKey) => json!({"authenticating": "apiKeyFlow"}),
            Self::Authenticating(LoginMethod::AwsBedrock) => {
                json!({"authenticating": "awsBedrockFlow"})
            }
            Self::Authenticated => json!("authenticated"),
            Self::Disabled => json!("disabled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AiPanelContext {
    /// Login method selected by the user; the authenticating sub-flow is
    /// derived from this field on entry, never cached.
    pub login_method: Option<LoginMethod>,
    pub account: Option<String>,
    /// Error message rendered by the disabled state's retry affordance.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AiPanelEvent {
    StartLogin { method: LoginMethod, credentials: Value },
    SignOut,
    Dispose,
    /// Internal: invoked credential service resolved.
    AuthSucceeded { account: String },
    /// Internal: invoked credential service failed.
    AuthFailed { message: String },
}

impl AiPanelEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::StartLogin { .. } => "START_LOGIN",
            Self::SignOut => "SIGN_OUT",
            Self::Dispose => "DISPOSE",
            Self::AuthSucceeded { .. } => "AUTH_SUCCEEDED",
            Self::AuthFailed { .. } => "AUTH_FAILED",
        }
    }
}

enum Effect {
    /// Run the credential exchange for the given method.
    Authenticate { method: LoginMethod, credentials: Value },
    /// Persist the exchanged secret (held in `pending_secret`) and account.
    PersistCredentials { method: LoginMethod, account: String },
    /// Remove all stored credentials.
    ClearCredentials,
}

fn transition(
    state: AiPanelState,
    context: &AiPanelContext,
    event: &AiPanelEvent,
) -> Option<(AiPanelState, AiPanelContext, Vec<Effect>)> {
    use AiPanelEvent::*;
    use AiPanelState::*;
    match (state, event) {
        // Valid from unauthenticated, disabled (retry), and mid-flow (the
        // user switched credential types) — the sub-flow is re-derived from
        // the freshly-set login method.
        (Unauthenticated | Disabled | Authenticating(_), StartLogin { method, credentials }) => {
            let mut ctx = context.clone();
            ctx.login_method = Some(*method);
            ctx.error = None;
            // Sub-flow derived from the context field, not from the event,
            // so every entry into the composite state recomputes it.
            let flow = ctx.login_method.unwrap_or(*method);
            Some((
                Authenticating(flow),
                ctx,
                vec![Effect::Authenticate {
                    method: *method,
                    credentials: credentials.clone(),
                }],
            ))
        }
        (Authenticating(method), AuthSucceeded { account }) => {
            let mut ctx = context.clone();
            ctx.account = Some(account.clone());
            ctx.error = None;
            Some((
                Authenticated,
                ctx,
                vec![Effect::PersistCredentials {
                    method,
                    account: account.clone(),
                }],
            ))
        }
        (Authenticating(_), AuthFailed { message }) => {
            let mut ctx = context.clone();
            ctx.account = None;
            ctx.error = Some(message.clone());
            Some((Disabled, ctx, vec![]))
        }
        (Authenticated | Disabled, SignOut) => {
            Some((Unauthenticated, AiPanelContext::default(), vec![Effect::ClearCredentials]))
        }
        (_, Dispose) => Some((Init, AiPanelContext::default(), vec![])),
        _ => None,
    }
}

// ─── Machine ─────────────────────────────────────────────────────────────────

struct Inner {
    state: AiPanelState,
    context: AiPanelContext,
    started: bool,
    /// Secret from the in-flight exchange, handed from the authenticate
    /// effect to the persist effect.
    pending_secret: Option<String>,
}

pub struct AiPanelMachine {
    router: Arc<NotificationRouter>,
    secrets: Arc<SecretStore>,
    service: Arc<dyn CredentialService>,
    enabled: bool,
    inner: Mutex<Inner>,
}

impl AiPanelMachine {
    pub fn new(
        router: Arc<NotificationRouter>,
        secrets: Arc<SecretStore>,
        service: Arc<dyn CredentialService>,
        enabled: bool,
    ) -> Self {
        Self {
            router,
            secrets,
            service,
            enabled,
            inner: Mutex::new(Inner {
                state: AiPanelState::Init,
                context: AiPanelContext::default(),
                started: false,
                pending_secret: None,
            }),
        }
    }

    /// Start the machine.  Lands in `disabled` when AI features are turned
    /// off, `authenticated` when a stored credential exists, otherwise
    /// `unauthenticated`.  Idempotent while started.
    pub async fn initialize(&self) -> Snapshot<AiPanelContext> {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            if inner.started {
                return Snapshot {
                    state: inner.state.to_wire(),
                    context: inner.context.clone(),
                };
            }
            inner.started = true;
            if !self.enabled {
                inner.state = AiPanelState::Disabled;
                inner.context = AiPanelContext {
                    error: Some("AI features are disabled by configuration".to_string()),
                    ..AiPanelContext::default()
                };
            } else if self.secrets.get(secrets::ACCESS_TOKEN_KEY).is_some()
                || self.secrets.get(secrets::API_KEY_KEY).is_some()
            {
                inner.state = AiPanelState::Authenticated;
                inner.context = AiPanelContext {
                    account: self.secrets.get(secrets::ACCOUNT_KEY),
                    ..AiPanelContext::default()
                };
            } else {
                inner.state = AiPanelState::Unauthenticated;
                inner.context = AiPanelContext::default();
            }
            Snapshot {
                state: inner.state.to_wire(),
                context: inner.context.clone(),
            }
        };
        self.push_state_changed(&snapshot).await;
        snapshot
    }

    pub async fn context(&self) -> AiPanelContext {
        self.inner.lock().await.context.clone()
    }

    pub async fn state(&self) -> Value {
        self.inner.lock().await.state.to_wire()
    }

    /// Process one event.  A `StartLogin` runs the invoked credential
    /// service to completion before returning — the returned snapshot is
    /// always a settled state (`authenticated` or `disabled`), never
    /// `authenticating`.
    pub async fn send_event(&self, event: AiPanelEvent) -> Snapshot<AiPanelContext> {
        let (mut snapshot, effects, applied) = self.apply(event).await;
        if applied {
            self.push_state_changed(&snapshot).await;
        }
        for effect in effects {
            match effect {
                Effect::Authenticate { method, credentials } => {
                    let follow_up = match self.service.authenticate(method, &credentials).await {
                        Ok(outcome) => {
                            self.inner.lock().await.pending_secret = Some(outcome.secret);
                            AiPanelEvent::AuthSucceeded {
                                account: outcome.account,
                            }
                        }
                        Err(e) => AiPanelEvent::AuthFailed {
                            message: e.to_string(),
                        },
                    };
                    snapshot = Box::pin(self.send_event(follow_up)).await;
                }
                Effect::PersistCredentials { method, account } => {
                    let secret = self.inner.lock().await.pending_secret.take();
                    if let Some(secret) = secret {
                        if let Err(e) = self.secrets.set(method.secret_key(), &secret) {
                            warn!(err = %e, "failed to persist credential");
                        }
                        if let Err(e) = self.secrets.set(secrets::ACCOUNT_KEY, &account) {
                            warn!(err = %e, "failed to persist account");
                        }
                    }
                }
                Effect::ClearCredentials => {
                    for key in [
                        secrets::ACCESS_TOKEN_KEY,
                        secrets::API_KEY_KEY,
                        secrets::ACCOUNT_KEY,
                    ] {
                        if let Err(e) = self.secrets.delete(key) {
                            warn!(key = key, err = %e, "failed to clear credential");
                        }
                    }
                }
            }
        }
        snapshot
    }

    async fn apply(
        &self,
        event: AiPanelEvent,
    ) -> (Snapshot<AiPanelContext>, Vec<Effect>, bool) {
        let mut inner = self.inner.lock().await;
        match transition(inner.state, &inner.context, &event) {
            Some((state, context, effects)) => {
                if matches!(event, AiPanelEvent::Dispose) {
                    inner.started = false;
                    inner.pending_secret = None;
                }
                inner.state = state;
                inner.context = context;
                (
                    Snapshot {
                        state: inner.state.to_wire(),
                        context: inner.context.clone(),
                    },
                    effects,
                    true,
                )
            }
            None => {
                debug!(event = event.name(), "ai panel event dropped — no transition");
                (
                    Snapshot {
                        state: inner.state.to_wire(),
                        context: inner.context.clone(),
                    },
                    vec![],
                    false,
                )
            }
        }
    }

    async fn push_state_changed(&self, snapshot: &Snapshot<AiPanelContext>) {
        self.router
            .send(
                "aiPanel.stateChanged",
                &NotificationTarget::webview(webview_type::AI_PANEL),
                snapshot.to_value(),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FailingService;

    #[async_trait]
    impl CredentialService for FailingService {
        async fn authenticate(
            &self,
            _method: LoginMethod,
            _credentials: &Value,
        ) -> Result<AuthOutcome, AuthError> {
            Err(AuthError::Unavailable("backend offline".to_string()))
        }
    }

    fn machine_with(
        dir: &TempDir,
        service: Arc<dyn CredentialService>,
        enabled: bool,
    ) -> AiPanelMachine {
        AiPanelMachine::new(
            Arc::new(NotificationRouter::new()),
            Arc::new(SecretStore::new(dir.path())),
            service,
            enabled,
        )
    }

    #[tokio::test]
    async fn test_initialize_unauthenticated_without_credentials() {
        let dir = TempDir::new().unwrap();
        let m = machine_with(&dir, Arc::new(TokenCredentialService), true);
        let snap = m.initialize().await;
        assert_eq!(snap.state, json!("unauthenticated"));
    }

    #[tokio::test]
    async fn test_initialize_disabled_when_ai_off() {
        let dir = TempDir::new().unwrap();
        let m = machine_with(&dir, Arc::new(TokenCredentialService), false);
        let snap = m.initialize().await;
        assert_eq!(snap.state, json!("disabled"));
        assert!(snap.context.error.is_some());
    }

    #[tokio::test]
    async fn test_api_key_login_persists_secret() {
        let dir = TempDir::new().unwrap();
        let m = machine_with(&dir, Arc::new(TokenCredentialService), true);
        m.initialize().await;
        let snap = m
            .send_event(AiPanelEvent::StartLogin {
                method: LoginMethod::ApiKey,
                credentials: json!({"apiKey": "sk-live-1", "account": "dev@example.com"}),
            })
            .await;
        assert_eq!(snap.state, json!("authenticated"));
        assert_eq!(snap.context.account.as_deref(), Some("dev@example.com"));

        let store = SecretStore::new(dir.path());
        assert_eq!(store.get(secrets::API_KEY_KEY).as_deref(), Some("sk-live-1"));
        assert_eq!(
            store.get(secrets::ACCOUNT_KEY).as_deref(),
            Some("dev@example.com")
        );
    }

    #[tokio::test]
    async fn test_service_failure_routes_to_disabled() {
        let dir = TempDir::new().unwrap();
        let m = machine_with(&dir, Arc::new(FailingService), true);
        m.initialize().await;
        let snap = m
            .send_event(AiPanelEvent::StartLogin {
                method: LoginMethod::Sso,
                credentials: json!({"token": "t"}),
            })
            .await;
        assert_eq!(snap.state, json!("disabled"));
        assert_eq!(
            snap.context.error.as_deref(),
            Some("auth service unavailable: backend offline")
        );
    }

    #[tokio::test]
    async fn test_invalid_credentials_message() {
        let dir = TempDir::new().unwrap();
        let m = machine_with(&dir, Arc::new(TokenCredentialService), true);
        m.initialize().await;
        let snap = m
            .send_event(AiPanelEvent::StartLogin {
                method: LoginMethod::ApiKey,
                credentials: json!({}),
            })
            .await;
        assert_eq!(snap.state, json!("disabled"));
        assert_eq!(
            snap.context.error.as_deref(),
            Some("invalid credentials: missing field: apiKey")
        );
    }

    #[tokio::test]
    async fn test_sign_out_clears_credentials() {
        let dir = TempDir::new().unwrap();
        let m = machine_with(&dir, Arc::new(TokenCredentialService), true);
        m.initialize().await;
        m.send_event(AiPanelEvent::StartLogin {
            method: LoginMethod::ApiKey,
            credentials: json!({"apiKey": "sk-live-1"}),
        })
        .await;
        let snap = m.send_event(AiPanelEvent::SignOut).await;
        assert_eq!(snap.state, json!("unauthenticated"));

        let store = SecretStore::new(dir.path());
        assert!(store.get(secrets::API_KEY_KEY).is_none());
        assert!(store.get(secrets::ACCOUNT_KEY).is_none());
    }

    #[tokio::test]
    async fn test_initialize_authenticated_with_stored_key() {
        let dir = TempDir::new().unwrap();
        {
            let store = SecretStore::new(dir.path());
            store.set(secrets::API_KEY_KEY, "sk-live-1").unwrap();
            store.set(secrets::ACCOUNT_KEY, "dev@example.com").unwrap();
        }
        let m = machine_with(&dir, Arc::new(TokenCredentialService), true);
        let snap = m.initialize().await;
        assert_eq!(snap.state, json!("authenticated"));
        assert_eq!(snap.context.account.as_deref(), Some("dev@example.com"));
    }

    #[tokio::test]
    async fn test_events_dropped_before_initialize() {
        let dir = TempDir::new().unwrap();
        let m = machine_with(&dir, Arc::new(TokenCredentialService), true);
        let snap = m.send_event(AiPanelEvent::SignOut).await;
        assert_eq!(snap.state, json!("initialize"));
    }
}
