// SPDX-License-Identifier: MIT
//! Popup visualizer state machine.
//!
//! Secondary, transient views.  Same alphabet as the main visualizer plus
//! nested open substates: `open.active` (normal open), `open.reopen` (an
//! approval view being re-shown with its saved placement), and `open.notify`
//! — a one-shot state that fires a cross-webview notification at the main
//! visualizer and settles back in `ready` before `send_event` returns.

use crate::ipc::event::{webview_type, NotificationRouter, NotificationTarget};
use crate::machine::view::ViewLocation;
use crate::machine::Snapshot;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenSub {
    Active,
    Reopen,
    Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupState {
    Init,
    Ready,
    Open(OpenSub),
}

impl PopupState {
    pub fn to_wire(self) -> Value {
        match self {
            Self::Init => json!("initialize"),
            Self::Ready => json!("ready"),
            Self::Open(OpenSub::Active) => json!({"open": "active"}),
            Self::Open(OpenSub::Reopen) => json!({"open": "reopen"}),
            Self::Open(OpenSub::Notify) => json!({"open": "notify"}),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PopupEvent {
    OpenView(ViewLocation),
    ReopenView(ViewLocation),
    NotifyView(ViewLocation),
    ViewUpdate(ViewLocation),
    CloseView,
    Dispose,
    /// Internal: the notify effect has been delivered; settle back in ready.
    NotifyDelivered,
}

impl PopupEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::OpenView(_) => "OPEN_VIEW",
            Self::ReopenView(_) => "REOPEN_VIEW",
            Self::NotifyView(_) => "NOTIFY_VIEW",
            Self::ViewUpdate(_) => "VIEW_UPDATE",
            Self::CloseView => "CLOSE_VIEW",
            Self::Dispose => "DISPOSE",
            Self::NotifyDelivered => "NOTIFY_DELIVERED",
        }
    }
}

/// Side effect produced by a transition, executed after the state lock is
/// released.
enum Effect {
    /// Push the view location at the main visualizer webview.
    NotifyVisualizer(ViewLocation),
}

struct Inner {
    state: PopupState,
    context: ViewLocation,
    started: bool,
}

/// The popup visualizer machine.
pub struct PopupMachine {
    router: Arc<NotificationRouter>,
    default_project_path: Option<String>,
    inner: Mutex<Inner>,
}

fn inherit_project(loc: &ViewLocation, context: &ViewLocation) -> ViewLocation {
    let mut next = loc.clone();
    if next.project_path.is_none() {
        next.project_path = context.project_path.clone();
    }
    next
}

fn transition(
    state: PopupState,
    context: &ViewLocation,
    event: &PopupEvent,
) -> Option<(PopupState, ViewLocation, Vec<Effect>)> {
    use PopupEvent::*;
    use PopupState::*;
    match (state, event) {
        (Ready | Open(_), OpenView(loc)) => {
            Some((Open(OpenSub::Active), inherit_project(loc, context), vec![]))
        }
        (Ready | Open(_), ReopenView(loc)) => {
            Some((Open(OpenSub::Reopen), inherit_project(loc, context), vec![]))
        }
        (Ready, NotifyView(loc)) => {
            let loc = inherit_project(loc, context);
            Some((
                Open(OpenSub::Notify),
                loc.clone(),
                vec![Effect::NotifyVisualizer(loc)],
            ))
        }
        (Open(OpenSub::Notify), NotifyDelivered) => Some((
            Ready,
            ViewLocation::default_screen(context.project_path.clone()),
            vec![],
        )),
        (Open(OpenSub::Active) | Open(OpenSub::Reopen), ViewUpdate(loc)) => {
            Some((state, inherit_project(loc, context), vec![]))
        }
        (Open(_), CloseView) => Some((
            Ready,
            ViewLocation::default_screen(context.project_path.clone()),
            vec![],
        )),
        (_, Dispose) => Some((Init, ViewLocation::default(), vec![])),
        _ => None,
    }
}

impl PopupMachine {
    pub fn new(router: Arc<NotificationRouter>, default_project_path: Option<String>) -> Self {
        Self {
            router,
            default_project_path,
            inner: Mutex::new(Inner {
                state: PopupState::Init,
                context: ViewLocation::default(),
                started: false,
            }),
        }
    }

    /// Start the machine: `initialize → ready`.  Idempotent while started.
    pub async fn initialize(&self) -> Snapshot<ViewLocation> {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            if inner.started {
                return Snapshot {
                    state: inner.state.to_wire(),
                    context: inner.context.clone(),
                };
            }
            inner.started = true;
            inner.state = PopupState::Ready;
            inner.context = ViewLocation::default_screen(self.default_project_path.clone());
            Snapshot {
                state: inner.state.to_wire(),
                context: inner.context.clone(),
            }
        };
        self.push_state_changed(&snapshot).await;
        snapshot
    }

    pub async fn context(&self) -> ViewLocation {
        self.inner.lock().await.context.clone()
    }

    pub async fn state(&self) -> Value {
        self.inner.lock().await.state.to_wire()
    }

    /// Process one event, run its effects, and — for the one-shot notify
    /// state — the internal follow-up, so the machine never parks in
    /// `open.notify`.
    pub async fn send_event(&self, event: PopupEvent) -> Snapshot<ViewLocation> {
        let snapshot = self.apply(event).await;
        if snapshot.state == json!({"open": "notify"}) {
            return self.apply(PopupEvent::NotifyDelivered).await;
        }
        snapshot
    }

    async fn apply(&self, event: PopupEvent) -> Snapshot<ViewLocation> {
        let (snapshot, effects, applied) = {
            let mut inner = self.inner.lock().await;
            match transition(inner.state, &inner.context, &event) {
                Some((state, context, effects)) => {
                    if matches!(event, PopupEvent::Dispose) {
                        inner.started = false;
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
                    debug!(event = event.name(), "popup event dropped — no transition");
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
        };
        if applied {
            self.push_state_changed(&snapshot).await;
        }
        for effect in effects {
            match effect {
                Effect::NotifyVisualizer(loc) => {
                    self.router
                        .send(
                            "popup.viewNotification",
                            &NotificationTarget::webview(webview_type::VISUALIZER),
                            serde_json::to_value(&loc).unwrap_or(Value::Null),
                        )
                        .await;
                }
            }
        }
        snapshot
    }

    async fn push_state_changed(&self, snapshot: &Snapshot<ViewLocation>) {
        self.router
            .send(
                "popup.stateChanged",
                &NotificationTarget::webview(webview_type::POPUP),
                snapshot.to_value(),
            )
            .await;
    }
}
