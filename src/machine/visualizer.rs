// SPDX-License-Identifier: MIT
//! Main visualizer state machine.
//!
//! Tracks the diagram/editor view currently shown by the main webview panel.
//! States: `initialize → ready → open.active`.  Disposing the owning webview
//! resets the machine to its initial state; the context is rebuilt from the
//! persisted project path on the next `initialize()`.

use crate::ipc::event::{webview_type, NotificationRouter, NotificationTarget};
use crate::machine::view::ViewLocation;
use crate::machine::Snapshot;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizerState {
    Init,
    Ready,
    Open,
}

impl VisualizerState {
    /// Wire rendering of the state node.
    pub fn to_wire(self) -> Value {
        match self {
            Self::Init => json!("initialize"),
            Self::Ready => json!("ready"),
            Self::Open => json!({"open": "active"}),
        }
    }
}

#[derive(Debug, Clone)]
pub enum VisualizerEvent {
    OpenView(ViewLocation),
    ViewUpdate(ViewLocation),
    CloseView,
    Dispose,
}

impl VisualizerEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::OpenView(_) => "OPEN_VIEW",
            Self::ViewUpdate(_) => "VIEW_UPDATE",
            Self::CloseView => "CLOSE_VIEW",
            Self::Dispose => "DISPOSE",
        }
    }
}

struct Inner {
    state: VisualizerState,
    context: ViewLocation,
    started: bool,
}

/// The main visualizer machine.  One instance per host process, owned by the
/// `HostContext`.
pub struct VisualizerMachine {
    router: Arc<NotificationRouter>,
    default_project_path: Option<String>,
    inner: Mutex<Inner>,
}

/// Transition table.  Returns `None` when the event is not valid for the
/// current state — the caller drops the event.
fn transition(
    state: VisualizerState,
    context: &ViewLocation,
    event: &VisualizerEvent,
) -> Option<(VisualizerState, ViewLocation)> {
    use VisualizerEvent::*;
    use VisualizerState::*;
    match (state, event) {
        (Ready | Open, OpenView(loc)) => {
            let mut next = loc.clone();
            if next.project_path.is_none() {
                next.project_path = context.project_path.clone();
            }
            Some((Open, next))
        }
        (Open, ViewUpdate(loc)) => {
            let mut next = loc.clone();
            if next.project_path.is_none() {
                next.project_path = context.project_path.clone();
            }
            Some((Open, next))
        }
        (Open, CloseView) => Some((
            Ready,
            ViewLocation::default_screen(context.project_path.clone()),
        )),
        (_, Dispose) => Some((Init, ViewLocation::default())),
        _ => None,
    }
}

impl VisualizerMachine {
    pub fn new(router: Arc<NotificationRouter>, default_project_path: Option<String>) -> Self {
        Self {
            router,
            default_project_path,
            inner: Mutex::new(Inner {
                state: VisualizerState::Init,
                context: ViewLocation::default(),
                started: false,
            }),
        }
    }

    /// Start the machine: `initialize → ready`, context seeded from the
    /// persisted project path.  Idempotent — a second call while started
    /// returns the current snapshot without re-running side effects.
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
            inner.state = VisualizerState::Ready;
            inner.context = ViewLocation::default_screen(self.default_project_path.clone());
            Snapshot {
                state: inner.state.to_wire(),
                context: inner.context.clone(),
            }
        };
        self.push_state_changed(&snapshot).await;
        snapshot
    }

    /// Current context snapshot (copy semantics).
    pub async fn context(&self) -> ViewLocation {
        self.inner.lock().await.context.clone()
    }

    /// Current state value.
    pub async fn state(&self) -> Value {
        self.inner.lock().await.state.to_wire()
    }

    /// Process one event.  Invalid events are dropped; every applied
    /// transition pushes a `visualizer.stateChanged` notification.
    pub async fn send_event(&self, event: VisualizerEvent) -> Snapshot<ViewLocation> {
        let (snapshot, applied) = {
            let mut inner = self.inner.lock().await;
            match transition(inner.state, &inner.context, &event) {
                Some((state, context)) => {
                    if matches!(event, VisualizerEvent::Dispose) {
                        inner.started = false;
                    }
                    inner.state = state;
                    inner.context = context;
                    (
                        Snapshot {
                            state: inner.state.to_wire(),
                            context: inner.context.clone(),
                        },
                        true,
                    )
                }
                None => {
                    debug!(event = event.name(), "visualizer event dropped — no transition");
                    (
                        Snapshot {
                            state: inner.state.to_wire(),
                            context: inner.context.clone(),
                        },
                        false,
                    )
                }
            }
        };
        if applied {
            self.push_state_changed(&snapshot).await;
        }
        snapshot
    }

    async fn push_state_changed(&self, snapshot: &Snapshot<ViewLocation>) {
        self.router
            .send(
                "visualizer.stateChanged",
                &NotificationTarget::webview(webview_type::VISUALIZER),
                snapshot.to_value(),
            )
            .await;
    }
}
