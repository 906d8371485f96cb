// SPDX-License-Identifier: MIT
//! View state machines.
//!
//! Each machine is a strict finite-state machine: an enum of states, an enum
//! of events, and a pure transition function returning the new state, the new
//! context, and any side effects.  The declared transition table is the single
//! source of truth — an event that is not valid for the current state is
//! dropped (logged at debug level), never an error.
//!
//! The machine wrapper owns its state behind a `tokio::sync::Mutex` so events
//! are processed strictly in send order.  Context reads return clones — a
//! caller mutating the returned value cannot affect machine state.  Effects
//! are executed after the state lock is released so an effect that sends a
//! follow-up event cannot deadlock.

pub mod ai_panel;
pub mod popup;
pub mod view;
pub mod visualizer;

use serde::Serialize;
use serde_json::Value;

/// A read-only snapshot of a machine: the wire rendering of the current state
/// node (`"ready"`, `{"open":"active"}`, ...) plus a copy of the context.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot<C: Serialize> {
    pub state: Value,
    pub context: C,
}

impl<C: Serialize> Snapshot<C> {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
