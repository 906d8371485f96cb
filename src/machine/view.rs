// SPDX-License-Identifier: MIT
//! View location types shared by the visualizer and popup machines.
//!
//! A [`ViewLocation`] identifies what a webview is currently showing: which
//! named view kind, which document, which construct inside it.  `view == None`
//! means the webview renders its default/empty screen.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named view kinds the visual editor can render.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ViewKind {
    /// Default screen: the package-level overview diagram.
    PackageOverview,
    FlowDiagram,
    SequenceDiagram,
    DataMapper,
    ConnectorSpec,
    TaskPlan,
    ConfigurationForm,
    /// Unknown / future view kind — stored as-is.
    #[serde(untagged)]
    Other(String),
}

impl ViewKind {
    /// Parse from a raw string such as `"flowDiagram"`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "packageOverview" => Self::PackageOverview,
            "flowDiagram" => Self::FlowDiagram,
            "sequenceDiagram" => Self::SequenceDiagram,
            "dataMapper" => Self::DataMapper,
            "connectorSpec" => Self::ConnectorSpec,
            "taskPlan" => Self::TaskPlan,
            "configurationForm" => Self::ConfigurationForm,
            other => Self::Other(other.to_string()),
        }
    }

    /// Return the string representation for the wire and for logs.
    pub fn as_str(&self) -> &str {
        match self {
            Self::PackageOverview => "packageOverview",
            Self::FlowDiagram => "flowDiagram",
            Self::SequenceDiagram => "sequenceDiagram",
            Self::DataMapper => "dataMapper",
            Self::ConnectorSpec => "connectorSpec",
            Self::TaskPlan => "taskPlan",
            Self::ConfigurationForm => "configurationForm",
            Self::Other(s) => s.as_str(),
        }
    }
}

/// An inclusive line range inside a source document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LineRange {
    pub start_line: u32,
    pub end_line: u32,
}

/// What the user is currently viewing in one webview.
///
/// Created at machine initialization from the persisted project path and
/// mutated only through machine events.  All fields except `project_path`
/// may be absent — a webview showing the default screen carries no view.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewLocation {
    /// Current view kind; `None` means the default/empty screen.
    pub view: Option<ViewKind>,
    /// URI of the source document backing the view.
    pub document_uri: Option<String>,
    /// Identifier of the construct being viewed (function name, service name, ...).
    pub identifier: Option<String>,
    /// Identifier of the enclosing construct, when the view is nested.
    pub parent_identifier: Option<String>,
    /// Line range of the construct inside the document.
    pub position: Option<LineRange>,
    /// Root path of the project the view belongs to.
    pub project_path: Option<String>,
    /// Free-form per-view auxiliary data.
    pub metadata: Option<Value>,
    /// Auxiliary data attached by the AI agent flow.
    pub agent_metadata: Option<Value>,
    /// Auxiliary data for the data-mapper view.
    pub data_mapper_metadata: Option<Value>,
}

impl ViewLocation {
    /// The default/empty screen for a project: no view selected.
    pub fn default_screen(project_path: Option<String>) -> Self {
        Self {
            project_path,
            ..Self::default()
        }
    }

    /// The package overview screen — where the main view navigates back to
    /// when a popup-only approval view is dismissed.
    pub fn package_overview(project_path: Option<String>) -> Self {
        Self {
            view: Some(ViewKind::PackageOverview),
            project_path,
            ..Self::default()
        }
    }
}
