//! Shared types for the Folio voice assistant.
//!
//! This crate holds the data model that both the token endpoint and the
//! client-side session controller agree on: the credential handed out by the
//! server, the session states the widget moves through, transcript segments
//! streamed from the room, and the action directives the agent embeds in its
//! speech.

use serde::{Deserialize, Serialize};

mod voice;
pub use voice::{Participant, TranscriptSegment};

/// A signed room credential plus the endpoint it is valid for.
///
/// This is also the success body of the token endpoint, hence the `wsUrl`
/// wire name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Signed JWT granting access to exactly one room.
    pub token: String,
    /// WebSocket URL of the real-time transport.
    #[serde(rename = "wsUrl")]
    pub ws_url: String,
}

/// Lifecycle state of a voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No call in progress.
    #[default]
    Disconnected,
    /// Waiting on a credential or on the room join.
    Connecting,
    /// In the room.
    Connected,
    /// The last attempt failed; reverts to `Disconnected` on its own.
    Error,
}

impl SessionState {
    /// Returns the string label for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }

    /// Whether a user-initiated start is accepted from this state.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }
}

/// The UI actions the host page knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Open the project panel for a project id.
    ShowProject,
    /// Scroll to a page section.
    ScrollTo,
    /// Open a modal by name.
    ShowModal,
}

impl ActionKind {
    /// Parses a directive type name. Matching is case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "show_project" => Some(Self::ShowProject),
            "scroll_to" => Some(Self::ScrollTo),
            "show_modal" => Some(Self::ShowModal),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShowProject => "show_project",
            Self::ScrollTo => "scroll_to",
            Self::ShowModal => "show_modal",
        }
    }
}

/// An action directive extracted from agent speech, consumed once by the host
/// page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCommand {
    /// The directive type as it appeared in the transcript (lowercased).
    #[serde(rename = "type")]
    pub action_type: String,
    pub parameter: String,
}

impl ActionCommand {
    pub fn new(action_type: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            parameter: parameter.into(),
        }
    }

    /// Returns the known action kind, or `None` if the host page has no
    /// handler for this type.
    pub fn kind(&self) -> Option<ActionKind> {
        ActionKind::parse(&self.action_type)
    }
}
