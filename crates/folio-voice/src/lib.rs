//! Voice assistant plumbing for the Folio portfolio site.
//!
//! Two halves live here. [`TokenService`] runs on the server and mints a
//! LiveKit credential scoped to one per-caller room, with a dispatch
//! instruction that brings the hosted agent into that room. [`VoiceController`]
//! runs on the client, owns the lifecycle of a single call and turns the
//! agent's transcription stream into widget state and host-page actions.
//!
//! The real-time transport itself is external; the controller reaches it through
//! the [`RoomTransport`] and [`CredentialSource`] traits.

pub mod action;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod error;
pub mod service;
pub mod transport;

pub use action::parse_action;
pub use classifier::{AgentSpeechClassifier, SubstringClassifier};
pub use config::{ControllerSettings, LiveKitConfig};
pub use controller::{
    ControllerEvent, VoiceController, WidgetView, SUGGESTION_PROMPTS, SUGGESTION_ROTATION,
};
pub use error::VoiceError;
pub use service::{Caller, IssuedToken, TokenService};
pub use transport::{
    CredentialSource, HttpCredentialSource, JoinedRoom, RoomConnection, RoomConnectionState,
    RoomEvent, RoomTransport,
};
