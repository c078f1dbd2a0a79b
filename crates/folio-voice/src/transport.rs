//! Seams between the session controller and the outside world.
//!
//! The controller only needs three things: a way to get a credential, a way
//! to join a room with it, and a handle on the joined room. An SDK binding
//! implements [`RoomTransport`]; the credential side ships with an HTTP
//! implementation that talks to the token endpoint.

use crate::error::VoiceError;
use folio_types::{Credential, Participant, TranscriptSegment};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Timeout for a single credential request.
const CREDENTIAL_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection state as reported by the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

/// Events delivered by a joined room.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    ConnectionStateChanged(RoomConnectionState),
    TranscriptionReceived {
        participant: Participant,
        segments: Vec<TranscriptSegment>,
    },
    /// The full list of remote participants after a join or leave.
    ParticipantsChanged(Vec<Participant>),
    /// Unrecoverable transport failure (ICE, signalling, ...).
    Error(String),
}

/// A joined room: a control handle plus its event stream.
pub struct JoinedRoom<C> {
    pub connection: C,
    pub events: mpsc::Receiver<RoomEvent>,
}

/// Source of room credentials.
pub trait CredentialSource: Send + Sync + 'static {
    fn fetch(
        &self,
        display_name: Option<&str>,
    ) -> impl Future<Output = Result<Credential, VoiceError>> + Send;
}

/// Joins real-time rooms.
pub trait RoomTransport: Send + Sync + 'static {
    type Connection: RoomConnection;

    fn join(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<JoinedRoom<Self::Connection>, VoiceError>> + Send;
}

/// Control handle for a joined room.
pub trait RoomConnection: Send + 'static {
    fn set_microphone_enabled(
        &mut self,
        enabled: bool,
    ) -> impl Future<Output = Result<(), VoiceError>> + Send;

    /// Leaves the room. Must be safe to call more than once.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;
}

/// Body of the token endpoint, success or failure.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenReply {
    Failed { error: String },
    Issued(Credential),
}

/// Fetches credentials from a Folio server's `GET /api/token`.
#[derive(Debug, Clone)]
pub struct HttpCredentialSource {
    client: reqwest::Client,
    token_url: String,
}

impl HttpCredentialSource {
    /// `base_url` is the server origin, e.g. `https://folio.example.com`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            token_url: format!("{}/api/token", base_url.trim_end_matches('/')),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

impl CredentialSource for HttpCredentialSource {
    async fn fetch(&self, display_name: Option<&str>) -> Result<Credential, VoiceError> {
        let mut request = self
            .client
            .get(&self.token_url)
            .timeout(CREDENTIAL_REQUEST_TIMEOUT);
        if let Some(name) = display_name {
            request = request.query(&[("name", name)]);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%status, url = %self.token_url, "credential response");

        let reply: TokenReply = response.json().await.map_err(|e| {
            VoiceError::CredentialRequest(format!("unreadable token response ({}): {}", status, e))
        })?;

        match reply {
            TokenReply::Failed { error } => Err(VoiceError::CredentialRequest(format!(
                "token endpoint returned {}: {}",
                status, error
            ))),
            TokenReply::Issued(_) if !status.is_success() => Err(VoiceError::CredentialRequest(
                format!("token endpoint returned {}", status),
            )),
            TokenReply::Issued(credential) => Ok(credential),
        }
    }
}
