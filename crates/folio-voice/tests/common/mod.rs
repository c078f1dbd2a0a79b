//! Scripted credential source and room transport for controller tests.

#![allow(dead_code)]

use folio_types::{Credential, Participant, TranscriptSegment};
use folio_voice::{
    ControllerEvent, ControllerSettings, CredentialSource, JoinedRoom, RoomConnection, RoomEvent,
    RoomTransport, SubstringClassifier, VoiceController, VoiceError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};

pub const AGENT: &str = "agent-AJ_harper";
pub const CALLER: &str = "user-k3j2h1";

/// Counts credential requests, optionally holding them until released.
#[derive(Default)]
pub struct CredentialProbe {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub hold: AtomicBool,
    pub release: Notify,
}

#[derive(Clone)]
pub struct MockCredentials(pub Arc<CredentialProbe>);

impl CredentialSource for MockCredentials {
    async fn fetch(&self, _display_name: Option<&str>) -> Result<Credential, VoiceError> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        if self.0.hold.load(Ordering::SeqCst) {
            self.0.release.notified().await;
        }
        if self.0.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::CredentialRequest(
                "token endpoint returned 500 Internal Server Error: Server misconfigured"
                    .to_string(),
            ));
        }
        Ok(Credential {
            token: "jwt".to_string(),
            ws_url: "wss://folio-test.livekit.cloud".to_string(),
        })
    }
}

/// Observes and drives the room side.
#[derive(Default)]
pub struct RoomProbe {
    pub joins: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub mic_calls: AtomicUsize,
    pub fail_join: AtomicBool,
    pub fail_mic: AtomicBool,
    pub sender: Mutex<Option<mpsc::Sender<RoomEvent>>>,
}

impl RoomProbe {
    pub async fn send(&self, event: RoomEvent) {
        let sender = self
            .sender
            .lock()
            .unwrap()
            .clone()
            .expect("no room joined yet");
        sender.send(event).await.expect("room event stream closed");
    }

    pub async fn agent_says(&self, text: &str) {
        self.send(transcription(AGENT, &[text])).await;
    }

    pub async fn participants(&self, identities: &[&str]) {
        let list = identities.iter().map(|id| Participant::new(*id)).collect();
        self.send(RoomEvent::ParticipantsChanged(list)).await;
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

pub fn transcription(identity: &str, texts: &[&str]) -> RoomEvent {
    RoomEvent::TranscriptionReceived {
        participant: Participant::new(identity),
        segments: texts
            .iter()
            .map(|text| TranscriptSegment::new(identity, *text))
            .collect(),
    }
}

#[derive(Clone)]
pub struct MockTransport(pub Arc<RoomProbe>);

pub struct MockConnection(Arc<RoomProbe>);

impl RoomTransport for MockTransport {
    type Connection = MockConnection;

    async fn join(&self, _credential: &Credential) -> Result<JoinedRoom<MockConnection>, VoiceError> {
        self.0.joins.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_join.load(Ordering::SeqCst) {
            return Err(VoiceError::Transport("ICE connection failed".to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        *self.0.sender.lock().unwrap() = Some(tx);
        Ok(JoinedRoom {
            connection: MockConnection(Arc::clone(&self.0)),
            events: rx,
        })
    }
}

impl RoomConnection for MockConnection {
    async fn set_microphone_enabled(&mut self, _enabled: bool) -> Result<(), VoiceError> {
        self.0.mic_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_mic.load(Ordering::SeqCst) {
            return Err(VoiceError::Microphone("permission denied".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.0.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub controller: VoiceController,
    pub events: broadcast::Receiver<ControllerEvent>,
    pub credentials: Arc<CredentialProbe>,
    pub room: Arc<RoomProbe>,
}

impl Harness {
    pub fn new() -> Self {
        let credentials = Arc::new(CredentialProbe::default());
        let room = Arc::new(RoomProbe::default());
        let (controller, _handle) = VoiceController::spawn(
            MockCredentials(Arc::clone(&credentials)),
            MockTransport(Arc::clone(&room)),
            Arc::new(SubstringClassifier::default()),
            ControllerSettings::default(),
        );
        let events = controller.subscribe();
        Self {
            controller,
            events,
            credentials,
            room,
        }
    }

    /// A harness whose controller is already connected with the agent present.
    pub async fn connected() -> Self {
        let mut harness = Self::new();
        harness.controller.start().unwrap();
        settle().await;
        harness.room.participants(&[CALLER, AGENT]).await;
        settle().await;
        harness.drain();
        harness
    }

    /// Everything emitted since the last drain.
    pub fn drain(&mut self) -> Vec<ControllerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn credential_calls(&self) -> usize {
        self.credentials.calls.load(Ordering::SeqCst)
    }
}

/// Lets all ready tasks run. With a paused clock this advances by 10ms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
