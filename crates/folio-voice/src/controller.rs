//! Client-side state machine for a single voice call.
//!
//! [`VoiceController::spawn`] starts an actor task that owns the session. User
//! commands, credential and join results, room events and timer firings all
//! arrive on that task and are handled one at a time, so no state is shared.
//!
//! Every delayed callback is a spawned sleep. Its abort handle is owned by the
//! [`Session`] it belongs to (or by the controller, for the error-revert and
//! call-ended timers), and its message carries the session generation. A
//! callback that outlives its session is aborted, and if the abort loses the
//! race the generation check drops it.

use crate::action::parse_action;
use crate::classifier::AgentSpeechClassifier;
use crate::config::ControllerSettings;
use crate::error::VoiceError;
use crate::transport::{
    CredentialSource, JoinedRoom, RoomConnection, RoomConnectionState, RoomEvent, RoomTransport,
};
use folio_types::{ActionCommand, Credential, Participant, SessionState, TranscriptSegment};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Default capacity for the controller event broadcast channel.
const DEFAULT_EVENT_BROADCAST_CAPACITY: usize = 256;

/// Prompts the widget cycles through while suggestions are shown.
pub const SUGGESTION_PROMPTS: [&str; 4] = [
    "Ano ang mga projects mo?",
    "Tell me about yourself",
    "Show me your skills",
    "Paano kita makokontak?",
];

/// How long each suggestion prompt stays up.
pub const SUGGESTION_ROTATION: Duration = Duration::from_secs(4);

/// Something the widget or host page should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    StateChanged(SessionState),
    Listening(bool),
    Speaking(bool),
    /// New agent transcript text to display.
    Transcript(String),
    TranscriptHidden,
    /// The "call ended" banner went up.
    CallEnded,
    CallEndedCleared,
    /// A directive for the host page (`onAction(type, parameter)`).
    ///
    /// Also delivered losslessly through [`VoiceController::actions`].
    Action(ActionCommand),
}

/// Snapshot of everything the widget renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetView {
    pub state: SessionState,
    pub listening: bool,
    pub speaking: bool,
    /// Last agent transcript shown in this call.
    pub transcript: String,
    pub transcript_visible: bool,
    pub call_ended_visible: bool,
}

impl WidgetView {
    /// Suggestion prompts fill the space while nothing else is happening.
    pub fn show_suggestions(&self) -> bool {
        self.state == SessionState::Connected && !self.transcript_visible && !self.speaking
    }

    /// The prompt to show `elapsed` after suggestions appeared, rotating
    /// every [`SUGGESTION_ROTATION`]. `None` while suggestions are hidden.
    pub fn suggestion_at(&self, elapsed: Duration) -> Option<&'static str> {
        if !self.show_suggestions() {
            return None;
        }
        let step = (elapsed.as_millis() / SUGGESTION_ROTATION.as_millis()) as usize;
        Some(SUGGESTION_PROMPTS[step % SUGGESTION_PROMPTS.len()])
    }

    pub fn status_label(&self) -> &'static str {
        match self.state {
            SessionState::Disconnected => "Talk to AI",
            SessionState::Connecting => "Connecting...",
            SessionState::Connected => "Connected",
            SessionState::Error => "Unavailable",
        }
    }
}

#[derive(Debug)]
enum Command {
    Start,
    Stop,
    Toggle,
    Shutdown,
    SinkActions(mpsc::UnboundedSender<ActionCommand>),
}

/// Handle to a running controller.
///
/// Dropping every handle stops the actor and leaves any active room.
#[derive(Debug, Clone)]
pub struct VoiceController {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<ControllerEvent>,
    view: watch::Receiver<WidgetView>,
}

impl VoiceController {
    /// Spawns the controller actor on the current tokio runtime.
    pub fn spawn<C, T>(
        credentials: C,
        transport: T,
        classifier: Arc<dyn AgentSpeechClassifier>,
        settings: ControllerSettings,
    ) -> (Self, JoinHandle<()>)
    where
        C: CredentialSource,
        T: RoomTransport,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(DEFAULT_EVENT_BROADCAST_CAPACITY);
        let (view_tx, view_rx) = watch::channel(WidgetView::default());

        let actor = Actor {
            credentials: Arc::new(credentials),
            transport: Arc::new(transport),
            classifier,
            settings,
            state: SessionState::Disconnected,
            generation: 0,
            pending: None,
            session: None,
            timers: TimerSet::default(),
            ui: Ui {
                view: WidgetView::default(),
                view_tx,
                events: events.clone(),
                action_sink: None,
            },
            internal_tx,
        };
        let handle = tokio::spawn(actor.run(command_rx, internal_rx));

        (
            Self {
                commands: command_tx,
                events,
                view: view_rx,
            },
            handle,
        )
    }

    /// Starts a call. Ignored unless the session is disconnected or errored.
    pub fn start(&self) -> Result<(), VoiceError> {
        self.send(Command::Start)
    }

    /// Ends the current call. A no-op when nothing is connected.
    pub fn stop(&self) -> Result<(), VoiceError> {
        self.send(Command::Stop)
    }

    /// Orb click: start when idle, stop when connected, ignore while connecting.
    pub fn toggle(&self) -> Result<(), VoiceError> {
        self.send(Command::Toggle)
    }

    /// Stops the actor, leaving any active room.
    pub fn shutdown(&self) -> Result<(), VoiceError> {
        self.send(Command::Shutdown)
    }

    /// Every event from now on.
    ///
    /// A receiver that falls more than the channel capacity behind gets
    /// `RecvError::Lagged` and misses events, actions included. Hosts that
    /// must see every action should use [`actions`](Self::actions).
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// A dedicated, unbounded stream of host-page actions.
    ///
    /// Each directive is delivered exactly once, however slowly it is read.
    /// Only the most recent receiver is fed; calling this again replaces it.
    pub fn actions(&self) -> Result<mpsc::UnboundedReceiver<ActionCommand>, VoiceError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.send(Command::SinkActions(tx))?;
        Ok(rx)
    }

    /// Current widget snapshot.
    pub fn view(&self) -> WidgetView {
        self.view.borrow().clone()
    }

    /// A receiver that is notified on every view change.
    pub fn watch_view(&self) -> watch::Receiver<WidgetView> {
        self.view.clone()
    }

    fn send(&self, command: Command) -> Result<(), VoiceError> {
        self.commands
            .send(command)
            .map_err(|_| VoiceError::ControllerStopped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Timer {
    MicEnable,
    SpeakingOff,
    TranscriptHide,
    AutoDisconnect,
    ErrorRevert,
    EndedBanner,
}

enum Internal<Conn> {
    Credential {
        generation: u64,
        result: Result<Credential, VoiceError>,
    },
    Joined {
        generation: u64,
        credential: Credential,
        result: Result<JoinedRoom<Conn>, VoiceError>,
    },
    Room {
        generation: u64,
        event: RoomEvent,
    },
    RoomClosed {
        generation: u64,
    },
    Timer {
        generation: u64,
        timer: Timer,
    },
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Pending delayed callbacks, at most one per kind.
#[derive(Default)]
struct TimerSet {
    handles: HashMap<Timer, AbortHandle>,
}

impl TimerSet {
    /// Sends `message` after `delay`, replacing any pending timer of the same
    /// kind.
    fn schedule<M: Send + 'static>(
        &mut self,
        timer: Timer,
        delay: Duration,
        tx: &mpsc::UnboundedSender<M>,
        message: M,
    ) {
        let tx = tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(message);
        });
        if let Some(previous) = self.handles.insert(timer, handle.abort_handle()) {
            previous.abort();
        }
    }

    fn cancel(&mut self, timer: Timer) {
        if let Some(handle) = self.handles.remove(&timer) {
            handle.abort();
        }
    }

    fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Everything that lives exactly as long as one room membership.
struct Session<Conn> {
    generation: u64,
    credential: Credential,
    connection: Conn,
    timers: TimerSet,
    _forwarder: AbortOnDrop,
    goodbye_handled: bool,
    agent_seen: bool,
    last_transcript: String,
    mic_enabled: bool,
}

/// Widget state plus the channels it is published on.
struct Ui {
    view: WidgetView,
    view_tx: watch::Sender<WidgetView>,
    events: broadcast::Sender<ControllerEvent>,
    action_sink: Option<mpsc::UnboundedSender<ActionCommand>>,
}

impl Ui {
    fn emit(&self, event: ControllerEvent) {
        // No subscribers is fine; the widget may only watch the view.
        let _ = self.events.send(event);
        self.view_tx.send_replace(self.view.clone());
    }

    fn set_state(&mut self, state: SessionState) {
        if self.view.state != state {
            self.view.state = state;
            self.emit(ControllerEvent::StateChanged(state));
        }
    }

    fn set_listening(&mut self, listening: bool) {
        if self.view.listening != listening {
            self.view.listening = listening;
            self.emit(ControllerEvent::Listening(listening));
        }
    }

    fn set_speaking(&mut self, speaking: bool) {
        if self.view.speaking != speaking {
            self.view.speaking = speaking;
            self.emit(ControllerEvent::Speaking(speaking));
        }
    }

    fn show_transcript(&mut self, text: &str) {
        self.view.transcript = text.to_string();
        self.view.transcript_visible = true;
        self.emit(ControllerEvent::Transcript(text.to_string()));
    }

    fn hide_transcript(&mut self) {
        if self.view.transcript_visible {
            self.view.transcript_visible = false;
            self.emit(ControllerEvent::TranscriptHidden);
        }
    }

    fn show_call_ended(&mut self) {
        if !self.view.call_ended_visible {
            self.view.call_ended_visible = true;
            self.emit(ControllerEvent::CallEnded);
        }
    }

    fn clear_call_ended(&mut self) {
        if self.view.call_ended_visible {
            self.view.call_ended_visible = false;
            self.emit(ControllerEvent::CallEndedCleared);
        }
    }

    /// Resets the per-call substates.
    fn clear_call(&mut self) {
        self.set_listening(false);
        self.set_speaking(false);
        self.hide_transcript();
        if !self.view.transcript.is_empty() {
            self.view.transcript.clear();
            self.view_tx.send_replace(self.view.clone());
        }
    }

    fn emit_action(&mut self, command: ActionCommand) {
        if let Some(sink) = &self.action_sink {
            if sink.send(command.clone()).is_err() {
                debug!("action receiver dropped");
                self.action_sink = None;
            }
        }
        self.emit(ControllerEvent::Action(command));
    }
}

struct Actor<C, T: RoomTransport> {
    credentials: Arc<C>,
    transport: Arc<T>,
    classifier: Arc<dyn AgentSpeechClassifier>,
    settings: ControllerSettings,
    state: SessionState,
    /// Bumped on every start; tags all session-bound messages.
    generation: u64,
    /// The in-flight credential request or join.
    pending: Option<AbortOnDrop>,
    session: Option<Session<T::Connection>>,
    /// Controller-scoped timers: error revert and the call-ended banner.
    timers: TimerSet,
    ui: Ui,
    internal_tx: mpsc::UnboundedSender<Internal<T::Connection>>,
}

impl<C, T> Actor<C, T>
where
    C: CredentialSource,
    T: RoomTransport,
{
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal<T::Connection>>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(message) = internal.recv() => self.handle_internal(message).await,
            }
        }

        self.pending = None;
        if let Some(mut session) = self.session.take() {
            session.connection.disconnect().await;
        }
        debug!("voice controller stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop().await,
            Command::Toggle => match self.state {
                SessionState::Disconnected | SessionState::Error => self.start(),
                SessionState::Connected => self.stop().await,
                SessionState::Connecting => debug!("toggle ignored while connecting"),
            },
            Command::SinkActions(sink) => self.ui.action_sink = Some(sink),
            Command::Shutdown => {}
        }
    }

    async fn handle_internal(&mut self, message: Internal<T::Connection>) {
        match message {
            Internal::Credential { generation, result } => {
                self.on_credential(generation, result).await;
            }
            Internal::Joined {
                generation,
                credential,
                result,
            } => self.on_joined(generation, credential, result).await,
            Internal::Room { generation, event } => {
                if self.is_current(generation) {
                    self.on_room_event(event).await;
                }
            }
            Internal::RoomClosed { generation } => {
                if self.is_current(generation) {
                    info!(generation, "room event stream closed");
                    self.end_call("room closed").await;
                }
            }
            Internal::Timer { generation, timer } => self.on_timer(generation, timer).await,
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(from = self.state.as_str(), to = state.as_str(), "session state");
        }
        self.state = state;
        self.ui.set_state(state);
    }

    /// Whether `generation` names the live, connected session.
    fn is_current(&self, generation: u64) -> bool {
        self.state == SessionState::Connected
            && self
                .session
                .as_ref()
                .is_some_and(|session| session.generation == generation)
    }

    fn timer_message(generation: u64, timer: Timer) -> Internal<T::Connection> {
        Internal::Timer { generation, timer }
    }

    fn start(&mut self) {
        if !self.state.can_start() {
            debug!(state = self.state.as_str(), "start ignored");
            return;
        }

        self.timers.cancel_all();
        self.ui.clear_call_ended();

        self.generation += 1;
        let generation = self.generation;
        self.set_state(SessionState::Connecting);
        info!(generation, "requesting room credential");

        let credentials = Arc::clone(&self.credentials);
        let display_name = self.settings.display_name.clone();
        let tx = self.internal_tx.clone();
        let handle = tokio::spawn(async move {
            let result = credentials.fetch(display_name.as_deref()).await;
            let _ = tx.send(Internal::Credential { generation, result });
        });
        self.pending = Some(AbortOnDrop(handle.abort_handle()));
    }

    async fn stop(&mut self) {
        match self.state {
            SessionState::Connected => self.end_call("user").await,
            SessionState::Connecting => {
                info!(generation = self.generation, "connection attempt cancelled");
                self.pending = None;
                self.set_state(SessionState::Disconnected);
            }
            SessionState::Disconnected | SessionState::Error => {
                debug!(state = self.state.as_str(), "stop ignored");
            }
        }
    }

    async fn on_credential(&mut self, generation: u64, result: Result<Credential, VoiceError>) {
        if generation != self.generation || self.state != SessionState::Connecting {
            debug!(generation, "dropping stale credential result");
            return;
        }

        match result {
            Ok(credential) => {
                let transport = Arc::clone(&self.transport);
                let tx = self.internal_tx.clone();
                let handle = tokio::spawn(async move {
                    let result = transport.join(&credential).await;
                    let _ = tx.send(Internal::Joined {
                        generation,
                        credential,
                        result,
                    });
                });
                self.pending = Some(AbortOnDrop(handle.abort_handle()));
            }
            Err(e) => {
                warn!(generation, error = %e, "credential request failed");
                self.fail().await;
            }
        }
    }

    async fn on_joined(
        &mut self,
        generation: u64,
        credential: Credential,
        result: Result<JoinedRoom<T::Connection>, VoiceError>,
    ) {
        if generation != self.generation || self.state != SessionState::Connecting {
            debug!(generation, "dropping stale room join");
            if let Ok(mut joined) = result {
                joined.connection.disconnect().await;
            }
            return;
        }
        self.pending = None;

        let joined = match result {
            Ok(joined) => joined,
            Err(e) => {
                warn!(generation, error = %e, "failed to join room");
                self.fail().await;
                return;
            }
        };

        let JoinedRoom {
            connection,
            mut events,
        } = joined;
        let tx = self.internal_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if tx.send(Internal::Room { generation, event }).is_err() {
                    return;
                }
            }
            let _ = tx.send(Internal::RoomClosed { generation });
        });

        let mut session = Session {
            generation,
            credential,
            connection,
            timers: TimerSet::default(),
            _forwarder: AbortOnDrop(forwarder.abort_handle()),
            goodbye_handled: false,
            agent_seen: false,
            last_transcript: String::new(),
            mic_enabled: false,
        };
        session.timers.schedule(
            Timer::MicEnable,
            self.settings.mic_enable_delay(),
            &self.internal_tx,
            Self::timer_message(generation, Timer::MicEnable),
        );
        info!(
            generation,
            ws_url = %session.credential.ws_url,
            "joined room"
        );
        self.session = Some(session);
        self.set_state(SessionState::Connected);
    }

    /// Moves to `error` and schedules the revert to `disconnected`.
    async fn fail(&mut self) {
        self.pending = None;
        if let Some(mut session) = self.session.take() {
            session.connection.disconnect().await;
        }
        self.ui.clear_call();
        self.set_state(SessionState::Error);
        self.timers.schedule(
            Timer::ErrorRevert,
            self.settings.error_revert(),
            &self.internal_tx,
            Self::timer_message(self.generation, Timer::ErrorRevert),
        );
    }

    /// Tears down a connected call and shows the call-ended banner.
    async fn end_call(&mut self, reason: &'static str) {
        if self.state != SessionState::Connected {
            debug!(reason, state = self.state.as_str(), "end_call ignored");
            return;
        }

        if let Some(mut session) = self.session.take() {
            session.connection.disconnect().await;
            info!(generation = session.generation, reason, "call ended");
        }
        self.ui.clear_call();
        self.set_state(SessionState::Disconnected);
        self.ui.show_call_ended();
        self.timers.schedule(
            Timer::EndedBanner,
            self.settings.ended_banner(),
            &self.internal_tx,
            Self::timer_message(self.generation, Timer::EndedBanner),
        );
    }

    async fn on_room_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::ConnectionStateChanged(RoomConnectionState::Disconnected) => {
                self.end_call("room disconnected").await;
            }
            RoomEvent::ConnectionStateChanged(state) => {
                debug!(?state, "room connection state");
            }
            RoomEvent::TranscriptionReceived {
                participant,
                segments,
            } => self.on_transcription(&participant, &segments),
            RoomEvent::ParticipantsChanged(participants) => self.on_participants(&participants),
            RoomEvent::Error(message) => {
                warn!(generation = self.generation, error = %message, "room transport error");
                self.fail().await;
            }
        }
    }

    fn on_transcription(&mut self, participant: &Participant, segments: &[TranscriptSegment]) {
        if !self.classifier.is_agent(&participant.identity) {
            trace!(identity = %participant.identity, "ignoring non-agent transcription");
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let generation = session.generation;

        self.ui.set_speaking(true);
        session.timers.schedule(
            Timer::SpeakingOff,
            self.settings.speaking_window(),
            &self.internal_tx,
            Self::timer_message(generation, Timer::SpeakingOff),
        );

        for segment in segments {
            let text = segment.text.as_str();

            if !text.is_empty() && text != session.last_transcript {
                session.last_transcript = text.to_string();
                self.ui.show_transcript(text);
                session.timers.schedule(
                    Timer::TranscriptHide,
                    self.settings.transcript_hide(),
                    &self.internal_tx,
                    Self::timer_message(generation, Timer::TranscriptHide),
                );
            }

            if !session.goodbye_handled && self.classifier.is_goodbye(text) {
                session.goodbye_handled = true;
                info!(generation, "agent said goodbye, scheduling disconnect");
                session.timers.schedule(
                    Timer::AutoDisconnect,
                    self.settings.goodbye_disconnect(),
                    &self.internal_tx,
                    Self::timer_message(generation, Timer::AutoDisconnect),
                );
                return;
            }

            if let Some(command) = parse_action(text) {
                info!(
                    generation,
                    action = %command.action_type,
                    parameter = %command.parameter,
                    "agent action directive"
                );
                self.ui.emit_action(command);
            }
        }
    }

    fn on_participants(&mut self, participants: &[Participant]) {
        let has_agent = participants
            .iter()
            .any(|p| self.classifier.is_agent(&p.identity));
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if has_agent && !session.agent_seen {
            info!(generation = session.generation, "agent joined room");
            session.agent_seen = true;
        }

        if session.agent_seen && !has_agent && !session.goodbye_handled {
            session.goodbye_handled = true;
            info!(
                generation = session.generation,
                "agent left room, scheduling disconnect"
            );
            session.timers.schedule(
                Timer::AutoDisconnect,
                self.settings.agent_left_disconnect(),
                &self.internal_tx,
                Self::timer_message(session.generation, Timer::AutoDisconnect),
            );
        }
    }

    async fn on_timer(&mut self, generation: u64, timer: Timer) {
        match timer {
            Timer::ErrorRevert => {
                if generation == self.generation && self.state == SessionState::Error {
                    self.timers.cancel(Timer::ErrorRevert);
                    self.set_state(SessionState::Disconnected);
                }
            }
            Timer::EndedBanner => {
                if generation == self.generation {
                    self.timers.cancel(Timer::EndedBanner);
                    self.ui.clear_call_ended();
                }
            }
            _ if !self.is_current(generation) => {
                trace!(generation, ?timer, "dropping stale timer");
            }
            Timer::MicEnable => self.enable_microphone().await,
            Timer::SpeakingOff => self.ui.set_speaking(false),
            Timer::TranscriptHide => self.ui.hide_transcript(),
            Timer::AutoDisconnect => self.end_call("auto").await,
        }
    }

    async fn enable_microphone(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.mic_enabled {
            return;
        }

        match session.connection.set_microphone_enabled(true).await {
            Ok(()) => {
                session.mic_enabled = true;
                debug!(generation = session.generation, "microphone enabled");
                self.ui.set_listening(true);
            }
            Err(e) => {
                warn!(
                    generation = session.generation,
                    error = %e,
                    "failed to enable microphone, continuing without audio capture"
                );
            }
        }
    }
}
