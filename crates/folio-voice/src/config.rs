use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::VoiceError;

fn default_token_ttl_seconds() -> u64 {
    3600
}

fn default_agent_name() -> String {
    "Harper-80c".to_string()
}

fn default_room_prefix() -> String {
    "portfolio".to_string()
}

fn default_dispatch_source() -> String {
    "portfolio-website".to_string()
}

/// LiveKit credentials plus the agent dispatch settings baked into every
/// token.
#[derive(Clone, Serialize, Deserialize)]
pub struct LiveKitConfig {
    /// WebSocket URL handed to clients alongside the token.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    /// JWT token TTL in seconds for LiveKit join tokens. Default: 3600 (1 hour).
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
    /// Name of the hosted agent dispatched into each room.
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
    /// Prefix for per-caller room names (`<prefix>-<identity>`).
    #[serde(default = "default_room_prefix")]
    pub room_prefix: String,
    /// `source` tag in the dispatch metadata.
    #[serde(default = "default_dispatch_source")]
    pub dispatch_source: String,
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
            agent_name: default_agent_name(),
            room_prefix: default_room_prefix(),
            dispatch_source: default_dispatch_source(),
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("agent_name", &self.agent_name)
            .field("room_prefix", &self.room_prefix)
            .field("dispatch_source", &self.dispatch_source)
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Self::default()
        }
    }

    /// Checks that every value needed to sign a token is present.
    pub fn validate(&self) -> Result<(), VoiceError> {
        let missing: Vec<&str> = [
            ("url", &self.url),
            ("api_key", &self.api_key),
            ("api_secret", &self.api_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(VoiceError::Config(format!(
                "missing livekit settings: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Timing parameters for [`crate::VoiceController`], in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Display name sent with the credential request. `None` asks for a guest
    /// identity.
    pub display_name: Option<String>,
    /// Delay between reaching `connected` and enabling the microphone.
    pub mic_enable_delay_ms: u64,
    /// How long "speaking" stays on after the latest agent segment.
    pub speaking_window_ms: u64,
    /// How long the transcript bubble stays up without a new update.
    pub transcript_hide_ms: u64,
    /// Grace period between a detected goodbye and the disconnect.
    pub goodbye_disconnect_ms: u64,
    /// Grace period between the agent leaving and the disconnect.
    pub agent_left_disconnect_ms: u64,
    /// How long the `error` state is shown before reverting.
    pub error_revert_ms: u64,
    /// How long the "call ended" banner is shown.
    pub ended_banner_ms: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            display_name: None,
            mic_enable_delay_ms: 1000,
            speaking_window_ms: 2000,
            transcript_hide_ms: 5000,
            goodbye_disconnect_ms: 3000,
            agent_left_disconnect_ms: 1000,
            error_revert_ms: 3000,
            ended_banner_ms: 3000,
        }
    }
}

impl ControllerSettings {
    pub fn mic_enable_delay(&self) -> Duration {
        Duration::from_millis(self.mic_enable_delay_ms)
    }

    pub fn speaking_window(&self) -> Duration {
        Duration::from_millis(self.speaking_window_ms)
    }

    pub fn transcript_hide(&self) -> Duration {
        Duration::from_millis(self.transcript_hide_ms)
    }

    pub fn goodbye_disconnect(&self) -> Duration {
        Duration::from_millis(self.goodbye_disconnect_ms)
    }

    pub fn agent_left_disconnect(&self) -> Duration {
        Duration::from_millis(self.agent_left_disconnect_ms)
    }

    pub fn error_revert(&self) -> Duration {
        Duration::from_millis(self.error_revert_ms)
    }

    pub fn ended_banner(&self) -> Duration {
        Duration::from_millis(self.ended_banner_ms)
    }
}
