//! Room participant and transcription types.

use serde::{Deserialize, Serialize};

/// A participant in a voice room, either the caller or the hosted agent.
///
/// Nothing in the transport guarantees which is which; callers classify by
/// identity string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub identity: String,
    /// Display name, if the transport reports one.
    #[serde(default)]
    pub name: Option<String>,
}

impl Participant {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            name: None,
        }
    }
}

/// A unit of speech-to-text output attributed to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub speaker_identity: String,
    pub text: String,
    /// Whether the transcriber considers this segment settled.
    #[serde(default)]
    pub is_final: bool,
}

impl TranscriptSegment {
    pub fn new(speaker_identity: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker_identity: speaker_identity.into(),
            text: text.into(),
            is_final: true,
        }
    }
}
