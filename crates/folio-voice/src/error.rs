use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("LiveKit API error: {0}")]
    LiveKit(#[from] livekit_api::access_token::AccessTokenError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid display name: {0}")]
    InvalidName(String),

    #[error("Credential request failed: {0}")]
    CredentialRequest(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Microphone error: {0}")]
    Microphone(String),

    #[error("Voice controller is no longer running")]
    ControllerStopped,
}

impl From<reqwest::Error> for VoiceError {
    fn from(e: reqwest::Error) -> Self {
        VoiceError::CredentialRequest(e.to_string())
    }
}
