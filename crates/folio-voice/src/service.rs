use crate::config::LiveKitConfig;
use crate::error::VoiceError;
use folio_types::Credential;
use livekit_api::access_token::{AccessToken, VideoGrants};
use livekit_protocol::{RoomAgentDispatch, RoomConfiguration};
use rand::Rng;
use std::time::Duration;
use tracing::info;

/// Longest display name accepted from callers, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// Length of the random base36 suffix on every identity.
const IDENTITY_SUFFIX_LEN: usize = 6;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A freshly minted credential together with what it was minted for.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub identity: String,
    /// Name shown to other participants (the token's `name` claim).
    pub display_name: String,
    pub room: String,
    pub credential: Credential,
}

/// Who a token is minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Participant identity, unique per issued token.
    pub identity: String,
    pub display_name: String,
}

/// Mints single-room LiveKit credentials and asks the platform to dispatch
/// the hosted agent into that room.
///
/// Stateless: every call signs a new token and nothing is recorded.
#[derive(Debug, Clone)]
pub struct TokenService {
    config: LiveKitConfig,
}

impl TokenService {
    pub fn new(config: LiveKitConfig) -> Self {
        Self { config }
    }

    /// Whether all signing credentials and the endpoint are configured.
    pub fn is_enabled(&self) -> bool {
        self.config.validate().is_ok()
    }

    pub fn get_url(&self) -> &str {
        &self.config.url
    }

    pub fn agent_name(&self) -> &str {
        &self.config.agent_name
    }

    /// Returns the room a given identity is placed in.
    pub fn room_name_for(&self, identity: &str) -> String {
        format!("{}-{}", self.config.room_prefix, identity)
    }

    /// Issues a credential for `display_name`, or for a random guest identity
    /// when no usable name is given. Each call gets a fresh identity and room.
    pub fn issue(&self, display_name: Option<&str>) -> Result<IssuedToken, VoiceError> {
        self.config.validate()?;

        let Caller {
            identity,
            display_name,
        } = resolve_caller(display_name)?;
        let room = self.room_name_for(&identity);

        let metadata = serde_json::json!({
            "source": self.config.dispatch_source,
            "user": identity,
        })
        .to_string();

        let room_config = RoomConfiguration {
            agents: vec![RoomAgentDispatch {
                agent_name: self.config.agent_name.clone(),
                metadata,
                ..Default::default()
            }],
            ..Default::default()
        };

        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(&identity)
            .with_name(&display_name)
            .with_grants(VideoGrants {
                room_join: true,
                room_create: true,
                room: room.clone(),
                can_publish: true,
                can_subscribe: true,
                ..Default::default()
            })
            .with_room_config(room_config)
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        let jwt = token.to_jwt()?;

        info!(
            identity = %identity,
            room = %room,
            agent = %self.config.agent_name,
            "issued room credential"
        );

        Ok(IssuedToken {
            identity,
            display_name,
            room,
            credential: Credential {
                token: jwt,
                ws_url: self.config.url.clone(),
            },
        })
    }
}

/// Turns the optional caller-supplied name into a per-session identity.
///
/// Blank names count as absent and yield a guest, whose display name is the
/// identity itself. A usable name is kept as the display name and gets a
/// random suffix for the identity, so two callers with the same name never
/// share a room.
pub fn resolve_caller(display_name: Option<&str>) -> Result<Caller, VoiceError> {
    let name = match display_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name,
        None => {
            let identity = guest_identity();
            return Ok(Caller {
                display_name: identity.clone(),
                identity,
            });
        }
    };

    validate_display_name(name)?;

    Ok(Caller {
        identity: format!("{}-{}", name, random_suffix()),
        display_name: name.to_string(),
    })
}

fn validate_display_name(name: &str) -> Result<(), VoiceError> {
    if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(VoiceError::InvalidName(format!(
            "name exceeds {} characters",
            MAX_DISPLAY_NAME_CHARS
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(VoiceError::InvalidName(
            "name contains control characters".to_string(),
        ));
    }
    // Lossy percent-decoding of invalid UTF-8 leaves replacement characters.
    if name.contains(char::REPLACEMENT_CHARACTER) {
        return Err(VoiceError::InvalidName(
            "name is not valid UTF-8".to_string(),
        ));
    }
    Ok(())
}

/// Generates `user-xxxxxx` with a random base36 suffix.
pub fn guest_identity() -> String {
    format!("user-{}", random_suffix())
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..IDENTITY_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suffix_of<'a>(identity: &'a str, prefix: &str) -> &'a str {
        identity
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('-'))
            .unwrap()
    }

    fn is_base36(s: &str) -> bool {
        s.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
    }

    #[test]
    fn blank_names_become_guests() {
        for name in [None, Some(""), Some("   ")] {
            let caller = resolve_caller(name).unwrap();
            assert!(caller.identity.starts_with("user-"), "got {}", caller.identity);
            assert_eq!(caller.identity.len(), "user-".len() + IDENTITY_SUFFIX_LEN);
            assert_eq!(caller.display_name, caller.identity);
        }
    }

    #[test]
    fn names_are_trimmed_and_suffixed() {
        let caller = resolve_caller(Some("  alice ")).unwrap();
        assert_eq!(caller.display_name, "alice");
        let suffix = suffix_of(&caller.identity, "alice");
        assert_eq!(suffix.len(), IDENTITY_SUFFIX_LEN);
        assert!(is_base36(suffix));
    }

    #[test]
    fn same_name_gets_distinct_identities() {
        let first = resolve_caller(Some("alice")).unwrap();
        let second = resolve_caller(Some("alice")).unwrap();
        assert_eq!(first.display_name, second.display_name);
        assert_ne!(first.identity, second.identity);
    }

    #[test]
    fn overlong_and_control_names_are_rejected() {
        let long = "x".repeat(MAX_DISPLAY_NAME_CHARS + 1);
        assert!(matches!(
            resolve_caller(Some(&long)),
            Err(VoiceError::InvalidName(_))
        ));
        assert!(matches!(
            resolve_caller(Some("bad\nname")),
            Err(VoiceError::InvalidName(_))
        ));

        let max = "y".repeat(MAX_DISPLAY_NAME_CHARS);
        assert_eq!(resolve_caller(Some(&max)).unwrap().display_name, max);
    }

    #[test]
    fn replacement_characters_are_rejected() {
        assert!(matches!(
            resolve_caller(Some("\u{FFFD}\u{FFFD}")),
            Err(VoiceError::InvalidName(_))
        ));
        assert!(matches!(
            resolve_caller(Some("al\u{FFFD}ice")),
            Err(VoiceError::InvalidName(_))
        ));
    }

    #[test]
    fn guest_suffix_is_base36() {
        let identity = guest_identity();
        assert!(is_base36(suffix_of(&identity, "user")));
    }

    #[test]
    fn room_name_uses_prefix() {
        let service = TokenService::new(LiveKitConfig::new("wss://lk", "k", "s"));
        assert_eq!(service.room_name_for("alice-k3j2h1"), "portfolio-alice-k3j2h1");
    }

    #[test]
    fn issue_fails_without_config() {
        let service = TokenService::new(LiveKitConfig::default());
        assert!(!service.is_enabled());
        assert!(matches!(
            service.issue(Some("alice")),
            Err(VoiceError::Config(_))
        ));
    }
}
