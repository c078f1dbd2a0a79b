//! Heuristics that decide who is speaking and whether they said goodbye.
//!
//! The transport gives no reliable sender role, so the session controller
//! asks an [`AgentSpeechClassifier`]. The default is plain substring
//! matching; a tokenized matcher or one driven by participant metadata can be
//! dropped in without touching the state machine.

/// Identity fragments that mark a participant as the hosted agent.
pub const DEFAULT_AGENT_FRAGMENTS: &[&str] = &["agent", "harper", "maeng"];

/// Phrases that end the call when the agent says them.
///
/// Kept specific; a bare "bye" would match far too much.
pub const DEFAULT_GOODBYE_PHRASES: &[&str] = &[
    "goodbye",
    "bye bye",
    "bye for now",
    "paalam na",
    "talk to you later",
    "talk later",
    "see you later",
    "see you soon",
    "take care",
    "have a good one",
    "have a great day",
    "nice talking",
    "ingat ka",
    "babay",
    "kita kits",
];

pub trait AgentSpeechClassifier: Send + Sync {
    /// Whether `identity` belongs to the hosted agent.
    fn is_agent(&self, identity: &str) -> bool;

    /// Whether `text` contains a farewell that should end the call.
    fn is_goodbye(&self, text: &str) -> bool;
}

/// Case-insensitive substring matching over fixed lists.
#[derive(Debug, Clone)]
pub struct SubstringClassifier {
    agent_fragments: Vec<String>,
    goodbye_phrases: Vec<String>,
}

impl SubstringClassifier {
    pub fn new<A, G>(agent_fragments: A, goodbye_phrases: G) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        G: IntoIterator,
        G::Item: AsRef<str>,
    {
        Self {
            agent_fragments: lowercase_all(agent_fragments),
            goodbye_phrases: lowercase_all(goodbye_phrases),
        }
    }

    /// Adds the configured agent name to the fragment list.
    pub fn with_agent_name(mut self, agent_name: &str) -> Self {
        let name = agent_name.trim().to_lowercase();
        if !name.is_empty() && !self.agent_fragments.contains(&name) {
            self.agent_fragments.push(name);
        }
        self
    }
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_FRAGMENTS, DEFAULT_GOODBYE_PHRASES)
    }
}

impl AgentSpeechClassifier for SubstringClassifier {
    fn is_agent(&self, identity: &str) -> bool {
        let identity = identity.to_lowercase();
        self.agent_fragments
            .iter()
            .any(|fragment| identity.contains(fragment.as_str()))
    }

    fn is_goodbye(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.goodbye_phrases
            .iter()
            .any(|phrase| text.contains(phrase.as_str()))
    }
}

fn lowercase_all<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
