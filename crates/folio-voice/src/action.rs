//! Extraction of `[action:<type>:<parameter>]` directives from agent speech.

use folio_types::ActionCommand;
use regex::Regex;
use std::sync::LazyLock;

static ACTION_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[action:(\w+):([^\]]+)\]").expect("action directive pattern is valid")
});

/// Returns the first action directive in `text`, if any.
///
/// Matching runs on the lowercased text, so both the type and the parameter
/// come back lowercased. Later directives in the same text are ignored.
pub fn parse_action(text: &str) -> Option<ActionCommand> {
    let lower = text.to_lowercase();
    let captures = ACTION_DIRECTIVE.captures(&lower)?;
    Some(ActionCommand::new(&captures[1], &captures[2]))
}
