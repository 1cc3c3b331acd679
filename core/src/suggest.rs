//! Prefix autocomplete over the console command vocabulary.

/// Commands offered when the config does not provide its own list.
pub const DEFAULT_COMMANDS: &[&str] = &[
    "help",
    "list",
    "say",
    "tell",
    "kick",
    "ban",
    "ban-ip",
    "pardon",
    "op",
    "deop",
    "whitelist",
    "gamemode",
    "difficulty",
    "time",
    "weather",
    "give",
    "tp",
    "save-all",
    "save-off",
    "save-on",
    "reload",
    "stop",
];

#[derive(Debug, Clone, Default)]
pub struct SuggestionEngine {
    vocabulary: Vec<String>,
}

impl SuggestionEngine {
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vocabulary: vocabulary.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_default_commands() -> Self {
        Self::new(DEFAULT_COMMANDS.iter().copied())
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Case-insensitive membership test for a command token.
    pub fn is_exact_match(&self, token: &str) -> bool {
        let token = token.to_lowercase();
        self.vocabulary
            .iter()
            .any(|command| command.to_lowercase() == token)
    }

    /// Candidates for `input`, in vocabulary order.
    ///
    /// Once the token is a known command and the user has moved on to
    /// arguments, nothing is suggested.
    pub fn suggest(&self, input: &str) -> Vec<String> {
        let token = command_token(input);
        if has_arguments(input) && self.is_exact_match(token) {
            return Vec::new();
        }
        let prefix = token.to_lowercase();
        self.vocabulary
            .iter()
            .filter(|command| command.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect()
    }
}

/// The command part of `input`: the trimmed text up to the first space.
pub fn command_token(input: &str) -> &str {
    let trimmed = input.trim();
    match trimmed.find(' ') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    }
}

fn has_arguments(input: &str) -> bool {
    input.trim().contains(' ')
}

/// Replace the command token of `input` with `suggestion`, keeping any
/// arguments already typed after it.
pub fn accept_suggestion(input: &str, suggestion: &str) -> String {
    let input = input.trim_start();
    let suffix = match input.find(' ') {
        Some(idx) => input[idx..].trim_start(),
        None => "",
    };
    if suffix.is_empty() {
        suggestion.to_string()
    } else {
        format!("{suggestion} {suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn engine() -> SuggestionEngine {
        SuggestionEngine::new(["help", "hello", "list", "Stop"])
    }

    #[test]
    fn token_stops_at_first_space() {
        assert_eq!(command_token("  say hi there "), "say");
        assert_eq!(command_token("list"), "list");
        assert_eq!(command_token("   "), "");
    }

    #[test]
    fn prefix_match_is_case_insensitive_and_ordered() {
        assert_eq!(engine().suggest("HE"), vec!["help", "hello"]);
        assert_eq!(engine().suggest("st"), vec!["Stop"]);
        assert!(engine().suggest("xyz").is_empty());
    }

    #[test]
    fn empty_input_offers_the_whole_vocabulary() {
        assert_eq!(engine().suggest("").len(), 4);
    }

    #[test]
    fn locked_in_command_with_arguments_suggests_nothing() {
        assert!(engine().suggest("help me").is_empty());
        // exact match without arguments still lists candidates sharing the prefix
        assert_eq!(engine().suggest("help"), vec!["help"]);
        // unknown token with arguments keeps suggesting by prefix
        assert_eq!(engine().suggest("he worl"), vec!["help", "hello"]);
    }

    #[test]
    fn accepting_preserves_argument_suffix() {
        assert_eq!(accept_suggestion("he worl", "hello"), "hello worl");
        assert_eq!(accept_suggestion("he    worl", "hello"), "hello worl");
        assert_eq!(accept_suggestion("hel", "help"), "help");
        assert_eq!(accept_suggestion("  li", "list"), "list");
    }

    #[test]
    fn exact_match_ignores_case() {
        assert!(engine().is_exact_match("STOP"));
        assert!(!engine().is_exact_match("sto"));
    }
}
