//! Chat command recognition.

use std::collections::HashSet;

/// Commands chat may trigger. A sound only plays if its name is listed
/// here and present in the sound catalog.
pub const RECOGNIZED_COMMANDS: &[&str] = &["ding", "applause", "airhorn", "drumroll", "sadtrombone"];

/// Prefix that marks a chat message as a command.
pub const COMMAND_PREFIX: char = '!';

/// Turns chat text into a recognized command token.
#[derive(Debug, Clone)]
pub struct CommandMatcher {
    commands: HashSet<String>,
}

impl CommandMatcher {
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            commands: commands
                .into_iter()
                .map(|c| c.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Extract the command token from a message.
    ///
    /// One leading `!` is stripped if present and the rest is lowercased.
    pub fn token(text: &str) -> String {
        let text = text.trim();
        text.strip_prefix(COMMAND_PREFIX)
            .unwrap_or(text)
            .to_lowercase()
    }

    /// Return the command a message asks for, if it is recognized.
    pub fn match_command(&self, text: &str) -> Option<String> {
        let token = Self::token(text);
        self.commands.contains(&token).then_some(token)
    }
}

impl Default for CommandMatcher {
    fn default() -> Self {
        Self::new(RECOGNIZED_COMMANDS)
    }
}
