use std::sync::Arc;

use tracing::info;

use crate::messages::{USAGE, render_verification};
use crate::reporter::Notifier;
use crate::verifier::Verifier;

const PREFIXES: [&str; 2] = ["!Verify", "!verify"];

/// What a chat message asks of the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Not addressed to the bot.
    Ignore,
    /// `!verify` without an `@handle`.
    MissingHandle,
    /// `!verify` with the first `@handle` found, `@` included.
    Verify(String),
}

pub fn parse_command(content: &str) -> Command {
    if !PREFIXES.iter().any(|p| content.starts_with(p)) {
        return Command::Ignore;
    }
    match first_mention(content) {
        Some(handle) => Command::Verify(handle.to_string()),
        None => Command::MissingHandle,
    }
}

/// First `@` followed by at least one word character.
fn first_mention(content: &str) -> Option<&str> {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    content.match_indices('@').find_map(|(at, _)| {
        let rest = &content[at + 1..];
        let len = rest.find(|c: char| !is_word(c)).unwrap_or(rest.len());
        (len > 0).then(|| &content[at..at + 1 + len])
    })
}

/// Answers `!verify @handle` messages.
#[derive(Clone)]
pub struct CommandHandler {
    verifier: Arc<Verifier>,
}

impl CommandHandler {
    pub fn new(verifier: Arc<Verifier>) -> Self {
        Self { verifier }
    }

    /// Handle one message, replying through `notifier`. Returns whether the
    /// message was a command.
    pub async fn handle(&self, content: &str, notifier: &dyn Notifier) -> bool {
        let handle = match parse_command(content) {
            Command::Ignore => return false,
            Command::MissingHandle => {
                notifier.send(USAGE).await;
                return true;
            }
            Command::Verify(handle) => handle,
        };

        info!("Verifying {handle}");
        notifier.indicate_activity().await;
        let result = self.verifier.verify_handle(&handle).await;
        let lines = render_verification(&handle, &result);
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            notifier.send(line).await;
            if i < last {
                notifier.indicate_activity().await;
            }
        }
        true
    }
}
