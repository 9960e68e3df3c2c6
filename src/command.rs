/// What a chat message asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `+poll !Question !Option ...`
    StartPoll,
    /// `+<anything else>`; reserved prefix with no handler yet.
    Unrecognized(String),
    /// `!haru-inspire`
    Inspire,
    /// `!haru-help`
    Help,
    /// `!haru-move @member ... #voice-channel`
    MoveMembers,
}

pub const POLL_PREFIX: &str = "+poll";
pub const INSPIRE: &str = "!haru-inspire";
pub const HELP: &str = "!haru-help";
pub const MOVE: &str = "!haru-move";

/// Classify message text. Rules are tried in order and the first match wins;
/// `None` means the message is not for the bot.
pub fn classify(text: &str) -> Option<Command> {
    if let Some(rest) = text.strip_prefix('+') {
        if starts_with_ignore_case(text, POLL_PREFIX) {
            return Some(Command::StartPoll);
        }
        let token = rest.split_whitespace().next().unwrap_or_default();
        return Some(Command::Unrecognized(token.to_string()));
    }

    // `!` commands match their whole first word; mentions may follow.
    let word = text.split_whitespace().next()?;
    if word.eq_ignore_ascii_case(INSPIRE) {
        Some(Command::Inspire)
    } else if word.eq_ignore_ascii_case(HELP) {
        Some(Command::Help)
    } else if word.eq_ignore_ascii_case(MOVE) {
        Some(Command::MoveMembers)
    } else {
        None
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
