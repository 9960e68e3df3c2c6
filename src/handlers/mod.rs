pub mod move_members;
pub mod poll;
pub mod quote;
pub mod welcome;

use crate::command::{HELP, INSPIRE, MOVE, POLL_PREFIX};

pub fn help_text() -> String {
    format!(
        "Commands:\n\
         {POLL_PREFIX} !Question !Option1 !Option2 ... - Start a poll\n\
         {MOVE} @member ... #voice-channel - Move members to a voice channel\n\
         {INSPIRE} - Fetch an inspirational quote\n\
         {HELP} - Show this message"
    )
}
