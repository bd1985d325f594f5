pub(super) mod config;
pub(super) mod core;
pub(super) mod io;

use crate::commands::{CommandResult, ParsedCommand};
use crate::core::session::Session;

pub(super) fn usage_status(session: &mut Session, usage: &'static str) -> CommandResult {
    session.error(format!("Usage: {usage}"));
    CommandResult::Continue
}

pub(super) fn required_arg<'a>(
    session: &mut Session,
    parsed: &'a ParsedCommand,
    index: usize,
    usage: &'static str,
) -> Option<&'a str> {
    match parsed.arg(index) {
        Some(value) => Some(value),
        None => {
            usage_status(session, usage);
            None
        }
    }
}
