use super::{required_arg, usage_status};
use crate::commands::{CommandResult, ParsedCommand};
use crate::core::session::Session;
use crate::core::transcript;
use std::path::Path;

const USAGE_SAVE: &str = "/save [file]";
const USAGE_LOAD: &str = "/load <file>";

pub(crate) fn save(session: &mut Session, parsed: &ParsedCommand) -> CommandResult {
    if parsed.args.len() > 1 {
        return usage_status(session, USAGE_SAVE);
    }
    if session.conversation.is_empty() {
        session.info("Nothing to save yet.");
        return CommandResult::Continue;
    }
    let path = transcript::resolve_save_path(parsed.arg(0), session.config.history_dir.as_deref());
    match transcript::save(&path, &session.model, &session.conversation) {
        Ok(()) => session.info(format!(
            "Saved {} messages to {}",
            session.conversation.len(),
            path.display()
        )),
        Err(e) => session.error(format!("Save failed: {e}")),
    }
    CommandResult::Continue
}

pub(crate) fn load(session: &mut Session, parsed: &ParsedCommand) -> CommandResult {
    let Some(file) = required_arg(session, parsed, 0, USAGE_LOAD) else {
        return CommandResult::Continue;
    };
    match transcript::load(Path::new(file)) {
        Ok(saved) => {
            let count = saved.messages.len();
            session.conversation.replace(saved.messages);
            session.info(format!(
                "Loaded {count} messages from {file} (saved with {} at {}).",
                saved.model,
                saved.saved_at.format("%Y-%m-%d %H:%M UTC")
            ));
        }
        Err(e) => session.error(format!("Load failed: {e}")),
    }
    CommandResult::Continue
}
