use super::{required_arg, usage_status};
use crate::commands::{all_commands, CommandResult, ParsedCommand};
use crate::core::session::Session;

const USAGE_CONTEXT: &str = "/context [clear|key=value ...]";

pub(crate) fn help(session: &mut Session, _parsed: &ParsedCommand) -> CommandResult {
    let rows = all_commands()
        .iter()
        .map(|command| {
            let mut name = command.usage.to_string();
            if !command.aliases.is_empty() {
                let aliases: Vec<String> =
                    command.aliases.iter().map(|alias| format!("/{alias}")).collect();
                name.push_str(&format!(" ({})", aliases.join(", ")));
            }
            vec![name, command.help.to_string()]
        })
        .collect();
    session.table("Commands", &["Command", "Description"], rows);
    session.info(
        "Lines without a leading / are matched against tool phrases (try /interpret), \
         otherwise they are sent to the model.",
    );
    CommandResult::Continue
}

pub(crate) fn exit(_session: &mut Session, _parsed: &ParsedCommand) -> CommandResult {
    CommandResult::Exit
}

pub(crate) fn clear(session: &mut Session, _parsed: &ParsedCommand) -> CommandResult {
    session.conversation.clear();
    session.info("Conversation cleared.");
    CommandResult::Continue
}

pub(crate) fn tools(session: &mut Session, _parsed: &ParsedCommand) -> CommandResult {
    let rows = session.executor.registry().summary_rows();
    session.table("Tools", &["Name", "Safety", "Arguments", "Description"], rows);
    if !session.allow_execution {
        session.info("Executing tools are disabled. Enable them with /allow on.");
    }
    CommandResult::Continue
}

pub(crate) fn summary(session: &mut Session, _parsed: &ParsedCommand) -> CommandResult {
    if session.conversation.is_empty() {
        session.info("Nothing to summarize yet.");
        return CommandResult::Continue;
    }
    CommandResult::Summarize
}

pub(crate) fn interpret(session: &mut Session, parsed: &ParsedCommand) -> CommandResult {
    if required_arg(session, parsed, 0, "/interpret <phrase>").is_none() {
        return CommandResult::Continue;
    }
    let phrase = parsed.raw_args.as_str();
    match (
        session.interpreter.interpret(phrase),
        session.interpreter.matching_rule(phrase),
    ) {
        (Some(invocation), Some(rule)) => {
            session.info(format!("{} (rule: {rule})", invocation.describe()))
        }
        _ => session.info("No rule matches; this would be sent to the model."),
    }
    CommandResult::Continue
}

pub(crate) fn context(session: &mut Session, parsed: &ParsedCommand) -> CommandResult {
    match parsed.args.as_slice() {
        [] => {
            if session.context.is_empty() {
                session.info("Context is empty. Set entries with /context key=value.");
            } else {
                let rows = session
                    .context
                    .entries()
                    .map(|(key, value)| vec![key.to_string(), value.to_string()])
                    .collect();
                session.table("Context", &["Key", "Value"], rows);
            }
        }
        [only] if only.eq_ignore_ascii_case("clear") => {
            session.context.clear();
            session.info("Context cleared.");
        }
        pairs => {
            let mut parsed_pairs = Vec::with_capacity(pairs.len());
            for pair in pairs {
                match pair.split_once('=') {
                    Some((key, value)) => parsed_pairs.push((key, value)),
                    None => return usage_status(session, USAGE_CONTEXT),
                }
            }
            for (key, value) in parsed_pairs {
                match session.context.set(key, value) {
                    Ok(_) => session.info(format!("Context {}={}", key.trim(), value.trim())),
                    Err(e) => session.error(e),
                }
            }
        }
    }
    CommandResult::Continue
}
