use super::usage_status;
use crate::commands::{CommandResult, ParsedCommand};
use crate::core::config::parse_switch;
use crate::core::session::Session;

const USAGE_MODELS: &str = "/models [id]";
const USAGE_ALLOW: &str = "/allow [on|off]";

pub(crate) fn models(session: &mut Session, parsed: &ParsedCommand) -> CommandResult {
    match parsed.args.as_slice() {
        [] => CommandResult::ListModels,
        [model_id] => {
            session.model = model_id.clone();
            session.config.model = Some(model_id.clone());
            session.persist_config();
            session.info(format!("Model set: {model_id}"));
            CommandResult::Continue
        }
        _ => usage_status(session, USAGE_MODELS),
    }
}

pub(crate) fn show(session: &mut Session, _parsed: &ParsedCommand) -> CommandResult {
    let mut rows: Vec<Vec<String>> = session
        .config
        .summary_rows()
        .into_iter()
        .map(|(key, value)| vec![key, value])
        .collect();
    // Session overrides from the command line take precedence over the file.
    for row in &mut rows {
        match row[0].as_str() {
            "model" => row[1] = session.model.clone(),
            "allow-execution" => row[1] = on_off(session.allow_execution),
            "enable-tools" => row[1] = on_off(session.enable_tools),
            _ => {}
        }
    }
    let location = session
        .config_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(not saved)".to_string());
    rows.push(vec!["config-file".to_string(), location]);
    session.table("Configuration", &["Setting", "Value"], rows);
    CommandResult::Continue
}

pub(crate) fn system(session: &mut Session, parsed: &ParsedCommand) -> CommandResult {
    if parsed.args.is_empty() {
        let current = session.config.system_message().to_string();
        session.info(format!("System message: {current}"));
        return CommandResult::Continue;
    }
    let message = parsed.args.join(" ");
    session.config.system_message = Some(message);
    session.persist_config();
    session.info("System message updated.");
    CommandResult::Continue
}

pub(crate) fn allow(session: &mut Session, parsed: &ParsedCommand) -> CommandResult {
    let enabled = match parsed.args.as_slice() {
        [] => {
            session.info(format!(
                "Command execution is {}.",
                if session.allow_execution { "allowed" } else { "not allowed" }
            ));
            return CommandResult::Continue;
        }
        [value] => match parse_switch(value) {
            Some(enabled) => enabled,
            None => return usage_status(session, USAGE_ALLOW),
        },
        _ => return usage_status(session, USAGE_ALLOW),
    };
    session.allow_execution = enabled;
    session.config.allow_execution = Some(enabled);
    session.persist_config();
    session.info(if enabled {
        "Command execution allowed: shell and write_file will run."
    } else {
        "Command execution disabled."
    });
    CommandResult::Continue
}

fn on_off(flag: bool) -> String {
    let label = if flag { "on" } else { "off" };
    label.to_string()
}
