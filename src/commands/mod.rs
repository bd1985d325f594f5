//! Slash-command routing and dispatch of interactive input.

mod handlers;
pub mod parser;
mod registry;

pub use parser::ParsedCommand;
pub use registry::{all_commands, find_command, Capabilities, Command, CommandAction};

use tracing::{debug, warn};

use crate::core::error::AgentError;
use crate::core::session::Session;
use crate::tools::{ArgValue, InvocationOrigin, ToolDefinition, ToolInvocation};

/// What the interactive loop should do after a line has been handled.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Continue,
    Exit,
    /// Run a tool and show its result; nothing enters the conversation.
    RunTool(ToolInvocation),
    /// Start a model turn with this text.
    SendMessage(String),
    Summarize,
    ListModels,
}

impl CommandResult {
    /// Whether the loop has to await something before the next prompt.
    pub fn suspends(&self) -> bool {
        matches!(
            self,
            Self::RunTool(_) | Self::SendMessage(_) | Self::Summarize | Self::ListModels
        )
    }
}

/// A parsed line bound to its command.
pub struct Route {
    pub command: &'static Command,
    pub parsed: ParsedCommand,
}

/// Parse a `/` line and find its command. Arguments are rejected for
/// commands that take none.
pub fn route(line: &str) -> Result<Route, AgentError> {
    let (name, _) = parser::split_command(line)?;
    let command = find_command(name).ok_or_else(|| AgentError::command_not_found(name))?;
    let parsed = ParsedCommand::parse(line, command.capabilities.options)?;
    if !command.capabilities.positional && !parsed.args.is_empty() {
        return Err(AgentError::InvalidArguments(format!(
            "/{} takes no arguments (usage: {})",
            command.name, command.usage
        )));
    }
    Ok(Route { command, parsed })
}

/// Handle one line of input. Slash lines are routed; anything else is offered
/// to the interpreter and otherwise becomes a message for the model.
pub fn process_input(session: &mut Session, line: &str) -> CommandResult {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return CommandResult::Continue;
    }

    if !trimmed.starts_with('/') {
        return match session.interpreter.interpret(trimmed) {
            Some(invocation) => {
                debug!(tool = %invocation.tool, "phrase mapped to tool");
                CommandResult::RunTool(invocation)
            }
            None => CommandResult::SendMessage(trimmed.to_string()),
        };
    }

    let routed = match route(trimmed) {
        Ok(routed) => routed,
        Err(err) => {
            debug!(error = %err, "command rejected");
            session.error(err.to_string());
            return CommandResult::Continue;
        }
    };
    debug!(command = routed.command.name, "routing command");
    dispatch(session, &routed)
}

/// Run a routed command. Only asynchronous commands may hand the loop work
/// that suspends.
pub(crate) fn dispatch(session: &mut Session, routed: &Route) -> CommandResult {
    let result = run_action(session, routed);
    if result.suspends() && !routed.command.capabilities.asynchronous {
        warn!(command = routed.command.name, "synchronous command asked to suspend");
        session.error(format!("/{} cannot start background work.", routed.command.name));
        return CommandResult::Continue;
    }
    result
}

fn run_action(session: &mut Session, routed: &Route) -> CommandResult {
    match routed.command.action {
        CommandAction::Handler(handler) => handler(session, &routed.parsed),
        CommandAction::Tool(tool) => {
            let outcome = session
                .executor
                .registry()
                .definition(tool)
                .and_then(|definition| {
                    tool_invocation(definition, &routed.parsed, routed.command.capabilities)
                });
            match outcome {
                Ok(invocation) => CommandResult::RunTool(invocation),
                Err(err) => {
                    session.error(err.to_string());
                    CommandResult::Continue
                }
            }
        }
    }
}

/// Map command arguments onto a tool's parameters: positional tokens in
/// declared order, named options by name, and a trailing rest parameter
/// takes the remaining raw text when the command keeps options positional.
pub fn tool_invocation(
    definition: &ToolDefinition,
    parsed: &ParsedCommand,
    capabilities: Capabilities,
) -> Result<ToolInvocation, AgentError> {
    let mut invocation = ToolInvocation::new(definition.name, InvocationOrigin::ExplicitCommand);
    let raw_rest = !capabilities.options && definition.params.last().is_some_and(|p| p.rest);

    let positional_params = if raw_rest {
        &definition.params[..definition.params.len() - 1]
    } else {
        &definition.params[..]
    };

    for (param, value) in positional_params.iter().zip(&parsed.args) {
        invocation.args.insert(param.name.to_string(), ArgValue::from(value.as_str()));
    }

    if raw_rest {
        if let Some(rest) = definition.params.last() {
            let text = parsed.raw_after(positional_params.len());
            if !text.is_empty() {
                invocation.args.insert(rest.name.to_string(), ArgValue::from(text));
            }
        }
    } else if parsed.args.len() > positional_params.len() {
        return Err(AgentError::InvalidArguments(format!(
            "'{}' takes at most {} argument{} (usage: {} {})",
            definition.name,
            positional_params.len(),
            if positional_params.len() == 1 { "" } else { "s" },
            definition.name,
            definition.synopsis()
        )));
    }

    for (key, value) in &parsed.options {
        if invocation.args.contains_key(key) {
            return Err(AgentError::InvalidArguments(format!(
                "'{key}' given twice for '{}'",
                definition.name
            )));
        }
        invocation.args.insert(key.clone(), ArgValue::from(value.as_str()));
    }

    Ok(invocation)
}

#[cfg(test)]
mod tests;
