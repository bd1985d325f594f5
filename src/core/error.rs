use std::fmt;
use std::time::Duration;

/// Failures raised while dispatching commands, running tools, or driving a
/// model turn. None of these end the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// Unknown command or tool. `kind` is "command" or "tool".
    NotFound { kind: &'static str, name: String },
    /// The input line could not be parsed as a command.
    Unrecognized(String),
    InvalidArguments(String),
    PermissionDenied { tool: String },
    Timeout { tool: String, after: Duration },
    /// A tool body ran and failed; carried back to the model as a tool-role
    /// error.
    ToolExecution { tool: String, message: String },
    ModelStream(String),
    ToolCallLimitExceeded { limit: usize },
}

impl AgentError {
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        AgentError::NotFound {
            kind: "tool",
            name: name.into(),
        }
    }

    pub fn command_not_found(name: impl Into<String>) -> Self {
        AgentError::NotFound {
            kind: "command",
            name: name.into(),
        }
    }

    /// Short machine-friendly label, used in tool-role payloads and logs.
    pub fn label(&self) -> &'static str {
        match self {
            AgentError::NotFound { .. } => "not_found",
            AgentError::Unrecognized(_) => "unrecognized",
            AgentError::InvalidArguments(_) => "invalid_arguments",
            AgentError::PermissionDenied { .. } => "permission_denied",
            AgentError::Timeout { .. } => "timeout",
            AgentError::ToolExecution { .. } => "tool_execution_error",
            AgentError::ModelStream(_) => "model_stream_error",
            AgentError::ToolCallLimitExceeded { .. } => "tool_call_limit_exceeded",
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::NotFound { kind, name } => write!(f, "Unknown {kind}: {name}"),
            AgentError::Unrecognized(line) => write!(f, "Unrecognized command line: {line}"),
            AgentError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            AgentError::PermissionDenied { tool } => write!(
                f,
                "Permission denied: '{tool}' runs commands or modifies files. Enable execution with /allow on"
            ),
            AgentError::Timeout { tool, after } => {
                write!(f, "'{tool}' timed out after {}s", after.as_secs())
            }
            AgentError::ToolExecution { tool, message } => {
                write!(f, "'{tool}' failed: {message}")
            }
            AgentError::ModelStream(msg) => write!(f, "Model stream error: {msg}"),
            AgentError::ToolCallLimitExceeded { limit } => write!(
                f,
                "Tool-call limit exceeded: the model requested more than {limit} tool rounds"
            ),
        }
    }
}

impl std::error::Error for AgentError {}
