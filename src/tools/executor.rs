use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{
    ArgValue, SafetyClass, ToolArgs, ToolDefinition, ToolInvocation, ToolPayload, ToolRegistry,
    ToolResult, ToolStatus,
};
use crate::core::error::AgentError;

/// Validates, authorizes and runs tool invocations. Holds no per-call state;
/// every input arrives with the invocation.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Resolve and run `invocation`.
    ///
    /// Argument checks happen before anything else, then the safety gate.
    /// A tool body that fails still yields `Ok` with an error status; `Err`
    /// is reserved for dispatch failures and timeouts.
    pub async fn execute(
        &self,
        invocation: &ToolInvocation,
        allow_execution: bool,
    ) -> Result<ToolResult, AgentError> {
        let started = Instant::now();
        let tool = self.registry.lookup(&invocation.tool)?;
        let definition = tool.definition();

        let args = resolve_args(definition, invocation)?;
        tool.validate(&args).map_err(|reason| {
            AgentError::InvalidArguments(format!("{}: {reason}", definition.name))
        })?;

        if definition.safety == SafetyClass::Executing && !allow_execution {
            debug!(
                tool = definition.name,
                origin = invocation.origin.label(),
                "execution not allowed"
            );
            return Err(AgentError::PermissionDenied {
                tool: definition.name.to_string(),
            });
        }

        debug!(
            tool = definition.name,
            origin = invocation.origin.label(),
            timeout_ms = definition.timeout.map(|t| t.as_millis() as u64),
            "running tool"
        );

        let outcome = match definition.timeout {
            Some(limit) => match tokio::time::timeout(limit, tool.run(&args)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    info!(tool = definition.name, after_ms = limit.as_millis() as u64, "tool timed out");
                    return Err(AgentError::Timeout {
                        tool: definition.name.to_string(),
                        after: limit,
                    });
                }
            },
            None => tool.run(&args).await,
        };

        let elapsed = started.elapsed();
        let result = match outcome {
            Ok(payload) => ToolResult {
                tool: definition.name.to_string(),
                status: ToolStatus::Ok,
                payload,
                elapsed,
            },
            Err(diagnostic) => ToolResult {
                tool: definition.name.to_string(),
                status: ToolStatus::Error,
                payload: ToolPayload::Text(diagnostic),
                elapsed,
            },
        };
        info!(
            tool = definition.name,
            origin = invocation.origin.label(),
            ok = result.is_ok(),
            elapsed_ms = elapsed.as_millis() as u64,
            "tool finished"
        );
        Ok(result)
    }
}

/// Match supplied arguments against the definition: unknown names and type
/// mismatches are rejected, declared defaults fill gaps, and missing required
/// parameters are reported together.
pub fn resolve_args(
    definition: &ToolDefinition,
    invocation: &ToolInvocation,
) -> Result<ToolArgs, AgentError> {
    if let Some(unknown) = invocation
        .args
        .keys()
        .find(|key| definition.find_param(key).is_none())
    {
        let expected = if definition.params.is_empty() {
            "none".to_string()
        } else {
            definition
                .params
                .iter()
                .map(|param| param.name)
                .collect::<Vec<_>>()
                .join(", ")
        };
        return Err(AgentError::InvalidArguments(format!(
            "unknown argument '{unknown}' for '{}' (expected: {expected})",
            definition.name
        )));
    }

    let mut args = ToolArgs::default();
    let mut missing = Vec::new();
    for param in &definition.params {
        let supplied = invocation.args.get(param.name).filter(|value| {
            !matches!(value, ArgValue::String(s) if s.trim().is_empty())
        });
        let value = match (supplied, param.default) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => ArgValue::from(default),
            (None, None) => {
                if param.required {
                    missing.push(param.name);
                }
                continue;
            }
        };
        let typed = value.coerce(param.kind).map_err(|reason| {
            AgentError::InvalidArguments(format!(
                "'{}' for '{}': {reason}",
                param.name, definition.name
            ))
        })?;
        args.insert(param.name, typed);
    }

    if !missing.is_empty() {
        return Err(AgentError::InvalidArguments(format!(
            "'{}' requires {} (usage: {} {})",
            definition.name,
            missing
                .iter()
                .map(|name| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(", "),
            definition.name,
            definition.synopsis()
        )));
    }

    Ok(args)
}

fn error_text(error: &AgentError) -> ToolPayload {
    ToolPayload::Text(format!("Error ({}): {error}", error.label()))
}

/// Tool-role stand-in for an invocation that never produced a result.
pub fn failure_result(tool: &str, error: &AgentError) -> ToolResult {
    ToolResult {
        tool: tool.to_string(),
        status: ToolStatus::Error,
        payload: error_text(error),
        elapsed: Duration::ZERO,
    }
}

/// Tag a failed tool body's diagnostic as a `ToolExecution` error, the form
/// the model gets. Successful results pass through.
pub fn label_body_failure(result: ToolResult) -> ToolResult {
    if result.is_ok() {
        return result;
    }
    let error = AgentError::ToolExecution {
        tool: result.tool.clone(),
        message: result.payload.to_plain_text().trim_end().to_string(),
    };
    ToolResult {
        payload: error_text(&error),
        ..result
    }
}

#[cfg(test)]
mod tests;
