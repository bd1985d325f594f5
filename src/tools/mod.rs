//! Local tools the assistant can run: definitions, invocations, results, the
//! registry that catalogues them and the executor that runs them.
//!
//! A tool is reachable three ways (an explicit `/command`, a phrase matched by
//! [`crate::nlp`], or a function call issued by the model) and every route
//! ends in [`executor::ToolExecutor::execute`].

pub mod builtin;
pub mod executor;
pub mod process;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::api::{ChatToolDefinition, ChatToolFunction};
use crate::core::error::AgentError;

pub use executor::ToolExecutor;
pub use registry::ToolRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyClass {
    ReadOnly,
    /// Spawns arbitrary commands or writes files; needs execution allowed.
    Executing,
}

impl SafetyClass {
    pub fn label(self) -> &'static str {
        match self {
            SafetyClass::ReadOnly => "read-only",
            SafetyClass::Executing => "executing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Int,
    Bool,
}

impl ParamKind {
    pub fn json_type(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Int => "integer",
            ParamKind::Bool => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<&'static str>,
    pub description: &'static str,
    /// Swallows the remaining text of an explicit command.
    pub rest: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            description,
            rest: false,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            description,
            rest: false,
        }
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self.required = false;
        self
    }

    pub const fn rest(mut self) -> Self {
        self.rest = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub safety: SafetyClass,
    /// Talks to the network; always runs under `timeout`.
    pub network_bound: bool,
    pub timeout: Option<Duration>,
}

impl ToolDefinition {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            params: Vec::new(),
            safety: SafetyClass::ReadOnly,
            network_bound: false,
            timeout: None,
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn executing(mut self) -> Self {
        self.safety = SafetyClass::Executing;
        self
    }

    pub fn network(mut self, timeout: Duration) -> Self {
        self.network_bound = true;
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn find_param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|param| param.name == name)
    }

    /// `<path> [count=15]` style synopsis.
    pub fn synopsis(&self) -> String {
        self.params
            .iter()
            .map(|param| match (param.required, param.default) {
                (true, _) if param.rest => format!("<{}...>", param.name),
                (true, _) => format!("<{}>", param.name),
                (false, Some(default)) => format!("[{}={}]", param.name, default),
                (false, None) => format!("[{}]", param.name),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Function-calling schema advertised to the model.
    pub fn function_definition(&self) -> ChatToolDefinition {
        let mut properties = Map::new();
        for param in &self.params {
            let mut description = param.description.to_string();
            if let Some(default) = param.default {
                description.push_str(&format!(" (default: {default})"));
            }
            properties.insert(
                param.name.to_string(),
                json!({ "type": param.kind.json_type(), "description": description }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name)
            .collect();

        ChatToolDefinition {
            kind: "function".to_string(),
            function: ChatToolFunction {
                name: self.name.to_string(),
                description: Some(self.description.to_string()),
                parameters: json!({
                    "type": "object",
                    "properties": Value::Object(properties),
                    "required": required,
                }),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl ArgValue {
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) => Ok(ArgValue::String(s.clone())),
            Value::Bool(b) => Ok(ArgValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(ArgValue::Int(i)),
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Ok(ArgValue::Int(f as i64))
                    }
                    _ => Err(format!("unsupported number {n}")),
                },
            },
            Value::Null => Err("null is not a valid value".to_string()),
            Value::Array(_) | Value::Object(_) => {
                Err("nested values are not supported".to_string())
            }
        }
    }

    /// Convert to the declared kind. Strings from commands and phrases are
    /// parsed; mismatched model values are rejected.
    pub fn coerce(&self, kind: ParamKind) -> Result<ArgValue, String> {
        match (kind, self) {
            (ParamKind::String, ArgValue::String(_)) => Ok(self.clone()),
            (ParamKind::String, ArgValue::Int(i)) => Ok(ArgValue::String(i.to_string())),
            (ParamKind::String, ArgValue::Bool(_)) => Err("expected a string".to_string()),
            (ParamKind::Int, ArgValue::Int(_)) => Ok(self.clone()),
            (ParamKind::Int, ArgValue::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(ArgValue::Int)
                .map_err(|_| format!("expected an integer, got '{s}'")),
            (ParamKind::Int, ArgValue::Bool(_)) => Err("expected an integer".to_string()),
            (ParamKind::Bool, ArgValue::Bool(_)) => Ok(self.clone()),
            (ParamKind::Bool, ArgValue::String(s)) => crate::core::config::parse_switch(s)
                .map(ArgValue::Bool)
                .ok_or_else(|| format!("expected true/false, got '{s}'")),
            (ParamKind::Bool, ArgValue::Int(_)) => Err("expected true/false".to_string()),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::String(s) => write!(f, "{s}"),
            ArgValue::Int(i) => write!(f, "{i}"),
            ArgValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::String(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::String(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int(value)
    }
}

/// Arguments after validation against a definition: every declared parameter
/// with a value or default is present and typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolArgs {
    values: BTreeMap<String, ArgValue>,
}

impl ToolArgs {
    pub fn insert(&mut self, name: &str, value: ArgValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn require_str(&self, name: &str) -> Result<&str, String> {
        self.str(name)
            .ok_or_else(|| format!("missing argument '{name}'"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOrigin {
    ExplicitCommand,
    NaturalLanguage,
    ModelFunctionCall,
}

impl InvocationOrigin {
    pub fn label(self) -> &'static str {
        match self {
            InvocationOrigin::ExplicitCommand => "command",
            InvocationOrigin::NaturalLanguage => "phrase",
            InvocationOrigin::ModelFunctionCall => "model",
        }
    }
}

/// A request to run one tool; created per dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool: String,
    pub args: BTreeMap<String, ArgValue>,
    pub origin: InvocationOrigin,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, origin: InvocationOrigin) -> Self {
        Self {
            tool: tool.into(),
            args: BTreeMap::new(),
            origin,
        }
    }

    pub fn with_arg(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.args.insert(name.to_string(), value.into());
        self
    }

    /// Build from a model function call whose arguments arrive as JSON text.
    pub fn from_function_call(name: &str, arguments: &str) -> Result<Self, AgentError> {
        let mut invocation = Self::new(name, InvocationOrigin::ModelFunctionCall);
        if arguments.trim().is_empty() {
            return Ok(invocation);
        }
        let value: Value = serde_json::from_str(arguments).map_err(|e| {
            AgentError::InvalidArguments(format!("arguments for '{name}' are not valid JSON: {e}"))
        })?;
        let Value::Object(map) = value else {
            return Err(AgentError::InvalidArguments(format!(
                "arguments for '{name}' must be a JSON object"
            )));
        };
        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            let arg = ArgValue::from_json(&value)
                .map_err(|e| AgentError::InvalidArguments(format!("'{key}': {e}")))?;
            invocation.args.insert(key, arg);
        }
        Ok(invocation)
    }

    /// `name(key="value", n=3)` for display.
    pub fn describe(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|(key, value)| match value {
                ArgValue::String(s) => format!("{key}={s:?}"),
                other => format!("{key}={other}"),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({args})", self.tool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolPayload {
    Text(String),
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

impl ToolPayload {
    pub fn table<H: Into<String>>(headers: impl IntoIterator<Item = H>) -> Self {
        ToolPayload::Table {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_row<C: Into<String>>(mut self, row: impl IntoIterator<Item = C>) -> Self {
        if let ToolPayload::Table { rows, .. } = &mut self {
            rows.push(row.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Plain text form, used when the result goes back to the model.
    pub fn to_plain_text(&self) -> String {
        match self {
            ToolPayload::Text(text) => text.clone(),
            ToolPayload::Table { headers, rows } => {
                let mut out = headers.join(" | ");
                for row in rows {
                    out.push('\n');
                    out.push_str(&row.join(" | "));
                }
                if rows.is_empty() {
                    out.push_str("\n(no rows)");
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub tool: String,
    pub status: ToolStatus,
    pub payload: ToolPayload,
    pub elapsed: Duration,
}

impl ToolResult {
    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Ok
    }
}

/// A runnable tool body. `validate` runs before any permission check or side
/// effect; `run` performs the work.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    fn validate(&self, _args: &ToolArgs) -> Result<(), String> {
        Ok(())
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String>;
}
