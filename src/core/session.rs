use std::path::PathBuf;

use tracing::{info, warn};

use crate::core::config::Config;
use crate::core::context::ContextStore;
use crate::core::message::Conversation;
use crate::core::prompt::build_system_prompt;
use crate::core::streamer::TurnSettings;
use crate::nlp::Interpreter;
use crate::tools::{ToolExecutor, ToolInvocation, ToolResult};

/// Something for the interactive loop to print.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Info(String),
    Warning(String),
    Error(String),
    Table {
        title: String,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    ToolResult {
        call: String,
        result: ToolResult,
    },
}

/// State of the single interactive session. Passed by reference to every
/// command handler and to each model turn.
pub struct Session {
    pub config: Config,
    /// Where setting changes are persisted; `None` keeps them in memory.
    pub config_path: Option<PathBuf>,
    pub model: String,
    pub allow_execution: bool,
    pub enable_tools: bool,
    pub conversation: Conversation,
    pub context: ContextStore,
    pub executor: ToolExecutor,
    pub interpreter: Interpreter,
    output: Vec<Output>,
}

impl Session {
    pub fn new(config: Config, config_path: Option<PathBuf>, executor: ToolExecutor) -> Self {
        Self {
            model: config.model().to_string(),
            allow_execution: config.allow_execution(),
            enable_tools: config.enable_tools(),
            config,
            config_path,
            conversation: Conversation::new(),
            context: ContextStore::new(),
            executor,
            interpreter: Interpreter::new(),
            output: Vec::new(),
        }
    }

    pub fn push(&mut self, output: Output) {
        self.output.push(output);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Output::Info(message.into()));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Output::Warning(message.into()));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Output::Error(message.into()));
    }

    pub fn table(&mut self, title: impl Into<String>, headers: &[&str], rows: Vec<Vec<String>>) {
        self.push(Output::Table {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        });
    }

    /// Everything queued since the last call.
    pub fn take_output(&mut self) -> Vec<Output> {
        std::mem::take(&mut self.output)
    }

    pub fn system_prompt(&self) -> String {
        let cwd = std::env::current_dir().ok();
        build_system_prompt(self.config.system_message(), &self.context, cwd.as_deref())
    }

    pub fn turn_settings(&self) -> TurnSettings {
        TurnSettings {
            model: self.model.clone(),
            temperature: self.config.temperature(),
            top_p: self.config.top_p(),
            max_tokens: self.config.max_tokens(),
            enable_tools: self.enable_tools,
            allow_execution: self.allow_execution,
            max_tool_rounds: self.config.max_tool_rounds(),
            refresh_interval: self.config.refresh_interval(),
        }
    }

    /// Write the config back to disk. A failure is reported as a warning and
    /// the in-memory change is kept.
    pub fn persist_config(&mut self) {
        let Some(path) = self.config_path.clone() else {
            return;
        };
        match self.config.save_to_path(&path) {
            Ok(()) => info!(path = %path.display(), "settings saved"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to save settings");
                self.warn(format!(
                    "Could not save settings to {}: {e}",
                    path.display()
                ));
            }
        }
    }

    /// Run a tool from a command or phrase and queue its result for display.
    pub async fn run_tool(&mut self, invocation: &ToolInvocation) {
        match self
            .executor
            .execute(invocation, self.allow_execution)
            .await
        {
            Ok(result) => self.push(Output::ToolResult {
                call: invocation.describe(),
                result,
            }),
            Err(err) => self.error(err.to_string()),
        }
    }
}
