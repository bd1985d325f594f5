use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful terminal assistant. \
You can inspect the local machine through the provided tools: run shell commands, \
query git repositories, list and read files, check processes, ping hosts and fetch URLs. \
Prefer calling a tool over guessing. Keep answers concise and use plain text suitable for a terminal.";

/// Environment variables consulted for the API key, in order.
pub const API_KEY_VARS: [&str; 3] = ["TERMPAL_API_KEY", "GEMINI_API_KEY", "OPENAI_API_KEY"];

/// Settings keys accepted by `termpal set` / `termpal unset`.
pub const SETTING_KEYS: &[&str] = &[
    "model",
    "base-url",
    "api-key",
    "system-message",
    "temperature",
    "top-p",
    "max-tokens",
    "allow-execution",
    "enable-tools",
    "max-tool-rounds",
    "refresh-interval-ms",
    "history-dir",
];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub system_message: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Gates tools that spawn commands or write files.
    pub allow_execution: Option<bool>,
    /// Send tool definitions to the model.
    pub enable_tools: Option<bool>,
    pub max_tool_rounds: Option<usize>,
    pub refresh_interval_ms: Option<u64>,
    /// Default directory for `/save`.
    pub history_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownKey(String),
    InvalidValue { key: String, value: String, expected: &'static str },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownKey(key) => write!(
                f,
                "Unknown setting '{key}'. Available: {}",
                SETTING_KEYS.join(", ")
            ),
            ConfigError::InvalidValue {
                key,
                value,
                expected,
            } => write!(f, "Invalid value '{value}' for {key}: expected {expected}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn load() -> Result<Config, Box<dyn std::error::Error>> {
        Self::load_from_path(&Self::default_path()?)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&contents)
                .map_err(|e| format!("Invalid config file {}: {e}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let proj_dirs = ProjectDirs::from("org", "termpal", "termpal")
            .ok_or("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn system_message(&self) -> &str {
        self.system_message
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_MESSAGE)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(0.7)
    }

    pub fn top_p(&self) -> f32 {
        self.top_p.unwrap_or(0.95)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(4096)
    }

    pub fn allow_execution(&self) -> bool {
        self.allow_execution.unwrap_or(false)
    }

    pub fn enable_tools(&self) -> bool {
        self.enable_tools.unwrap_or(true)
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds.unwrap_or(5)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.unwrap_or(100).max(10))
    }

    /// API key from the environment first, then from the file.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        API_KEY_VARS
            .into_iter()
            .filter_map(lookup)
            .chain(self.api_key.clone())
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |expected: &'static str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        };
        match key {
            "model" => self.model = Some(value.to_string()),
            "base-url" => self.base_url = Some(value.to_string()),
            "api-key" => self.api_key = Some(value.to_string()),
            "system-message" => self.system_message = Some(value.to_string()),
            "temperature" => {
                self.temperature = Some(value.parse().map_err(|_| invalid("a number"))?)
            }
            "top-p" => self.top_p = Some(value.parse().map_err(|_| invalid("a number"))?),
            "max-tokens" => {
                self.max_tokens = Some(value.parse().map_err(|_| invalid("a positive integer"))?)
            }
            "allow-execution" => {
                self.allow_execution = Some(parse_switch(value).ok_or_else(|| invalid("on/off"))?)
            }
            "enable-tools" => {
                self.enable_tools = Some(parse_switch(value).ok_or_else(|| invalid("on/off"))?)
            }
            "max-tool-rounds" => {
                self.max_tool_rounds =
                    Some(value.parse().map_err(|_| invalid("a positive integer"))?)
            }
            "refresh-interval-ms" => {
                self.refresh_interval_ms =
                    Some(value.parse().map_err(|_| invalid("milliseconds"))?)
            }
            "history-dir" => self.history_dir = Some(PathBuf::from(value)),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: &str) -> Result<(), ConfigError> {
        match key {
            "model" => self.model = None,
            "base-url" => self.base_url = None,
            "api-key" => self.api_key = None,
            "system-message" => self.system_message = None,
            "temperature" => self.temperature = None,
            "top-p" => self.top_p = None,
            "max-tokens" => self.max_tokens = None,
            "allow-execution" => self.allow_execution = None,
            "enable-tools" => self.enable_tools = None,
            "max-tool-rounds" => self.max_tool_rounds = None,
            "refresh-interval-ms" => self.refresh_interval_ms = None,
            "history-dir" => self.history_dir = None,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Effective settings as display rows. The API key is never shown.
    pub fn summary_rows(&self) -> Vec<(String, String)> {
        let on_off = |flag: bool| if flag { "on" } else { "off" }.to_string();
        let api_key = if self.resolve_api_key().is_some() {
            "(set)"
        } else {
            "(unset)"
        };
        vec![
            ("model".into(), self.model().to_string()),
            ("base-url".into(), self.base_url().to_string()),
            ("api-key".into(), api_key.to_string()),
            ("temperature".into(), self.temperature().to_string()),
            ("top-p".into(), self.top_p().to_string()),
            ("max-tokens".into(), self.max_tokens().to_string()),
            ("allow-execution".into(), on_off(self.allow_execution())),
            ("enable-tools".into(), on_off(self.enable_tools())),
            ("max-tool-rounds".into(), self.max_tool_rounds().to_string()),
            (
                "refresh-interval-ms".into(),
                self.refresh_interval().as_millis().to_string(),
            ),
            (
                "history-dir".into(),
                self.history_dir
                    .as_ref()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_else(|| "(current directory)".into()),
            ),
            ("system-message".into(), self.system_message().to_string()),
        ]
    }

    pub fn print_all(&self) {
        println!("Current configuration:");
        for (key, value) in self.summary_rows() {
            println!("  {key}: {value}");
        }
    }
}

/// Accepts on/off, true/false, yes/no, 1/0.
pub fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
