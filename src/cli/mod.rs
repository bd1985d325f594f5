//! Command-line entry point.
//!
//! Parses arguments, sets up logging, loads the config and either runs one of
//! the configuration subcommands or starts the interactive session.

use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::chat_stream::HttpChatBackend;
use crate::core::config::{Config, API_KEY_VARS};
use crate::core::session::Session;
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::ui::chat_loop::run_chat;
use crate::ui::render::format_table;

/// Log filter environment variable.
pub const LOG_ENV: &str = "TERMPAL_LOG";
const DEFAULT_LOG_FILTER: &str = "termpal=info";

#[derive(Parser, Debug)]
#[command(name = "termpal", version)]
#[command(about = "A terminal assistant that chats with a language model and runs local tools")]
#[command(
    long_about = "termpal streams replies from an OpenAI-compatible chat endpoint and lets the \
model (or you) run local inspection tools: files, git, processes, ping and HTTP fetches.\n\n\
Environment Variables:\n\
  TERMPAL_API_KEY   API key (GEMINI_API_KEY and OPENAI_API_KEY are also read)\n\
  TERMPAL_LOG       Log filter for --log-file (default: termpal=info)\n\n\
Inside a session:\n\
  /help             List commands\n\
  /allow on         Allow shell commands and file writes\n\
  Ctrl+C            Cancel the running reply\n\
  /exit             Quit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Model for this session (not saved)
    #[arg(short = 'm', long, global = true, value_name = "ID")]
    pub model: Option<String>,

    /// Allow tools that run commands or write files for this session
    #[arg(long, global = true)]
    pub allow_execution: bool,

    /// Do not offer tools to the model
    #[arg(long, global = true)]
    pub no_tools: bool,

    /// Write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start an interactive session (default)
    Chat,
    /// List the available tools
    Tools,
    /// Print the current configuration
    Config,
    /// Set a configuration value
    Set {
        key: String,
        /// Value; several words are joined with spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        value: Vec<String>,
    },
    /// Remove a configuration value
    Unset { key: String },
}

fn init_logging(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    // Without a file, nothing is logged so the live view stays clean.
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false);
    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

fn config_path(args: &Args) -> Result<PathBuf, Box<dyn Error>> {
    match &args.config {
        Some(path) => Ok(path.clone()),
        None => Config::default_path(),
    }
}

fn print_tools(registry: &ToolRegistry) {
    let rows = registry.summary_rows();
    let headers = ["Name", "Safety", "Arguments", "Description"].map(String::from);
    println!("{}", format_table(&headers, &rows));
}

fn set_value(path: &Path, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load_from_path(path)?;
    config.set_value(key, value)?;
    config.save_to_path(path)?;
    if key == "api-key" {
        println!("✅ Set {key}");
    } else {
        println!("✅ Set {key} = {value}");
    }
    Ok(())
}

fn unset_value(path: &Path, key: &str) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load_from_path(path)?;
    config.unset_value(key)?;
    config.save_to_path(path)?;
    println!("✅ Unset {key}");
    Ok(())
}

fn build_session(args: &Args, config: Config, path: PathBuf, client: reqwest::Client) -> Session {
    let registry = ToolRegistry::builtin(client);
    let mut session = Session::new(config, Some(path), ToolExecutor::new(Arc::new(registry)));
    if let Some(model) = args.model.as_ref().filter(|m| !m.trim().is_empty()) {
        session.model = model.trim().to_string();
    }
    if args.allow_execution {
        session.allow_execution = true;
    }
    if args.no_tools {
        session.enable_tools = false;
    }
    session
}

async fn start_chat(args: &Args, config: Config, path: PathBuf) -> Result<(), Box<dyn Error>> {
    let api_key = config.resolve_api_key().ok_or_else(|| {
        format!(
            "No API key found. Set one of {} or run: termpal set api-key <key>",
            API_KEY_VARS.join(", ")
        )
    })?;
    let client = reqwest::Client::new();
    let backend = HttpChatBackend::new(client.clone(), config.base_url(), api_key);
    let session = build_session(args, config, path, client);
    run_chat(session, backend).await
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let path = config_path(&args)?;
    match args.command.as_ref().unwrap_or(&Commands::Chat) {
        Commands::Chat => {
            let config = Config::load_from_path(&path)?;
            info!(config = %path.display(), "starting chat");
            start_chat(&args, config, path).await
        }
        Commands::Tools => {
            print_tools(&ToolRegistry::builtin(reqwest::Client::new()));
            Ok(())
        }
        Commands::Config => {
            Config::load_from_path(&path)?.print_all();
            println!("  config-file: {}", path.display());
            Ok(())
        }
        Commands::Set { key, value } => set_value(&path, key, &value.join(" ")),
        Commands::Unset { key } => unset_value(&path, key),
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))
}
