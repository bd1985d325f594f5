use super::handlers::{config, core, io};
use super::{CommandResult, ParsedCommand};
use crate::core::session::Session;

pub type CommandHandler = fn(&mut Session, &ParsedCommand) -> CommandResult;

/// What a command accepts, and whether running it may suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub positional: bool,
    pub options: bool,
    pub asynchronous: bool,
}

const NONE: Capabilities = Capabilities {
    positional: false,
    options: false,
    asynchronous: false,
};

const POSITIONAL: Capabilities = Capabilities {
    positional: true,
    ..NONE
};

const TOOL: Capabilities = Capabilities {
    positional: true,
    options: true,
    asynchronous: true,
};

/// Tool commands whose last parameter takes the rest of the line verbatim.
const RAW_TOOL: Capabilities = Capabilities {
    options: false,
    ..TOOL
};

pub enum CommandAction {
    Handler(CommandHandler),
    /// Runs the named tool with arguments mapped from the command line.
    Tool(&'static str),
}

pub struct Command {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub help: &'static str,
    pub capabilities: Capabilities,
    pub action: CommandAction,
}

impl Command {
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
    }

    pub fn tool(&self) -> Option<&'static str> {
        match self.action {
            CommandAction::Tool(tool) => Some(tool),
            CommandAction::Handler(_) => None,
        }
    }
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands().iter().find(|command| command.matches(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        aliases: &["?"],
        usage: "/help",
        help: "Show available commands.",
        capabilities: NONE,
        action: CommandAction::Handler(core::help),
    },
    Command {
        name: "exit",
        aliases: &["quit"],
        usage: "/exit",
        help: "Leave the session.",
        capabilities: NONE,
        action: CommandAction::Handler(core::exit),
    },
    Command {
        name: "clear",
        aliases: &[],
        usage: "/clear",
        help: "Forget the conversation so far.",
        capabilities: NONE,
        action: CommandAction::Handler(core::clear),
    },
    Command {
        name: "models",
        aliases: &["model"],
        usage: "/models [id]",
        help: "List available models, or switch to one.",
        capabilities: Capabilities {
            asynchronous: true,
            ..POSITIONAL
        },
        action: CommandAction::Handler(config::models),
    },
    Command {
        name: "save",
        aliases: &[],
        usage: "/save [file]",
        help: "Save the conversation as JSON.",
        capabilities: POSITIONAL,
        action: CommandAction::Handler(io::save),
    },
    Command {
        name: "load",
        aliases: &[],
        usage: "/load <file>",
        help: "Replace the conversation with a saved one.",
        capabilities: POSITIONAL,
        action: CommandAction::Handler(io::load),
    },
    Command {
        name: "tools",
        aliases: &[],
        usage: "/tools",
        help: "List the tools and their safety class.",
        capabilities: NONE,
        action: CommandAction::Handler(core::tools),
    },
    Command {
        name: "config",
        aliases: &[],
        usage: "/config",
        help: "Show the active settings.",
        capabilities: NONE,
        action: CommandAction::Handler(config::show),
    },
    Command {
        name: "system",
        aliases: &[],
        usage: "/system [text]",
        help: "Show or replace the system message.",
        capabilities: POSITIONAL,
        action: CommandAction::Handler(config::system),
    },
    Command {
        name: "allow",
        aliases: &[],
        usage: "/allow [on|off]",
        help: "Show or toggle permission to run commands and write files.",
        capabilities: POSITIONAL,
        action: CommandAction::Handler(config::allow),
    },
    Command {
        name: "summary",
        aliases: &[],
        usage: "/summary",
        help: "Ask the model to summarize the conversation.",
        capabilities: Capabilities {
            asynchronous: true,
            ..NONE
        },
        action: CommandAction::Handler(core::summary),
    },
    Command {
        name: "interpret",
        aliases: &[],
        usage: "/interpret <phrase>",
        help: "Show which tool a phrase maps to, without running it.",
        capabilities: POSITIONAL,
        action: CommandAction::Handler(core::interpret),
    },
    Command {
        name: "context",
        aliases: &["ctx"],
        usage: "/context [clear|key=value ...]",
        help: "List, set or clear context passed to the model.",
        capabilities: POSITIONAL,
        action: CommandAction::Handler(core::context),
    },
    Command {
        name: "execute",
        aliases: &["exec", "sh"],
        usage: "/execute <command>",
        help: "Run a shell command.",
        capabilities: RAW_TOOL,
        action: CommandAction::Tool("shell"),
    },
    Command {
        name: "write",
        aliases: &[],
        usage: "/write <path> <content>",
        help: "Write text to a file.",
        capabilities: RAW_TOOL,
        action: CommandAction::Tool("write_file"),
    },
    Command {
        name: "read",
        aliases: &["cat"],
        usage: "/read <path>",
        help: "Show a text file.",
        capabilities: TOOL,
        action: CommandAction::Tool("read_file"),
    },
    Command {
        name: "ls",
        aliases: &["list"],
        usage: "/ls [path]",
        help: "List a directory.",
        capabilities: TOOL,
        action: CommandAction::Tool("list_files"),
    },
    Command {
        name: "stat",
        aliases: &[],
        usage: "/stat <path>",
        help: "Show file metadata.",
        capabilities: TOOL,
        action: CommandAction::Tool("file_stats"),
    },
    Command {
        name: "find_large",
        aliases: &[],
        usage: "/find_large [path] [count]",
        help: "Find the largest files under a directory.",
        capabilities: TOOL,
        action: CommandAction::Tool("find_large"),
    },
    Command {
        name: "search",
        aliases: &["grep"],
        usage: "/search <query> [path]",
        help: "Find files whose name or content contains the query.",
        capabilities: TOOL,
        action: CommandAction::Tool("search_files"),
    },
    Command {
        name: "git_status",
        aliases: &[],
        usage: "/git_status [path]",
        help: "Show the working tree status.",
        capabilities: TOOL,
        action: CommandAction::Tool("git_status"),
    },
    Command {
        name: "git_log",
        aliases: &[],
        usage: "/git_log [path] [count]",
        help: "Show recent commits.",
        capabilities: TOOL,
        action: CommandAction::Tool("git_log"),
    },
    Command {
        name: "git_diff",
        aliases: &["diff"],
        usage: "/git_diff <first> <second>",
        help: "Diff two files or directories.",
        capabilities: TOOL,
        action: CommandAction::Tool("git_diff"),
    },
    Command {
        name: "ps",
        aliases: &[],
        usage: "/ps [limit]",
        help: "List processes by memory use.",
        capabilities: TOOL,
        action: CommandAction::Tool("list_processes"),
    },
    Command {
        name: "sysinfo",
        aliases: &[],
        usage: "/sysinfo",
        help: "Show host and OS details.",
        capabilities: TOOL,
        action: CommandAction::Tool("system_info"),
    },
    Command {
        name: "datetime",
        aliases: &["date"],
        usage: "/datetime",
        help: "Show the current date and time.",
        capabilities: TOOL,
        action: CommandAction::Tool("current_datetime"),
    },
    Command {
        name: "ping",
        aliases: &[],
        usage: "/ping <host> [count]",
        help: "Check reachability and latency of a host.",
        capabilities: TOOL,
        action: CommandAction::Tool("ping"),
    },
    Command {
        name: "curl",
        aliases: &["fetch"],
        usage: "/curl <url>",
        help: "Fetch a URL.",
        capabilities: TOOL,
        action: CommandAction::Tool("fetch_url"),
    },
];
