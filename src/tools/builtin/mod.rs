//! Builtin tool bodies.

mod files;
mod git;
mod network;
mod shell;
mod system;

use std::sync::Arc;

use super::registry::ToolRegistryBuilder;

pub use files::{FileStatsTool, FindLargeTool, ListFilesTool, ReadFileTool, SearchFilesTool};
pub use git::{GitDiffTool, GitLogTool, GitStatusTool};
pub use network::{FetchUrlTool, PingTool};
pub use shell::{ShellTool, WriteFileTool};
pub use system::{CurrentDateTimeTool, ListProcessesTool, SystemInfoTool};

/// Registration order is the order `/tools` lists them and the order the
/// model sees them.
pub fn register_all(builder: ToolRegistryBuilder, client: reqwest::Client) -> ToolRegistryBuilder {
    builder
        .register(Arc::new(ShellTool::new()))
        .register(Arc::new(WriteFileTool::new()))
        .register(Arc::new(ReadFileTool::new()))
        .register(Arc::new(ListFilesTool::new()))
        .register(Arc::new(FileStatsTool::new()))
        .register(Arc::new(FindLargeTool::new()))
        .register(Arc::new(SearchFilesTool::new()))
        .register(Arc::new(GitStatusTool::new()))
        .register(Arc::new(GitLogTool::new()))
        .register(Arc::new(GitDiffTool::new()))
        .register(Arc::new(ListProcessesTool::new()))
        .register(Arc::new(SystemInfoTool::new()))
        .register(Arc::new(CurrentDateTimeTool::new()))
        .register(Arc::new(PingTool::new()))
        .register(Arc::new(FetchUrlTool::new(client)))
}

/// Positive integer argument within `1..=max`.
fn bounded_count(value: Option<i64>, name: &str, max: i64) -> Result<usize, String> {
    match value {
        Some(n) if (1..=max).contains(&n) => Ok(n as usize),
        Some(n) => Err(format!("{name} must be between 1 and {max}, got {n}")),
        None => Err(format!("missing argument '{name}'")),
    }
}
