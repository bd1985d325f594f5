use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::bounded_count;
use crate::tools::process::run_program;
use crate::tools::{ParamKind, ParamSpec, Tool, ToolArgs, ToolDefinition, ToolPayload};

const GIT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GitStatusTool {
    definition: ToolDefinition,
}

impl GitStatusTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "git_status",
                "Show the branch and the staged, unstaged and untracked files of a git repository.",
            )
            .param(ParamSpec::optional("path", ParamKind::String, "Repository directory").with_default("."))
            .timeout(GIT_TIMEOUT),
        }
    }
}

impl Default for GitStatusTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq, Eq)]
struct StatusSummary {
    branch: Option<String>,
    entries: Vec<(String, String)>,
}

fn describe_code(code: char) -> &'static str {
    match code {
        'M' => "modified",
        'A' => "added",
        'D' => "deleted",
        'R' => "renamed",
        'C' => "copied",
        'T' => "type changed",
        'U' => "conflicted",
        _ => "changed",
    }
}

/// Parse `git status --porcelain=v1 --branch` output.
fn parse_porcelain(output: &str) -> StatusSummary {
    let mut branch = None;
    let mut entries = Vec::new();

    for line in output.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            branch = Some(header.to_string());
            continue;
        }
        if line.len() < 4 {
            continue;
        }
        let mut codes = line.chars();
        let (Some(x), Some(y)) = (codes.next(), codes.next()) else {
            continue;
        };
        let path = line[3..].to_string();

        if x == '?' && y == '?' {
            entries.push(("untracked".to_string(), path));
            continue;
        }
        if x == '!' {
            continue;
        }
        if x != ' ' {
            entries.push((format!("staged: {}", describe_code(x)), path.clone()));
        }
        if y != ' ' {
            entries.push((format!("unstaged: {}", describe_code(y)), path));
        }
    }

    StatusSummary { branch, entries }
}

async fn ensure_repository(dir: &Path) -> Result<(), String> {
    let output = run_program("git", &["rev-parse", "--is-inside-work-tree"], Some(dir)).await?;
    if output.success() && output.stdout.trim() == "true" {
        Ok(())
    } else {
        Err(format!("{} is not inside a git work tree", dir.display()))
    }
}

#[async_trait]
impl Tool for GitStatusTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let dir = Path::new(args.require_str("path")?);
        ensure_repository(dir).await?;

        let output = run_program("git", &["status", "--porcelain=v1", "--branch"], Some(dir)).await?;
        if !output.success() {
            return Err(output.combined());
        }

        let summary = parse_porcelain(&output.stdout);
        let branch = summary.branch.unwrap_or_else(|| "(unknown branch)".into());
        if summary.entries.is_empty() {
            return Ok(ToolPayload::Text(format!(
                "On {branch}\nClean working directory."
            )));
        }

        Ok(summary.entries.into_iter().fold(
            ToolPayload::table(["State", "Path"]).with_row(["branch".to_string(), branch]),
            |table, (state, path)| table.with_row([state, path]),
        ))
    }
}

pub struct GitLogTool {
    definition: ToolDefinition,
}

impl GitLogTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new("git_log", "Show the most recent commits of a git repository.")
                .param(ParamSpec::optional("path", ParamKind::String, "Repository directory").with_default("."))
                .param(ParamSpec::optional("count", ParamKind::Int, "Number of commits").with_default("15"))
                .timeout(GIT_TIMEOUT),
        }
    }
}

impl Default for GitLogTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Rows from `--pretty=format:%h%x09%an%x09%ar%x09%s`.
fn parse_log(output: &str) -> Vec<Vec<String>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields: Vec<String> = line.splitn(4, '\t').map(str::to_string).collect();
            fields.resize(4, String::new());
            fields
        })
        .collect()
}

#[async_trait]
impl Tool for GitLogTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), String> {
        bounded_count(args.int("count"), "count", 500).map(|_| ())
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let dir = Path::new(args.require_str("path")?);
        let count = bounded_count(args.int("count"), "count", 500)?;
        ensure_repository(dir).await?;

        let max_count = format!("--max-count={count}");
        let output = run_program(
            "git",
            &[
                "log",
                max_count.as_str(),
                "--pretty=format:%h%x09%an%x09%ar%x09%s",
            ],
            Some(dir),
        )
        .await?;
        if !output.success() {
            return Err(output.combined());
        }

        let rows = parse_log(&output.stdout);
        if rows.is_empty() {
            return Ok(ToolPayload::Text("No commits yet.".to_string()));
        }
        Ok(rows.into_iter().fold(
            ToolPayload::table(["Commit", "Author", "When", "Subject"]),
            |table, row| table.with_row(row),
        ))
    }
}

pub struct GitDiffTool {
    definition: ToolDefinition,
}

impl GitDiffTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "git_diff",
                "Show a unified diff between two files or directories (works outside repositories).",
            )
            .param(ParamSpec::required("first", ParamKind::String, "Original path"))
            .param(ParamSpec::required("second", ParamKind::String, "Changed path"))
            .timeout(GIT_TIMEOUT),
        }
    }
}

impl Default for GitDiffTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GitDiffTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let first = args.require_str("first")?;
        let second = args.require_str("second")?;
        for path in [first, second] {
            if !Path::new(path).exists() {
                return Err(format!("{path} does not exist"));
            }
        }

        let output = run_program(
            "git",
            &["--no-pager", "diff", "--no-index", "--no-color", "--", first, second],
            None,
        )
        .await?;
        // --no-index exits 1 when the inputs differ.
        match output.code {
            Some(0) => Ok(ToolPayload::Text("No differences.".to_string())),
            Some(1) if !output.stdout.trim().is_empty() => {
                Ok(ToolPayload::Text(output.stdout.trim_end().to_string()))
            }
            _ => Err(output.combined()),
        }
    }
}
