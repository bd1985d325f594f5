use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::warn;

use super::bounded_count;
use crate::tools::{ParamKind, ParamSpec, Tool, ToolArgs, ToolDefinition, ToolPayload};
use crate::utils::format::{format_size, truncate_chars};

const READ_LIMIT_BYTES: u64 = 1024 * 1024;
const READ_DISPLAY_CHARS: usize = 20_000;

/// Recursive searches give up after this long or this many entries.
const WALK_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_WALK_ENTRIES: usize = 200_000;

pub struct ReadFileTool {
    definition: ToolDefinition,
}

impl ReadFileTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new("read_file", "Read a text file and return its content.")
                .param(ParamSpec::required("path", ParamKind::String, "File to read")),
        }
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let path = Path::new(args.require_str("path")?);
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        if metadata.is_dir() {
            return Err(format!(
                "{} is a directory; use list_files instead",
                path.display()
            ));
        }
        if metadata.len() > READ_LIMIT_BYTES {
            return Err(format!(
                "{} is {}; files over {} are not read",
                path.display(),
                format_size(metadata.len()),
                format_size(READ_LIMIT_BYTES)
            ));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        if text.is_empty() {
            return Ok(ToolPayload::Text(format!("{} is empty.", path.display())));
        }
        Ok(ToolPayload::Text(truncate_chars(&text, READ_DISPLAY_CHARS)))
    }
}

pub struct ListFilesTool {
    definition: ToolDefinition,
}

impl ListFilesTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "list_files",
                "List the entries of a directory with their type and size.",
            )
            .param(ParamSpec::optional("path", ParamKind::String, "Directory to list").with_default(".")),
        }
    }
}

impl Default for ListFilesTool {
    fn default() -> Self {
        Self::new()
    }
}

struct Entry {
    name: String,
    kind: &'static str,
    size: Option<u64>,
}

#[async_trait]
impl Tool for ListFilesTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let dir = Path::new(args.require_str("path")?);
        let mut reader = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| format!("cannot list {}: {e}", dir.display()))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| format!("cannot list {}: {e}", dir.display()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            let (kind, size) = if file_type.is_dir() {
                ("dir", None)
            } else if file_type.is_symlink() {
                ("link", None)
            } else {
                ("file", entry.metadata().await.ok().map(|m| m.len()))
            };
            entries.push(Entry { name, kind, size });
        }

        entries.sort_by(|a, b| {
            (a.kind != "dir")
                .cmp(&(b.kind != "dir"))
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        if entries.is_empty() {
            return Ok(ToolPayload::Text(format!("{} is empty.", dir.display())));
        }

        Ok(entries.into_iter().fold(
            ToolPayload::table(["Name", "Type", "Size"]),
            |table, entry| {
                let size = entry.size.map(format_size).unwrap_or_else(|| "-".into());
                let name = if entry.kind == "dir" {
                    format!("{}/", entry.name)
                } else {
                    entry.name
                };
                table.with_row([name, entry.kind.to_string(), size])
            },
        ))
    }
}

pub struct FileStatsTool {
    definition: ToolDefinition,
}

impl FileStatsTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "file_stats",
                "Show size, type, timestamps and permissions of a file or directory.",
            )
            .param(ParamSpec::required("path", ParamKind::String, "File or directory")),
        }
    }
}

impl Default for FileStatsTool {
    fn default() -> Self {
        Self::new()
    }
}

fn format_time(time: std::io::Result<SystemTime>) -> String {
    match time {
        Ok(time) => DateTime::<Local>::from(time)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => "unavailable".to_string(),
    }
}

#[async_trait]
impl Tool for FileStatsTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let path = Path::new(args.require_str("path")?);
        let metadata = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|e| format!("cannot stat {}: {e}", path.display()))?;

        let kind = if metadata.is_dir() {
            "directory"
        } else if metadata.file_type().is_symlink() {
            "symlink"
        } else {
            "file"
        };
        let absolute = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());

        let mut table = ToolPayload::table(["Property", "Value"])
            .with_row(["Path".to_string(), absolute.display().to_string()])
            .with_row(["Type".to_string(), kind.to_string()])
            .with_row([
                "Size".to_string(),
                format!("{} ({} bytes)", format_size(metadata.len()), metadata.len()),
            ])
            .with_row(["Modified".to_string(), format_time(metadata.modified())])
            .with_row(["Accessed".to_string(), format_time(metadata.accessed())])
            .with_row([
                "Read-only".to_string(),
                metadata.permissions().readonly().to_string(),
            ]);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            table = table.with_row([
                "Mode".to_string(),
                format!("{:o}", metadata.permissions().mode() & 0o7777),
            ]);
        }

        Ok(table)
    }
}

pub struct FindLargeTool {
    definition: ToolDefinition,
}

impl FindLargeTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "find_large",
                "Find the largest files under a directory, searching recursively.",
            )
            .param(ParamSpec::optional("path", ParamKind::String, "Directory to search").with_default("."))
            .param(ParamSpec::optional("count", ParamKind::Int, "How many files to report").with_default("10"))
            .timeout(WALK_TIMEOUT),
        }
    }
}

impl Default for FindLargeTool {
    fn default() -> Self {
        Self::new()
    }
}

fn require_dir(root: &Path) -> Result<(), String> {
    let meta =
        std::fs::metadata(root).map_err(|e| format!("cannot search {}: {e}", root.display()))?;
    if !meta.is_dir() {
        return Err(format!("{} is not a directory", root.display()));
    }
    Ok(())
}

/// Visit regular files under `root` depth-first until `visit` returns false.
/// Symlinks are not followed, unreadable directories are skipped and the
/// walk stops after `MAX_WALK_ENTRIES` entries.
fn walk_files(root: &Path, mut visit: impl FnMut(&Path, u64) -> bool) {
    let mut seen = 0usize;
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(reader) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in reader.flatten() {
            seen += 1;
            if seen > MAX_WALK_ENTRIES {
                warn!(root = %root.display(), limit = MAX_WALK_ENTRIES, "directory walk truncated");
                return;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                let len = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
                if !visit(&entry.path(), len) {
                    return;
                }
            }
        }
    }
}

/// Largest regular files under `root`, biggest first.
fn largest_files(root: &Path, count: usize) -> Result<Vec<(u64, PathBuf)>, String> {
    require_dir(root)?;
    let mut found = Vec::new();
    walk_files(root, |path, len| {
        found.push((len, path.to_path_buf()));
        true
    });
    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    found.truncate(count);
    Ok(found)
}

#[async_trait]
impl Tool for FindLargeTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), String> {
        bounded_count(args.int("count"), "count", 1000).map(|_| ())
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let root = PathBuf::from(args.require_str("path")?);
        let count = bounded_count(args.int("count"), "count", 1000)?;

        let search_root = root.clone();
        let found = tokio::task::spawn_blocking(move || largest_files(&search_root, count))
            .await
            .map_err(|e| format!("search aborted: {e}"))??;

        if found.is_empty() {
            return Ok(ToolPayload::Text(format!(
                "No files found under {}.",
                root.display()
            )));
        }

        Ok(found
            .into_iter()
            .fold(ToolPayload::table(["Size", "Path"]), |table, (size, path)| {
                table.with_row([format_size(size), path.display().to_string()])
            }))
    }
}

pub struct SearchFilesTool {
    definition: ToolDefinition,
}

impl SearchFilesTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "search_files",
                "Search a directory tree for files whose name or text content contains a string.",
            )
            .param(ParamSpec::required("query", ParamKind::String, "Text to look for"))
            .param(ParamSpec::optional("path", ParamKind::String, "Directory to search").with_default("."))
            .timeout(WALK_TIMEOUT),
        }
    }
}

impl Default for SearchFilesTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Matches of each kind stop at this many.
const SEARCH_MATCH_LIMIT: usize = 50;
/// Files larger than this are not searched for content.
const SEARCH_CONTENT_BYTES: u64 = 1024 * 1024;
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "rs", "toml", "py", "js", "ts", "html", "css", "json", "xml", "yml", "yaml",
    "sh", "c", "h", "go", "java",
];

#[derive(Debug, Default)]
struct SearchMatches {
    by_name: Vec<String>,
    by_content: Vec<String>,
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn search_files(root: &Path, query: &str) -> Result<SearchMatches, String> {
    require_dir(root)?;
    let mut matches = SearchMatches::default();
    walk_files(root, |path, len| {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let name_hit = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().contains(query));
        // One extra match of each kind marks the list as cut short.
        if name_hit && matches.by_name.len() <= SEARCH_MATCH_LIMIT {
            matches.by_name.push(relative.display().to_string());
        }
        if matches.by_content.len() <= SEARCH_MATCH_LIMIT
            && len <= SEARCH_CONTENT_BYTES
            && is_text_file(path)
        {
            if let Ok(bytes) = std::fs::read(path) {
                if String::from_utf8_lossy(&bytes).contains(query) {
                    matches.by_content.push(relative.display().to_string());
                }
            }
        }
        matches.by_name.len() <= SEARCH_MATCH_LIMIT || matches.by_content.len() <= SEARCH_MATCH_LIMIT
    });
    matches.by_name.sort();
    matches.by_content.sort();
    Ok(matches)
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), String> {
        if args.require_str("query")?.is_empty() {
            return Err("query must not be empty".to_string());
        }
        Ok(())
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let query = args.require_str("query")?.to_string();
        let root = PathBuf::from(args.require_str("path")?);

        let (search_root, needle) = (root.clone(), query.clone());
        let found = tokio::task::spawn_blocking(move || search_files(&search_root, &needle))
            .await
            .map_err(|e| format!("search aborted: {e}"))??;

        if found.by_name.is_empty() && found.by_content.is_empty() {
            return Ok(ToolPayload::Text(format!(
                "No files under {} match '{query}'.",
                root.display()
            )));
        }

        let mut table = ToolPayload::table(["Match", "Path"]);
        for (kind, paths) in [("name", &found.by_name), ("content", &found.by_content)] {
            for path in paths.iter().take(SEARCH_MATCH_LIMIT) {
                table = table.with_row([kind.to_string(), path.clone()]);
            }
            if paths.len() > SEARCH_MATCH_LIMIT {
                table = table.with_row([
                    kind.to_string(),
                    format!("(stopped after {SEARCH_MATCH_LIMIT} matches)"),
                ]);
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ArgValue;
    use std::fs;
    use tempfile::TempDir;

    fn args(pairs: &[(&str, ArgValue)]) -> ToolArgs {
        let mut args = ToolArgs::default();
        for (k, v) in pairs {
            args.insert(k, v.clone());
        }
        args
    }

    fn fixture() -> TempDir {
        let temp = TempDir::new().expect("temp dir");
        fs::create_dir(temp.path().join("src")).expect("mkdir");
        fs::write(temp.path().join("src").join("big.bin"), vec![0u8; 4096]).expect("write");
        fs::write(temp.path().join("README.md"), "hello").expect("write");
        fs::write(temp.path().join("a.txt"), "12345678901").expect("write");
        temp
    }

    #[tokio::test]
    async fn list_files_puts_directories_first() {
        let temp = fixture();
        let path = temp.path().display().to_string();
        let payload = ListFilesTool::new()
            .run(&args(&[("path", ArgValue::String(path))]))
            .await
            .expect("list");

        let ToolPayload::Table { headers, rows } = payload else {
            panic!("expected table");
        };
        assert_eq!(headers, vec!["Name", "Type", "Size"]);
        let names: Vec<_> = rows.iter().map(|row| row[0].as_str()).collect();
        assert_eq!(names, vec!["src/", "a.txt", "README.md"]);
        assert_eq!(rows[1][2], "11 B");
    }

    #[tokio::test]
    async fn list_files_on_a_file_fails() {
        let temp = fixture();
        let path = temp.path().join("a.txt").display().to_string();
        let err = ListFilesTool::new()
            .run(&args(&[("path", ArgValue::String(path))]))
            .await
            .expect_err("not a dir");
        assert!(err.starts_with("cannot list"));
    }

    #[tokio::test]
    async fn read_file_refuses_directories() {
        let temp = fixture();
        let tool = ReadFileTool::new();
        let readme = temp.path().join("README.md").display().to_string();
        assert_eq!(
            tool.run(&args(&[("path", ArgValue::String(readme))]))
                .await
                .expect("read"),
            ToolPayload::Text("hello".into())
        );

        let dir = temp.path().display().to_string();
        let err = tool
            .run(&args(&[("path", ArgValue::String(dir))]))
            .await
            .expect_err("directory");
        assert!(err.contains("is a directory"));
    }

    #[tokio::test]
    async fn find_large_orders_by_size() {
        let temp = fixture();
        let path = temp.path().display().to_string();
        let tool = FindLargeTool::new();
        let call = args(&[("path", ArgValue::String(path)), ("count", ArgValue::Int(2))]);
        assert!(tool.validate(&call).is_ok());

        let ToolPayload::Table { rows, .. } = tool.run(&call).await.expect("search") else {
            panic!("expected table");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "4.0 KB");
        assert!(rows[0][1].ends_with("big.bin"));
        assert!(rows[1][1].ends_with("a.txt"));
    }

    #[test]
    fn find_large_validates_count() {
        let tool = FindLargeTool::new();
        let err = tool
            .validate(&args(&[("count", ArgValue::Int(0))]))
            .expect_err("zero");
        assert_eq!(err, "count must be between 1 and 1000, got 0");
    }

    #[tokio::test]
    async fn search_files_matches_names_and_content() {
        let temp = fixture();
        fs::write(temp.path().join("src").join("notes.md"), "call the README helper").expect("write");
        let path = temp.path().display().to_string();
        let tool = SearchFilesTool::new();
        let call = args(&[
            ("query", ArgValue::from("README")),
            ("path", ArgValue::String(path.clone())),
        ]);
        assert!(tool.validate(&call).is_ok());

        let ToolPayload::Table { headers, rows } = tool.run(&call).await.expect("search") else {
            panic!("expected table");
        };
        assert_eq!(headers, vec!["Match", "Path"]);
        assert_eq!(rows[0], vec!["name", "README.md"]);
        let content: Vec<_> = rows.iter().filter(|row| row[0] == "content").collect();
        assert_eq!(content.len(), 1);
        assert!(content[0][1].ends_with("notes.md"));

        let miss = args(&[
            ("query", ArgValue::from("zebra")),
            ("path", ArgValue::String(path)),
        ]);
        assert_eq!(
            tool.run(&miss).await.expect("search"),
            ToolPayload::Text(format!("No files under {} match 'zebra'.", temp.path().display()))
        );
    }

    #[tokio::test]
    async fn search_files_caps_matches() {
        let temp = TempDir::new().expect("temp dir");
        for i in 0..(SEARCH_MATCH_LIMIT + 5) {
            fs::write(temp.path().join(format!("log-{i}.bin")), "x").expect("write");
        }
        let call = args(&[
            ("query", ArgValue::from("log")),
            ("path", ArgValue::String(temp.path().display().to_string())),
        ]);
        let ToolPayload::Table { rows, .. } = SearchFilesTool::new().run(&call).await.expect("search") else {
            panic!("expected table");
        };
        assert_eq!(rows.len(), SEARCH_MATCH_LIMIT + 1);
        assert_eq!(rows[SEARCH_MATCH_LIMIT][1], "(stopped after 50 matches)");
    }

    #[test]
    fn search_files_needs_a_directory_and_a_query() {
        let temp = fixture();
        assert!(search_files(&temp.path().join("a.txt"), "x")
            .expect_err("file root")
            .ends_with("is not a directory"));
        let err = SearchFilesTool::new()
            .validate(&args(&[("query", ArgValue::from(""))]))
            .expect_err("empty");
        assert_eq!(err, "query must not be empty");
    }

    #[test]
    fn recursive_tools_run_under_a_timeout() {
        assert_eq!(FindLargeTool::new().definition().timeout, Some(WALK_TIMEOUT));
        assert_eq!(SearchFilesTool::new().definition().timeout, Some(WALK_TIMEOUT));
    }

    #[tokio::test]
    async fn file_stats_reports_size() {
        let temp = fixture();
        let path = temp.path().join("a.txt").display().to_string();
        let ToolPayload::Table { rows, .. } = FileStatsTool::new()
            .run(&args(&[("path", ArgValue::String(path))]))
            .await
            .expect("stat")
        else {
            panic!("expected table");
        };
        let size = rows.iter().find(|row| row[0] == "Size").expect("size row");
        assert_eq!(size[1], "11 B (11 bytes)");
        let kind = rows.iter().find(|row| row[0] == "Type").expect("type row");
        assert_eq!(kind[1], "file");
    }
}
