use regex::{Captures, Regex};
use tracing::error;

use super::{Extractor, Rule};

fn capture(captures: &Captures<'_>, name: &str) -> Option<String> {
    captures
        .name(name)
        .map(|m| {
            m.as_str()
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string()
        })
        .filter(|value| !value.is_empty())
}

fn path_only(captures: &Captures<'_>) -> Vec<(&'static str, String)> {
    capture(captures, "path")
        .map(|path| vec![("path", path)])
        .unwrap_or_default()
}

fn path_and_count(captures: &Captures<'_>) -> Vec<(&'static str, String)> {
    let mut args = path_only(captures);
    if let Some(count) = capture(captures, "count") {
        args.push(("count", count));
    }
    args
}

fn no_args(_captures: &Captures<'_>) -> Vec<(&'static str, String)> {
    Vec::new()
}

fn command(captures: &Captures<'_>) -> Vec<(&'static str, String)> {
    captures
        .name("command")
        .map(|m| vec![("command", m.as_str().trim().to_string())])
        .unwrap_or_default()
}

fn write_file(captures: &Captures<'_>) -> Vec<(&'static str, String)> {
    let content = captures
        .name("dq")
        .or_else(|| captures.name("sq"))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let mut args = path_only(captures);
    args.push(("content", content));
    args
}

fn query_and_path(captures: &Captures<'_>) -> Vec<(&'static str, String)> {
    let mut args: Vec<_> = capture(captures, "query")
        .map(|query| vec![("query", query)])
        .unwrap_or_default();
    args.extend(path_only(captures));
    args
}

fn diff(captures: &Captures<'_>) -> Vec<(&'static str, String)> {
    ["first", "second"]
        .into_iter()
        .filter_map(|name| capture(captures, name).map(|value| (name, value)))
        .collect()
}

fn host(captures: &Captures<'_>) -> Vec<(&'static str, String)> {
    capture(captures, "host")
        .map(|host| vec![("host", host)])
        .unwrap_or_default()
}

fn url(captures: &Captures<'_>) -> Vec<(&'static str, String)> {
    capture(captures, "url")
        .map(|url| vec![("url", url)])
        .unwrap_or_default()
}

fn rule(name: &'static str, tool: &'static str, pattern: &str, extract: Extractor) -> Option<Rule> {
    match Regex::new(&format!("(?i){pattern}")) {
        Ok(pattern) => Some(Rule {
            name,
            tool,
            pattern,
            extract,
        }),
        Err(e) => {
            error!(rule = name, error = %e, "phrase rule failed to compile");
            None
        }
    }
}

pub(super) fn standard_rules() -> Vec<Rule> {
    [
        rule(
            "shell-backticks",
            "shell",
            r"^(?:please\s+)?(?:run|execute)\s+`(?P<command>[^`]+)`$",
            command,
        ),
        rule(
            "shell-command",
            "shell",
            r"^(?:please\s+)?(?:run|execute)\s+(?:the\s+)?(?:shell\s+)?command\s+(?P<command>.+)$",
            command,
        ),
        rule(
            "write-file",
            "write_file",
            r#"^(?:write|save)\s+(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')\s+(?:to|into)\s+(?:the\s+)?(?:file\s+)?(?P<path>\S+)$"#,
            write_file,
        ),
        rule(
            "read-file",
            "read_file",
            r"^(?:read|cat|show|display|print)\s+(?:me\s+)?(?:the\s+)?(?:file|contents\s+of)\s+(?P<path>\S+)$",
            path_only,
        ),
        rule(
            "list-files",
            "list_files",
            r"^(?:list|show)\s+(?:me\s+)?(?:all\s+|the\s+)?files(?:\s+(?:in|under|inside|of)\s+(?P<path>\S+))?$",
            path_only,
        ),
        rule("ls", "list_files", r"^(?:ls|dir)(?:\s+(?P<path>\S+))?$", path_only),
        rule(
            "find-large",
            "find_large",
            r"^(?:find|show|list)\s+(?:me\s+)?(?:the\s+)?(?:(?P<count>\d+)\s+)?(?:largest|biggest|large)\s+files(?:\s+(?:in|under)\s+(?P<path>\S+))?$",
            path_and_count,
        ),
        rule(
            "search-for",
            "search_files",
            r#"^search\s+(?:for\s+)?(?P<query>"[^"]+"|'[^']+'|\S+)(?:\s+(?:in|under)\s+(?P<path>\S+))?$"#,
            query_and_path,
        ),
        rule(
            "find-in",
            "search_files",
            r#"^find\s+(?:files?\s+)?(?:named\s+)?(?P<query>"[^"]+"|'[^']+'|\S+)\s+(?:in|under)\s+(?P<path>\S+)$"#,
            query_and_path,
        ),
        rule(
            "file-stats",
            "file_stats",
            r"^(?:stat|stats|file\s+stats|file\s+info|size\s+of)\s+(?:for\s+|of\s+)?(?P<path>\S+)$",
            path_only,
        ),
        rule(
            "git-status",
            "git_status",
            r"^(?:show\s+|check\s+|what(?:'s|\s+is)\s+the\s+)?git\s+status(?:\s+(?:in|for|of)\s+(?P<path>\S+))?\??$",
            path_only,
        ),
        rule(
            "git-log",
            "git_log",
            r"^(?:show\s+)?(?:me\s+)?(?:the\s+)?(?:last\s+(?P<count>\d+)\s+commits|git\s+log|recent\s+commits|commit\s+history)(?:\s+(?:in|for|of)\s+(?P<path>\S+))?$",
            path_and_count,
        ),
        rule(
            "git-diff",
            "git_diff",
            r"^(?:diff|compare)\s+(?P<first>\S+)\s+(?:and|with|to)\s+(?P<second>\S+)$",
            diff,
        ),
        rule(
            "processes",
            "list_processes",
            r"^(?:ps|(?:show|list)\s+(?:me\s+)?(?:all\s+|the\s+)?(?:running\s+)?processes)$",
            no_args,
        ),
        rule(
            "system-info",
            "system_info",
            r"^(?:show\s+|check\s+|get\s+)?(?:me\s+)?(?:the\s+)?(?:system|sys)\s*(?:info|information|stats|status)$",
            no_args,
        ),
        rule(
            "datetime",
            "current_datetime",
            r"^(?:what(?:'s|\s+is)\s+the\s+(?:current\s+)?(?:time|date)(?:\s+now)?\??|date|time)$",
            no_args,
        ),
        rule("ping", "ping", r"^ping\s+(?P<host>[A-Za-z0-9.:_%-]+)$", host),
        rule(
            "fetch",
            "fetch_url",
            r"^(?:fetch|curl|download|get)\s+(?P<url>https?://\S+)$",
            url,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}
