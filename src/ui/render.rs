//! Scrollback output: tables, tool result panels and finished turns.

use std::time::Duration;

use ratatui::crossterm::style::Stylize;
use unicode_width::UnicodeWidthStr;

use crate::core::session::Output;
use crate::core::streamer::{TurnOutcome, TurnReport};
use crate::tools::{ToolPayload, ToolResult};
use crate::utils::format::truncate_chars;

/// Longest cell shown before truncation.
const MAX_CELL_CHARS: usize = 80;

fn pad(cell: &str, width: usize) -> String {
    let fill = width.saturating_sub(UnicodeWidthStr::width(cell));
    format!("{cell}{}", " ".repeat(fill))
}

fn clip(cell: &str) -> String {
    let single_line = cell.replace('\n', " ");
    if single_line.chars().count() <= MAX_CELL_CHARS {
        return single_line;
    }
    let mut clipped: String = single_line.chars().take(MAX_CELL_CHARS - 1).collect();
    clipped.push('…');
    clipped
}

/// Column-aligned text table with a rule under the header.
pub fn format_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let headers: Vec<String> = headers.iter().map(|h| clip(h)).collect();
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|cell| clip(cell)).collect())
        .collect();

    let columns = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);
    let mut widths = vec![0; columns];
    for row in std::iter::once(&headers).chain(rows.iter()) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(UnicodeWidthStr::width(cell.as_str()));
        }
    }

    let render_row = |row: &[String]| {
        let cells: Vec<String> = (0..columns)
            .map(|i| pad(row.get(i).map(String::as_str).unwrap_or(""), widths[i]))
            .collect();
        cells.join("  ").trim_end().to_string()
    };

    let mut lines = vec![render_row(&headers)];
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    lines.push(rule.join("  "));
    if rows.is_empty() {
        lines.push("(no rows)".to_string());
    }
    lines.extend(rows.iter().map(|row| render_row(row)));
    lines.join("\n")
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Header line plus body for a tool result.
pub fn tool_panel(call: &str, result: &ToolResult) -> (String, String) {
    let status = if result.is_ok() { "ok" } else { "failed" };
    let header = format!("▶ {call} · {status} · {}", format_elapsed(result.elapsed));
    let body = match &result.payload {
        ToolPayload::Text(text) => truncate_chars(text.trim_end(), 20_000),
        ToolPayload::Table { headers, rows } => format_table(headers, rows),
    };
    (header, body)
}

pub fn print_output(output: &Output) {
    match output {
        Output::Info(message) => println!("{}", message.as_str().dark_grey()),
        Output::Warning(message) => println!("{}", message.as_str().yellow()),
        Output::Error(message) => println!("{}", message.as_str().red()),
        Output::Table {
            title,
            headers,
            rows,
        } => {
            println!("{}", title.as_str().bold());
            println!("{}", format_table(headers, rows));
        }
        Output::ToolResult { call, result } => {
            let (header, body) = tool_panel(call, result);
            if result.is_ok() {
                println!("{}", header.as_str().cyan());
                println!("{body}");
            } else {
                println!("{}", header.as_str().red());
                println!("{}", body.as_str().red());
            }
        }
    }
}

/// Final text of a turn, printed once the live view has been cleared.
pub fn print_turn(report: &TurnReport) {
    let text = report.text.trim_end();
    if !text.is_empty() {
        println!("{text}");
    }
    match &report.outcome {
        TurnOutcome::Complete => {}
        TurnOutcome::Cancelled => println!("{}", "[cancelled]".yellow()),
        TurnOutcome::Failed(err) => println!("{}", err.to_string().red()),
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolStatus;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn table_columns_align_by_display_width() {
        let headers = strings(&["Name", "Size"]);
        let rows = vec![strings(&["日本", "1 B"]), strings(&["readme.md", "12.0 KB"])];
        let table = format_table(&headers, &rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Name       Size");
        assert_eq!(lines[1], "─────────  ───────");
        assert_eq!(lines[2], "日本       1 B");
        assert_eq!(lines[3], "readme.md  12.0 KB");
    }

    #[test]
    fn empty_tables_say_so_and_ragged_rows_are_padded() {
        let table = format_table(&strings(&["A"]), &[]);
        assert!(table.ends_with("(no rows)"));

        let table = format_table(&strings(&["A"]), &[strings(&["x", "extra"])]);
        assert_eq!(table.lines().last(), Some("x  extra"));
    }

    #[test]
    fn long_cells_are_clipped_to_one_line() {
        let long = "a".repeat(200);
        let table = format_table(&strings(&["Value"]), &[vec![format!("{long}\nnext")]]);
        let last = table.lines().last().expect("row");
        assert_eq!(last.chars().count(), MAX_CELL_CHARS);
        assert!(last.ends_with('…'));
    }

    #[test]
    fn tool_panel_shows_status_and_elapsed_time() {
        let result = ToolResult {
            tool: "ping".into(),
            status: ToolStatus::Error,
            payload: ToolPayload::Text("unreachable\n".into()),
            elapsed: Duration::from_millis(1500),
        };
        let (header, body) = tool_panel("ping(host=\"x\")", &result);
        assert_eq!(header, "▶ ping(host=\"x\") · failed · 1.5s");
        assert_eq!(body, "unreachable");

        let ok = ToolResult {
            elapsed: Duration::from_millis(42),
            status: ToolStatus::Ok,
            ..result
        };
        assert!(tool_panel("ping()", &ok).0.ends_with("ok · 42ms"));
    }
}
