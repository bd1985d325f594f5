use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, Utc};

use super::bounded_count;
use crate::tools::process::run_program;
use crate::tools::{ParamKind, ParamSpec, Tool, ToolArgs, ToolDefinition, ToolPayload};
use crate::utils::format::format_size;

pub struct ListProcessesTool {
    definition: ToolDefinition,
}

impl ListProcessesTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "list_processes",
                "List running processes, highest memory use first.",
            )
            .param(ParamSpec::optional("limit", ParamKind::Int, "Maximum rows").with_default("50"))
            .timeout(Duration::from_secs(30)),
        }
    }
}

impl Default for ListProcessesTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `ps -axo pid=,user=,pcpu=,pmem=,comm=` output, sorted by memory then
/// CPU share, descending.
fn parse_ps(output: &str, limit: usize) -> Vec<Vec<String>> {
    let mut rows: Vec<(f64, f64, Vec<String>)> = output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?;
            let user = fields.next()?;
            let cpu = fields.next()?;
            let mem = fields.next()?;
            let command = fields.collect::<Vec<_>>().join(" ");
            if command.is_empty() {
                return None;
            }
            let cpu_value = cpu.parse::<f64>().unwrap_or(0.0);
            let mem_value = mem.parse::<f64>().unwrap_or(0.0);
            Some((
                mem_value,
                cpu_value,
                vec![
                    pid.to_string(),
                    user.to_string(),
                    cpu.to_string(),
                    mem.to_string(),
                    command,
                ],
            ))
        })
        .collect();

    rows.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.total_cmp(&a.1)));
    rows.into_iter().take(limit).map(|(_, _, row)| row).collect()
}

/// Parse `tasklist /fo csv /nh` output.
fn parse_tasklist(output: &str, limit: usize) -> Vec<Vec<String>> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<String> = line
                .trim()
                .trim_matches('"')
                .split("\",\"")
                .map(str::to_string)
                .collect();
            (fields.len() >= 5).then(|| vec![fields[1].clone(), fields[0].clone(), fields[4].clone()])
        })
        .take(limit)
        .collect()
}

#[async_trait]
impl Tool for ListProcessesTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), String> {
        bounded_count(args.int("limit"), "limit", 500).map(|_| ())
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let limit = bounded_count(args.int("limit"), "limit", 500)?;

        if cfg!(target_os = "windows") {
            let output = run_program("tasklist", &["/fo", "csv", "/nh"], None).await?;
            if !output.success() {
                return Err(output.combined());
            }
            return Ok(parse_tasklist(&output.stdout, limit).into_iter().fold(
                ToolPayload::table(["PID", "Name", "Memory"]),
                |table, row| table.with_row(row),
            ));
        }

        let output = run_program("ps", &["-axo", "pid=,user=,pcpu=,pmem=,comm="], None).await?;
        if !output.success() {
            return Err(output.combined());
        }
        Ok(parse_ps(&output.stdout, limit).into_iter().fold(
            ToolPayload::table(["PID", "User", "CPU%", "MEM%", "Command"]),
            |table, row| table.with_row(row),
        ))
    }
}

pub struct SystemInfoTool {
    definition: ToolDefinition,
}

impl SystemInfoTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "system_info",
                "Show operating system, CPU, memory, uptime and load information.",
            ),
        }
    }
}

impl Default for SystemInfoTool {
    fn default() -> Self {
        Self::new()
    }
}

/// `(total, available)` bytes from `/proc/meminfo`.
fn parse_meminfo(text: &str) -> Option<(u64, u64)> {
    let field = |name: &str| {
        text.lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse::<u64>().ok())
            .map(|kib| kib * 1024)
    };
    Some((field("MemTotal:")?, field("MemAvailable:")?))
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

async fn hostname() -> Option<String> {
    for var in ["HOSTNAME", "COMPUTERNAME"] {
        if let Ok(name) = std::env::var(var) {
            if !name.trim().is_empty() {
                return Some(name.trim().to_string());
            }
        }
    }
    tokio::fs::read_to_string("/etc/hostname")
        .await
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

#[async_trait]
impl Tool for SystemInfoTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn run(&self, _args: &ToolArgs) -> Result<ToolPayload, String> {
        let mut rows: Vec<(String, String)> = vec![
            ("OS".into(), std::env::consts::OS.into()),
            ("Family".into(), std::env::consts::FAMILY.into()),
            ("Architecture".into(), std::env::consts::ARCH.into()),
        ];
        if let Some(name) = hostname().await {
            rows.push(("Hostname".into(), name));
        }
        if let Ok(cpus) = std::thread::available_parallelism() {
            rows.push(("CPUs".into(), cpus.get().to_string()));
        }
        if let Some((total, available)) = tokio::fs::read_to_string("/proc/meminfo")
            .await
            .ok()
            .as_deref()
            .and_then(parse_meminfo)
        {
            rows.push(("Memory total".into(), format_size(total)));
            rows.push(("Memory available".into(), format_size(available)));
        }
        if let Some(seconds) = tokio::fs::read_to_string("/proc/uptime")
            .await
            .ok()
            .and_then(|text| text.split_whitespace().next()?.parse::<f64>().ok())
        {
            rows.push(("Uptime".into(), format_uptime(seconds as u64)));
        }
        if let Some(load) = tokio::fs::read_to_string("/proc/loadavg")
            .await
            .ok()
            .map(|text| text.split_whitespace().take(3).collect::<Vec<_>>().join(" "))
        {
            rows.push(("Load average".into(), load));
        }
        if let Ok(dir) = std::env::current_dir() {
            rows.push(("Working directory".into(), dir.display().to_string()));
        }

        Ok(rows.into_iter().fold(
            ToolPayload::table(["Property", "Value"]),
            |table, (key, value)| table.with_row([key, value]),
        ))
    }
}

pub struct CurrentDateTimeTool {
    definition: ToolDefinition,
}

impl CurrentDateTimeTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "current_datetime",
                "Return the current local date, time and time zone offset.",
            ),
        }
    }
}

impl Default for CurrentDateTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CurrentDateTimeTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn run(&self, _args: &ToolArgs) -> Result<ToolPayload, String> {
        let local = Local::now();
        let utc = Utc::now();
        Ok(ToolPayload::table(["Property", "Value"])
            .with_row(["Local".to_string(), local.format("%Y-%m-%d %H:%M:%S %:z").to_string()])
            .with_row(["Weekday".to_string(), local.format("%A").to_string()])
            .with_row(["UTC".to_string(), utc.to_rfc3339()])
            .with_row(["Unix time".to_string(), utc.timestamp().to_string()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ps_rows_sort_by_memory() {
        let output = "  1 root  0.0  0.1 /sbin/init\n 42 ada  12.5  3.2 cargo build\n 7 bob   1.0  3.2 vim\n";
        let rows = parse_ps(output, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["42", "ada", "12.5", "3.2", "cargo build"]);
        assert_eq!(rows[1][0], "7");
    }

    #[test]
    fn tasklist_rows_pick_pid_name_memory() {
        let output = "\"System\",\"4\",\"Services\",\"0\",\"1,234 K\"\n";
        let rows = parse_tasklist(output, 10);
        assert_eq!(rows, vec![vec!["4", "System", "1,234 K"]]);
    }

    #[test]
    fn meminfo_reads_total_and_available() {
        let text = "MemTotal:       16384 kB\nMemFree:  100 kB\nMemAvailable:    8192 kB\n";
        assert_eq!(parse_meminfo(text), Some((16384 * 1024, 8192 * 1024)));
        assert_eq!(parse_meminfo("MemTotal: 1 kB\n"), None);
    }

    #[test]
    fn uptime_uses_largest_units() {
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(3_660), "1h 1m");
        assert_eq!(format_uptime(90_061), "1d 1h 1m");
    }

    #[tokio::test]
    async fn system_info_always_reports_platform() {
        let ToolPayload::Table { rows, .. } = SystemInfoTool::new()
            .run(&ToolArgs::default())
            .await
            .expect("info")
        else {
            panic!("expected table");
        };
        assert_eq!(rows[0], vec!["OS", std::env::consts::OS]);
    }
}
