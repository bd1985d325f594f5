use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout, then stderr under a marker, then the exit code when non-zero.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        let stderr = self.stderr.trim_end();
        if !stderr.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("--- STDERR ---\n");
            out.push_str(stderr);
        }
        if !self.success() {
            if !out.is_empty() {
                out.push('\n');
            }
            match self.code {
                Some(code) => out.push_str(&format!("[Exit Code: {code}]")),
                None => out.push_str("[Terminated by signal]"),
            }
        }
        out
    }
}

/// Run `program` with `args`, capturing both streams. The child is killed if
/// the returned future is dropped, so an enclosing timeout cleans it up.
pub async fn run_program(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<ProcessOutput, String> {
    let mut command = Command::new(program);
    command.args(args);
    spawn_and_wait(command, program, cwd).await
}

/// Run `line` through the platform shell.
pub async fn run_shell(line: &str, cwd: Option<&Path>) -> Result<ProcessOutput, String> {
    let command = if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", line]);
        command
    } else {
        let mut command = Command::new("sh");
        command.args(["-c", line]);
        command
    };
    spawn_and_wait(command, "shell", cwd).await
}

async fn spawn_and_wait(
    mut command: Command,
    label: &str,
    cwd: Option<&Path>,
) -> Result<ProcessOutput, String> {
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = command
        .output()
        .await
        .map_err(|e| format!("failed to run {label}: {e}"))?;

    Ok(ProcessOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
