use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::tools::process::run_shell;
use crate::tools::{ParamKind, ParamSpec, Tool, ToolArgs, ToolDefinition, ToolPayload};

const SHELL_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ShellTool {
    definition: ToolDefinition,
}

impl ShellTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "shell",
                "Run a shell command on the local machine and return its stdout and stderr.",
            )
            .param(
                ParamSpec::required("command", ParamKind::String, "The full command line to run")
                    .rest(),
            )
            .executing()
            .timeout(SHELL_TIMEOUT),
        }
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let command = args.require_str("command")?;
        let output = run_shell(command, None).await?;
        let combined = output.combined();
        if output.success() {
            if combined.is_empty() {
                Ok(ToolPayload::Text(
                    "Command completed with no output.".to_string(),
                ))
            } else {
                Ok(ToolPayload::Text(combined))
            }
        } else {
            Err(combined)
        }
    }
}

pub struct WriteFileTool {
    definition: ToolDefinition,
}

impl WriteFileTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "write_file",
                "Create or overwrite a text file with the given content.",
            )
            .param(ParamSpec::required("path", ParamKind::String, "File to write"))
            .param(ParamSpec::required("content", ParamKind::String, "Text to write").rest())
            .executing(),
        }
    }
}

impl Default for WriteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let path = Path::new(args.require_str("path")?);
        let content = args.require_str("content")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
            }
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| format!("cannot write {}: {e}", path.display()))?;

        Ok(ToolPayload::Text(format!(
            "Wrote {} bytes to {}",
            content.len(),
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ArgValue;
    use tempfile::TempDir;

    fn args(pairs: &[(&str, &str)]) -> ToolArgs {
        let mut args = ToolArgs::default();
        for (k, v) in pairs {
            args.insert(k, ArgValue::from(*v));
        }
        args
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_reports_failures_with_exit_code() {
        let tool = ShellTool::new();
        let ok = tool
            .run(&args(&[("command", "printf 'a b'")]))
            .await
            .expect("success");
        assert_eq!(ok, ToolPayload::Text("a b".into()));

        let quiet = tool.run(&args(&[("command", "true")])).await.expect("ok");
        assert_eq!(
            quiet,
            ToolPayload::Text("Command completed with no output.".into())
        );

        let err = tool
            .run(&args(&[("command", "echo nope >&2; exit 4")]))
            .await
            .expect_err("failure");
        assert_eq!(err, "--- STDERR ---\nnope\n[Exit Code: 4]");
    }

    #[tokio::test]
    async fn write_file_creates_parents() {
        let temp = TempDir::new().expect("temp dir");
        let target = temp.path().join("notes").join("todo.txt");
        let target_text = target.display().to_string();

        let payload = WriteFileTool::new()
            .run(&args(&[("path", &target_text), ("content", "buy milk")]))
            .await
            .expect("write");
        assert_eq!(
            payload,
            ToolPayload::Text(format!("Wrote 8 bytes to {target_text}"))
        );
        assert_eq!(
            std::fs::read_to_string(&target).expect("read back"),
            "buy milk"
        );
    }
}
