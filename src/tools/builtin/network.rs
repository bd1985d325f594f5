use std::time::Duration;

use async_trait::async_trait;

use super::bounded_count;
use crate::tools::process::run_program;
use crate::tools::{ParamKind, ParamSpec, Tool, ToolArgs, ToolDefinition, ToolPayload};
use crate::utils::format::truncate_chars;
use crate::utils::url::is_http_url;

const PING_TIMEOUT: Duration = Duration::from_secs(15);
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const FETCH_DISPLAY_CHARS: usize = 20_000;

pub struct PingTool {
    definition: ToolDefinition,
}

impl PingTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "ping",
                "Send ICMP echo requests to a host and report latency and packet loss.",
            )
            .param(ParamSpec::required("host", ParamKind::String, "Host name or IP address"))
            .param(ParamSpec::optional("count", ParamKind::Int, "Number of probes").with_default("4"))
            .network(PING_TIMEOUT),
        }
    }
}

impl Default for PingTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Host names and IPv4/IPv6 literals only; never something `ping` would
/// read as an option.
fn validate_host(host: &str) -> Result<(), String> {
    if host.starts_with('-') {
        return Err(format!("'{host}' is not a valid host"));
    }
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '_' | '%'))
    {
        return Err(format!("'{host}' contains characters not allowed in a host name"));
    }
    Ok(())
}

#[async_trait]
impl Tool for PingTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), String> {
        validate_host(args.require_str("host")?)?;
        bounded_count(args.int("count"), "count", 10).map(|_| ())
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let host = args.require_str("host")?;
        let count = bounded_count(args.int("count"), "count", 10)?.to_string();
        let count_flag = if cfg!(target_os = "windows") { "-n" } else { "-c" };

        let output = run_program("ping", &[count_flag, count.as_str(), host], None).await?;
        if output.success() {
            Ok(ToolPayload::Text(output.stdout.trim_end().to_string()))
        } else {
            Err(output.combined())
        }
    }
}

pub struct FetchUrlTool {
    definition: ToolDefinition,
    client: reqwest::Client,
}

impl FetchUrlTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            definition: ToolDefinition::new(
                "fetch_url",
                "Fetch a web page or API endpoint over HTTP(S) and return the status, content type and body.",
            )
            .param(ParamSpec::required("url", ParamKind::String, "http:// or https:// URL"))
            .network(FETCH_TIMEOUT),
            client,
        }
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), String> {
        let url = args.require_str("url")?;
        if is_http_url(url) {
            Ok(())
        } else {
            Err(format!("'{url}' must start with http:// or https://"))
        }
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        let url = args.require_str("url")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request to {url} failed: {e}"))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| format!("reading body from {url} failed: {e}"))?;
        let body = truncate_chars(body.trim(), FETCH_DISPLAY_CHARS);

        let report = format!("HTTP {status}\ncontent-type: {content_type}\n\n{body}");
        if status.is_success() {
            Ok(ToolPayload::Text(report))
        } else {
            Err(report)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ArgValue;

    fn args(pairs: &[(&str, &str)]) -> ToolArgs {
        let mut args = ToolArgs::default();
        for (k, v) in pairs {
            args.insert(k, ArgValue::from(*v));
        }
        args
    }

    #[test]
    fn ping_host_validation() {
        let tool = PingTool::new();
        let with_count = |host: &str| {
            let mut call = args(&[("host", host)]);
            call.insert("count", ArgValue::Int(4));
            call
        };
        assert!(tool.validate(&with_count("8.8.8.8")).is_ok());
        assert!(tool.validate(&with_count("example.com")).is_ok());
        assert!(tool.validate(&with_count("fe80::1%eth0")).is_ok());
        assert!(tool.validate(&with_count("-f")).is_err());
        assert!(tool.validate(&with_count("host; rm -rf /")).is_err());
    }

    #[test]
    fn fetch_rejects_non_http_urls() {
        let tool = FetchUrlTool::new(reqwest::Client::new());
        assert!(tool.validate(&args(&[("url", "https://example.com")])).is_ok());
        assert_eq!(
            tool.validate(&args(&[("url", "file:///etc/passwd")])),
            Err("'file:///etc/passwd' must start with http:// or https://".to_string())
        );
    }
}
