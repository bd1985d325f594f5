use super::*;
use crate::tools::{InvocationOrigin, ParamKind, ParamSpec, Tool};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

struct CountingTool {
    definition: ToolDefinition,
    runs: Arc<AtomicUsize>,
    behaviour: Behaviour,
}

enum Behaviour {
    Echo,
    Fail(&'static str),
    Sleep(Duration),
}

#[async_trait]
impl Tool for CountingTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn run(&self, args: &ToolArgs) -> Result<ToolPayload, String> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Echo => Ok(ToolPayload::Text(
                args.iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" "),
            )),
            Behaviour::Fail(message) => Err(message.to_string()),
            Behaviour::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(ToolPayload::Text("late".into()))
            }
        }
    }
}

fn executor_with(definition: ToolDefinition, behaviour: Behaviour) -> (ToolExecutor, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let registry = ToolRegistry::builder()
        .register(Arc::new(CountingTool {
            definition,
            runs: Arc::clone(&runs),
            behaviour,
        }))
        .build();
    (ToolExecutor::new(Arc::new(registry)), runs)
}

fn log_definition() -> ToolDefinition {
    ToolDefinition::new("log", "Show commits")
        .param(ParamSpec::required("path", ParamKind::String, "Repository"))
        .param(ParamSpec::optional("count", ParamKind::Int, "Commits").with_default("15"))
        .param(ParamSpec::optional("verbose", ParamKind::Bool, "Verbose"))
}

fn invocation(tool: &str) -> ToolInvocation {
    ToolInvocation::new(tool, InvocationOrigin::ExplicitCommand)
}

#[tokio::test]
async fn unknown_tool_is_not_found() {
    let (executor, runs) = executor_with(log_definition(), Behaviour::Echo);
    let err = executor
        .execute(&invocation("nope"), true)
        .await
        .expect_err("unknown tool");
    assert_eq!(err, AgentError::tool_not_found("nope"));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_required_parameter_never_runs_the_body() {
    let (executor, runs) = executor_with(log_definition(), Behaviour::Echo);

    let err = executor
        .execute(&invocation("log").with_arg("count", "3"), true)
        .await
        .expect_err("missing path");
    assert!(matches!(err, AgentError::InvalidArguments(ref msg) if msg.contains("'path'")));

    let blank = executor
        .execute(&invocation("log").with_arg("path", "   "), true)
        .await
        .expect_err("blank path");
    assert!(matches!(blank, AgentError::InvalidArguments(_)));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn defaults_fill_only_declared_gaps() {
    let (executor, runs) = executor_with(log_definition(), Behaviour::Echo);
    let result = executor
        .execute(&invocation("log").with_arg("path", "src"), false)
        .await
        .expect("runs");
    assert_eq!(result.status, ToolStatus::Ok);
    assert_eq!(result.payload, ToolPayload::Text("count=15 path=src".into()));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn type_mismatch_and_unknown_arguments_are_invalid() {
    let (executor, runs) = executor_with(log_definition(), Behaviour::Echo);

    let bad_type = executor
        .execute(
            &invocation("log").with_arg("path", ".").with_arg("count", "lots"),
            true,
        )
        .await
        .expect_err("bad count");
    assert!(matches!(bad_type, AgentError::InvalidArguments(ref msg) if msg.contains("count")));

    let unknown = executor
        .execute(
            &invocation("log").with_arg("path", ".").with_arg("colour", "red"),
            true,
        )
        .await
        .expect_err("unknown arg");
    assert!(
        matches!(unknown, AgentError::InvalidArguments(ref msg) if msg.contains("'colour'"))
    );
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn executing_tools_need_permission() {
    let definition = ToolDefinition::new("danger", "Does things")
        .param(ParamSpec::required("command", ParamKind::String, "What").rest())
        .executing();
    let (executor, runs) = executor_with(definition, Behaviour::Echo);
    let call = invocation("danger").with_arg("command", "rm -rf /tmp/x");

    let err = executor.execute(&call, false).await.expect_err("denied");
    assert_eq!(
        err,
        AgentError::PermissionDenied {
            tool: "danger".into()
        }
    );
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    let allowed = executor.execute(&call, true).await.expect("allowed");
    assert!(allowed.is_ok());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn argument_errors_take_precedence_over_permission() {
    let definition = ToolDefinition::new("danger", "Does things")
        .param(ParamSpec::required("command", ParamKind::String, "What"))
        .executing();
    let (executor, _runs) = executor_with(definition, Behaviour::Echo);
    let err = executor
        .execute(&invocation("danger"), false)
        .await
        .expect_err("invalid");
    assert!(matches!(err, AgentError::InvalidArguments(_)));
}

#[tokio::test]
async fn failing_body_becomes_an_error_result() {
    let (executor, runs) = executor_with(
        ToolDefinition::new("broken", "Always fails"),
        Behaviour::Fail("exit status 2: no such file"),
    );
    let result = executor
        .execute(&invocation("broken"), false)
        .await
        .expect("failure is a result");
    assert_eq!(result.status, ToolStatus::Error);
    assert_eq!(
        result.payload,
        ToolPayload::Text("exit status 2: no such file".into())
    );
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn body_failures_are_labelled_for_the_model() {
    let failed = ToolResult {
        tool: "ping".into(),
        status: ToolStatus::Error,
        payload: ToolPayload::Text("host unreachable\n".into()),
        elapsed: Duration::from_millis(5),
    };
    let labelled = label_body_failure(failed);
    assert_eq!(
        labelled.payload,
        ToolPayload::Text("Error (tool_execution_error): 'ping' failed: host unreachable".into())
    );
    assert_eq!(labelled.elapsed, Duration::from_millis(5));

    let ok = ToolResult {
        status: ToolStatus::Ok,
        payload: ToolPayload::Text("pong".into()),
        ..labelled
    };
    assert_eq!(label_body_failure(ok.clone()).payload, ToolPayload::Text("pong".into()));
}

#[tokio::test]
async fn network_bound_tools_time_out() {
    let definition =
        ToolDefinition::new("slow", "Never answers").network(Duration::from_millis(20));
    let (executor, runs) = executor_with(definition, Behaviour::Sleep(Duration::from_secs(5)));

    let started = Instant::now();
    let err = executor
        .execute(&invocation("slow"), false)
        .await
        .expect_err("timeout");
    assert_eq!(
        err,
        AgentError::Timeout {
            tool: "slow".into(),
            after: Duration::from_millis(20)
        }
    );
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn every_builtin_rejects_missing_required_parameters() {
    let registry = Arc::new(ToolRegistry::builtin(reqwest::Client::new()));
    let executor = ToolExecutor::new(Arc::clone(&registry));

    let mut checked = 0;
    for definition in registry.list() {
        if !definition.params.iter().any(|param| param.required) {
            continue;
        }
        let err = executor
            .execute(&ToolInvocation::new(definition.name, InvocationOrigin::ModelFunctionCall), true)
            .await
            .expect_err("missing required parameters");
        assert!(
            matches!(err, AgentError::InvalidArguments(_)),
            "{} returned {err:?}",
            definition.name
        );
        checked += 1;
    }
    assert!(checked >= 6);
}

#[tokio::test]
async fn every_builtin_executing_tool_is_denied_without_side_effects() {
    let temp = TempDir::new().expect("temp dir");
    let marker = temp.path().join("marker");
    let marker_text = marker.display().to_string();
    let registry = Arc::new(ToolRegistry::builtin(reqwest::Client::new()));
    let executor = ToolExecutor::new(Arc::clone(&registry));

    for definition in registry.list() {
        if definition.safety != SafetyClass::Executing {
            continue;
        }
        let mut call = ToolInvocation::new(definition.name, InvocationOrigin::ExplicitCommand);
        for param in &definition.params {
            let value = match param.name {
                "command" => format!("touch {marker_text}"),
                "path" => marker_text.clone(),
                _ => "content".to_string(),
            };
            call = call.with_arg(param.name, value);
        }
        let err = executor.execute(&call, false).await.expect_err("denied");
        assert!(matches!(err, AgentError::PermissionDenied { .. }));
        assert!(!marker.exists(), "{} left a side effect", definition.name);
    }
}

#[test]
fn failure_result_labels_the_error() {
    let result = failure_result("frobnicate", &AgentError::tool_not_found("frobnicate"));
    assert_eq!(result.status, ToolStatus::Error);
    assert_eq!(
        result.payload,
        ToolPayload::Text("Error (not_found): Unknown tool: frobnicate".into())
    );
}
