use super::*;
use crate::core::config::Config;
use crate::core::message::{Message, MessageStatus};
use crate::core::session::Output;
use crate::tools::{ToolExecutor, ToolRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn test_session(config_path: Option<PathBuf>) -> Session {
    let registry = ToolRegistry::builtin(reqwest::Client::new());
    Session::new(
        Config::default(),
        config_path,
        ToolExecutor::new(Arc::new(registry)),
    )
}

fn expect_tool(result: CommandResult) -> ToolInvocation {
    match result {
        CommandResult::RunTool(invocation) => invocation,
        other => panic!("expected a tool run, got {other:?}"),
    }
}

fn arg<'a>(invocation: &'a ToolInvocation, name: &str) -> Option<&'a ArgValue> {
    invocation.args.get(name)
}

fn single_error(session: &mut Session) -> String {
    match session.take_output().as_slice() {
        [Output::Error(message)] => message.clone(),
        other => panic!("expected one error, got {other:?}"),
    }
}

#[test]
fn unknown_command_is_reported_not_fatal() {
    let mut session = test_session(None);
    let result = process_input(&mut session, "/frobnicate now");
    assert_eq!(result, CommandResult::Continue);
    assert_eq!(single_error(&mut session), "Unknown command: frobnicate");

    assert!(matches!(
        route("/frobnicate"),
        Err(AgentError::NotFound { kind: "command", .. })
    ));
}

#[test]
fn routing_is_case_insensitive_and_knows_aliases() {
    assert_eq!(route("/HELP").expect("route").command.name, "help");
    assert_eq!(route("/quit").expect("route").command.name, "exit");
    assert_eq!(route("/Fetch https://x").expect("route").command.name, "curl");
}

#[test]
fn unparsable_lines_are_unrecognized() {
    let mut session = test_session(None);
    assert!(matches!(route("/system \"open"), Err(AgentError::Unrecognized(_))));
    assert_eq!(process_input(&mut session, "/system \"open"), CommandResult::Continue);
    assert!(single_error(&mut session).contains("Unclosed quote"));
}

#[test]
fn tool_commands_target_registered_tools() {
    let registry = ToolRegistry::builtin(reqwest::Client::new());
    let mut mapped = 0;
    for command in all_commands() {
        if let Some(tool) = command.tool() {
            assert!(registry.lookup(tool).is_ok(), "/{} -> {tool}", command.name);
            assert!(command.capabilities.asynchronous);
            mapped += 1;
        }
    }
    assert_eq!(mapped, registry.len());
}

#[test]
fn positional_and_named_arguments_map_to_parameters() {
    let mut session = test_session(None);

    let invocation = expect_tool(process_input(&mut session, "/git_log ../repo --count=3"));
    assert_eq!(invocation.tool, "git_log");
    assert_eq!(invocation.origin, InvocationOrigin::ExplicitCommand);
    assert_eq!(arg(&invocation, "path"), Some(&ArgValue::from("../repo")));
    assert_eq!(arg(&invocation, "count"), Some(&ArgValue::from("3")));

    let invocation = expect_tool(process_input(&mut session, "/find_large \"My Files\" 5"));
    assert_eq!(arg(&invocation, "path"), Some(&ArgValue::from("My Files")));
    assert_eq!(arg(&invocation, "count"), Some(&ArgValue::from("5")));

    let invocation = expect_tool(process_input(&mut session, "/ls"));
    assert!(invocation.args.is_empty());
}

#[test]
fn surplus_or_duplicate_arguments_are_rejected() {
    let mut session = test_session(None);

    assert_eq!(
        process_input(&mut session, "/ping example.com 3 extra"),
        CommandResult::Continue
    );
    assert!(single_error(&mut session).contains("takes at most 2 arguments"));

    assert_eq!(
        process_input(&mut session, "/ls src --path=lib"),
        CommandResult::Continue
    );
    assert!(single_error(&mut session).contains("'path' given twice"));
}

#[test]
fn execute_keeps_the_command_text_verbatim() {
    let mut session = test_session(None);
    let invocation = expect_tool(process_input(
        &mut session,
        "/execute grep -r \"two  spaces\" --color=never .",
    ));
    assert_eq!(invocation.tool, "shell");
    assert_eq!(
        arg(&invocation, "command"),
        Some(&ArgValue::from("grep -r \"two  spaces\" --color=never ."))
    );
    assert_eq!(invocation.args.len(), 1);

    let invocation = expect_tool(process_input(&mut session, "/write notes.txt hello   world"));
    assert_eq!(arg(&invocation, "path"), Some(&ArgValue::from("notes.txt")));
    assert_eq!(arg(&invocation, "content"), Some(&ArgValue::from("hello   world")));
}

#[tokio::test]
async fn execute_without_permission_spawns_nothing() {
    let temp = TempDir::new().expect("temp dir");
    let marker = temp.path().join("x");
    std::fs::create_dir(&marker).expect("mkdir");

    let mut session = test_session(None);
    assert!(!session.allow_execution);
    let line = format!("/execute rm -rf {}", marker.display());
    let invocation = expect_tool(process_input(&mut session, &line));
    session.run_tool(&invocation).await;

    let message = single_error(&mut session);
    assert!(message.starts_with("Permission denied: 'shell'"), "{message}");
    assert!(marker.exists());
}

#[tokio::test]
async fn unknown_option_is_rejected_by_the_executor() {
    let mut session = test_session(None);
    let invocation = expect_tool(process_input(&mut session, "/ls --bogus=1"));
    session.run_tool(&invocation).await;
    assert!(single_error(&mut session).contains("unknown argument 'bogus'"));
}

#[test]
fn phrases_map_to_tools_or_fall_through() {
    let mut session = test_session(None);

    let invocation = expect_tool(process_input(&mut session, "list files in src"));
    assert_eq!(invocation.tool, "list_files");
    assert_eq!(invocation.origin, InvocationOrigin::NaturalLanguage);
    assert_eq!(arg(&invocation, "path"), Some(&ArgValue::from("src")));

    assert_eq!(
        process_input(&mut session, "  why is the sky blue?  "),
        CommandResult::SendMessage("why is the sky blue?".into())
    );
    assert_eq!(process_input(&mut session, "   "), CommandResult::Continue);
    assert!(session.conversation.is_empty());
}

#[test]
fn context_set_list_and_clear() {
    let mut session = test_session(None);

    process_input(&mut session, "/context project='my app' owner=me");
    assert_eq!(session.context.get("project"), Some("my app"));
    assert_eq!(session.context.get("owner"), Some("me"));
    session.take_output();

    process_input(&mut session, "/context");
    match session.take_output().as_slice() {
        [Output::Table { rows, .. }] => assert_eq!(rows.len(), 2),
        other => panic!("expected a table, got {other:?}"),
    }

    process_input(&mut session, "/context nonsense");
    assert!(single_error(&mut session).starts_with("Usage: /context"));
    assert_eq!(session.context.len(), 2);

    process_input(&mut session, "/context clear");
    assert!(session.context.is_empty());
}

#[test]
fn allow_toggles_and_persists() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("config.toml");
    let mut session = test_session(Some(path.clone()));

    process_input(&mut session, "/allow on");
    assert!(session.allow_execution);
    assert!(Config::load_from_path(&path).expect("load").allow_execution());

    process_input(&mut session, "/allow maybe");
    assert!(session.allow_execution);
    session.take_output();

    process_input(&mut session, "/allow off");
    assert!(!session.allow_execution);
    assert!(!Config::load_from_path(&path).expect("load").allow_execution());
}

#[test]
fn models_and_system_update_settings() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("config.toml");
    let mut session = test_session(Some(path.clone()));

    assert_eq!(process_input(&mut session, "/models"), CommandResult::ListModels);
    assert_eq!(
        process_input(&mut session, "/models gemini-1.5-pro"),
        CommandResult::Continue
    );
    assert_eq!(session.model, "gemini-1.5-pro");

    process_input(&mut session, "/system \"Answer in one line.\"");
    assert_eq!(session.config.system_message(), "Answer in one line.");

    let saved = Config::load_from_path(&path).expect("load");
    assert_eq!(saved.model(), "gemini-1.5-pro");
    assert_eq!(saved.system_message(), "Answer in one line.");
}

#[test]
fn save_then_load_replaces_conversation() {
    let temp = TempDir::new().expect("temp dir");
    let file = temp.path().join("chat.json");
    let mut session = test_session(None);
    session.conversation.push(Message::user("hello"));
    session
        .conversation
        .push(Message::assistant("hi", MessageStatus::Complete));

    process_input(&mut session, &format!("/save {}", file.display()));
    assert!(file.exists());

    process_input(&mut session, "/clear");
    assert!(session.conversation.is_empty());

    process_input(&mut session, &format!("/load {}", file.display()));
    assert_eq!(session.conversation.len(), 2);
    assert_eq!(session.conversation.messages()[1].text(), "hi");

    process_input(&mut session, "/load");
    assert!(session
        .take_output()
        .iter()
        .any(|output| matches!(output, Output::Error(m) if m == "Usage: /load <file>")));
}

#[test]
fn interpret_previews_without_running() {
    let mut session = test_session(None);
    process_input(&mut session, "/interpret list files in src");
    assert_eq!(
        session.take_output(),
        vec![Output::Info(
            "list_files(path=\"src\") (rule: list-files)".to_string()
        )]
    );

    process_input(&mut session, "/interpret tell me a joke");
    assert_eq!(
        session.take_output(),
        vec![Output::Info(
            "No rule matches; this would be sent to the model.".to_string()
        )]
    );
}

#[test]
fn session_flow_commands() {
    let mut session = test_session(None);
    assert_eq!(process_input(&mut session, "/exit"), CommandResult::Exit);
    assert_eq!(process_input(&mut session, "/QUIT"), CommandResult::Exit);

    assert_eq!(process_input(&mut session, "/summary"), CommandResult::Continue);
    session.conversation.push(Message::user("hello"));
    assert_eq!(process_input(&mut session, "/summary"), CommandResult::Summarize);

    session.take_output();
    process_input(&mut session, "/help");
    assert!(matches!(
        session.take_output().first(),
        Some(Output::Table { title, .. }) if title == "Commands"
    ));
}

#[test]
fn commands_without_arguments_reject_them() {
    let mut session = test_session(None);
    session.conversation.push(Message::user("keep me"));

    for line in ["/clear junk", "/exit now", "/tools x", "/summary please"] {
        assert_eq!(process_input(&mut session, line), CommandResult::Continue, "{line}");
        let message = single_error(&mut session);
        assert!(message.starts_with("Invalid arguments: /"), "{line}: {message}");
        assert!(message.contains("takes no arguments"), "{line}: {message}");
    }
    assert_eq!(session.conversation.len(), 1);

    assert!(matches!(route("/help me"), Err(AgentError::InvalidArguments(_))));
    assert!(route("/models gemini-2.0-flash").is_ok());
}

fn send_hello(_: &mut Session, _: &ParsedCommand) -> CommandResult {
    CommandResult::SendMessage("hello".into())
}

static BLOCKING_SEND: Command = Command {
    name: "blocking",
    aliases: &[],
    usage: "/blocking",
    help: "",
    capabilities: Capabilities {
        positional: false,
        options: false,
        asynchronous: false,
    },
    action: CommandAction::Handler(send_hello),
};

#[test]
fn only_asynchronous_commands_may_suspend() {
    let mut session = test_session(None);
    let routed = Route {
        command: &BLOCKING_SEND,
        parsed: ParsedCommand::default(),
    };
    assert_eq!(dispatch(&mut session, &routed), CommandResult::Continue);
    assert_eq!(single_error(&mut session), "/blocking cannot start background work.");

    for line in ["/help", "/clear", "/tools", "/config", "/system", "/allow", "/context"] {
        let routed = route(line).expect("route");
        assert!(!routed.command.capabilities.asynchronous, "{line}");
        assert!(!dispatch(&mut session, &routed).suspends(), "{line}");
    }
}

#[test]
fn search_maps_query_then_path() {
    let mut session = test_session(None);
    let invocation = expect_tool(process_input(&mut session, "/search 'fn main' src"));
    assert_eq!(invocation.tool, "search_files");
    assert_eq!(arg(&invocation, "query"), Some(&ArgValue::from("fn main")));
    assert_eq!(arg(&invocation, "path"), Some(&ArgValue::from("src")));

    let invocation = expect_tool(process_input(&mut session, "/grep --query=TODO"));
    assert_eq!(arg(&invocation, "query"), Some(&ArgValue::from("TODO")));
    assert_eq!(arg(&invocation, "path"), None);
}
