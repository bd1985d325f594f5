//! The interactive read-eval-print loop.
//!
//! Each line goes through [`crate::commands::process_input`]; the returned
//! [`CommandResult`] decides whether a tool runs locally, a model turn
//! starts, or the loop ends. Ctrl+C cancels a running turn and is otherwise
//! only a hint, so an interrupted turn never takes the session down.

use std::error::Error;
use std::io::Write;

use chrono::DateTime;
use ratatui::crossterm::style::Stylize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ModelInfo;
use crate::commands::{process_input, CommandResult};
use crate::core::chat_stream::HttpChatBackend;
use crate::core::session::Session;
use crate::core::streamer::ChatStreamer;
use crate::ui::live::terminal_view;
use crate::ui::render::{print_output, print_turn};

fn prompt_text(session: &Session) -> String {
    format!("[{}] {} › ", session.conversation.len(), session.model)
}

fn show_prompt(session: &Session) {
    print!("{}", prompt_text(session).green().bold());
    let _ = std::io::stdout().flush();
}

fn flush_output(session: &mut Session) {
    for output in session.take_output() {
        print_output(&output);
    }
}

/// Cancel `token` on the next Ctrl+C.
fn spawn_interrupt_watcher(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            token.cancel();
        }
    })
}

async fn chat_turn(session: &mut Session, backend: &HttpChatBackend, text: &str) {
    let cancel = CancellationToken::new();
    let watcher = spawn_interrupt_watcher(cancel.clone());
    let system_prompt = session.system_prompt();
    let streamer = ChatStreamer::new(backend, &session.executor, session.turn_settings());

    let mut view = terminal_view();
    let report = streamer
        .run_turn(
            &mut session.conversation,
            &system_prompt,
            text,
            view.as_mut(),
            &cancel,
        )
        .await;
    watcher.abort();
    drop(view);

    for activity in &report.tools {
        debug!(call = %activity.call, ok = activity.result.is_ok(), "model tool call");
    }
    print_turn(&report);
}

async fn summarize(session: &mut Session, backend: &HttpChatBackend) {
    let cancel = CancellationToken::new();
    let watcher = spawn_interrupt_watcher(cancel.clone());
    let system_prompt = session.system_prompt();
    let streamer = ChatStreamer::new(backend, &session.executor, session.turn_settings());

    let mut view = terminal_view();
    let report = streamer
        .summarize(&session.conversation, &system_prompt, view.as_mut(), &cancel)
        .await;
    watcher.abort();
    drop(view);
    print_turn(&report);
}

fn model_rows(models: &[ModelInfo]) -> Vec<Vec<String>> {
    models
        .iter()
        .map(|model| {
            let created = model
                .created
                .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            vec![
                model.id.clone(),
                model.display_name.clone().unwrap_or_default(),
                model.owned_by.clone().unwrap_or_default(),
                created,
            ]
        })
        .collect()
}

async fn list_models(session: &mut Session, backend: &HttpChatBackend) {
    match backend.list_models().await {
        Ok(models) if models.is_empty() => session.warn("The endpoint returned no models."),
        Ok(models) => {
            let rows = model_rows(&models);
            session.table("Models", &["ID", "Name", "Owner", "Created"], rows);
            session.info(format!(
                "Current model: {}. Switch with /models <id>.",
                session.model
            ));
        }
        Err(e) => {
            warn!(error = %e, "model listing failed");
            session.error(format!("Could not list models: {e}"));
        }
    }
}

/// Run the session until `/exit` or end of input.
pub async fn run_chat(mut session: Session, backend: HttpChatBackend) -> Result<(), Box<dyn Error>> {
    println!(
        "{} {} · {} · {} tools · /help for commands",
        "termpal".bold(),
        env!("CARGO_PKG_VERSION"),
        session.model,
        session.executor.registry().len()
    );
    if !session.allow_execution {
        println!(
            "{}",
            "Command execution is off; enable it with /allow on.".dark_grey()
        );
    }
    info!(model = %session.model, base_url = backend.base_url(), "session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        show_prompt(&session);
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "Use /exit to quit.".dark_grey());
                continue;
            }
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let result = process_input(&mut session, &line);
        flush_output(&mut session);
        match result {
            CommandResult::Continue => {}
            CommandResult::Exit => break,
            CommandResult::RunTool(invocation) => {
                session.run_tool(&invocation).await;
                flush_output(&mut session);
            }
            CommandResult::SendMessage(text) => chat_turn(&mut session, &backend, &text).await,
            CommandResult::Summarize => summarize(&mut session, &backend).await,
            CommandResult::ListModels => {
                list_models(&mut session, &backend).await;
                flush_output(&mut session);
            }
        }
    }

    info!(messages = session.conversation.len(), "session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::message::Message;
    use crate::tools::{ToolExecutor, ToolRegistry};
    use std::sync::Arc;

    #[test]
    fn prompt_shows_history_length_and_model() {
        let registry = ToolRegistry::builtin(reqwest::Client::new());
        let mut session = Session::new(
            Config::default(),
            None,
            ToolExecutor::new(Arc::new(registry)),
        );
        session.model = "m1".into();
        assert_eq!(prompt_text(&session), "[0] m1 › ");
        session.conversation.push(Message::user("hi"));
        assert_eq!(prompt_text(&session), "[1] m1 › ");
    }

    #[test]
    fn model_rows_fill_missing_fields() {
        let models = vec![
            ModelInfo {
                id: "gemini-2.0-flash".into(),
                created: Some(1_700_000_000),
                owned_by: Some("google".into()),
                display_name: Some("Gemini 2.0 Flash".into()),
            },
            ModelInfo {
                id: "local".into(),
                created: None,
                owned_by: None,
                display_name: None,
            },
        ];
        let rows = model_rows(&models);
        assert_eq!(
            rows[0],
            vec!["gemini-2.0-flash", "Gemini 2.0 Flash", "google", "2023-11-14"]
        );
        assert_eq!(rows[1], vec!["local", "", "", ""]);
    }
}
