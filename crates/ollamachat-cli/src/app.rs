use std::future::Future;
use std::io::Write;

use anyhow::{bail, Result};
use chrono::Local;
use ollamachat_core::context::window;
use ollamachat_core::{
    create_provider, create_store, ChatController, ChatEvent, SessionSettings, Settings, TurnStatus,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};

use crate::commands::{handle_command, CommandResult};

/// Wire provider, store and controller together from settings.
pub async fn connect(settings: &Settings) -> Result<(ChatController, UnboundedReceiver<ChatEvent>)> {
    let provider = create_provider(&settings.provider_config())?;
    match provider.check_health().await {
        Ok(()) => info!(provider = provider.name(), "Backend is reachable"),
        Err(e) => warn!(error = %e, "Backend is not reachable yet, queries may fail"),
    }

    let storage = settings.storage_config();
    let store = create_store(&storage)?;
    info!(path = %storage.base_path.display(), "Using session store");

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let controller =
        ChatController::open(provider, store, settings.controller_options(), event_tx).await?;
    Ok((controller, event_rx))
}

// ── One-shot prompt ─────────────────────────────────────────────────────

pub async fn run_single_prompt(
    controller: &ChatController,
    events: &mut UnboundedReceiver<ChatEvent>,
    prompt: &str,
) -> Result<()> {
    if !controller.submit_user_message(prompt).await? {
        bail!("a reply is already in progress");
    }
    match stream_turn(controller, events).await {
        TurnStatus::Failed => bail!("query failed"),
        _ => Ok(()),
    }
}

/// Print streamed text until the turn ends. Ctrl-C cancels the turn.
async fn stream_turn(
    controller: &ChatController,
    events: &mut UnboundedReceiver<ChatEvent>,
) -> TurnStatus {
    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ChatEvent::Chunk { text, .. }) => {
                    print!("{text}");
                    let _ = stdout.flush();
                }
                Some(ChatEvent::TurnFinished { status, error }) => {
                    println!();
                    match status {
                        TurnStatus::Canceled => eprintln!("[request canceled]"),
                        TurnStatus::Failed => {
                            eprintln!("Error: {}", error.unwrap_or_default());
                        }
                        TurnStatus::Completed => {}
                    }
                    return status;
                }
                Some(ChatEvent::SessionListChanged(_)) => {}
                None => return TurnStatus::Failed,
            },
            _ = tokio::signal::ctrl_c() => {
                controller.cancel_current_turn();
            }
        }
    }
}

// ── Interactive loop ────────────────────────────────────────────────────

pub async fn run_repl(
    controller: &ChatController,
    events: &mut UnboundedReceiver<ChatEvent>,
) -> Result<()> {
    let session = controller.current_session();
    println!(
        "OllamaChat v{} | session \"{}\" | model {}",
        env!("CARGO_PKG_VERSION"),
        session.name,
        controller.resolved_model()
    );
    println!("Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let Some(line) = next_input(&mut lines, tokio::signal::ctrl_c()).await? else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match handle_command(line) {
            CommandResult::Quit => break,
            CommandResult::NotACommand => {
                // Drop list refreshes queued by earlier commands.
                while events.try_recv().is_ok() {}
                match controller.submit_user_message(line).await {
                    Ok(true) => {
                        stream_turn(controller, events).await;
                    }
                    Ok(false) => eprintln!("A reply is still streaming."),
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            command => {
                if let Err(e) = execute(controller, command).await {
                    eprintln!("Error: {e}");
                }
            }
        }
    }

    controller.cancel_current_turn();
    controller.wait_for_turn().await;
    Ok(())
}

/// Next input line, or `None` at end of input or once `interrupt` resolves.
async fn next_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    tokio::select! {
        line = lines.next_line() => Ok(line?),
        _ = interrupt => Ok(None),
    }
}

async fn execute(controller: &ChatController, command: CommandResult) -> Result<()> {
    match command {
        CommandResult::Message(msg) => println!("{msg}"),
        CommandResult::NewSession => {
            let id = controller.create_session().await?;
            println!("Started session {id}");
        }
        CommandResult::ListSessions => {
            let current = controller.current_session().id;
            for summary in controller.refresh_sessions().await? {
                let marker = if summary.id == current { "*" } else { " " };
                println!(
                    "{marker} {}  {:<24} {:>4} msgs  {}{}",
                    summary.id,
                    summary.name,
                    summary.message_count,
                    summary
                        .updated_at
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M"),
                    summary
                        .model
                        .as_deref()
                        .map(|m| format!("  [{m}]"))
                        .unwrap_or_default()
                );
            }
        }
        CommandResult::SwitchSession(id) => {
            controller.switch_session(&id).await?;
            print_session_header(controller);
        }
        CommandResult::DeleteSession(id) => {
            let id = id.unwrap_or_else(|| controller.current_session().id);
            controller.delete_session(&id).await?;
            println!("Deleted session {id}");
            print_session_header(controller);
        }
        CommandResult::RenameSession(name) => {
            controller.rename_session(&name).await?;
            println!("Renamed session to \"{name}\"");
        }
        CommandResult::ExportTranscript(path) => {
            let written = controller.export_transcript(&path).await?;
            println!("Transcript saved to {}", written.display());
        }
        CommandResult::SetSessionModel(model) => {
            let mut settings = SessionSettings::from_session(&controller.current_session());
            settings.model = model;
            controller.update_session_settings(settings).await?;
            println!("Model: {}", controller.resolved_model());
        }
        CommandResult::SetDefaultModel(model) => {
            controller.set_default_model(&model).await?;
            println!("Default model: {model}");
        }
        CommandResult::SetContextWindow(n) => {
            let mut settings = SessionSettings::from_session(&controller.current_session());
            settings.max_context_messages = n;
            controller.update_session_settings(settings).await?;
            println!("Context window: {n} messages");
        }
        CommandResult::SetTemperature(t) => {
            let mut settings = SessionSettings::from_session(&controller.current_session());
            settings.temperature = t;
            controller.update_session_settings(settings).await?;
            println!("Temperature: {t:.1}");
        }
        CommandResult::ListModels => {
            let current = controller.resolved_model();
            for model in controller.list_models().await? {
                let marker = if model.name == current { "*" } else { " " };
                println!("{marker} {}", model.name);
            }
        }
        CommandResult::ShowStatus => {
            let session = controller.current_session();
            println!("Session:     {} ({})", session.name, session.id);
            println!("Messages:    {}", session.messages.len());
            println!("Provider:    {}", controller.provider_name());
            println!("Model:       {}", controller.resolved_model());
            println!("Context:     {} messages", session.max_context_messages);
            println!("Temperature: {:.1}", session.temperature);
        }
        CommandResult::Quit | CommandResult::NotACommand => {}
    }
    Ok(())
}

fn print_session_header(controller: &ChatController) {
    let session = controller.current_session();
    println!(
        "Session \"{}\" ({} messages)",
        session.name,
        session.messages.len()
    );
    for message in window(&session.messages, 4) {
        println!("  {}: {}", message.sender.as_str(), message.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_interrupt_ends_input_while_waiting() {
        let (_writer, reader) = tokio::io::duplex(64);
        let mut lines = BufReader::new(reader).lines();
        let line = next_input(&mut lines, std::future::ready(())).await.unwrap();
        assert_eq!(line, None);
    }

    #[tokio::test]
    async fn test_lines_read_until_eof() {
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(b"hello\n").await.unwrap();
        drop(writer);

        let mut lines = BufReader::new(reader).lines();
        let first = next_input(&mut lines, std::future::pending::<()>()).await.unwrap();
        assert_eq!(first.as_deref(), Some("hello"));
        let second = next_input(&mut lines, std::future::pending::<()>()).await.unwrap();
        assert_eq!(second, None);
    }
}
