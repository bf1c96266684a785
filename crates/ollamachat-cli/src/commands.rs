use ollamachat_core::constants::defaults;
use ollamachat_core::validation;
use std::path::PathBuf;

/// Result of processing a slash command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Display a message to the user.
    Message(String),
    /// Quit the application.
    Quit,
    /// Start a fresh session.
    NewSession,
    /// List saved sessions.
    ListSessions,
    /// Switch to a session by id.
    SwitchSession(String),
    /// Delete a session by id, or the current one.
    DeleteSession(Option<String>),
    RenameSession(String),
    /// Write the current transcript to a text file.
    ExportTranscript(PathBuf),
    /// Set the current session's model; `None` clears the override.
    SetSessionModel(Option<String>),
    SetDefaultModel(String),
    SetContextWindow(u32),
    SetTemperature(f64),
    /// List models installed on the backend.
    ListModels,
    /// Show status (session, model, settings).
    ShowStatus,
    /// Not a command - treat as regular input.
    NotACommand,
}

pub fn handle_command(input: &str) -> CommandResult {
    let input = input.trim();
    if !input.starts_with('/') {
        return CommandResult::NotACommand;
    }

    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/help" | "/h" => show_help(),
        "/exit" | "/quit" | "/q" => CommandResult::Quit,

        // Session commands
        "/new" => CommandResult::NewSession,
        "/sessions" | "/ls" => CommandResult::ListSessions,
        "/switch" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /switch <session-id>".into())
            } else {
                CommandResult::SwitchSession(arg.to_string())
            }
        }
        "/delete" => CommandResult::DeleteSession((!arg.is_empty()).then(|| arg.to_string())),
        "/rename" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /rename <new name>".into())
            } else {
                CommandResult::RenameSession(arg.to_string())
            }
        }
        "/export" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /export <file>  (.txt is added if missing)".into())
            } else {
                CommandResult::ExportTranscript(PathBuf::from(arg))
            }
        }

        // Model commands
        "/model" => match arg {
            "" => CommandResult::Message(
                "Usage: /model <model-name>  (or /model default to use the default model)".into(),
            ),
            "default" => CommandResult::SetSessionModel(None),
            name => CommandResult::SetSessionModel(Some(name.to_string())),
        },
        "/default-model" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /default-model <model-name>".into())
            } else {
                CommandResult::SetDefaultModel(arg.to_string())
            }
        }
        "/models" => CommandResult::ListModels,

        // Session settings
        "/context" => {
            if arg.is_empty() {
                return CommandResult::Message(
                    "Usage: /context <messages>  (0 sends no history)".into(),
                );
            }
            match validation::parse_non_negative_int(arg, "context window") {
                Ok(n) => CommandResult::SetContextWindow(n),
                Err(e) => CommandResult::Message(e.to_string()),
            }
        }
        "/temperature" | "/temp" => {
            if arg.is_empty() {
                return CommandResult::Message(format!(
                    "Usage: /temperature <{:.1}-{:.1}>",
                    defaults::MIN_TEMPERATURE,
                    defaults::MAX_TEMPERATURE
                ));
            }
            match validation::parse_float_in_range(
                arg,
                "temperature",
                defaults::MIN_TEMPERATURE,
                defaults::MAX_TEMPERATURE,
            ) {
                Ok(t) => CommandResult::SetTemperature(t),
                Err(e) => CommandResult::Message(e.to_string()),
            }
        }

        "/status" => CommandResult::ShowStatus,
        "/version" => CommandResult::Message(format!("OllamaChat CLI v{}", env!("CARGO_PKG_VERSION"))),

        _ => CommandResult::Message(format!("Unknown command: {cmd}. Type /help for commands.")),
    }
}

fn show_help() -> CommandResult {
    let help_text = "\
OllamaChat Commands

  SESSIONS
    /new                      Start a fresh session
    /sessions, /ls            List saved sessions
    /switch <id>              Switch to another session
    /delete [id]              Delete a session (default: the current one)
    /rename <name>            Rename the current session
    /export <file>            Save the current transcript as text

  MODEL & SETTINGS
    /model <name|default>     Set this session's model
    /default-model <name>     Set the model used by sessions without their own
    /models                   List models installed in Ollama
    /context <n>              Number of previous messages sent as context
    /temperature <t>          Sampling temperature for this session

  OTHER
    /status                   Show current session and settings
    /help, /h                 Show this help message
    /version                  Show version information
    /exit, /quit, /q          Quit

  Press Ctrl-C while a reply is streaming to cancel it.";

    CommandResult::Message(help_text.into())
}
