use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::events::{ChatEvent, TurnState, TurnStatus};
use crate::constants::{defaults, markers, models};
use crate::context::ContextBuilder;
use crate::error::{Result, ValidationError};
use crate::llm::{ModelInfo, Provider, QueryOptions, StreamChunk, StreamEnd};
use crate::session::{ChatMessage, ChatSession, SessionSettings, SessionSummary};
use crate::storage::{AppPreferences, SessionStore};

/// Defaults the controller falls back to when neither the session nor the
/// stored preferences say otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOptions {
    pub default_model: String,
    pub max_tokens: u32,
    /// Applied to every newly created session.
    pub session_defaults: SessionSettings,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            default_model: models::DEFAULT_MODEL.to_string(),
            max_tokens: defaults::MAX_TOKENS,
            session_defaults: SessionSettings::default(),
        }
    }
}

struct ActiveTurn {
    cancel: CancellationToken,
    done: Shared<BoxFuture<'static, ()>>,
}

struct ControllerState {
    session: ChatSession,
    preferences: AppPreferences,
    turn_state: TurnState,
    active: Option<ActiveTurn>,
}

fn lock(state: &Mutex<ControllerState>) -> MutexGuard<'_, ControllerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives one conversation at a time: builds prompts, streams replies into the
/// current session and keeps the store up to date.
///
/// At most one turn is in flight. Operations that change the current session
/// first cancel that turn and wait for it to be finalized, so its transcript
/// is always written to the session it started in.
pub struct ChatController {
    provider: Arc<dyn Provider>,
    store: Arc<dyn SessionStore>,
    builder: ContextBuilder,
    options: ControllerOptions,
    state: Arc<Mutex<ControllerState>>,
    events: UnboundedSender<ChatEvent>,
}

impl ChatController {
    /// Resume the most recently updated session, or start a fresh one when the
    /// store is empty.
    pub async fn open(
        provider: Arc<dyn Provider>,
        store: Arc<dyn SessionStore>,
        options: ControllerOptions,
        events: UnboundedSender<ChatEvent>,
    ) -> Result<Self> {
        if let Err(e) = store.ping() {
            warn!(error = %e, "Session store health check failed");
        }

        let preferences = store.load_preferences()?;
        let session = match store.list()?.into_iter().next() {
            Some(session) => {
                info!(session_id = %session.id, "Resuming most recent session");
                session
            }
            None => {
                let mut session = fresh_session(&options);
                store.save(&mut session)?;
                info!(session_id = %session.id, "Created initial session");
                session
            }
        };

        let controller = Self {
            provider,
            store,
            builder: ContextBuilder::new(),
            options,
            state: Arc::new(Mutex::new(ControllerState {
                session,
                preferences,
                turn_state: TurnState::Idle,
                active: None,
            })),
            events,
        };
        controller.publish_sessions();
        Ok(controller)
    }

    /// Start a turn for `text`. Returns `Ok(false)` without side effects when
    /// another turn is still in flight.
    pub async fn submit_user_message(&self, text: &str) -> Result<bool> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::Empty("message".to_string()).into());
        }

        let mut state = lock(&self.state);
        if state.turn_state != TurnState::Idle {
            warn!("A response is still streaming, ignoring new message");
            return Ok(false);
        }

        let prompt = self.builder.build_prompt(&state.session, text);
        let model = resolve_model(&state.session, &state.preferences, &self.options.default_model);
        let query = QueryOptions {
            temperature: state.session.temperature,
            max_tokens: self.options.max_tokens,
        };

        state.session.add_message(ChatMessage::user(text));
        match self.store.save(&mut state.session) {
            Ok(()) => self.publish_sessions(),
            Err(e) => warn!(session_id = %state.session.id, error = %e, "Failed to save session"),
        }
        state.turn_state = TurnState::Sending;

        info!(session_id = %state.session.id, model = %model, "Starting turn");
        let cancel = CancellationToken::new();
        let turn = Turn {
            state: Arc::clone(&self.state),
            store: Arc::clone(&self.store),
            events: self.events.clone(),
        };
        let handle = tokio::spawn(turn.run(
            Arc::clone(&self.provider),
            cancel.clone(),
            model,
            prompt,
            query,
        ));

        let shared_state = Arc::clone(&self.state);
        let done = handle
            .map(move |joined| {
                if let Err(e) = joined {
                    error!(error = %e, "Turn task ended abnormally");
                    lock(&shared_state).turn_state = TurnState::Idle;
                }
            })
            .boxed()
            .shared();
        state.active = Some(ActiveTurn { cancel, done });
        Ok(true)
    }

    /// Request cancellation of the in-flight turn. Returns false when idle.
    pub fn cancel_current_turn(&self) -> bool {
        let state = lock(&self.state);
        match &state.active {
            Some(turn) if state.turn_state != TurnState::Idle => {
                info!(session_id = %state.session.id, "Cancelling current turn");
                turn.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Resolve once the most recent turn has been finalized.
    pub async fn wait_for_turn(&self) {
        let done = lock(&self.state).active.as_ref().map(|turn| turn.done.clone());
        if let Some(done) = done {
            done.await;
        }
    }

    async fn settle_turn(&self) {
        self.cancel_current_turn();
        self.wait_for_turn().await;
    }

    pub async fn switch_session(&self, id: &str) -> Result<()> {
        self.settle_turn().await;
        let session = self.store.load(id)?;
        info!(session_id = id, "Switched session");
        lock(&self.state).session = session;
        Ok(())
    }

    /// Create, persist and switch to an empty session. Returns its id.
    pub async fn create_session(&self) -> Result<String> {
        self.settle_turn().await;
        let mut session = fresh_session(&self.options);
        self.store.save(&mut session)?;
        let id = session.id.clone();
        info!(session_id = %id, "Created session");
        lock(&self.state).session = session;
        self.publish_sessions();
        Ok(id)
    }

    /// Delete a session. Deleting the current one moves to the most recent
    /// remaining session, or a new one if none is left.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        self.settle_turn().await;
        self.store.delete(id)?;

        let was_current = lock(&self.state).session.id == id;
        if was_current {
            let next = match self.store.list()?.into_iter().next() {
                Some(session) => session,
                None => {
                    let mut session = fresh_session(&self.options);
                    self.store.save(&mut session)?;
                    session
                }
            };
            info!(deleted = id, session_id = %next.id, "Deleted current session");
            lock(&self.state).session = next;
        }
        self.publish_sessions();
        Ok(())
    }

    pub async fn update_session_settings(&self, settings: SessionSettings) -> Result<()> {
        settings.validate()?;
        {
            let mut state = lock(&self.state);
            settings.apply(&mut state.session);
            self.store.save(&mut state.session)?;
            debug!(
                session_id = %state.session.id,
                model = ?state.session.model,
                max_context_messages = state.session.max_context_messages,
                temperature = state.session.temperature,
                "Updated session settings"
            );
        }
        self.publish_sessions();
        Ok(())
    }

    pub async fn rename_session(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty("session name".to_string()).into());
        }
        {
            let mut state = lock(&self.state);
            state.session.rename(name);
            self.store.save(&mut state.session)?;
        }
        self.publish_sessions();
        Ok(())
    }

    /// Change the model used by sessions without their own override.
    pub async fn set_default_model(&self, model: &str) -> Result<()> {
        let mut state = lock(&self.state);
        let mut preferences = state.preferences.clone();
        preferences.default_model = model.trim().to_string();
        self.store.save_preferences(&preferences)?;
        state.preferences = preferences;
        info!(model = model.trim(), "Default model changed");
        Ok(())
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(self.provider.list_models().await?)
    }

    /// Reload session summaries from the store and broadcast them.
    pub async fn refresh_sessions(&self) -> Result<Vec<SessionSummary>> {
        let summaries = self.store.list_summaries()?;
        let _ = self
            .events
            .send(ChatEvent::SessionListChanged(summaries.clone()));
        Ok(summaries)
    }

    pub fn current_session(&self) -> ChatSession {
        lock(&self.state).session.clone()
    }

    pub fn turn_state(&self) -> TurnState {
        lock(&self.state).turn_state
    }

    pub fn preferences(&self) -> AppPreferences {
        lock(&self.state).preferences.clone()
    }

    /// The model the next turn would use.
    pub fn resolved_model(&self) -> String {
        let state = lock(&self.state);
        resolve_model(&state.session, &state.preferences, &self.options.default_model)
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn publish_sessions(&self) {
        publish_session_list(self.store.as_ref(), &self.events);
    }

    /// Write the current session as a plain-text transcript. A `.txt`
    /// extension is added when `path` lacks one. Returns the path written.
    pub async fn export_transcript(&self, path: &Path) -> Result<PathBuf> {
        let path = transcript_path(path);
        let transcript = lock(&self.state).session.to_transcript();
        tokio::fs::write(&path, transcript).await?;
        info!(path = %path.display(), "Exported transcript");
        Ok(path)
    }
}

fn publish_session_list(store: &dyn SessionStore, events: &UnboundedSender<ChatEvent>) {
    match store.list_summaries() {
        Ok(summaries) => {
            let _ = events.send(ChatEvent::SessionListChanged(summaries));
        }
        Err(e) => warn!(error = %e, "Failed to list sessions"),
    }
}

fn transcript_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "txt") {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_owned();
    name.push(".txt");
    PathBuf::from(name)
}

fn fresh_session(options: &ControllerOptions) -> ChatSession {
    ChatSession::new(ChatSession::default_name()).with_settings(&options.session_defaults)
}

/// Session override, then the stored default, then the configured default.
fn resolve_model(session: &ChatSession, preferences: &AppPreferences, fallback: &str) -> String {
    session
        .model()
        .or_else(|| preferences.default_model())
        .unwrap_or(fallback)
        .to_string()
}

/// Everything a spawned turn needs to write its results back.
struct Turn {
    state: Arc<Mutex<ControllerState>>,
    store: Arc<dyn SessionStore>,
    events: UnboundedSender<ChatEvent>,
}

impl Turn {
    async fn run(
        self,
        provider: Arc<dyn Provider>,
        cancel: CancellationToken,
        model: String,
        prompt: String,
        options: QueryOptions,
    ) {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let mut started = false;
        let mut on_chunk = move |chunk: StreamChunk| {
            let is_new_turn = !started;
            {
                let mut state = lock(&state);
                if is_new_turn {
                    state.session.add_message(ChatMessage::assistant(chunk.text.clone()));
                    state.turn_state = TurnState::Streaming;
                } else {
                    state.session.append_to_last_assistant(&chunk.text);
                }
            }
            started = true;
            let _ = events.send(ChatEvent::Chunk {
                text: chunk.text,
                is_new_turn,
            });
        };

        let result = provider
            .stream_query(cancel, &model, &prompt, options, &mut on_chunk)
            .await;

        match result {
            Ok(StreamEnd::Completed) => self.finish(TurnStatus::Completed, None),
            Ok(StreamEnd::Cancelled) => self.finish(TurnStatus::Canceled, None),
            Err(e) => {
                error!(model = %model, error = %e, "Query failed");
                self.finish(TurnStatus::Failed, Some(e.to_string()))
            }
        }
    }

    fn finish(self, status: TurnStatus, error: Option<String>) {
        {
            let mut state = lock(&self.state);
            match status {
                TurnStatus::Completed => {}
                TurnStatus::Canceled => {
                    state.session.add_message(ChatMessage::assistant(markers::CANCELED));
                }
                TurnStatus::Failed => {
                    let message = error.as_deref().unwrap_or_default();
                    state.session.add_message(ChatMessage::assistant(format!(
                        "{}{}",
                        markers::ERROR_PREFIX,
                        message
                    )));
                }
            }
            match self.store.save(&mut state.session) {
                Ok(()) => publish_session_list(self.store.as_ref(), &self.events),
                Err(e) => error!(session_id = %state.session.id, error = %e, "Failed to save session"),
            }
            state.turn_state = TurnState::Idle;
            info!(session_id = %state.session.id, ?status, "Turn finished");
        }
        let _ = self.events.send(ChatEvent::TurnFinished { status, error });
    }
}
