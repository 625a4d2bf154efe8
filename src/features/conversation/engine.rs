//! Conversation state machine
//!
//! Drives the three-step dialogue (title → description → remind-at) for
//! each user independently. Sessions are transient and in-memory only;
//! losing an in-progress note on restart is accepted. Exactly one note is
//! appended to the store per completed dialogue, and nothing is written
//! during intermediate steps.

use anyhow::{Context, Result};
use dashmap::DashMap;
use log::{debug, info};
use std::sync::Arc;

use crate::core::clock::{format_minute, parse_minute};
use crate::store::{Note, NoteStore};

/// Which field the dialogue is currently collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingTitle,
    AwaitingDescription,
    AwaitingRemindAt,
}

/// Transient per-user dialogue progress.
#[derive(Debug, Default)]
struct Session {
    state: SessionState,
    title: Option<String>,
    description: Option<String>,
}

const GREETING: &str =
    "👋 Hi! Send /new to create a note with a reminder, or /notes to see what you have.";
const PROMPT_TITLE: &str = "📝 Enter a title for your note:";
const PROMPT_TITLE_AGAIN: &str = "The title can't be empty. Enter a title for your note:";
const PROMPT_DESCRIPTION: &str = "Enter a description for your note:";
const PROMPT_REMIND_AT: &str =
    "⏰ When should I remind you? Use the format YYYY-MM-DD HH:MM (for example: 2025-03-29 17:30):";
const REPLY_BAD_TIMESTAMP: &str =
    "❌ That doesn't look right. Please use YYYY-MM-DD HH:MM (for example: 2025-03-29 17:30):";
const REPLY_NO_NOTES: &str = "📋 You don't have any notes yet. Send /new to create one!";

/// The conversation state machine for all users.
///
/// Message handling is per-user: each user's session lives in its own
/// map slot, so handling one user never blocks or touches another.
pub struct ConversationEngine {
    store: Arc<NoteStore>,
    sessions: DashMap<String, Session>,
}

impl ConversationEngine {
    pub fn new(store: Arc<NoteStore>) -> Self {
        ConversationEngine {
            store,
            sessions: DashMap::new(),
        }
    }

    /// Advance one user's dialogue with one inbound message.
    ///
    /// Returns the reply to send back, or `None` when the message is not
    /// for this component (plain text while idle). A store failure leaves
    /// the session where it was, so the user's next message retries.
    pub async fn handle_message(&self, user_id: &str, text: &str) -> Result<Option<String>> {
        let trimmed = text.trim();

        match trimmed.split_whitespace().next() {
            Some("/start") => {
                self.sessions.remove(user_id);
                debug!("user {user_id} (re)started");
                return Ok(Some(GREETING.to_string()));
            }
            Some("/new") => {
                self.sessions.insert(
                    user_id.to_string(),
                    Session {
                        state: SessionState::AwaitingTitle,
                        ..Session::default()
                    },
                );
                debug!("user {user_id} started a new note");
                return Ok(Some(PROMPT_TITLE.to_string()));
            }
            Some("/notes") => return self.list_notes(user_id).await.map(Some),
            _ => {}
        }

        match self.session_state(user_id) {
            SessionState::Idle => Ok(None),
            SessionState::AwaitingTitle => {
                if trimmed.is_empty() {
                    return Ok(Some(PROMPT_TITLE_AGAIN.to_string()));
                }
                if let Some(mut session) = self.sessions.get_mut(user_id) {
                    session.title = Some(trimmed.to_string());
                    session.state = SessionState::AwaitingDescription;
                }
                Ok(Some(PROMPT_DESCRIPTION.to_string()))
            }
            SessionState::AwaitingDescription => {
                if let Some(mut session) = self.sessions.get_mut(user_id) {
                    session.description = Some(trimmed.to_string());
                    session.state = SessionState::AwaitingRemindAt;
                }
                Ok(Some(PROMPT_REMIND_AT.to_string()))
            }
            SessionState::AwaitingRemindAt => {
                // The only validating step. On a parse failure nothing is
                // stored and the state does not move.
                let remind_at = match parse_minute(trimmed) {
                    Ok(t) => t,
                    Err(_) => return Ok(Some(REPLY_BAD_TIMESTAMP.to_string())),
                };

                let (title, description) = match self.sessions.get(user_id) {
                    Some(session) => (
                        session.title.clone().unwrap_or_default(),
                        session.description.clone().unwrap_or_default(),
                    ),
                    None => return Ok(None),
                };

                let note = Note::new(title, description, remind_at);
                let note_id = note.id;
                self.store
                    .append_note(user_id, note)
                    .await
                    .context("saving the completed note")?;

                // Reset only after the append succeeded
                self.sessions.remove(user_id);
                info!("saved note {note_id} for user {user_id}, reminder at {}", format_minute(remind_at));
                Ok(Some(format!(
                    "✅ Note saved! I'll remind you at {}.",
                    format_minute(remind_at)
                )))
            }
        }
    }

    /// Current dialogue state for a user.
    pub fn session_state(&self, user_id: &str) -> SessionState {
        self.sessions
            .get(user_id)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    async fn list_notes(&self, user_id: &str) -> Result<String> {
        let book = self.store.load().await.context("loading notes")?;
        let notes = match book.get(user_id) {
            Some(notes) if !notes.is_empty() => notes,
            _ => return Ok(REPLY_NO_NOTES.to_string()),
        };

        Ok(notes
            .iter()
            .map(|n| format!("📌 **{}**\n📝 {}\n⏰ {}", n.title, n.description, n.remind_at))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
