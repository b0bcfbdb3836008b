use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ModelError;
use crate::extract::extract_section;
use crate::level::Level;
use crate::llm::{LlmMessage, LlmRequest, ModelBackend};
use crate::prompts::{build_system_prompt, PromptMode, DEFAULT_SUBJECT};

/// Who said a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used in exported transcripts
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User:",
            Role::Assistant => "AI:",
        }
    }

    fn to_message(self, content: &str) -> LlmMessage {
        match self {
            Role::User => LlmMessage::user(content),
            Role::Assistant => LlmMessage::assistant(content),
        }
    }
}

/// One role-tagged entry of the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Per-session settings that shape the outbound request
#[derive(Debug, Clone)]
pub struct PromptOptions {
    pub level: Level,
    pub mode: PromptMode,
    pub subject: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            level: Level::default(),
            mode: PromptMode::default(),
            subject: DEFAULT_SUBJECT.to_string(),
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

/// One learner's conversation: an append-only transcript plus the active level.
///
/// The transcript only ever grows, one user turn per submitted question and
/// one assistant turn per successful model call, until [`reset`](Self::reset)
/// empties it.
pub struct ConversationSession {
    id: Uuid,
    backend: Arc<dyn ModelBackend>,
    transcript: Vec<Turn>,
    options: PromptOptions,
}

impl ConversationSession {
    pub fn new(backend: Arc<dyn ModelBackend>, options: PromptOptions) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, level = %options.level, mode = %options.mode, "session created");
        Self {
            id,
            backend,
            transcript: Vec::new(),
            options,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask a question and record the answer.
    ///
    /// Blank input is ignored and returns `Ok(None)` without calling the
    /// model. The user turn is recorded before the call and stays even if the
    /// call fails; only a successful call appends the assistant turn, which
    /// holds the raw reply in single-level mode or the active level's section
    /// in multi-level mode.
    pub async fn submit(&mut self, question: &str) -> Result<Option<Turn>, ModelError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(None);
        }

        let request = self.build_request(question);
        self.transcript.push(Turn::new(Role::User, question));

        let raw = self.backend.generate(&request).await.inspect_err(|e| {
            tracing::warn!(session = %self.id, error = %e, "model call failed, keeping user turn");
        })?;

        let content = match self.options.mode {
            PromptMode::SingleLevel => raw,
            PromptMode::MultiLevel => extract_section(&raw, self.options.level),
        };

        let turn = Turn::new(Role::Assistant, content);
        self.transcript.push(turn.clone());
        Ok(Some(turn))
    }

    /// System prompt, then the transcript so far, then the new question.
    fn build_request(&self, question: &str) -> LlmRequest {
        let mut messages = Vec::with_capacity(self.transcript.len() + 2);
        messages.push(LlmMessage::system(self.system_prompt()));
        messages.extend(
            self.transcript
                .iter()
                .map(|turn| turn.role.to_message(&turn.content)),
        );
        messages.push(LlmMessage::user(question));

        let request = LlmRequest::new(messages).with_temperature(self.options.temperature);
        match self.options.max_tokens {
            Some(tokens) => request.with_max_tokens(tokens),
            None => request,
        }
    }

    pub fn system_prompt(&self) -> String {
        build_system_prompt(self.options.level, self.options.mode, &self.options.subject)
    }

    /// Change the level for future questions; stored turns are untouched.
    pub fn set_level(&mut self, level: Level) {
        self.options.level = level;
    }

    pub fn set_mode(&mut self, mode: PromptMode) {
        self.options.mode = mode;
    }

    pub fn level(&self) -> Level {
        self.options.level
    }

    pub fn mode(&self) -> PromptMode {
        self.options.mode
    }

    /// Drop every turn; the level is kept.
    pub fn reset(&mut self) {
        self.transcript.clear();
        tracing::debug!(session = %self.id, "transcript cleared");
    }

    #[cfg(test)]
    pub fn turns(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    /// Plain-text transcript, one labelled block per turn in order.
    pub fn export(&self) -> String {
        let mut out = self
            .transcript
            .iter()
            .map(|turn| format!("{} {}", turn.role.label(), turn.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Write [`export`](Self::export) to `path` as UTF-8
    pub fn save_export(&self, path: &Path) -> Result<()> {
        fs::write(path, self.export())
            .with_context(|| format!("Failed to write transcript to {}", path.display()))?;
        Ok(())
    }
}

/// Owns every live session, keyed by id, so no two learners share state
pub struct SessionManager {
    backend: Arc<dyn ModelBackend>,
    defaults: PromptOptions,
    sessions: HashMap<Uuid, ConversationSession>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn ModelBackend>, defaults: PromptOptions) -> Self {
        Self {
            backend,
            defaults,
            sessions: HashMap::new(),
        }
    }

    /// Start a new empty session with the default options
    pub fn create(&mut self) -> Uuid {
        self.create_with(self.defaults.clone())
    }

    pub fn create_with(&mut self, options: PromptOptions) -> Uuid {
        let session = ConversationSession::new(self.backend.clone(), options);
        let id = session.id();
        self.sessions.insert(id, session);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<&ConversationSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut ConversationSession> {
        self.sessions.get_mut(id)
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<ConversationSession> {
        self.sessions.remove(id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelErrorKind;
    use crate::llm::testing::ScriptedBackend;

    fn session_with(backend: Arc<ScriptedBackend>, mode: PromptMode) -> ConversationSession {
        ConversationSession::new(
            backend,
            PromptOptions {
                mode,
                ..PromptOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn advanced_answer_is_sliced_out() {
        let backend = Arc::new(ScriptedBackend::new().reply("🚀 Advanced: Overfitting occurs when..."));
        let mut session = session_with(backend.clone(), PromptMode::MultiLevel);
        session.set_level(Level::Advanced);

        let turn = session.submit("What is overfitting?").await.unwrap().unwrap();

        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "Overfitting occurs when...");
        assert_eq!(session.len(), 2);
        assert_eq!(session.turns()[0].content, "What is overfitting?");
    }

    #[tokio::test]
    async fn model_failure_keeps_only_the_user_turn() {
        let backend = Arc::new(ScriptedBackend::new().fail(ModelError::from_status(500, "boom")));
        let mut session = session_with(backend, PromptMode::MultiLevel);

        let err = session.submit("test").await.unwrap_err();

        assert_eq!(err.kind, ModelErrorKind::Server);
        assert_eq!(session.len(), 1);
        assert_eq!(session.turns()[0].role, Role::User);
    }

    #[tokio::test]
    async fn session_stays_usable_after_failure() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .fail(ModelError::network("timeout"))
                .reply("second try"),
        );
        let mut session = session_with(backend.clone(), PromptMode::SingleLevel);

        assert!(session.submit("first").await.is_err());
        let turn = session.submit("again").await.unwrap().unwrap();

        assert_eq!(turn.content, "second try");
        assert_eq!(session.len(), 3);
        // The orphaned user turn is still sent as history.
        let sent = &backend.requests()[1].messages;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1], LlmMessage::user("first"));
    }

    #[tokio::test]
    async fn blank_question_is_a_no_op() {
        let backend = Arc::new(ScriptedBackend::new().reply("unused"));
        let mut session = session_with(backend.clone(), PromptMode::MultiLevel);

        assert!(session.submit("   ").await.unwrap().is_none());
        assert!(session.submit("\n\t").await.unwrap().is_none());

        assert!(session.is_empty());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn question_is_stored_trimmed() {
        let backend = Arc::new(ScriptedBackend::new().reply("fine"));
        let mut session = session_with(backend.clone(), PromptMode::SingleLevel);

        session.submit("  what is a p-value?\n").await.unwrap();

        assert_eq!(session.turns()[0].content, "what is a p-value?");
        let sent = &backend.requests()[0].messages;
        assert_eq!(sent.last().unwrap(), &LlmMessage::user("what is a p-value?"));
    }

    #[tokio::test]
    async fn request_is_system_then_history_then_question() {
        let backend = Arc::new(ScriptedBackend::new().reply("one").reply("two"));
        let mut session = session_with(backend.clone(), PromptMode::SingleLevel);
        session.set_level(Level::Intermediate);

        session.submit("q1").await.unwrap();
        session.submit("q2").await.unwrap();

        let request = &backend.requests()[1];
        assert_eq!(
            request.messages,
            vec![
                LlmMessage::system("Provide responses at a Intermediate level."),
                LlmMessage::user("q1"),
                LlmMessage::assistant("one"),
                LlmMessage::user("q2"),
            ]
        );
        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, None);
    }

    #[tokio::test]
    async fn max_tokens_is_forwarded_when_set() {
        let backend = Arc::new(ScriptedBackend::new().reply("short"));
        let mut session = ConversationSession::new(
            backend.clone(),
            PromptOptions {
                max_tokens: Some(256),
                ..PromptOptions::default()
            },
        );

        session.submit("q").await.unwrap();
        assert_eq!(backend.requests()[0].max_tokens, Some(256));
    }

    #[tokio::test]
    async fn single_level_stores_reply_verbatim() {
        let raw = "🔰 Beginner: simple\n📚 Intermediate: deeper";
        let backend = Arc::new(ScriptedBackend::new().reply(raw));
        let mut session = session_with(backend, PromptMode::SingleLevel);

        let turn = session.submit("q").await.unwrap().unwrap();
        assert_eq!(turn.content, raw);
    }

    #[tokio::test]
    async fn multi_level_miss_falls_back_to_full_reply() {
        let backend = Arc::new(ScriptedBackend::new().reply("No labels here at all"));
        let mut session = session_with(backend, PromptMode::MultiLevel);

        let turn = session.submit("q").await.unwrap().unwrap();
        assert_eq!(turn.content, "No labels here at all");
    }

    #[tokio::test]
    async fn level_change_does_not_touch_stored_turns() {
        let raw = "🔰 Beginner: easy\n📚 Intermediate: medium\n🚀 Advanced: hard";
        let backend = Arc::new(ScriptedBackend::new().reply(raw).reply(raw));
        let mut session = session_with(backend.clone(), PromptMode::MultiLevel);

        session.submit("q1").await.unwrap();
        session.set_level(Level::Advanced);
        session.submit("q2").await.unwrap();

        assert_eq!(session.turns()[1].content, "easy");
        assert_eq!(session.turns()[3].content, "hard");
        let system = &backend.requests()[1].messages[0];
        assert_eq!(system.role, "system");
        assert!(system.content.contains(Level::Advanced.marker()));
    }

    #[tokio::test]
    async fn reset_clears_transcript_but_keeps_level() {
        let backend = Arc::new(ScriptedBackend::new().reply("a"));
        let mut session = session_with(backend, PromptMode::SingleLevel);
        session.set_level(Level::Advanced);
        session.submit("q").await.unwrap();

        session.reset();
        assert!(session.is_empty());
        assert_eq!(session.level(), Level::Advanced);

        session.reset();
        assert!(session.is_empty());
        assert_eq!(session.level(), Level::Advanced);
    }

    #[tokio::test]
    async fn export_labels_turns_in_order() {
        let backend = Arc::new(ScriptedBackend::new().reply("Mean is the average.").fail(ModelError::network("down")));
        let mut session = session_with(backend, PromptMode::SingleLevel);
        assert_eq!(session.export(), "");

        session.submit("What is a mean?").await.unwrap();
        let _ = session.submit("And a mode?").await;

        let expected = "User: What is a mean?\n\nAI: Mean is the average.\n\nUser: And a mode?\n";
        assert_eq!(session.export(), expected);
        assert_eq!(session.export(), session.export());
    }

    #[tokio::test]
    async fn save_export_writes_file() {
        let backend = Arc::new(ScriptedBackend::new().reply("hi"));
        let mut session = session_with(backend, PromptMode::SingleLevel);
        session.submit("hello").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.txt");
        session.save_export(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), session.export());
    }

    #[tokio::test]
    async fn manager_keeps_sessions_isolated() {
        let backend = Arc::new(ScriptedBackend::new().reply("for a"));
        let mut manager = SessionManager::new(backend, PromptOptions::default());
        let a = manager.create();
        let b = manager.create();
        assert_ne!(a, b);
        assert_eq!(manager.len(), 2);

        manager.get_mut(&b).unwrap().set_level(Level::Advanced);
        manager.get_mut(&a).unwrap().submit("question").await.unwrap();

        assert_eq!(manager.get(&a).unwrap().len(), 2);
        assert_eq!(manager.get(&a).unwrap().level(), Level::Beginner);
        assert!(manager.get(&b).unwrap().is_empty());
        assert_eq!(manager.get(&b).unwrap().level(), Level::Advanced);

        assert!(manager.remove(&a).is_some());
        assert!(manager.get(&a).is_none());
        assert!(!manager.is_empty());
    }
}
