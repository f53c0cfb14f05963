use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tutor_core::model::{
    Concept, Progress, Session, SessionError, SessionId, Turn, UserId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for a session row.
///
/// Carries the full concept snapshot so the bound question sequence survives
/// graph edits; mirrors the domain `Session` so repositories can
/// serialize/deserialize without leaking storage concerns into the domain
/// layer. Only `next_question_index` and `hint_level` ever change after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub concept: Concept,
    pub next_question_index: usize,
    pub hint_level: usize,
}

impl SessionRecord {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: session.id(),
            user_id: session.user_id().clone(),
            started_at: session.started_at(),
            concept: session.concept().clone(),
            next_question_index: session.next_question_index(),
            hint_level: session.hint_level(),
        }
    }

    /// Convert the record back into a domain `Session`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the persisted cursor violates the session
    /// invariants.
    pub fn into_session(self) -> Result<Session, SessionError> {
        Session::from_persisted(
            self.id,
            self.user_id,
            self.concept,
            self.next_question_index,
            self.hint_level,
            self.started_at,
        )
    }

    /// Whether the recorded cursor sits past the last question.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.next_question_index >= self.concept.total_questions()
    }
}

/// Persisted shape for the progress cache row.
///
/// A projection of the Turn log, rebuildable at any time; never treated as
/// authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub session_id: SessionId,
    pub questions_answered: usize,
    pub total_questions: usize,
    pub concepts_covered: Vec<String>,
    pub times_per_question: Vec<f64>,
}

impl ProgressRecord {
    #[must_use]
    pub fn from_progress(session_id: SessionId, progress: &Progress) -> Self {
        Self {
            session_id,
            questions_answered: progress.questions_answered,
            total_questions: progress.total_questions,
            concepts_covered: progress.concepts_covered.clone(),
            times_per_question: progress.times_per_question.clone(),
        }
    }
}

/// Repository contract for session rows.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a new session, creating the owning user row if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id already exists, or other
    /// storage errors.
    async fn create_session(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Fetch a session by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, StorageError>;

    /// Update the only mutable session fields: cursor and hint level.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn update_cursor(
        &self,
        id: SessionId,
        next_question_index: usize,
        hint_level: usize,
    ) -> Result<(), StorageError>;

    /// All sessions belonging to a user, ordered by start time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing cannot be read.
    async fn list_sessions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SessionRecord>, StorageError>;
}

/// Repository contract for the append-only turn log.
#[async_trait]
pub trait TurnRepository: Send + Sync {
    /// Append one turn to its session's log. Turns are never updated.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist, or
    /// other storage errors.
    async fn append_turn(&self, turn: &Turn) -> Result<(), StorageError>;

    /// Full turn log for a session, strictly in append order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be read.
    async fn list_turns(&self, session_id: SessionId) -> Result<Vec<Turn>, StorageError>;
}

/// Repository contract for the rebuildable progress cache.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert or replace the cached projection for a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// Fetch the cached projection, if one has been written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be read.
    async fn get_progress(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ProgressRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
    turns: Arc<Mutex<HashMap<SessionId, Vec<Turn>>>>,
    progress: Arc<Mutex<HashMap<SessionId, ProgressRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(&record.id) {
            return Err(StorageError::Conflict);
        }
        guard.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn update_cursor(
        &self,
        id: SessionId,
        next_question_index: usize,
        hint_level: usize,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let record = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        record.next_question_index = next_question_index;
        record.hint_level = hint_level;
        Ok(())
    }

    async fn list_sessions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<SessionRecord> = guard
            .values()
            .filter(|record| record.user_id == *user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.started_at, a.id).cmp(&(b.started_at, b.id)));
        Ok(found)
    }
}

#[async_trait]
impl TurnRepository for InMemoryRepository {
    async fn append_turn(&self, turn: &Turn) -> Result<(), StorageError> {
        {
            let sessions = self
                .sessions
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            if !sessions.contains_key(&turn.session_id) {
                return Err(StorageError::NotFound);
            }
        }
        let mut guard = self
            .turns
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.entry(turn.session_id).or_default().push(turn.clone());
        Ok(())
    }

    async fn list_turns(&self, session_id: SessionId) -> Result<Vec<Turn>, StorageError> {
        let guard = self
            .turns
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&session_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(record.session_id, record.clone());
        Ok(())
    }

    async fn get_progress(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&session_id).cloned())
    }
}

/// Aggregates the three repositories behind trait objects for easy backend
/// swapping. The engine never learns which backend is active.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub turns: Arc<dyn TurnRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let turns: Arc<dyn TurnRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self {
            sessions,
            turns,
            progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::model::{Concept, ConceptId, ConceptKey, Difficulty, Question};
    use tutor_core::time::fixed_now;

    fn build_record(user: &str) -> SessionRecord {
        let concept = Concept::new(
            ConceptId::new(1),
            ConceptKey::new(10, "Biology", "Photosynthesis").unwrap(),
            vec![Question::new("Q0", vec!["h".into()], Difficulty::Medium).unwrap()],
            vec!["Respiration".into()],
            Vec::new(),
        );
        let session = Session::start(
            SessionId::random(),
            UserId::new(user),
            concept,
            fixed_now(),
        );
        SessionRecord::from_session(&session)
    }

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let repo = InMemoryRepository::new();
        let record = build_record("u1");
        repo.create_session(&record).await.unwrap();

        let fetched = repo.get_session(record.id).await.unwrap();
        assert_eq!(fetched.user_id, UserId::new("u1"));
        let session = fetched.into_session().unwrap();
        assert_eq!(session.next_question_index(), 0);
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let repo = InMemoryRepository::new();
        let record = build_record("u1");
        repo.create_session(&record).await.unwrap();
        let err = repo.create_session(&record).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn turns_require_existing_session() {
        let repo = InMemoryRepository::new();
        let turn = Turn::question(SessionId::random(), "Q0", fixed_now());
        let err = repo.append_turn(&turn).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn turns_preserve_append_order() {
        let repo = InMemoryRepository::new();
        let record = build_record("u1");
        repo.create_session(&record).await.unwrap();

        for i in 0..4 {
            repo.append_turn(&Turn::question(record.id, format!("Q{i}"), fixed_now()))
                .await
                .unwrap();
        }

        let turns = repo.list_turns(record.id).await.unwrap();
        let texts: Vec<&str> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Q0", "Q1", "Q2", "Q3"]);
    }

    #[tokio::test]
    async fn cursor_update_is_scoped_to_mutable_fields() {
        let repo = InMemoryRepository::new();
        let record = build_record("u1");
        repo.create_session(&record).await.unwrap();

        repo.update_cursor(record.id, 1, 0).await.unwrap();
        let fetched = repo.get_session(record.id).await.unwrap();
        assert_eq!(fetched.next_question_index, 1);
        assert_eq!(fetched.started_at, record.started_at);
        assert_eq!(fetched.concept, record.concept);
    }

    #[tokio::test]
    async fn listing_filters_by_user() {
        let repo = InMemoryRepository::new();
        let a = build_record("u1");
        let b = build_record("u2");
        repo.create_session(&a).await.unwrap();
        repo.create_session(&b).await.unwrap();

        let found = repo.list_sessions_for_user(&UserId::new("u1")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);
    }
}
