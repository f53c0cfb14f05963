use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tutor_core::model::{SessionId, Turn, UserId};

use crate::repository::{
    ProgressRecord, ProgressRepository, SessionRecord, SessionRepository, Storage, StorageError,
    TurnRepository,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlatFileInitError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Everything the store knows about one session, kept together so a single
/// document write captures a consistent snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    record: SessionRecord,
    #[serde(default)]
    turns: Vec<Turn>,
    #[serde(default)]
    progress: Option<ProgressRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FlatFileState {
    sessions: BTreeMap<String, StoredSession>,
}

/// Flat-file fallback store: one JSON document, rewritten atomically on every
/// mutation (temp file in the same directory, fsync, rename). Crash-safe in
/// the sense that readers only ever observe a complete old or complete new
/// document, never a torn write.
#[derive(Clone)]
pub struct FlatFileRepository {
    path: PathBuf,
    state: Arc<Mutex<FlatFileState>>,
}

impl FlatFileRepository {
    /// Open the store, loading any existing document at `path`.
    ///
    /// # Errors
    ///
    /// Returns `FlatFileInitError` if an existing document cannot be read or
    /// parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FlatFileInitError> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            FlatFileState::default()
        };
        Ok(Self {
            path,
            state: Arc::new(Mutex::new(state)),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, FlatFileState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn persist(&self, state: &FlatFileState) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");

        let io = |e: std::io::Error| StorageError::Connection(e.to_string());
        let mut file = fs::File::create(&tmp).map_err(io)?;
        file.write_all(json.as_bytes()).map_err(io)?;
        file.sync_all().map_err(io)?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(io)?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for FlatFileRepository {
    async fn create_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let key = record.id.to_string();
        if state.sessions.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        state.sessions.insert(
            key,
            StoredSession {
                record: record.clone(),
                turns: Vec::new(),
                progress: None,
            },
        );
        self.persist(&state)
    }

    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, StorageError> {
        let state = self.lock()?;
        state
            .sessions
            .get(&id.to_string())
            .map(|stored| stored.record.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn update_cursor(
        &self,
        id: SessionId,
        next_question_index: usize,
        hint_level: usize,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let stored = state
            .sessions
            .get_mut(&id.to_string())
            .ok_or(StorageError::NotFound)?;
        stored.record.next_question_index = next_question_index;
        stored.record.hint_level = hint_level;
        self.persist(&state)
    }

    async fn list_sessions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let state = self.lock()?;
        let mut found: Vec<SessionRecord> = state
            .sessions
            .values()
            .filter(|stored| stored.record.user_id == *user_id)
            .map(|stored| stored.record.clone())
            .collect();
        found.sort_by(|a, b| (a.started_at, a.id).cmp(&(b.started_at, b.id)));
        Ok(found)
    }
}

#[async_trait]
impl TurnRepository for FlatFileRepository {
    async fn append_turn(&self, turn: &Turn) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let stored = state
            .sessions
            .get_mut(&turn.session_id.to_string())
            .ok_or(StorageError::NotFound)?;
        stored.turns.push(turn.clone());
        self.persist(&state)
    }

    async fn list_turns(&self, session_id: SessionId) -> Result<Vec<Turn>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .sessions
            .get(&session_id.to_string())
            .map(|stored| stored.turns.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProgressRepository for FlatFileRepository {
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let stored = state
            .sessions
            .get_mut(&record.session_id.to_string())
            .ok_or(StorageError::NotFound)?;
        stored.progress = Some(record.clone());
        self.persist(&state)
    }

    async fn get_progress(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .sessions
            .get(&session_id.to_string())
            .and_then(|stored| stored.progress.clone()))
    }
}

impl Storage {
    /// Build a `Storage` backed by the flat-file store.
    ///
    /// # Errors
    ///
    /// Returns `FlatFileInitError` if an existing document cannot be loaded.
    pub fn flat_file(path: impl AsRef<Path>) -> Result<Self, FlatFileInitError> {
        let repo = FlatFileRepository::open(path.as_ref())?;
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let turns: Arc<dyn TurnRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Ok(Self {
            sessions,
            turns,
            progress,
        })
    }
}
