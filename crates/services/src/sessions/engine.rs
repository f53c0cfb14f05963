use std::sync::Arc;
use std::time::Duration;

use storage::repository::{
    ProgressRecord, ProgressRepository, SessionRecord, SessionRepository, Storage, TurnRepository,
};
use tutor_core::Clock;
use tutor_core::model::{Progress, Question, Session, SessionId, Turn, UserId};

use super::dto::{
    ConceptListItem, DialogueReply, HintReply, ProgressReply, QuestionType, ReflectionReply,
    StartReply, StartRequest, TurnReply, TurnRequest,
};
use super::locks::SessionLocks;
use super::progress::ProgressQueries;
use super::reflection::ReflectionService;
use crate::concept_graph::ConceptGraph;
use crate::error::{EngineError, ValidationError};
use crate::generation::{TextGenerator, parsing, prompts};

/// Completion marker text, also surfaced by the original dialogue flow.
const COMPLETION_TEXT: &str = "All questions completed. Fetch reflection.";

/// Served when a concept carries no questions to hint about.
const NO_HINTS_TEXT: &str = "No hints available.";

const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(10);

enum AdvanceKind {
    Answer {
        text: String,
        time_spent: Option<f64>,
    },
    Skip,
}

/// The session state machine.
///
/// Owns session lifecycle, question sequencing, hint-level progression, and
/// progress derivation. Talks only to the injected concept graph, storage
/// backend, and optional generation collaborator; never to the network or a
/// UI. Operations on one session are serialized through [`SessionLocks`];
/// collaborator calls happen strictly outside the per-session critical
/// section and fall back to static seed data on any failure.
#[derive(Clone)]
pub struct SessionEngine {
    clock: Clock,
    graph: Arc<ConceptGraph>,
    storage: Storage,
    generator: Option<Arc<dyn TextGenerator>>,
    generation_timeout: Duration,
    locks: SessionLocks,
}

impl SessionEngine {
    #[must_use]
    pub fn new(clock: Clock, graph: Arc<ConceptGraph>, storage: Storage) -> Self {
        Self {
            clock,
            graph,
            storage,
            generator: None,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            locks: SessionLocks::new(),
        }
    }

    /// Attach an adaptive-generation collaborator.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Bound every collaborator call by this timeout.
    #[must_use]
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Concepts available for a class/subject pair, in graph order.
    #[must_use]
    pub fn list_concepts(&self, class_grade: u8, subject: &str) -> Vec<ConceptListItem> {
        self.graph
            .list_concepts(class_grade, subject)
            .into_iter()
            .map(|concept| ConceptListItem {
                id: concept.id(),
                title: concept.title().to_string(),
            })
            .collect()
    }

    /// Start a session: bind a concept snapshot and pose its first question.
    ///
    /// A concept with zero questions yields an already-completed session
    /// rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` for an unresolvable concept,
    /// `EngineError::Validation` for a blank user id, or a storage error.
    pub async fn start(&self, request: &StartRequest) -> Result<StartReply, EngineError> {
        if request.user_id.trim().is_empty() {
            return Err(ValidationError::EmptyUserId.into());
        }
        let concept = self
            .graph
            .resolve(request.class_grade, &request.subject, &request.concept_title)
            .ok_or(EngineError::NotFound)?;

        let now = self.clock.now();
        let session = Session::start(
            SessionId::random(),
            UserId::new(request.user_id.clone()),
            (*concept).clone(),
            now,
        );
        self.storage
            .sessions
            .create_session(&SessionRecord::from_session(&session))
            .await?;

        let reply = match session.current_question() {
            Some(question) => {
                self.storage
                    .turns
                    .append_turn(&Turn::question(session.id(), question.text(), now))
                    .await?;
                StartReply {
                    session_id: session.id(),
                    question: Some(question.text().to_string()),
                    question_type: QuestionType::Question,
                    concept_title: session.concept().title().to_string(),
                }
            }
            None => {
                self.storage
                    .turns
                    .append_turn(&Turn::completion(session.id(), COMPLETION_TEXT, now))
                    .await?;
                StartReply {
                    session_id: session.id(),
                    question: None,
                    question_type: QuestionType::Completed,
                    concept_title: session.concept().title().to_string(),
                }
            }
        };

        self.refresh_progress(&session).await?;
        Ok(reply)
    }

    /// Record the learner's answer and advance to the next question.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for a blank answer (nothing is
    /// written), `EngineError::NotFound` for an unknown session,
    /// `EngineError::InvalidState` when the session is already completed.
    pub async fn submit_answer(&self, request: &TurnRequest) -> Result<TurnReply, EngineError> {
        if request.user_answer.trim().is_empty() {
            return Err(ValidationError::EmptyAnswer.into());
        }
        self.advance(
            request.session_id,
            AdvanceKind::Answer {
                text: request.user_answer.clone(),
                time_spent: request.time_spent_seconds,
            },
        )
        .await
    }

    /// Advance past the current question without an answer.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` for an unknown session,
    /// `EngineError::InvalidState` when the session is already completed.
    pub async fn skip(&self, session_id: SessionId) -> Result<TurnReply, EngineError> {
        self.advance(session_id, AdvanceKind::Skip).await
    }

    async fn advance(
        &self,
        session_id: SessionId,
        kind: AdvanceKind,
    ) -> Result<TurnReply, EngineError> {
        // Snapshot first: the collaborator call below must not run while the
        // per-session lock is held.
        let snapshot = self.load_session_snapshot(session_id).await?;
        if snapshot.is_completed() {
            return Err(EngineError::InvalidState {
                state: snapshot.state(),
            });
        }
        let expected_index = snapshot.next_question_index() + 1;
        let adaptive = self.adaptive_question(&snapshot, expected_index).await;

        let lock = self.locks.lock_for(session_id);
        let _guard = lock.lock_owned().await;

        let mut session = self.load_session(session_id).await?;
        if session.is_completed() {
            return Err(EngineError::InvalidState {
                state: session.state(),
            });
        }

        let now = self.clock.now();
        match kind {
            AdvanceKind::Answer { text, time_spent } => {
                let mut turn = Turn::answer(session_id, text, now);
                if let Some(seconds) = time_spent {
                    turn = turn.with_time_spent(seconds);
                }
                self.storage.turns.append_turn(&turn).await?;
            }
            AdvanceKind::Skip => {
                self.storage
                    .turns
                    .append_turn(&Turn::skip(session_id, now))
                    .await?;
            }
        }

        session.advance().map_err(|_| EngineError::InvalidState {
            state: session.state(),
        })?;
        self.storage
            .sessions
            .update_cursor(session_id, session.next_question_index(), session.hint_level())
            .await?;

        let reply = match session.current_question() {
            Some(question) => {
                // A stale adaptive question (another call advanced the cursor
                // in between) is discarded for the seed question of the index
                // actually current now.
                let text = if session.next_question_index() == expected_index {
                    adaptive.unwrap_or_else(|| question.text().to_string())
                } else {
                    question.text().to_string()
                };
                self.storage
                    .turns
                    .append_turn(&Turn::question(session_id, text.clone(), now))
                    .await?;
                TurnReply {
                    question: Some(text),
                    question_type: QuestionType::Question,
                }
            }
            None => {
                self.storage
                    .turns
                    .append_turn(&Turn::completion(session_id, COMPLETION_TEXT, now))
                    .await?;
                TurnReply {
                    question: None,
                    question_type: QuestionType::Completed,
                }
            }
        };

        self.refresh_progress(&session).await?;
        Ok(reply)
    }

    /// Serve the next hint for the current (or, once completed, last)
    /// question and deepen the hint level.
    ///
    /// Never fails for hint exhaustion: the ladder clamps to its last entry,
    /// an empty ladder falls back to phrasing-based guidance.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` for an unknown session.
    pub async fn get_hint(&self, session_id: SessionId) -> Result<HintReply, EngineError> {
        let snapshot = self.load_session_snapshot(session_id).await?;
        let adaptive = self.adaptive_hint(&snapshot).await;

        let lock = self.locks.lock_for(session_id);
        let _guard = lock.lock_owned().await;

        let mut session = self.load_session(session_id).await?;
        let now = self.clock.now();

        let Some(question) = session.current_or_last_question().cloned() else {
            self.storage
                .turns
                .append_turn(&Turn::hint(session_id, NO_HINTS_TEXT, now))
                .await?;
            return Ok(HintReply {
                hint: NO_HINTS_TEXT.to_string(),
            });
        };

        let ladder_index = session.take_hint();
        let static_hint = ladder_index
            .and_then(|index| question.hints().get(index).cloned())
            .unwrap_or_else(|| heuristic_hint(&question));

        let hint = match adaptive {
            Some(text) if session.next_question_index() == snapshot.next_question_index() => text,
            _ => static_hint,
        };

        self.storage
            .sessions
            .update_cursor(session_id, session.next_question_index(), session.hint_level())
            .await?;
        self.storage
            .turns
            .append_turn(&Turn::hint(session_id, hint.clone(), now))
            .await?;

        Ok(HintReply { hint })
    }

    /// Re-emit the current (or last) question verbatim and reset hint depth.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` for an unknown session,
    /// `EngineError::InvalidState` for a concept with no questions at all.
    pub async fn retry(&self, session_id: SessionId) -> Result<TurnReply, EngineError> {
        let lock = self.locks.lock_for(session_id);
        let _guard = lock.lock_owned().await;

        let mut session = self.load_session(session_id).await?;
        let Some(question) = session.current_or_last_question().cloned() else {
            return Err(EngineError::InvalidState {
                state: session.state(),
            });
        };

        session.reset_hints();
        self.storage
            .sessions
            .update_cursor(session_id, session.next_question_index(), session.hint_level())
            .await?;
        self.storage
            .turns
            .append_turn(&Turn::question(session_id, question.text(), self.clock.now()))
            .await?;

        Ok(TurnReply {
            question: Some(question.text().to_string()),
            question_type: QuestionType::Question,
        })
    }

    /// Recompute progress from the turn log and refresh the cached
    /// projection.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` for an unknown session.
    pub async fn get_progress(&self, session_id: SessionId) -> Result<ProgressReply, EngineError> {
        let (session, turns) = self.load_session_and_turns(session_id).await?;
        let progress = self.derive_progress(&session, &turns).await?;
        self.storage
            .progress
            .upsert_progress(&ProgressRecord::from_progress(session_id, &progress))
            .await?;

        Ok(ProgressReply {
            questions_answered: progress.questions_answered,
            total_questions: progress.total_questions,
            concepts_covered: progress.concepts_covered,
            total_time: progress.total_time_seconds,
            avg_time_per_question: progress.avg_time_per_question,
            times_per_question: progress.times_per_question,
        })
    }

    /// Summarize the session and suggest what to learn next.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` for an unknown session. Collaborator
    /// failures are absorbed into the templated fallback.
    pub async fn get_reflection(
        &self,
        session_id: SessionId,
    ) -> Result<ReflectionReply, EngineError> {
        let (session, turns) = self.load_session_and_turns(session_id).await?;
        let completed =
            ProgressQueries::completed_for_user(self.storage.sessions.as_ref(), session.user_id())
                .await?;

        let reflection = ReflectionService::new(self.generator.clone(), self.generation_timeout)
            .build(&session, &turns, &completed)
            .await;
        Ok(reflection)
    }

    /// The full ordered dialogue, for adapters rebuilding history.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` for an unknown session.
    pub async fn load_dialogue(&self, session_id: SessionId) -> Result<DialogueReply, EngineError> {
        let lock = self.locks.lock_for(session_id);
        let _guard = lock.lock_owned().await;

        // existence check keeps unknown ids a NotFound, not an empty log
        self.storage.sessions.get_session(session_id).await?;
        let turns = self.storage.turns.list_turns(session_id).await?;

        Ok(DialogueReply {
            turns: turns.into_iter().map(Into::into).collect(),
        })
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    async fn load_session(&self, session_id: SessionId) -> Result<Session, EngineError> {
        let record = self.storage.sessions.get_session(session_id).await?;
        record
            .into_session()
            .map_err(|err| EngineError::InvalidBinding(err.to_string()))
    }

    async fn load_session_snapshot(&self, session_id: SessionId) -> Result<Session, EngineError> {
        let lock = self.locks.lock_for(session_id);
        let _guard = lock.lock_owned().await;
        self.load_session(session_id).await
    }

    /// Session row and turn log read under the session lock, so the pair is
    /// a consistent snapshot even while writers are active.
    async fn load_session_and_turns(
        &self,
        session_id: SessionId,
    ) -> Result<(Session, Vec<Turn>), EngineError> {
        let lock = self.locks.lock_for(session_id);
        let _guard = lock.lock_owned().await;
        let session = self.load_session(session_id).await?;
        let turns = self.storage.turns.list_turns(session_id).await?;
        Ok((session, turns))
    }

    async fn derive_progress(
        &self,
        session: &Session,
        turns: &[Turn],
    ) -> Result<Progress, EngineError> {
        let covered = ProgressQueries::covered_for_user(
            self.storage.sessions.as_ref(),
            session.user_id(),
            session.concept().title(),
        )
        .await?;
        Ok(Progress::from_turns(
            session.total_questions(),
            covered,
            turns,
        ))
    }

    async fn refresh_progress(&self, session: &Session) -> Result<(), EngineError> {
        let turns = self.storage.turns.list_turns(session.id()).await?;
        let progress = self.derive_progress(session, &turns).await?;
        self.storage
            .progress
            .upsert_progress(&ProgressRecord::from_progress(session.id(), &progress))
            .await?;
        Ok(())
    }

    /// Best-effort adaptive follow-up for the question at `index`. `None` on
    /// any failure; the caller then uses the seed question.
    async fn adaptive_question(&self, session: &Session, index: usize) -> Option<String> {
        let generator = self.generator.as_ref()?;
        let seed = session.concept().question_at(index)?;
        let prompt = prompts::follow_up_question(session.concept(), seed);

        match tokio::time::timeout(self.generation_timeout, generator.generate(&prompt)).await {
            Ok(Ok(raw)) => match parsing::parse_question(&raw) {
                Ok(parsed) => Some(parsed.question),
                Err(err) => {
                    tracing::debug!(error = %err, "discarding unparsable generated question");
                    None
                }
            },
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "question generation failed, using seed question");
                None
            }
            Err(_) => {
                tracing::warn!("question generation timed out, using seed question");
                None
            }
        }
    }

    /// Best-effort context-aware hint; same fallback contract as questions.
    async fn adaptive_hint(&self, session: &Session) -> Option<String> {
        let generator = self.generator.as_ref()?;
        let question = session.current_or_last_question()?;
        let prompt = prompts::hint(session.concept(), question, session.hint_level());

        match tokio::time::timeout(self.generation_timeout, generator.generate(&prompt)).await {
            Ok(Ok(raw)) => match parsing::parse_hint(&raw) {
                Ok(parsed) => Some(parsed.hint),
                Err(err) => {
                    tracing::debug!(error = %err, "discarding unparsable generated hint");
                    None
                }
            },
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "hint generation failed, using hint ladder");
                None
            }
            Err(_) => {
                tracing::warn!("hint generation timed out, using hint ladder");
                None
            }
        }
    }
}

/// Guidance for questions that ship without a hint ladder, keyed on the
/// question phrasing.
fn heuristic_hint(question: &Question) -> String {
    let text = question.text().to_lowercase();
    if text.contains("why") {
        "Think about cause and effect: what causes this to happen and why?".to_string()
    } else if text.contains("what") || text.contains("define") {
        "Try to define the key term in your own words, step by step.".to_string()
    } else {
        "Try breaking the problem into smaller parts and describe one part at a time.".to_string()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
