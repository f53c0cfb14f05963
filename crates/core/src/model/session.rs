use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

use crate::model::concept::{Concept, Question};
use crate::model::ids::{SessionId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("next question index {index} is out of range for {total} questions")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("session is already completed")]
    Completed,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle state of a session, derived from the cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    InProgress,
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::InProgress => f.write_str("in_progress"),
            SessionState::Completed => f.write_str("completed"),
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner's pass through one concept's question sequence.
///
/// The concept is a snapshot bound at start: edits to the live graph after
/// that point never change an in-flight session. `next_question_index` points
/// at the current unanswered question and equals the question count exactly
/// when the session is completed. `hint_level` is per-question: it only grows
/// while the cursor stands still, is clamped to the hint ladder length, and
/// resets to zero on every advance and on retry.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    concept: Concept,
    next_question_index: usize,
    hint_level: usize,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Creates a fresh session bound to a snapshot of the concept.
    #[must_use]
    pub fn start(id: SessionId, user_id: UserId, concept: Concept, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            concept,
            next_question_index: 0,
            hint_level: 0,
            started_at,
        }
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// The hint level is clamped to the current question's ladder length, the
    /// cursor must lie within `0..=total`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IndexOutOfRange` if the cursor exceeds the
    /// question count.
    pub fn from_persisted(
        id: SessionId,
        user_id: UserId,
        concept: Concept,
        next_question_index: usize,
        hint_level: usize,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let total = concept.total_questions();
        if next_question_index > total {
            return Err(SessionError::IndexOutOfRange {
                index: next_question_index,
                total,
            });
        }

        let mut session = Self {
            id,
            user_id,
            concept,
            next_question_index,
            hint_level: 0,
            started_at,
        };
        let max_level = session
            .current_or_last_question()
            .map_or(0, |q| q.hints().len());
        session.hint_level = hint_level.min(max_level);
        Ok(session)
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn concept(&self) -> &Concept {
        &self.concept
    }

    #[must_use]
    pub fn next_question_index(&self) -> usize {
        self.next_question_index
    }

    #[must_use]
    pub fn hint_level(&self) -> usize {
        self.hint_level
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.concept.total_questions()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.next_question_index >= self.total_questions()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.is_completed() {
            SessionState::Completed
        } else {
            SessionState::InProgress
        }
    }

    /// The current unanswered question, if the session is in progress.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.concept.question_at(self.next_question_index)
    }

    /// The current question, or the last one once the session is completed.
    ///
    /// Hint and retry stay answerable on a completed session for review; both
    /// address the final question then. `None` only for a concept with zero
    /// questions.
    #[must_use]
    pub fn current_or_last_question(&self) -> Option<&Question> {
        let total = self.total_questions();
        if total == 0 {
            return None;
        }
        let index = self.next_question_index.min(total - 1);
        self.concept.question_at(index)
    }

    /// Advance the cursor past the current question and reset the hint level.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if there is no question left to
    /// advance past.
    pub fn advance(&mut self) -> Result<SessionState, SessionError> {
        if self.is_completed() {
            return Err(SessionError::Completed);
        }
        self.next_question_index += 1;
        self.hint_level = 0;
        Ok(self.state())
    }

    /// Consume one hint level for the current (or last) question.
    ///
    /// Returns the ladder index to serve and bumps the level, clamped so it
    /// never exceeds the ladder length. `None` when the ladder is empty; the
    /// level is left untouched then.
    pub fn take_hint(&mut self) -> Option<usize> {
        let ladder_len = self.current_or_last_question()?.hints().len();
        if ladder_len == 0 {
            return None;
        }
        let index = self.hint_level.min(ladder_len - 1);
        self.hint_level = (self.hint_level + 1).min(ladder_len);
        Some(index)
    }

    /// Reset the hint level without moving the cursor (retry semantics).
    pub fn reset_hints(&mut self) {
        self.hint_level = 0;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::concept::{ConceptKey, Difficulty};
    use crate::model::ids::ConceptId;
    use crate::time::fixed_now;

    fn concept(question_hints: &[&[&str]]) -> Concept {
        let questions = question_hints
            .iter()
            .enumerate()
            .map(|(i, hints)| {
                Question::new(
                    format!("Q{i}"),
                    hints.iter().map(|h| (*h).to_string()).collect(),
                    Difficulty::Medium,
                )
                .unwrap()
            })
            .collect();
        Concept::new(
            ConceptId::new(1),
            ConceptKey::new(10, "Biology", "Photosynthesis").unwrap(),
            questions,
            vec!["Respiration".to_string()],
            Vec::new(),
        )
    }

    fn session(question_hints: &[&[&str]]) -> Session {
        Session::start(
            SessionId::random(),
            UserId::new("u1"),
            concept(question_hints),
            fixed_now(),
        )
    }

    #[test]
    fn cursor_advances_monotonically_to_completion() {
        let mut s = session(&[&[], &[], &[]]);
        assert_eq!(s.state(), SessionState::InProgress);

        assert_eq!(s.advance().unwrap(), SessionState::InProgress);
        assert_eq!(s.advance().unwrap(), SessionState::InProgress);
        assert_eq!(s.advance().unwrap(), SessionState::Completed);
        assert_eq!(s.next_question_index(), 3);

        let err = s.advance().unwrap_err();
        assert_eq!(err, SessionError::Completed);
        assert_eq!(s.next_question_index(), 3);
    }

    #[test]
    fn zero_question_concept_starts_completed() {
        let s = session(&[]);
        assert!(s.is_completed());
        assert_eq!(s.current_question(), None);
        assert_eq!(s.current_or_last_question(), None);
    }

    #[test]
    fn hint_level_clamps_and_resets_on_advance() {
        let mut s = session(&[&["h0", "h1"], &["x0"]]);

        assert_eq!(s.take_hint(), Some(0));
        assert_eq!(s.take_hint(), Some(1));
        // ladder exhausted: last entry repeats, level stays clamped
        assert_eq!(s.take_hint(), Some(1));
        assert_eq!(s.hint_level(), 2);

        s.advance().unwrap();
        assert_eq!(s.hint_level(), 0);
        assert_eq!(s.take_hint(), Some(0));
    }

    #[test]
    fn take_hint_on_empty_ladder_is_none() {
        let mut s = session(&[&[]]);
        assert_eq!(s.take_hint(), None);
        assert_eq!(s.hint_level(), 0);
    }

    #[test]
    fn hint_addresses_last_question_after_completion() {
        let mut s = session(&[&["only"]]);
        s.advance().unwrap();
        assert!(s.is_completed());
        assert_eq!(s.take_hint(), Some(0));
    }

    #[test]
    fn reset_hints_keeps_cursor() {
        let mut s = session(&[&["h0", "h1"]]);
        s.take_hint();
        s.take_hint();
        s.reset_hints();
        assert_eq!(s.hint_level(), 0);
        assert_eq!(s.next_question_index(), 0);
    }

    #[test]
    fn from_persisted_rejects_out_of_range_cursor() {
        let c = concept(&[&[], &[]]);
        let err = Session::from_persisted(
            SessionId::random(),
            UserId::new("u1"),
            c,
            3,
            0,
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::IndexOutOfRange { index: 3, total: 2 }));
    }

    #[test]
    fn from_persisted_clamps_hint_level() {
        let c = concept(&[&["h0"]]);
        let s = Session::from_persisted(
            SessionId::random(),
            UserId::new("u1"),
            c,
            0,
            9,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(s.hint_level(), 1);
    }
}
