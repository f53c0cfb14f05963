use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::SessionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TurnParseError {
    #[error("unknown speaker: {0}")]
    UnknownSpeaker(String),

    #[error("unknown turn kind: {0}")]
    UnknownKind(String),
}

//
// ─── SPEAKER ───────────────────────────────────────────────────────────────────
//

/// Who produced a dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The learner answering questions.
    Learner,
    /// The engine: questions, hints, and markers.
    System,
}

impl Speaker {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Speaker::Learner => "learner",
            Speaker::System => "system",
        }
    }
}

impl FromStr for Speaker {
    type Err = TurnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learner" => Ok(Self::Learner),
            "system" => Ok(Self::System),
            other => Err(TurnParseError::UnknownSpeaker(other.to_string())),
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── TURN KIND ─────────────────────────────────────────────────────────────────
//

/// Classification of a dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    /// A question posed to the learner.
    Question,
    /// The learner's answer.
    Answer,
    /// A hint served to the learner.
    Hint,
    /// Marker: the learner skipped the current question.
    Skip,
    /// Marker: the session reached the end of its question sequence.
    Completion,
}

impl TurnKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TurnKind::Question => "question",
            TurnKind::Answer => "answer",
            TurnKind::Hint => "hint",
            TurnKind::Skip => "skip",
            TurnKind::Completion => "completion",
        }
    }
}

impl FromStr for TurnKind {
    type Err = TurnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "question" => Ok(Self::Question),
            "answer" => Ok(Self::Answer),
            "hint" => Ok(Self::Hint),
            "skip" => Ok(Self::Skip),
            "completion" => Ok(Self::Completion),
            other => Err(TurnParseError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for TurnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── TURN ──────────────────────────────────────────────────────────────────────
//

/// One immutable entry in a session's dialogue log.
///
/// Turns are append-only: they are the historical record from which the
/// dialogue and all progress aggregates are reconstructed, so ordering is
/// strictly append order and entries are never edited after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub session_id: SessionId,
    pub speaker: Speaker,
    pub kind: TurnKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Seconds the learner spent before this turn; only set on learner turns.
    #[serde(default)]
    pub time_spent: Option<f64>,
}

impl Turn {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        speaker: Speaker,
        kind: TurnKind,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            speaker,
            kind,
            text: text.into(),
            timestamp,
            time_spent: None,
        }
    }

    #[must_use]
    pub fn with_time_spent(mut self, seconds: f64) -> Self {
        self.time_spent = Some(seconds);
        self
    }

    /// System turn posing a question.
    #[must_use]
    pub fn question(session_id: SessionId, text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(session_id, Speaker::System, TurnKind::Question, text, at)
    }

    /// Learner turn answering the current question.
    #[must_use]
    pub fn answer(session_id: SessionId, text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(session_id, Speaker::Learner, TurnKind::Answer, text, at)
    }

    /// System turn serving a hint.
    #[must_use]
    pub fn hint(session_id: SessionId, text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(session_id, Speaker::System, TurnKind::Hint, text, at)
    }

    /// Learner marker turn for a skipped question.
    #[must_use]
    pub fn skip(session_id: SessionId, at: DateTime<Utc>) -> Self {
        Self::new(session_id, Speaker::Learner, TurnKind::Skip, "(skipped)", at)
    }

    /// System marker turn closing out the question sequence.
    #[must_use]
    pub fn completion(session_id: SessionId, text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(session_id, Speaker::System, TurnKind::Completion, text, at)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn speaker_and_kind_roundtrip_as_str() {
        for speaker in [Speaker::Learner, Speaker::System] {
            assert_eq!(speaker.as_str().parse::<Speaker>().unwrap(), speaker);
        }
        for kind in [
            TurnKind::Question,
            TurnKind::Answer,
            TurnKind::Hint,
            TurnKind::Skip,
            TurnKind::Completion,
        ] {
            assert_eq!(kind.as_str().parse::<TurnKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_strings_are_rejected() {
        assert!("ai".parse::<Speaker>().is_err());
        assert!("reply".parse::<TurnKind>().is_err());
    }

    #[test]
    fn constructors_set_speaker_and_kind() {
        let id = SessionId::random();
        let now = fixed_now();

        let q = Turn::question(id, "Q0", now);
        assert_eq!(q.speaker, Speaker::System);
        assert_eq!(q.kind, TurnKind::Question);

        let a = Turn::answer(id, "sunlight", now).with_time_spent(12.5);
        assert_eq!(a.speaker, Speaker::Learner);
        assert_eq!(a.time_spent, Some(12.5));

        let s = Turn::skip(id, now);
        assert_eq!(s.kind, TurnKind::Skip);
        assert_eq!(s.speaker, Speaker::Learner);
    }
}
