//! Typed request/response shapes for the operation contract.
//!
//! These are the only payloads an adapter exchanges with the engine; they are
//! validated at the boundary before any state is touched, and question text
//! is always server-authoritative (clients never choose the next question).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tutor_core::model::{ConceptId, SessionId, Speaker, Turn, TurnKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub user_id: String,
    pub class_grade: u8,
    pub subject: String,
    pub concept_title: String,
}

/// Whether a reply carries another question or marks the end of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Question,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartReply {
    pub session_id: SessionId,
    pub question: Option<String>,
    pub question_type: QuestionType,
    pub concept_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub session_id: SessionId,
    pub user_answer: String,
    #[serde(default)]
    pub time_spent_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    pub question: Option<String>,
    pub question_type: QuestionType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintReply {
    pub hint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReply {
    pub questions_answered: usize,
    pub total_questions: usize,
    pub concepts_covered: Vec<String>,
    pub total_time: f64,
    pub avg_time_per_question: f64,
    pub times_per_question: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionReply {
    pub summary_text: String,
    pub focus_areas: Vec<String>,
    pub suggested_next_concepts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptListItem {
    pub id: ConceptId,
    pub title: String,
}

/// One dialogue entry as exposed to adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnView {
    pub speaker: Speaker,
    pub kind: TurnKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub time_spent: Option<f64>,
}

impl From<Turn> for TurnView {
    fn from(turn: Turn) -> Self {
        Self {
            speaker: turn.speaker,
            kind: turn.kind,
            text: turn.text,
            timestamp: turn.timestamp,
            time_spent: turn.time_spent,
        }
    }
}

/// The full ordered dialogue of a session, the single authoritative way for
/// any adapter to rebuild history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueReply {
    pub turns: Vec<TurnView>,
}
