use serde::{Deserialize, Serialize};

use crate::model::turn::{Turn, TurnKind};

/// Answer times derived from timestamps ignore gaps longer than this; the
/// learner most likely walked away rather than thought for an hour.
pub const MAX_ANSWER_GAP_SECS: f64 = 3600.0;

/// Aggregated view of a session's progress.
///
/// Derived, never authoritative: every field is recomputed from the Turn log,
/// so a persisted progress row is just a projection that can be rebuilt at
/// any time without drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Questions advanced past, by answer or by skip.
    pub questions_answered: usize,
    pub total_questions: usize,
    /// Rolling set of concept titles across the user's sessions.
    pub concepts_covered: Vec<String>,
    pub total_time_seconds: f64,
    pub avg_time_per_question: f64,
    /// Elapsed seconds per answered question, in answer order.
    pub times_per_question: Vec<f64>,
}

impl Progress {
    /// Recompute progress from a session's full Turn log.
    ///
    /// An answer's elapsed time is its explicit `time_spent` when the client
    /// supplied one, otherwise the delta from the preceding question turn,
    /// discarded when it exceeds [`MAX_ANSWER_GAP_SECS`]. Skip turns advance
    /// the answered count but contribute no time.
    #[must_use]
    pub fn from_turns(total_questions: usize, concepts_covered: Vec<String>, turns: &[Turn]) -> Self {
        let mut questions_answered = 0_usize;
        let mut times_per_question = Vec::new();
        let mut last_question_at = None;

        for turn in turns {
            match turn.kind {
                TurnKind::Question => last_question_at = Some(turn.timestamp),
                TurnKind::Answer => {
                    questions_answered += 1;
                    let elapsed = turn.time_spent.or_else(|| {
                        let asked_at = last_question_at?;
                        let secs = (turn.timestamp - asked_at).num_milliseconds() as f64 / 1000.0;
                        (secs >= 0.0 && secs < MAX_ANSWER_GAP_SECS).then_some(secs)
                    });
                    if let Some(secs) = elapsed {
                        times_per_question.push(secs);
                    }
                }
                TurnKind::Skip => questions_answered += 1,
                TurnKind::Hint | TurnKind::Completion => {}
            }
        }

        let total_time_seconds: f64 = times_per_question.iter().sum();
        let avg_time_per_question = if times_per_question.is_empty() {
            0.0
        } else {
            total_time_seconds / times_per_question.len() as f64
        };

        Self {
            questions_answered,
            total_questions,
            concepts_covered,
            total_time_seconds,
            avg_time_per_question,
            times_per_question,
        }
    }
}
