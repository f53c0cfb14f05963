use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ConceptId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConceptError {
    #[error("concept title cannot be empty")]
    EmptyTitle,

    #[error("concept subject cannot be empty")]
    EmptySubject,

    #[error("question text cannot be empty")]
    EmptyQuestionText,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Relative difficulty of a single question within a concept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// One Socratic question with its ordered hint ladder.
///
/// The hint ladder runs from least to most revealing; an empty ladder is
/// valid and means the engine falls back to generic guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    text: String,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default)]
    difficulty: Difficulty,
}

impl Question {
    /// Creates a new question.
    ///
    /// # Errors
    ///
    /// Returns `ConceptError::EmptyQuestionText` if the text is blank.
    pub fn new(
        text: impl Into<String>,
        hints: Vec<String>,
        difficulty: Difficulty,
    ) -> Result<Self, ConceptError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ConceptError::EmptyQuestionText);
        }
        Ok(Self {
            text,
            hints,
            difficulty,
        })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    /// Hint ladder entry for the given hint level, clamped to the last entry
    /// once the ladder is exhausted. `None` only when the ladder is empty.
    #[must_use]
    pub fn hint_at(&self, level: usize) -> Option<&str> {
        if self.hints.is_empty() {
            return None;
        }
        let index = level.min(self.hints.len() - 1);
        self.hints.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }
}

//
// ─── CONCEPT KEY ───────────────────────────────────────────────────────────────
//

/// Lookup identity of a concept: (class grade, subject, title).
///
/// Subject and title comparisons are case-insensitive; the stored casing is
/// what gets displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptKey {
    class_grade: u8,
    subject: String,
    title: String,
}

impl ConceptKey {
    /// Creates a concept key.
    ///
    /// # Errors
    ///
    /// Returns `ConceptError` if subject or title is blank.
    pub fn new(
        class_grade: u8,
        subject: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, ConceptError> {
        let subject = subject.into();
        let title = title.into();
        if subject.trim().is_empty() {
            return Err(ConceptError::EmptySubject);
        }
        if title.trim().is_empty() {
            return Err(ConceptError::EmptyTitle);
        }
        Ok(Self {
            class_grade,
            subject,
            title,
        })
    }

    #[must_use]
    pub fn class_grade(&self) -> u8 {
        self.class_grade
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Case-insensitive match against a lookup triple.
    #[must_use]
    pub fn matches(&self, class_grade: u8, subject: &str, title: &str) -> bool {
        self.class_grade == class_grade
            && self.subject.eq_ignore_ascii_case(subject)
            && self.title.eq_ignore_ascii_case(title)
    }
}

//
// ─── CONCEPT ───────────────────────────────────────────────────────────────────
//

/// A topic unit: an ordered question sequence plus related-concept links.
///
/// Immutable after load. Sessions bind a snapshot of the question sequence at
/// start, so later edits to the graph never affect an in-flight session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    id: ConceptId,
    key: ConceptKey,
    questions: Vec<Question>,
    #[serde(default)]
    related: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

impl Concept {
    #[must_use]
    pub fn new(
        id: ConceptId,
        key: ConceptKey,
        questions: Vec<Question>,
        related: Vec<String>,
        keywords: Vec<String>,
    ) -> Self {
        Self {
            id,
            key,
            questions,
            related,
            keywords,
        }
    }

    #[must_use]
    pub fn id(&self) -> ConceptId {
        self.id
    }

    #[must_use]
    pub fn key(&self) -> &ConceptKey {
        &self.key
    }

    #[must_use]
    pub fn class_grade(&self) -> u8 {
        self.key.class_grade()
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        self.key.subject()
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.key.title()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Titles of related concepts, in declared order.
    #[must_use]
    pub fn related(&self) -> &[String] {
        &self.related
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str, hints: &[&str]) -> Question {
        Question::new(
            text,
            hints.iter().map(|h| (*h).to_string()).collect(),
            Difficulty::Medium,
        )
        .unwrap()
    }

    #[test]
    fn question_rejects_blank_text() {
        let err = Question::new("  ", Vec::new(), Difficulty::Easy).unwrap_err();
        assert_eq!(err, ConceptError::EmptyQuestionText);
    }

    #[test]
    fn hint_at_clamps_to_last_entry() {
        let q = question("What is light?", &["first", "second"]);
        assert_eq!(q.hint_at(0), Some("first"));
        assert_eq!(q.hint_at(1), Some("second"));
        assert_eq!(q.hint_at(7), Some("second"));
    }

    #[test]
    fn hint_at_empty_ladder_is_none() {
        let q = question("Why?", &[]);
        assert_eq!(q.hint_at(0), None);
    }

    #[test]
    fn key_matches_case_insensitively() {
        let key = ConceptKey::new(10, "Biology", "Photosynthesis").unwrap();
        assert!(key.matches(10, "biology", "PHOTOSYNTHESIS"));
        assert!(!key.matches(9, "Biology", "Photosynthesis"));
        assert!(!key.matches(10, "Physics", "Photosynthesis"));
    }

    #[test]
    fn key_rejects_blank_parts() {
        assert_eq!(
            ConceptKey::new(10, " ", "Photosynthesis").unwrap_err(),
            ConceptError::EmptySubject
        );
        assert_eq!(
            ConceptKey::new(10, "Biology", "").unwrap_err(),
            ConceptError::EmptyTitle
        );
    }
}
