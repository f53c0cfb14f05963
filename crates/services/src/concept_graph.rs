//! Read-only concept graph, loaded once at process start.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use tutor_core::model::{Concept, ConceptError, ConceptId, ConceptKey, Difficulty, Question};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConceptGraphError {
    #[error("concept graph could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Concept(#[from] ConceptError),
}

/// Seed file shape: a flat list of concepts, questions inline.
#[derive(Debug, Deserialize)]
struct SeedConcept {
    class: u8,
    subject: String,
    title: String,
    #[serde(default)]
    questions: Vec<SeedQuestion>,
    #[serde(default)]
    related: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SeedQuestion {
    question: String,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default)]
    difficulty: Difficulty,
}

/// Immutable lookup of concepts by (class grade, subject, title).
///
/// Loaded once, then shared read-only across all sessions; concurrent reads
/// need no locking. Concept ids are ordinals in seed order, which keeps
/// `list_concepts` output stable across process restarts.
pub struct ConceptGraph {
    concepts: Vec<Arc<Concept>>,
}

impl ConceptGraph {
    /// Parse a concept graph from its JSON seed document.
    ///
    /// # Errors
    ///
    /// Returns `ConceptGraphError` on malformed JSON or invalid concepts.
    pub fn from_json_str(json: &str) -> Result<Self, ConceptGraphError> {
        let seeds: Vec<SeedConcept> = serde_json::from_str(json)?;

        let mut concepts = Vec::with_capacity(seeds.len());
        for (ordinal, seed) in seeds.into_iter().enumerate() {
            let key = ConceptKey::new(seed.class, seed.subject, seed.title)?;
            let mut questions = Vec::with_capacity(seed.questions.len());
            for q in seed.questions {
                questions.push(Question::new(q.question, q.hints, q.difficulty)?);
            }
            concepts.push(Arc::new(Concept::new(
                ConceptId::new(ordinal as u64),
                key,
                questions,
                seed.related,
                seed.keywords,
            )));
        }

        Ok(Self { concepts })
    }

    /// The seed graph embedded in the crate.
    ///
    /// # Panics
    ///
    /// Panics if the embedded seed is invalid, which is a build defect rather
    /// than a runtime condition.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_json_str(include_str!("seed/concept_graph.json"))
            .expect("embedded seed graph should be valid")
    }

    /// Look up one concept, matching subject and title case-insensitively.
    #[must_use]
    pub fn resolve(&self, class_grade: u8, subject: &str, title: &str) -> Option<Arc<Concept>> {
        self.concepts
            .iter()
            .find(|concept| concept.key().matches(class_grade, subject, title))
            .cloned()
    }

    /// All concepts for a class/subject pair, in seed order.
    #[must_use]
    pub fn list_concepts(&self, class_grade: u8, subject: &str) -> Vec<Arc<Concept>> {
        self.concepts
            .iter()
            .filter(|concept| {
                concept.class_grade() == class_grade
                    && concept.subject().eq_ignore_ascii_case(subject)
            })
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_seed_parses() {
        let graph = ConceptGraph::builtin();
        assert!(!graph.is_empty());
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let graph = ConceptGraph::builtin();
        let concept = graph.resolve(10, "biology", "photosynthesis").unwrap();
        assert_eq!(concept.title(), "Photosynthesis");
        assert_eq!(concept.total_questions(), 3);
        assert!(concept.related().contains(&"Respiration".to_string()));
    }

    #[test]
    fn resolve_misses_return_none() {
        let graph = ConceptGraph::builtin();
        assert!(graph.resolve(10, "Biology", "Gravity").is_none());
        assert!(graph.resolve(12, "Biology", "Photosynthesis").is_none());
    }

    #[test]
    fn listing_is_stable_and_scoped() {
        let graph = ConceptGraph::builtin();
        let biology = graph.list_concepts(10, "Biology");
        let titles: Vec<&str> = biology.iter().map(|c| c.title()).collect();
        assert_eq!(titles, vec!["Photosynthesis", "Respiration", "Transpiration"]);

        // ids are seed ordinals, stable across loads
        let again = ConceptGraph::builtin();
        let reloaded = again.list_concepts(10, "Biology");
        for (a, b) in biology.iter().zip(reloaded.iter()) {
            assert_eq!(a.id(), b.id());
        }
    }

    #[test]
    fn zero_question_concepts_are_allowed() {
        let graph = ConceptGraph::from_json_str(
            r#"[{"class": 8, "subject": "History", "title": "Stub"}]"#,
        )
        .unwrap();
        let concept = graph.resolve(8, "History", "Stub").unwrap();
        assert_eq!(concept.total_questions(), 0);
    }

    #[test]
    fn malformed_seed_is_rejected() {
        assert!(ConceptGraph::from_json_str("not json").is_err());
        let blank_title = r#"[{"class": 8, "subject": "History", "title": "  "}]"#;
        assert!(ConceptGraph::from_json_str(blank_title).is_err());
    }
}
