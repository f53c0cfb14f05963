//! Prompt templates for the generation collaborator.

use tutor_core::model::{Concept, Question};

/// Ask for an adaptive follow-up in place of a seed question.
///
/// The seed question is included so a degraded model answer still lands near
/// the intended ground; the engine falls back to the seed verbatim anyway if
/// parsing fails.
pub(crate) fn follow_up_question(concept: &Concept, seed: &Question) -> String {
    format!(
        "You are a Socratic tutor for class {grade} {subject}.\n\
         Concept: {title}\n\
         The next planned question is: \"{seed}\"\n\
         Rephrase it as a Socratic question that encourages reasoning, \
         keeping the same learning goal.\n\
         Respond as JSON: {{\"question\": \"...\", \"hint\": \"\", \"follow_up\": \"\"}}",
        grade = concept.class_grade(),
        subject = concept.subject(),
        title = concept.title(),
        seed = seed.text(),
    )
}

/// Ask for a context-aware hint for the current question.
pub(crate) fn hint(concept: &Concept, question: &Question, hint_level: usize) -> String {
    format!(
        "You are a Socratic tutor for class {grade} {subject}.\n\
         Concept: {title}\n\
         Question: \"{question}\"\n\
         The learner has already received {hint_level} hint(s). Give one more \
         hint, slightly more revealing than the last, without giving the \
         answer away.\n\
         Respond as JSON: {{\"hint\": \"...\"}}",
        grade = concept.class_grade(),
        subject = concept.subject(),
        title = concept.title(),
        question = question.text(),
    )
}

/// Ask for an end-of-concept reflection summary.
pub(crate) fn summary(concept: &Concept, answers: &[String]) -> String {
    format!(
        "You are a Socratic tutor for class {grade} {subject}.\n\
         The learner just finished the concept \"{title}\".\n\
         Their answers, in order: {answers:?}\n\
         Write a short encouraging summary of what they understood and list \
         up to three focus areas to revisit.\n\
         Respond as JSON: {{\"summary\": \"...\", \"focus_areas\": [\"...\"]}}",
        grade = concept.class_grade(),
        subject = concept.subject(),
        title = concept.title(),
    )
}
