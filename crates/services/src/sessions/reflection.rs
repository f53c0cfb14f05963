use std::sync::Arc;
use std::time::Duration;

use tutor_core::model::{Progress, Session, Turn, TurnKind};

use super::dto::ReflectionReply;
use crate::generation::{TextGenerator, parsing, prompts};

/// Suggested next concepts are capped so the learner gets a nudge, not a
/// syllabus.
pub(crate) const SUGGESTION_CAP: usize = 3;

/// Derives the end-of-concept reflection from the accumulated turn log.
///
/// Aggregation is owned here; the collaborator only ever dresses it up. When
/// the collaborator fails, times out, or is absent, the templated summary
/// built from the counts goes out instead, so the operation never hard-fails.
pub(crate) struct ReflectionService {
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl ReflectionService {
    pub(crate) fn new(generator: Option<Arc<dyn TextGenerator>>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub(crate) async fn build(
        &self,
        session: &Session,
        turns: &[Turn],
        completed_concepts: &[String],
    ) -> ReflectionReply {
        let answers: Vec<String> = turns
            .iter()
            .filter(|turn| turn.kind == TurnKind::Answer && !turn.text.trim().is_empty())
            .map(|turn| turn.text.clone())
            .collect();
        let hints_used = turns
            .iter()
            .filter(|turn| turn.kind == TurnKind::Hint)
            .count();
        let progress = Progress::from_turns(session.total_questions(), Vec::new(), turns);

        let (summary_text, focus_areas) = match self.generated_summary(session, &answers).await {
            Some(generated) => generated,
            None => (
                fallback_summary(session.concept().title(), &progress, hints_used),
                Vec::new(),
            ),
        };

        ReflectionReply {
            summary_text,
            focus_areas,
            suggested_next_concepts: suggest_next(session.concept().related(), completed_concepts),
        }
    }

    async fn generated_summary(
        &self,
        session: &Session,
        answers: &[String],
    ) -> Option<(String, Vec<String>)> {
        let generator = self.generator.as_ref()?;
        let prompt = prompts::summary(session.concept(), answers);
        match tokio::time::timeout(self.timeout, generator.generate(&prompt)).await {
            Ok(Ok(raw)) => match parsing::parse_summary(&raw) {
                Ok(parsed) => Some((parsed.summary, parsed.focus_areas)),
                Err(err) => {
                    tracing::debug!(error = %err, "discarding unparsable generated summary");
                    None
                }
            },
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "summary generation failed, using templated summary");
                None
            }
            Err(_) => {
                tracing::warn!("summary generation timed out, using templated summary");
                None
            }
        }
    }
}

fn fallback_summary(concept_title: &str, progress: &Progress, hints_used: usize) -> String {
    let mut summary = format!(
        "During '{concept_title}', you worked through {answered} of {total} questions and used {hints_used} hint(s).",
        answered = progress.questions_answered,
        total = progress.total_questions,
    );
    if !progress.times_per_question.is_empty() {
        summary.push_str(&format!(
            " You averaged {:.0} seconds per answer.",
            progress.avg_time_per_question
        ));
    }
    summary
}

/// Related concepts minus the ones already completed, declared order, capped.
fn suggest_next(related: &[String], completed: &[String]) -> Vec<String> {
    let mut suggestions: Vec<String> = Vec::new();
    for title in related {
        let already_completed = completed.iter().any(|c| c.eq_ignore_ascii_case(title));
        let already_suggested = suggestions.iter().any(|s| s.eq_ignore_ascii_case(title));
        if !already_completed && !already_suggested {
            suggestions.push(title.clone());
        }
        if suggestions.len() == SUGGESTION_CAP {
            break;
        }
    }
    suggestions
}
