use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use services::concept_graph::ConceptGraph;
use services::error::GenerationError;
use services::generation::TextGenerator;
use services::sessions::{QuestionType, SessionEngine, StartRequest, TurnRequest};
use storage::repository::Storage;
use tutor_core::time::fixed_clock;

struct CannedGenerator {
    response: String,
}

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Ok(self.response.clone())
    }
}

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::EmptyResponse)
    }
}

struct SlowGenerator;

#[async_trait]
impl TextGenerator for SlowGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(r#"{"question": "too late"}"#.to_string())
    }
}

fn engine() -> SessionEngine {
    SessionEngine::new(
        fixed_clock(),
        Arc::new(ConceptGraph::builtin()),
        Storage::in_memory(),
    )
}

fn start_photosynthesis(user: &str) -> StartRequest {
    StartRequest {
        user_id: user.to_string(),
        class_grade: 10,
        subject: "Biology".to_string(),
        concept_title: "Photosynthesis".to_string(),
    }
}

async fn complete_concept(engine: &SessionEngine, user: &str, title: &str) {
    let started = engine
        .start(&StartRequest {
            user_id: user.to_string(),
            class_grade: 10,
            subject: "Biology".to_string(),
            concept_title: title.to_string(),
        })
        .await
        .unwrap();
    loop {
        let turn = engine.skip(started.session_id).await.unwrap();
        if turn.question_type == QuestionType::Completed {
            break;
        }
    }
}

#[tokio::test]
async fn reflection_uses_generated_summary_when_available() {
    let engine = engine().with_generator(Arc::new(CannedGenerator {
        response: r#"{"summary": "You reasoned well about light.", "focus_areas": ["glucose"]}"#
            .to_string(),
    }));

    let started = engine.start(&start_photosynthesis("u1")).await.unwrap();
    engine
        .submit_answer(&TurnRequest {
            session_id: started.session_id,
            user_answer: "sunlight and water".to_string(),
            time_spent_seconds: None,
        })
        .await
        .unwrap();

    let reflection = engine.get_reflection(started.session_id).await.unwrap();
    assert_eq!(reflection.summary_text, "You reasoned well about light.");
    assert_eq!(reflection.focus_areas, vec!["glucose"]);
}

#[tokio::test]
async fn reflection_falls_back_to_templated_summary() {
    let engine = engine().with_generator(Arc::new(FailingGenerator));

    let started = engine.start(&start_photosynthesis("u1")).await.unwrap();
    engine
        .submit_answer(&TurnRequest {
            session_id: started.session_id,
            user_answer: "sunlight".to_string(),
            time_spent_seconds: Some(9.0),
        })
        .await
        .unwrap();

    let reflection = engine.get_reflection(started.session_id).await.unwrap();
    assert!(reflection.summary_text.contains("Photosynthesis"));
    assert!(reflection.summary_text.contains("1 of 3"));
    assert!(reflection.focus_areas.is_empty());
}

#[tokio::test]
async fn reflection_never_suggests_completed_concepts() {
    let engine = engine();

    // the learner has already completed Respiration
    complete_concept(&engine, "u1", "Respiration").await;

    let started = engine.start(&start_photosynthesis("u1")).await.unwrap();
    let reflection = engine.get_reflection(started.session_id).await.unwrap();

    assert!(
        !reflection
            .suggested_next_concepts
            .iter()
            .any(|s| s.eq_ignore_ascii_case("Respiration"))
    );
    assert_eq!(
        reflection.suggested_next_concepts,
        vec!["Transpiration", "Carbon Cycle"]
    );
}

#[tokio::test]
async fn adaptive_question_replaces_seed_text() {
    let engine = engine().with_generator(Arc::new(CannedGenerator {
        response: r#"{"question": "Where exactly does the light go once a leaf catches it?"}"#
            .to_string(),
    }));

    let started = engine.start(&start_photosynthesis("u1")).await.unwrap();
    let turn = engine
        .submit_answer(&TurnRequest {
            session_id: started.session_id,
            user_answer: "sunlight".to_string(),
            time_spent_seconds: None,
        })
        .await
        .unwrap();

    assert_eq!(
        turn.question.as_deref(),
        Some("Where exactly does the light go once a leaf catches it?")
    );
}

#[tokio::test]
async fn failed_generation_falls_back_to_seed_question() {
    let engine = engine().with_generator(Arc::new(FailingGenerator));

    let started = engine.start(&start_photosynthesis("u1")).await.unwrap();
    let turn = engine
        .submit_answer(&TurnRequest {
            session_id: started.session_id,
            user_answer: "sunlight".to_string(),
            time_spent_seconds: None,
        })
        .await
        .unwrap();

    assert_eq!(
        turn.question.as_deref(),
        Some("Why does photosynthesis mostly happen in the leaves?")
    );
}

#[tokio::test]
async fn slow_generation_times_out_to_seed_question() {
    let engine = engine()
        .with_generator(Arc::new(SlowGenerator))
        .with_generation_timeout(Duration::from_millis(50));

    let started = engine.start(&start_photosynthesis("u1")).await.unwrap();
    let turn = engine
        .submit_answer(&TurnRequest {
            session_id: started.session_id,
            user_answer: "sunlight".to_string(),
            time_spent_seconds: None,
        })
        .await
        .unwrap();

    assert_eq!(
        turn.question.as_deref(),
        Some("Why does photosynthesis mostly happen in the leaves?")
    );
}

#[tokio::test]
async fn adaptive_hint_falls_back_to_ladder_on_failure() {
    let engine = engine().with_generator(Arc::new(FailingGenerator));

    let started = engine.start(&start_photosynthesis("u1")).await.unwrap();
    let hint = engine.get_hint(started.session_id).await.unwrap();
    assert_eq!(
        hint.hint,
        "Think about what reaches the leaves from above and from below."
    );
}

#[tokio::test]
async fn adaptive_hint_is_used_when_parseable() {
    let engine = engine().with_generator(Arc::new(CannedGenerator {
        response: r#"{"hint": "You mentioned water; how does it reach the leaf?"}"#.to_string(),
    }));

    let started = engine.start(&start_photosynthesis("u1")).await.unwrap();
    let hint = engine.get_hint(started.session_id).await.unwrap();
    assert_eq!(hint.hint, "You mentioned water; how does it reach the leaf?");
}
