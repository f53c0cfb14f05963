use storage::repository::{SessionRepository, StorageError};
use tutor_core::model::UserId;

/// Storage-backed rollups across a user's sessions.
pub(crate) struct ProgressQueries;

fn push_unique(titles: &mut Vec<String>, candidate: &str) {
    if !titles.iter().any(|t| t.eq_ignore_ascii_case(candidate)) {
        titles.push(candidate.to_string());
    }
}

impl ProgressQueries {
    /// Rolling set of concepts the user has touched: the current session's
    /// concept first, then every completed session's concept in start order.
    pub(crate) async fn covered_for_user(
        sessions: &dyn SessionRepository,
        user_id: &UserId,
        current_title: &str,
    ) -> Result<Vec<String>, StorageError> {
        let mut titles = vec![current_title.to_string()];
        for record in sessions.list_sessions_for_user(user_id).await? {
            if record.is_completed() {
                push_unique(&mut titles, record.concept.title());
            }
        }
        Ok(titles)
    }

    /// Titles of concepts the user has completed, in start order.
    pub(crate) async fn completed_for_user(
        sessions: &dyn SessionRepository,
        user_id: &UserId,
    ) -> Result<Vec<String>, StorageError> {
        let mut titles = Vec::new();
        for record in sessions.list_sessions_for_user(user_id).await? {
            if record.is_completed() {
                push_unique(&mut titles, record.concept.title());
            }
        }
        Ok(titles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::{InMemoryRepository, SessionRecord};
    use tutor_core::model::{
        Concept, ConceptId, ConceptKey, Difficulty, Question, Session, SessionId,
    };
    use tutor_core::time::fixed_now;

    fn record(user: &str, title: &str, total: usize, answered: usize) -> SessionRecord {
        let questions = (0..total)
            .map(|i| Question::new(format!("Q{i}"), Vec::new(), Difficulty::Medium).unwrap())
            .collect();
        let concept = Concept::new(
            ConceptId::new(1),
            ConceptKey::new(10, "Biology", title).unwrap(),
            questions,
            Vec::new(),
            Vec::new(),
        );
        let session = Session::start(SessionId::random(), UserId::new(user), concept, fixed_now());
        let mut record = SessionRecord::from_session(&session);
        record.next_question_index = answered;
        record
    }

    #[tokio::test]
    async fn covered_includes_current_and_completed_only() {
        let repo = InMemoryRepository::new();
        let user = UserId::new("u1");

        repo.create_session(&record("u1", "Respiration", 2, 2))
            .await
            .unwrap();
        repo.create_session(&record("u1", "Transpiration", 2, 1))
            .await
            .unwrap();

        let covered = ProgressQueries::covered_for_user(&repo, &user, "Photosynthesis")
            .await
            .unwrap();
        assert_eq!(covered, vec!["Photosynthesis", "Respiration"]);
    }

    #[tokio::test]
    async fn covered_deduplicates_current_concept() {
        let repo = InMemoryRepository::new();
        let user = UserId::new("u1");

        repo.create_session(&record("u1", "Photosynthesis", 2, 2))
            .await
            .unwrap();

        let covered = ProgressQueries::covered_for_user(&repo, &user, "Photosynthesis")
            .await
            .unwrap();
        assert_eq!(covered, vec!["Photosynthesis"]);
    }

    #[tokio::test]
    async fn completed_ignores_other_users() {
        let repo = InMemoryRepository::new();

        repo.create_session(&record("u1", "Respiration", 2, 2))
            .await
            .unwrap();
        repo.create_session(&record("u2", "Transpiration", 2, 2))
            .await
            .unwrap();

        let completed = ProgressQueries::completed_for_user(&repo, &UserId::new("u1"))
            .await
            .unwrap();
        assert_eq!(completed, vec!["Respiration"]);
    }
}
