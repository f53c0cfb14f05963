use sqlx::Row;
use tutor_core::model::SessionId;

use super::SqliteRepository;
use super::mapping::{conn, from_json, i64_from_usize, ser, session_id_from_str, to_json, usize_from_i64};
use crate::repository::{ProgressRecord, ProgressRepository, StorageError};

fn map_progress_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProgressRecord, StorageError> {
    let session_id = session_id_from_str(&row.try_get::<String, _>("session_id").map_err(ser)?)?;
    let questions_answered = usize_from_i64(
        "questions_answered",
        row.try_get::<i64, _>("questions_answered").map_err(ser)?,
    )?;
    let total_questions = usize_from_i64(
        "total_questions",
        row.try_get::<i64, _>("total_questions").map_err(ser)?,
    )?;
    let concepts_covered: Vec<String> =
        from_json(&row.try_get::<String, _>("concepts_covered").map_err(ser)?)?;
    let times_per_question: Vec<f64> =
        from_json(&row.try_get::<String, _>("times_per_question").map_err(ser)?)?;

    Ok(ProgressRecord {
        session_id,
        questions_answered,
        total_questions,
        concepts_covered,
        times_per_question,
    })
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO progress (
                    session_id, questions_answered, total_questions,
                    concepts_covered, times_per_question
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(session_id) DO UPDATE SET
                    questions_answered = excluded.questions_answered,
                    total_questions = excluded.total_questions,
                    concepts_covered = excluded.concepts_covered,
                    times_per_question = excluded.times_per_question
            ",
        )
        .bind(record.session_id.value().to_string())
        .bind(i64_from_usize("questions_answered", record.questions_answered)?)
        .bind(i64_from_usize("total_questions", record.total_questions)?)
        .bind(to_json(&record.concepts_covered)?)
        .bind(to_json(&record.times_per_question)?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_progress(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT session_id, questions_answered, total_questions,
                       concepts_covered, times_per_question
                FROM progress
                WHERE session_id = ?1
            ",
        )
        .bind(session_id.value().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }
}
