use quiz_core::model::{Quiz, QuizId, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    conn, decode_questions, encode_questions, insert_err, quiz_id_from_str, ser,
    user_id_from_i64, user_id_to_i64,
};
use crate::repository::{QuizRepository, StorageError};

fn map_quiz_row(row: &SqliteRow) -> Result<Quiz, StorageError> {
    let raw_questions: Option<String> = row.try_get("questions").map_err(ser)?;
    Ok(Quiz {
        id: quiz_id_from_str(&row.try_get::<String, _>("id").map_err(ser)?)?,
        creator: user_id_from_i64(row.try_get::<i64, _>("creator_id").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        questions: decode_questions(raw_questions.as_deref()),
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO quizzes (id, creator_id, title, questions, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(quiz.id.to_string())
        .bind(user_id_to_i64(quiz.creator)?)
        .bind(&quiz.title)
        .bind(encode_questions(&quiz.questions)?)
        .bind(quiz.created_at)
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;

        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, creator_id, title, questions, created_at
                FROM quizzes
                WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_quiz_row).transpose()
    }

    async fn list_quizzes_by_creator(&self, creator: UserId) -> Result<Vec<Quiz>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, creator_id, title, questions, created_at
                FROM quizzes
                WHERE creator_id = ?1
                ORDER BY created_at DESC, id ASC
            ",
        )
        .bind(user_id_to_i64(creator)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_quiz_row).collect()
    }
}
