use quiz_core::model::{QuizId, QuizInteraction, Rating, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, quiz_id_from_str, ser, user_id_from_i64, user_id_to_i64};
use crate::repository::{InteractionRepository, StorageError};

fn map_interaction_row(row: &SqliteRow) -> Result<QuizInteraction, StorageError> {
    let stars: i64 = row.try_get("rating").map_err(ser)?;
    let stars = u8::try_from(stars).map_err(ser)?;
    Ok(QuizInteraction {
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        quiz_id: quiz_id_from_str(&row.try_get::<String, _>("quiz_id").map_err(ser)?)?,
        hearted: row.try_get::<i64, _>("hearted").map_err(ser)? != 0,
        rating: Rating::from_persisted(stars).map_err(ser)?,
    })
}

impl SqliteRepository {
    async fn get_interaction(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<QuizInteraction, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, quiz_id, hearted, rating
                FROM quiz_interactions
                WHERE user_id = ?1 AND quiz_id = ?2
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .bind(quiz_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_interaction_row(&row)
    }
}

#[async_trait::async_trait]
impl InteractionRepository for SqliteRepository {
    async fn set_hearted(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        hearted: bool,
    ) -> Result<QuizInteraction, StorageError> {
        sqlx::query(
            r"
                INSERT INTO quiz_interactions (user_id, quiz_id, hearted, rating)
                VALUES (?1, ?2, ?3, 0)
                ON CONFLICT(user_id, quiz_id) DO UPDATE SET hearted = excluded.hearted
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .bind(quiz_id.to_string())
        .bind(i64::from(hearted))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.get_interaction(user_id, quiz_id).await
    }

    async fn set_rating(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        rating: Rating,
    ) -> Result<QuizInteraction, StorageError> {
        sqlx::query(
            r"
                INSERT INTO quiz_interactions (user_id, quiz_id, hearted, rating)
                VALUES (?1, ?2, 0, ?3)
                ON CONFLICT(user_id, quiz_id) DO UPDATE SET rating = excluded.rating
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .bind(quiz_id.to_string())
        .bind(i64::from(rating.stars()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.get_interaction(user_id, quiz_id).await
    }

    async fn list_interactions(
        &self,
        user_id: UserId,
        quiz_ids: &[QuizId],
    ) -> Result<Vec<QuizInteraction>, StorageError> {
        if quiz_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
                SELECT user_id, quiz_id, hearted, rating
                FROM quiz_interactions
                WHERE user_id = ?1 AND quiz_id IN (
            ",
        );
        for i in 0..quiz_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 2).to_string());
        }
        sql.push(')');

        let mut query = sqlx::query(&sql).bind(user_id_to_i64(user_id)?);
        for id in quiz_ids {
            query = query.bind(id.to_string());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
        rows.iter().map(map_interaction_row).collect()
    }
}
