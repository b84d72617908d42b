use async_trait::async_trait;
use quiz_core::model::{
    DailyResult, PointsTotal, QuizId, QuizInteraction, Quiz, Rating, UserId, UserQuizStat,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Per-user daily quiz stat: last completion, streak, failed day.
///
/// There is one logical writer per user per day. Two sessions completing at
/// the same moment can overwrite each other's update; adapters do not guard
/// against it.
#[async_trait]
pub trait UserStatRepository: Send + Sync {
    /// Load the stat for a user, or `None` if they never finished a quiz.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_stat(&self, user_id: UserId) -> Result<Option<UserQuizStat>, StorageError>;

    /// Insert or replace the stat for `stat.user_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the stat cannot be stored.
    async fn save_stat(&self, stat: &UserQuizStat) -> Result<(), StorageError>;
}

#[async_trait]
pub trait DailyResultRepository: Send + Sync {
    /// Append a result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user already has a result for
    /// that quiz day, or other storage errors.
    async fn append_result(&self, result: &DailyResult) -> Result<(), StorageError>;

    /// Most recent results for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_results(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<DailyResult>, StorageError>;

    /// Point totals per user, highest first, ties by user id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn points_totals(&self, limit: u32) -> Result<Vec<PointsTotal>, StorageError>;
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is taken, or other storage errors.
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError>;

    /// Quizzes authored by `creator`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_quizzes_by_creator(&self, creator: UserId) -> Result<Vec<Quiz>, StorageError>;
}

#[async_trait]
pub trait InteractionRepository: Send + Sync {
    /// Set the heart flag, keeping any rating. Returns the stored interaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the interaction cannot be stored.
    async fn set_hearted(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        hearted: bool,
    ) -> Result<QuizInteraction, StorageError>;

    /// Set the rating, keeping the heart flag. Returns the stored interaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the interaction cannot be stored.
    async fn set_rating(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        rating: Rating,
    ) -> Result<QuizInteraction, StorageError>;

    /// The user's interactions with any of `quiz_ids`. Missing ones are omitted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_interactions(
        &self,
        user_id: UserId,
        quiz_ids: &[QuizId],
    ) -> Result<Vec<QuizInteraction>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    stats: Arc<Mutex<HashMap<UserId, UserQuizStat>>>,
    results: Arc<Mutex<Vec<DailyResult>>>,
    quizzes: Arc<Mutex<HashMap<QuizId, Quiz>>>,
    interactions: Arc<Mutex<HashMap<(UserId, QuizId), QuizInteraction>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl UserStatRepository for InMemoryRepository {
    async fn load_stat(&self, user_id: UserId) -> Result<Option<UserQuizStat>, StorageError> {
        let guard = self.stats.lock().map_err(poisoned)?;
        Ok(guard.get(&user_id).cloned())
    }

    async fn save_stat(&self, stat: &UserQuizStat) -> Result<(), StorageError> {
        let mut guard = self.stats.lock().map_err(poisoned)?;
        guard.insert(stat.user_id, stat.clone());
        Ok(())
    }
}

#[async_trait]
impl DailyResultRepository for InMemoryRepository {
    async fn append_result(&self, result: &DailyResult) -> Result<(), StorageError> {
        let mut guard = self.results.lock().map_err(poisoned)?;
        if guard
            .iter()
            .any(|r| r.user_id == result.user_id && r.day == result.day)
        {
            return Err(StorageError::Conflict);
        }
        guard.push(result.clone());
        Ok(())
    }

    async fn list_results(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<DailyResult>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let mut found: Vec<_> = guard
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        found.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(found)
    }

    async fn points_totals(&self, limit: u32) -> Result<Vec<PointsTotal>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let mut by_user: HashMap<UserId, PointsTotal> = HashMap::new();
        for result in guard.iter() {
            let total = by_user.entry(result.user_id).or_insert(PointsTotal {
                user_id: result.user_id,
                total_points: 0,
                completions: 0,
            });
            total.total_points += u64::from(result.points);
            total.completions = total.completions.saturating_add(1);
        }

        let mut totals: Vec<_> = by_user.into_values().collect();
        totals.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then(a.user_id.cmp(&b.user_id))
        });
        totals.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(totals)
    }
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let mut guard = self.quizzes.lock().map_err(poisoned)?;
        if guard.contains_key(&quiz.id) {
            return Err(StorageError::Conflict);
        }
        guard.insert(quiz.id, quiz.clone());
        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_quizzes_by_creator(&self, creator: UserId) -> Result<Vec<Quiz>, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        let mut found: Vec<_> = guard
            .values()
            .filter(|q| q.creator == creator)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }
}

impl InMemoryRepository {
    fn update_interaction(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        apply: impl FnOnce(&mut QuizInteraction),
    ) -> Result<QuizInteraction, StorageError> {
        let mut guard = self.interactions.lock().map_err(poisoned)?;
        let entry = guard
            .entry((user_id, quiz_id))
            .or_insert_with(|| QuizInteraction::empty(user_id, quiz_id));
        apply(entry);
        Ok(*entry)
    }
}

#[async_trait]
impl InteractionRepository for InMemoryRepository {
    async fn set_hearted(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        hearted: bool,
    ) -> Result<QuizInteraction, StorageError> {
        self.update_interaction(user_id, quiz_id, |i| i.hearted = hearted)
    }

    async fn set_rating(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        rating: Rating,
    ) -> Result<QuizInteraction, StorageError> {
        self.update_interaction(user_id, quiz_id, |i| i.rating = rating)
    }

    async fn list_interactions(
        &self,
        user_id: UserId,
        quiz_ids: &[QuizId],
    ) -> Result<Vec<QuizInteraction>, StorageError> {
        let guard = self.interactions.lock().map_err(poisoned)?;
        Ok(quiz_ids
            .iter()
            .filter_map(|id| guard.get(&(user_id, *id)).copied())
            .collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub stats: Arc<dyn UserStatRepository>,
    pub results: Arc<dyn DailyResultRepository>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub interactions: Arc<dyn InteractionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            stats: Arc::new(repo.clone()),
            results: Arc::new(repo.clone()),
            quizzes: Arc::new(repo.clone()),
            interactions: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::DailySchedule;
    use quiz_core::model::{AuthoredQuestion, QuestionKind};
    use quiz_core::time::fixed_now;

    fn result(user: u64, days_ago: i64, points: u32) -> DailyResult {
        let at = fixed_now() - Duration::days(days_ago);
        DailyResult {
            user_id: UserId::new(user),
            day: DailySchedule::default().quiz_day(at),
            score: points / 10,
            points,
            completed_at: at,
        }
    }

    fn quiz(creator: u64, minutes: i64) -> Quiz {
        Quiz {
            id: QuizId::random(),
            creator: UserId::new(creator),
            title: format!("Quiz {minutes}"),
            questions: vec![AuthoredQuestion {
                kind: QuestionKind::Text,
                text: "Q".into(),
                media: None,
                options: vec!["a".into(), "b".into()],
                answer: 0,
            }],
            created_at: fixed_now() + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn stat_round_trips() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(7);
        assert!(repo.load_stat(user).await.unwrap().is_none());

        let mut stat = UserQuizStat::new(user);
        stat.record_completion(fixed_now(), &DailySchedule::default());
        repo.save_stat(&stat).await.unwrap();

        assert_eq!(repo.load_stat(user).await.unwrap(), Some(stat));
    }

    #[tokio::test]
    async fn duplicate_day_result_conflicts() {
        let repo = InMemoryRepository::new();
        repo.append_result(&result(1, 0, 50)).await.unwrap();
        let err = repo.append_result(&result(1, 0, 30)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn totals_sum_points_per_user() {
        let repo = InMemoryRepository::new();
        repo.append_result(&result(1, 0, 50)).await.unwrap();
        repo.append_result(&result(1, 1, 30)).await.unwrap();
        repo.append_result(&result(2, 0, 40)).await.unwrap();

        let totals = repo.points_totals(10).await.unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].user_id, UserId::new(1));
        assert_eq!(totals[0].total_points, 80);
        assert_eq!(totals[0].completions, 2);

        let recent = repo.list_results(UserId::new(1), 1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].points, 50);
    }

    #[tokio::test]
    async fn quizzes_list_newest_first() {
        let repo = InMemoryRepository::new();
        let older = quiz(3, 0);
        let newer = quiz(3, 5);
        repo.insert_quiz(&older).await.unwrap();
        repo.insert_quiz(&newer).await.unwrap();
        repo.insert_quiz(&quiz(4, 10)).await.unwrap();

        let mine = repo.list_quizzes_by_creator(UserId::new(3)).await.unwrap();
        let ids: Vec<_> = mine.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn heart_and_rating_do_not_clobber_each_other() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        let quiz_id = QuizId::random();

        repo.set_rating(user, quiz_id, Rating::new(4).unwrap())
            .await
            .unwrap();
        let after_heart = repo.set_hearted(user, quiz_id, true).await.unwrap();
        assert!(after_heart.hearted);
        assert_eq!(after_heart.rating.stars(), 4);

        let listed = repo
            .list_interactions(user, &[quiz_id, QuizId::random()])
            .await
            .unwrap();
        assert_eq!(listed, vec![after_heart]);
    }
}
