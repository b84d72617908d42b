use std::sync::Arc;

use quiz_core::model::{Quiz, QuizDraft, QuizId, QuizInteraction, Rating, UserId};
use storage::repository::{InteractionRepository, QuizRepository};
use tracing::info;

use crate::Clock;
use crate::error::LibraryError;

/// A freshly stored quiz and the link to share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedQuiz {
    pub quiz: Quiz,
    pub share_link: String,
}

/// One of the user's quizzes with their own heart and rating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryItem {
    pub quiz: Quiz,
    pub hearted: bool,
    pub rating: Rating,
}

/// Publishing and managing user-authored quizzes.
#[derive(Clone)]
pub struct LibraryService {
    clock: Clock,
    share_base: String,
    quizzes: Arc<dyn QuizRepository>,
    interactions: Arc<dyn InteractionRepository>,
}

impl LibraryService {
    #[must_use]
    pub fn new(
        clock: Clock,
        share_base: impl Into<String>,
        quizzes: Arc<dyn QuizRepository>,
        interactions: Arc<dyn InteractionRepository>,
    ) -> Self {
        Self {
            clock,
            share_base: share_base.into(),
            quizzes,
            interactions,
        }
    }

    #[must_use]
    pub fn share_link(&self, id: QuizId) -> String {
        format!("{}/{id}", self.share_base.trim_end_matches('/'))
    }

    /// Validate and store a draft under a new id.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Draft` for the first invalid question, or
    /// `LibraryError::Storage` if the quiz cannot be stored.
    pub async fn create_quiz(
        &self,
        creator: UserId,
        draft: &QuizDraft,
    ) -> Result<PublishedQuiz, LibraryError> {
        let quiz = draft.publish(QuizId::random(), creator, self.clock.now())?;
        self.quizzes.insert_quiz(&quiz).await?;
        info!(quiz = %quiz.id, %creator, questions = quiz.questions.len(), "quiz published");

        let share_link = self.share_link(quiz.id);
        Ok(PublishedQuiz { quiz, share_link })
    }

    /// # Errors
    ///
    /// Returns `LibraryError::NotFound` if no quiz has that id.
    pub async fn get_quiz(&self, id: QuizId) -> Result<Quiz, LibraryError> {
        self.quizzes.get_quiz(id).await?.ok_or(LibraryError::NotFound)
    }

    /// Quizzes authored by `user`, newest first, with the user's interactions.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Storage` on repository failures.
    pub async fn my_quizzes(&self, user: UserId) -> Result<Vec<LibraryItem>, LibraryError> {
        let quizzes = self.quizzes.list_quizzes_by_creator(user).await?;
        let ids: Vec<QuizId> = quizzes.iter().map(|q| q.id).collect();
        let interactions = self.interactions.list_interactions(user, &ids).await?;

        Ok(quizzes
            .into_iter()
            .map(|quiz| {
                let mine = interactions
                    .iter()
                    .find(|i| i.quiz_id == quiz.id)
                    .copied()
                    .unwrap_or_else(|| QuizInteraction::empty(user, quiz.id));
                LibraryItem {
                    quiz,
                    hearted: mine.hearted,
                    rating: mine.rating,
                }
            })
            .collect())
    }

    /// Flip the user's heart on a quiz, keeping any rating.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::NotFound` for an unknown quiz.
    pub async fn toggle_heart(
        &self,
        user: UserId,
        quiz_id: QuizId,
    ) -> Result<QuizInteraction, LibraryError> {
        self.get_quiz(quiz_id).await?;
        let hearted = self
            .interactions
            .list_interactions(user, &[quiz_id])
            .await?
            .first()
            .is_some_and(|i| i.hearted);
        Ok(self.interactions.set_hearted(user, quiz_id, !hearted).await?)
    }

    /// Set a 1 to 5 star rating, keeping the heart.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Rating` for an invalid star count and
    /// `LibraryError::NotFound` for an unknown quiz.
    pub async fn rate(
        &self,
        user: UserId,
        quiz_id: QuizId,
        stars: u8,
    ) -> Result<QuizInteraction, LibraryError> {
        let rating = Rating::new(stars)?;
        self.get_quiz(quiz_id).await?;
        Ok(self.interactions.set_rating(user, quiz_id, rating).await?)
    }
}

#[cfg(test)]
mod tests {
    use quiz_core::model::DraftError;
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    use super::*;

    fn service() -> LibraryService {
        let repo = InMemoryRepository::new();
        LibraryService::new(
            Clock::fixed(fixed_now()),
            "https://farcaster.xyz/frame/quiz",
            Arc::new(repo.clone()),
            Arc::new(repo),
        )
    }

    fn valid_draft(title: &str) -> QuizDraft {
        let mut draft = QuizDraft::new();
        draft.set_title(title);
        let q = draft.question_mut(0).unwrap();
        q.text = "Largest planet?".into();
        for (i, name) in ["Mars", "Jupiter", "Venus", "Earth"].iter().enumerate() {
            q.set_option(i, *name);
        }
        q.answer = Some(1);
        draft
    }

    #[tokio::test]
    async fn publish_yields_share_link() {
        let svc = service();
        let published = svc
            .create_quiz(UserId::new(1), &valid_draft("Planets"))
            .await
            .unwrap();
        assert_eq!(
            published.share_link,
            format!("https://farcaster.xyz/frame/quiz/{}", published.quiz.id)
        );
        assert_eq!(svc.get_quiz(published.quiz.id).await.unwrap(), published.quiz);
    }

    #[tokio::test]
    async fn invalid_draft_is_not_stored() {
        let svc = service();
        let err = svc
            .create_quiz(UserId::new(1), &QuizDraft::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LibraryError::Draft(DraftError::EmptyText { index: 0 })
        ));
        assert!(svc.my_quizzes(UserId::new(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn heart_and_rating_show_in_library() {
        let svc = service();
        let user = UserId::new(2);
        let quiz = svc.create_quiz(user, &valid_draft("Mine")).await.unwrap().quiz;

        assert!(svc.toggle_heart(user, quiz.id).await.unwrap().hearted);
        assert_eq!(svc.rate(user, quiz.id, 5).await.unwrap().rating.stars(), 5);
        let toggled = svc.toggle_heart(user, quiz.id).await.unwrap();
        assert!(!toggled.hearted);
        assert_eq!(toggled.rating.stars(), 5);

        let items = svc.my_quizzes(user).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(!items[0].hearted);
        assert_eq!(items[0].rating.stars(), 5);
    }

    #[tokio::test]
    async fn rating_bounds_and_unknown_quiz() {
        let svc = service();
        let user = UserId::new(3);
        let quiz = svc.create_quiz(user, &valid_draft("x")).await.unwrap().quiz;

        assert!(matches!(
            svc.rate(user, quiz.id, 0).await,
            Err(LibraryError::Rating(_))
        ));
        assert!(matches!(
            svc.rate(user, quiz.id, 6).await,
            Err(LibraryError::Rating(_))
        ));
        assert!(matches!(
            svc.toggle_heart(user, QuizId::random()).await,
            Err(LibraryError::NotFound)
        ));
    }
}
