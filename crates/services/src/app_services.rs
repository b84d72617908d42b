use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::config::QuizConfig;
use crate::daily_quiz::DailyQuizService;
use crate::error::AppServicesError;
use crate::leaderboard::LeaderboardService;
use crate::library::LibraryService;
use crate::notify::QuestionBoard;
use crate::trivia::{QuestionSource, TriviaClient};

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    config: QuizConfig,
    daily_quiz: Arc<DailyQuizService>,
    library: Arc<LibraryService>,
    leaderboard: Arc<LeaderboardService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP trivia source.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: QuizConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let source = Arc::new(TriviaClient::new(
            config.trivia_url.clone(),
            config.session.question_count,
        ));
        Ok(Self::with_storage(&storage, clock, config, source))
    }

    /// Build services over in-memory storage with the given question source.
    #[must_use]
    pub fn in_memory(clock: Clock, config: QuizConfig, source: Arc<dyn QuestionSource>) -> Self {
        Self::with_storage(&Storage::in_memory(), clock, config, source)
    }

    #[must_use]
    pub fn with_storage(
        storage: &Storage,
        clock: Clock,
        config: QuizConfig,
        source: Arc<dyn QuestionSource>,
    ) -> Self {
        let daily_quiz = Arc::new(DailyQuizService::new(
            clock,
            &config,
            source,
            Arc::new(QuestionBoard::new()),
            Arc::clone(&storage.stats),
            Arc::clone(&storage.results),
        ));
        let library = Arc::new(LibraryService::new(
            clock,
            config.share_base.clone(),
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.interactions),
        ));
        let leaderboard = Arc::new(LeaderboardService::new(Arc::clone(&storage.results)));

        Self {
            config,
            daily_quiz,
            library,
            leaderboard,
        }
    }

    #[must_use]
    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    #[must_use]
    pub fn daily_quiz(&self) -> Arc<DailyQuizService> {
        Arc::clone(&self.daily_quiz)
    }

    #[must_use]
    pub fn library(&self) -> Arc<LibraryService> {
        Arc::clone(&self.library)
    }

    #[must_use]
    pub fn leaderboard(&self) -> Arc<LeaderboardService> {
        Arc::clone(&self.leaderboard)
    }
}
