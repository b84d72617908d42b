#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod daily_quiz;
pub mod error;
pub mod leaderboard;
pub mod library;
pub mod notify;
pub mod runner;
pub mod session_view;
pub mod trivia;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use config::QuizConfig;
pub use daily_quiz::{DailyQuiz, DailyQuizService, PlayerStats};
pub use error::{
    AppServicesError, DailyQuizError, FetchError, LibraryError, RunnerError, WriteError,
};
pub use leaderboard::LeaderboardService;
pub use library::{LibraryItem, LibraryService, PublishedQuiz};
pub use notify::QuestionBoard;
pub use runner::{SessionCommand, SessionRunner};
pub use session_view::{QuestionView, QuizSnapshot};
pub use trivia::{QuestionSource, TriviaClient};
