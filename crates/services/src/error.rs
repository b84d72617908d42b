//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{DraftError, QuestionError, RatingError};
use quiz_core::session::SessionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while loading the daily questions. The user may retry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("trivia request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("trivia request timed out after {millis} ms")]
    Timeout { millis: u64 },
    #[error("trivia response is malformed: {0}")]
    Malformed(String),
    #[error("trivia response has no questions")]
    Empty,
    #[error("expected {expected} questions, got {actual}")]
    Incomplete { expected: usize, actual: usize },
    #[error("trivia question {index} is invalid: {source}")]
    InvalidQuestion {
        index: usize,
        #[source]
        source: QuestionError,
    },
}

/// The completion write failed. The score is kept and the write can be
/// retried.
#[derive(Debug, Clone, Error)]
#[error("failed to save quiz completion: {0}")]
pub struct WriteError(#[from] pub StorageError);

/// Errors emitted by `DailyQuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DailyQuizError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Errors emitted by `LibraryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LibraryError {
    #[error("quiz not found")]
    NotFound,
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SessionRunner`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    #[error("session runner has stopped")]
    Stopped,
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
