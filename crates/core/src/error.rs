use thiserror::Error;

use crate::model::{DraftError, QuestionError, RatingError};
use crate::session::{SessionError, StructuralError};
use crate::time::ParseDateKeyError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error(transparent)]
    DateKey(#[from] ParseDateKeyError),
}
