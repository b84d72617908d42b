use thiserror::Error;

use crate::model::ids::{QuizId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("rating must be between 1 and 5, got {0}")]
pub struct RatingError(pub u8);

/// Star rating. Zero means "not rated yet" and cannot be set explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 5;

    /// # Errors
    ///
    /// Returns `RatingError` unless `stars` is in `1..=5`.
    pub fn new(stars: u8) -> Result<Self, RatingError> {
        if (1..=Self::MAX).contains(&stars) {
            Ok(Self(stars))
        } else {
            Err(RatingError(stars))
        }
    }

    /// Rehydrate a stored rating, where 0 is unrated.
    ///
    /// # Errors
    ///
    /// Returns `RatingError` if the stored value is above 5.
    pub fn from_persisted(stars: u8) -> Result<Self, RatingError> {
        if stars > Self::MAX {
            return Err(RatingError(stars));
        }
        Ok(Self(stars))
    }

    #[must_use]
    pub fn stars(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_rated(&self) -> bool {
        self.0 > 0
    }
}

/// A user's heart and rating on one quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizInteraction {
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub hearted: bool,
    pub rating: Rating,
}

impl QuizInteraction {
    #[must_use]
    pub fn empty(user_id: UserId, quiz_id: QuizId) -> Self {
        Self {
            user_id,
            quiz_id,
            hearted: false,
            rating: Rating::default(),
        }
    }
}
