mod ids;
mod interaction;
mod leaderboard;
mod question;
pub mod quiz;
mod result;
mod stat;

pub use ids::{ParseIdError, QuizId, UserId};

pub use interaction::{QuizInteraction, Rating, RatingError};
pub use leaderboard::{LeaderboardEntry, PointsTotal, rank_totals};
pub use question::{Question, QuestionError};
pub use quiz::{
    AuthoredQuestion, DraftError, MoveDirection, QuestionDraft, QuestionKind, Quiz, QuizDraft,
};
pub use result::DailyResult;
pub use stat::{Admission, UserQuizStat};
