use chrono::{DateTime, Utc};

use crate::model::ids::UserId;
use crate::time::DateKey;

/// Outcome of one completed daily quiz. At most one per user per quiz day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyResult {
    pub user_id: UserId,
    pub day: DateKey,
    pub score: u32,
    pub points: u32,
    pub completed_at: DateTime<Utc>,
}
