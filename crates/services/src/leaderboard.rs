use std::sync::Arc;

use quiz_core::model::{LeaderboardEntry, rank_totals};
use storage::repository::{DailyResultRepository, StorageError};

/// Ranks players by the points of their daily results.
#[derive(Clone)]
pub struct LeaderboardService {
    results: Arc<dyn DailyResultRepository>,
}

impl LeaderboardService {
    #[must_use]
    pub fn new(results: Arc<dyn DailyResultRepository>) -> Self {
        Self { results }
    }

    /// The top `limit` players. Equal totals share a rank.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if results cannot be read.
    pub async fn top(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let totals = self.results.points_totals(limit).await?;
        Ok(rank_totals(totals))
    }
}
