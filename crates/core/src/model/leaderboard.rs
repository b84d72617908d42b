use crate::model::ids::UserId;

/// Aggregated points for one user, before ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsTotal {
    pub user_id: UserId,
    pub total_points: u64,
    pub completions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: UserId,
    pub total_points: u64,
    pub completions: u32,
}

/// Sort totals by points (then user id) and assign competition ranks:
/// equal points share a rank and the next rank skips (1, 2, 2, 4).
#[must_use]
pub fn rank_totals(mut totals: Vec<PointsTotal>) -> Vec<LeaderboardEntry> {
    totals.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then(a.user_id.cmp(&b.user_id))
    });

    let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(totals.len());
    for (position, total) in totals.into_iter().enumerate() {
        let rank = match entries.last() {
            Some(prev) if prev.total_points == total.total_points => prev.rank,
            _ => u32::try_from(position + 1).unwrap_or(u32::MAX),
        };
        entries.push(LeaderboardEntry {
            rank,
            user_id: total.user_id,
            total_points: total.total_points,
            completions: total.completions,
        });
    }
    entries
}
