use chrono::{DateTime, Utc};

use crate::model::ids::UserId;
use crate::time::{DailySchedule, DateKey};

//
// ─── USER QUIZ STAT ────────────────────────────────────────────────────────────
//

/// Per-user daily quiz record: last completion and current streak.
///
/// Read once when a daily session opens and written once when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuizStat {
    pub user_id: UserId,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub streak_count: u32,
    pub failed_on: Option<DateKey>,
}

impl UserQuizStat {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            last_completed_at: None,
            streak_count: 0,
            failed_on: None,
        }
    }

    /// Apply a completion at `completed_at` and update the streak.
    ///
    /// One quiz day after the previous completion extends the streak, the same
    /// quiz day leaves it unchanged, anything else restarts it at 1.
    pub fn record_completion(&mut self, completed_at: DateTime<Utc>, schedule: &DailySchedule) {
        let delta = self
            .last_completed_at
            .map(|last| schedule.days_between(last, completed_at));

        self.streak_count = match delta {
            Some(1) => self.streak_count.saturating_add(1),
            Some(0) => self.streak_count,
            _ => 1,
        };
        self.last_completed_at = Some(completed_at);
    }

    pub fn record_failure(&mut self, day: DateKey) {
        self.failed_on = Some(day);
    }

    /// Streak as it should be displayed at `now`: a streak whose last
    /// completion is more than one quiz day old is already broken.
    #[must_use]
    pub fn current_streak(&self, now: DateTime<Utc>, schedule: &DailySchedule) -> u32 {
        match self.last_completed_at {
            Some(last) if schedule.days_between(last, now) <= 1 => self.streak_count,
            _ => 0,
        }
    }
}

//
// ─── ADMISSION ─────────────────────────────────────────────────────────────────
//

/// Whether a new daily session may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Open,
    Locked { unlock_at: DateTime<Utc> },
    Failed { unlock_at: DateTime<Utc> },
}

impl DailySchedule {
    /// Decide whether `stat`'s owner may start today's quiz at `now`.
    #[must_use]
    pub fn admission(&self, stat: Option<&UserQuizStat>, now: DateTime<Utc>) -> Admission {
        let Some(stat) = stat else {
            return Admission::Open;
        };

        if let Some(last) = stat.last_completed_at {
            let unlock_at = self.unlock_at(last);
            if now < unlock_at {
                return Admission::Locked { unlock_at };
            }
        }

        let today = self.quiz_day(now);
        if stat.failed_on == Some(today) {
            return Admission::Failed {
                unlock_at: self.day_start(today.next()),
            };
        }

        Admission::Open
    }
}
