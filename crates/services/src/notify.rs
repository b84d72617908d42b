//! Best-effort sharing of the daily question set between sessions.

use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::DateKey;
use quiz_core::model::Question;
use tokio::sync::broadcast;

/// A fetched question set for one quiz day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyQuestions {
    pub day: DateKey,
    pub questions: Arc<[Question]>,
}

/// Caches the latest successful daily fetch and announces new ones.
///
/// Advisory only: two sessions that miss the cache at the same moment both
/// fetch, and the later publish wins.
pub struct QuestionBoard {
    latest: Mutex<Option<DailyQuestions>>,
    announce: broadcast::Sender<DailyQuestions>,
}

impl Default for QuestionBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl QuestionBoard {
    #[must_use]
    pub fn new() -> Self {
        let (announce, _) = broadcast::channel(8);
        Self {
            latest: Mutex::new(None),
            announce,
        }
    }

    /// Cached questions for `day`, if another session already fetched them.
    #[must_use]
    pub fn get(&self, day: DateKey) -> Option<Vec<Question>> {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest
            .as_ref()
            .filter(|entry| entry.day == day)
            .map(|entry| entry.questions.to_vec())
    }

    /// Cache `questions` for `day` and notify subscribers.
    pub fn publish(&self, day: DateKey, questions: &[Question]) {
        let entry = DailyQuestions {
            day,
            questions: Arc::from(questions),
        };
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(entry.clone());
        // No subscribers is fine.
        let _ = self.announce.send(entry);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DailyQuestions> {
        self.announce.subscribe()
    }
}
