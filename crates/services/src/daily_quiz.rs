//! Daily quiz orchestration: admission, question loading, completion writes
//! and abandonment.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use quiz_core::model::{Admission, DailyResult, Question, UserId, UserQuizStat};
use quiz_core::session::{AbandonPolicy, Phase, QuizSession, SessionError, SessionSettings, Step};
use quiz_core::{DailySchedule, DateKey};
use storage::repository::{DailyResultRepository, StorageError, UserStatRepository};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::Clock;
use crate::config::QuizConfig;
use crate::error::{DailyQuizError, FetchError, WriteError};
use crate::notify::{DailyQuestions, QuestionBoard};
use crate::session_view::{QuestionView, QuizSnapshot};
use crate::trivia::QuestionSource;

//
// ─── DAILY QUIZ ────────────────────────────────────────────────────────────────
//

/// One user's daily quiz: the session plus what surrounds it.
#[derive(Debug)]
pub struct DailyQuiz {
    user_id: UserId,
    day: DateKey,
    session: QuizSession,
    streak: u32,
    completed_at: Option<DateTime<Utc>>,
    persisted: bool,
    fetch_error: Option<FetchError>,
    write_error: Option<WriteError>,
}

impl DailyQuiz {
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Quiz day the session was opened on.
    #[must_use]
    pub fn day(&self) -> DateKey {
        self.day
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn phase(&self) -> &Phase {
        self.session.phase()
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// When the last question was answered, once the quiz is complete.
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// True once the completion has been stored.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    #[must_use]
    pub fn fetch_error(&self) -> Option<&FetchError> {
        self.fetch_error.as_ref()
    }

    #[must_use]
    pub fn write_error(&self) -> Option<&WriteError> {
        self.write_error.as_ref()
    }

    #[must_use]
    pub fn snapshot(&self) -> QuizSnapshot {
        QuizSnapshot {
            day: self.day,
            phase: self.session.phase().clone(),
            question: QuestionView::from_session(&self.session),
            score: self.session.score(),
            points: self.session.points(),
            streak: self.streak,
            answers: self.session.answers().to_vec(),
            persisted: self.persisted,
            fetch_error: self.fetch_error.as_ref().map(ToString::to_string),
            write_error: self.write_error.as_ref().map(ToString::to_string),
            command_error: None,
        }
    }
}

/// Streak, lock state and recent results for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStats {
    pub user_id: UserId,
    pub streak: u32,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub admission: Admission,
    pub recent: Vec<DailyResult>,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Opens daily quizzes and applies their transitions.
///
/// The service owns the clock, the question source and the repositories; a
/// `DailyQuiz` only owns its session.
#[derive(Clone)]
pub struct DailyQuizService {
    clock: Clock,
    schedule: DailySchedule,
    settings: SessionSettings,
    abandon_policy: AbandonPolicy,
    fetch_timeout: Duration,
    feedback_delay: Duration,
    source: Arc<dyn QuestionSource>,
    board: Arc<QuestionBoard>,
    stats: Arc<dyn UserStatRepository>,
    results: Arc<dyn DailyResultRepository>,
}

impl DailyQuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        config: &QuizConfig,
        source: Arc<dyn QuestionSource>,
        board: Arc<QuestionBoard>,
        stats: Arc<dyn UserStatRepository>,
        results: Arc<dyn DailyResultRepository>,
    ) -> Self {
        Self {
            clock,
            schedule: config.schedule,
            settings: config.session,
            abandon_policy: config.abandon_policy,
            fetch_timeout: config.fetch_timeout,
            feedback_delay: config.feedback_delay,
            source,
            board,
            stats,
            results,
        }
    }

    #[must_use]
    pub fn schedule(&self) -> &DailySchedule {
        &self.schedule
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    #[must_use]
    pub fn feedback_delay(&self) -> Duration {
        self.feedback_delay
    }

    /// Announcements of question sets fetched by any session on this board.
    #[must_use]
    pub fn subscribe_questions(&self) -> broadcast::Receiver<DailyQuestions> {
        self.board.subscribe()
    }

    /// Open today's quiz for `user_id`.
    ///
    /// A locked or failed day yields a terminal session. A failed question
    /// fetch yields a session in the `Error` phase that can be retried.
    ///
    /// # Errors
    ///
    /// Returns `DailyQuizError::Storage` if the user's stat cannot be read.
    pub async fn open(&self, user_id: UserId) -> Result<DailyQuiz, DailyQuizError> {
        let now = self.clock.now();
        let day = self.schedule.quiz_day(now);
        let stat = self.stats.load_stat(user_id).await?;
        let streak = stat
            .as_ref()
            .map_or(0, |s| s.current_streak(now, &self.schedule));

        let mut quiz = DailyQuiz {
            user_id,
            day,
            session: QuizSession::unavailable(self.settings),
            streak,
            completed_at: None,
            persisted: false,
            fetch_error: None,
            write_error: None,
        };
        self.admit(&mut quiz, stat.as_ref(), now).await;
        Ok(quiz)
    }

    /// Reload questions for a quiz stuck in the `Error` phase.
    ///
    /// # Errors
    ///
    /// Returns `DailyQuizError::Session` unless the quiz is in `Error`, or
    /// `DailyQuizError::Storage` if the user's stat cannot be read.
    pub async fn retry(&self, quiz: &mut DailyQuiz) -> Result<(), DailyQuizError> {
        if !matches!(quiz.session.phase(), Phase::Error(_)) {
            return Err(SessionError::InvalidPhase {
                action: "retry",
                phase: quiz.session.phase().kind(),
            }
            .into());
        }

        let now = self.clock.now();
        quiz.day = self.schedule.quiz_day(now);
        let stat = self.stats.load_stat(quiz.user_id).await?;
        info!(user = %quiz.user_id, day = %quiz.day, "retrying daily quiz");
        self.admit(quiz, stat.as_ref(), now).await;
        Ok(())
    }

    async fn admit(&self, quiz: &mut DailyQuiz, stat: Option<&UserQuizStat>, now: DateTime<Utc>) {
        quiz.fetch_error = None;
        quiz.session = match self.schedule.admission(stat, now) {
            Admission::Locked { unlock_at } => {
                debug!(user = %quiz.user_id, %unlock_at, "daily quiz locked");
                QuizSession::locked(unlock_at, self.settings)
            }
            Admission::Failed { unlock_at } => {
                debug!(user = %quiz.user_id, %unlock_at, "daily quiz failed for today");
                QuizSession::failed(Some(unlock_at), self.settings)
            }
            Admission::Open => match self.load_questions(quiz.day).await {
                Ok(questions) => QuizSession::start(questions, self.settings),
                Err(err) => {
                    warn!(
                        user = %quiz.user_id,
                        day = %quiz.day,
                        error = %err,
                        "daily questions unavailable"
                    );
                    quiz.fetch_error = Some(err);
                    QuizSession::unavailable(self.settings)
                }
            },
        };
    }

    async fn load_questions(&self, day: DateKey) -> Result<Vec<Question>, FetchError> {
        if let Some(questions) = self.board.get(day) {
            debug!(%day, "reusing fetched daily questions");
            return Ok(questions);
        }

        info!(%day, seed = day.seed(), "fetching daily questions");
        let fetch = self.source.fetch_daily_questions(day);
        let fetched = tokio::time::timeout(self.fetch_timeout, fetch)
            .await
            .map_err(|_| FetchError::Timeout {
                millis: u64::try_from(self.fetch_timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        info!(%day, count = fetched.len(), "fetched daily questions");
        if fetched.len() == self.settings.question_count {
            self.board.publish(day, &fetched);
        } else {
            warn!(
                %day,
                expected = self.settings.question_count,
                actual = fetched.len(),
                "not sharing a question set of the wrong size"
            );
        }
        Ok(fetched)
    }

    /// Count the active question down by one second.
    ///
    /// # Errors
    ///
    /// Returns `DailyQuizError::Session` unless the quiz is `Active`.
    pub fn tick(&self, quiz: &mut DailyQuiz) -> Result<Step, DailyQuizError> {
        Ok(quiz.session.tick()?)
    }

    /// # Errors
    ///
    /// Returns `DailyQuizError::Session` unless the quiz is `Active` and the
    /// option exists.
    pub fn select(&self, quiz: &mut DailyQuiz, option: usize) -> Result<Step, DailyQuizError> {
        Ok(quiz.session.select(option)?)
    }

    /// Leave the feedback pause. Completing the last question stores the
    /// result once; a failed write is kept on the quiz for `finalize`.
    ///
    /// # Errors
    ///
    /// Returns `DailyQuizError::Session` unless the quiz is `AnsweredPause`.
    pub async fn advance(&self, quiz: &mut DailyQuiz) -> Result<Step, DailyQuizError> {
        let step = quiz.session.advance()?;
        if matches!(step, Step::Completed { .. }) {
            quiz.completed_at = Some(self.clock.now());
            if let Err(err) = self.persist_completion(quiz).await {
                warn!(user = %quiz.user_id, error = %err, "completion write failed");
                quiz.write_error = Some(err);
            }
        }
        Ok(step)
    }

    /// Retry a failed completion write. Already stored completions are left
    /// alone. The result keeps the day the quiz was completed on, however late
    /// the retry runs.
    ///
    /// # Errors
    ///
    /// Returns `DailyQuizError::Session` unless the quiz is `Complete`, or
    /// `DailyQuizError::Write` if the write fails again.
    pub async fn finalize(&self, quiz: &mut DailyQuiz) -> Result<(), DailyQuizError> {
        if !matches!(quiz.session.phase(), Phase::Complete { .. }) {
            return Err(SessionError::InvalidPhase {
                action: "finalize",
                phase: quiz.session.phase().kind(),
            }
            .into());
        }
        if quiz.persisted {
            return Ok(());
        }

        if let Err(err) = self.persist_completion(quiz).await {
            warn!(user = %quiz.user_id, error = %err, "completion write failed again");
            quiz.write_error = Some(err.clone());
            return Err(err.into());
        }
        Ok(())
    }

    async fn persist_completion(&self, quiz: &mut DailyQuiz) -> Result<(), WriteError> {
        if quiz.persisted {
            return Ok(());
        }

        let completed_at = *quiz.completed_at.get_or_insert_with(|| self.clock.now());
        let result = DailyResult {
            user_id: quiz.user_id,
            day: self.schedule.quiz_day(completed_at),
            score: quiz.session.score(),
            points: quiz.session.points(),
            completed_at,
        };
        match self.results.append_result(&result).await {
            Ok(()) | Err(StorageError::Conflict) => {}
            Err(err) => return Err(err.into()),
        }

        let mut stat = self
            .stats
            .load_stat(quiz.user_id)
            .await?
            .unwrap_or_else(|| UserQuizStat::new(quiz.user_id));
        stat.record_completion(completed_at, &self.schedule);
        self.stats.save_stat(&stat).await?;

        quiz.persisted = true;
        quiz.write_error = None;
        quiz.streak = stat.streak_count;
        info!(
            user = %quiz.user_id,
            day = %result.day,
            score = result.score,
            points = result.points,
            streak = stat.streak_count,
            "daily quiz completed"
        );
        Ok(())
    }

    /// Tear down a quiz that is still in progress.
    ///
    /// Returns `true` if a quiz was abandoned. Under `AbandonPolicy::FailDay`
    /// the day is recorded as failed and stays closed until the next boundary.
    ///
    /// # Errors
    ///
    /// Returns `DailyQuizError::Storage` if the failed day cannot be stored;
    /// the quiz is then left running.
    pub async fn abandon(&self, quiz: &mut DailyQuiz) -> Result<bool, DailyQuizError> {
        if !quiz.session.is_in_progress() {
            return Ok(false);
        }

        match self.abandon_policy {
            AbandonPolicy::Resumable => {
                quiz.session.abandon();
                info!(user = %quiz.user_id, day = %quiz.day, "daily quiz abandoned");
            }
            AbandonPolicy::FailDay => {
                let mut stat = self
                    .stats
                    .load_stat(quiz.user_id)
                    .await?
                    .unwrap_or_else(|| UserQuizStat::new(quiz.user_id));
                stat.record_failure(quiz.day);
                self.stats.save_stat(&stat).await?;

                let unlock_at = self.schedule.day_start(quiz.day.next());
                quiz.session = QuizSession::failed(Some(unlock_at), self.settings);
                info!(
                    user = %quiz.user_id,
                    day = %quiz.day,
                    %unlock_at,
                    "daily quiz abandoned, day failed"
                );
            }
        }
        Ok(true)
    }

    /// Streak, lock state and the latest results for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `DailyQuizError::Storage` on repository failures.
    pub async fn player_stats(
        &self,
        user_id: UserId,
        recent: u32,
    ) -> Result<PlayerStats, DailyQuizError> {
        let now = self.clock.now();
        let stat = self.stats.load_stat(user_id).await?;
        let recent = self.results.list_results(user_id, recent).await?;
        Ok(PlayerStats {
            user_id,
            streak: stat
                .as_ref()
                .map_or(0, |s| s.current_streak(now, &self.schedule)),
            last_completed_at: stat.as_ref().and_then(|s| s.last_completed_at),
            admission: self.schedule.admission(stat.as_ref(), now),
            recent,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use quiz_core::session::SessionFault;
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    use super::*;

    struct FixedSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuestionSource for FixedSource {
        async fn fetch_daily_questions(&self, _day: DateKey) -> Result<Vec<Question>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..5)
                .map(|n| {
                    Question::new(format!("Q{n}"), vec!["yes".into(), "no".into()], 0).unwrap()
                })
                .collect())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl QuestionSource for BrokenSource {
        async fn fetch_daily_questions(&self, _day: DateKey) -> Result<Vec<Question>, FetchError> {
            Err(FetchError::Empty)
        }
    }

    /// Always answers with three questions.
    struct ShortSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuestionSource for ShortSource {
        async fn fetch_daily_questions(&self, _day: DateKey) -> Result<Vec<Question>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..3)
                .map(|n| Question::new(format!("Q{n}"), vec!["a".into(), "b".into()], 1).unwrap())
                .collect())
        }
    }

    struct FlakyStats {
        inner: InMemoryRepository,
        offline: AtomicBool,
    }

    #[async_trait]
    impl UserStatRepository for FlakyStats {
        async fn load_stat(&self, user_id: UserId) -> Result<Option<UserQuizStat>, StorageError> {
            self.inner.load_stat(user_id).await
        }

        async fn save_stat(&self, stat: &UserQuizStat) -> Result<(), StorageError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("offline".into()));
            }
            self.inner.save_stat(stat).await
        }
    }

    fn service_with(
        source: Arc<dyn QuestionSource>,
        repo: &InMemoryRepository,
        clock: Clock,
        policy: AbandonPolicy,
    ) -> DailyQuizService {
        let config = QuizConfig {
            abandon_policy: policy,
            ..QuizConfig::default()
        };
        DailyQuizService::new(
            clock,
            &config,
            source,
            Arc::new(QuestionBoard::new()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    fn fixed_source() -> Arc<FixedSource> {
        Arc::new(FixedSource {
            calls: AtomicUsize::new(0),
        })
    }

    async fn play_all_correct(service: &DailyQuizService, quiz: &mut DailyQuiz) {
        for _ in 0..5 {
            service.select(quiz, 0).unwrap();
            service.advance(quiz).await.unwrap();
        }
    }

    #[tokio::test]
    async fn full_run_completes_and_locks() {
        let repo = InMemoryRepository::new();
        let service = service_with(
            fixed_source(),
            &repo,
            Clock::fixed(fixed_now()),
            AbandonPolicy::Resumable,
        );
        let user = UserId::new(1);

        let mut quiz = service.open(user).await.unwrap();
        assert_eq!(
            quiz.phase(),
            &Phase::Active {
                index: 0,
                remaining_secs: 10
            }
        );

        play_all_correct(&service, &mut quiz).await;
        assert_eq!(quiz.phase(), &Phase::Complete { score: 5 });
        assert!(quiz.is_persisted());
        assert_eq!(quiz.streak(), 1);

        let results = repo.list_results(user, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].points, 50);

        let again = service.open(user).await.unwrap();
        assert!(matches!(again.phase(), Phase::Locked { .. }));
    }

    #[tokio::test]
    async fn question_set_is_shared_through_the_board() {
        let repo = InMemoryRepository::new();
        let source = fixed_source();
        let service = service_with(
            source.clone(),
            &repo,
            Clock::fixed(fixed_now()),
            AbandonPolicy::Resumable,
        );

        service.open(UserId::new(1)).await.unwrap();
        service.open(UserId::new(2)).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_failure_yields_error_phase() {
        let repo = InMemoryRepository::new();
        let service = service_with(
            Arc::new(BrokenSource),
            &repo,
            Clock::fixed(fixed_now()),
            AbandonPolicy::Resumable,
        );

        let mut quiz = service.open(UserId::new(1)).await.unwrap();
        assert_eq!(quiz.phase(), &Phase::Error(SessionFault::Unavailable));
        assert!(matches!(quiz.fetch_error(), Some(FetchError::Empty)));
        assert!(service.select(&mut quiz, 0).is_err());
        assert_eq!(quiz.phase(), &Phase::Error(SessionFault::Unavailable));
    }

    #[tokio::test]
    async fn retry_only_from_error() {
        let repo = InMemoryRepository::new();
        let service = service_with(
            fixed_source(),
            &repo,
            Clock::fixed(fixed_now()),
            AbandonPolicy::Resumable,
        );
        let mut quiz = service.open(UserId::new(1)).await.unwrap();
        assert!(matches!(
            service.retry(&mut quiz).await,
            Err(DailyQuizError::Session(SessionError::InvalidPhase { .. }))
        ));
    }

    #[tokio::test]
    async fn resumable_abandon_keeps_day_open() {
        let repo = InMemoryRepository::new();
        let service = service_with(
            fixed_source(),
            &repo,
            Clock::fixed(fixed_now()),
            AbandonPolicy::Resumable,
        );
        let user = UserId::new(3);

        let mut quiz = service.open(user).await.unwrap();
        assert!(service.abandon(&mut quiz).await.unwrap());
        assert_eq!(quiz.phase(), &Phase::Failed { unlock_at: None });
        assert!(repo.load_stat(user).await.unwrap().is_none());

        let fresh = service.open(user).await.unwrap();
        assert!(matches!(fresh.phase(), Phase::Active { index: 0, .. }));
    }

    #[tokio::test]
    async fn fail_day_abandon_closes_day() {
        let repo = InMemoryRepository::new();
        let service = service_with(
            fixed_source(),
            &repo,
            Clock::fixed(fixed_now()),
            AbandonPolicy::FailDay,
        );
        let user = UserId::new(4);

        let mut quiz = service.open(user).await.unwrap();
        service.select(&mut quiz, 1).unwrap();
        assert!(service.abandon(&mut quiz).await.unwrap());

        let unlock = service.schedule().day_start(quiz.day().next());
        assert_eq!(quiz.phase(), &Phase::Failed { unlock_at: Some(unlock) });

        let reopened = service.open(user).await.unwrap();
        assert_eq!(reopened.phase(), &Phase::Failed { unlock_at: Some(unlock) });
        assert!(!service.abandon(&mut quiz).await.unwrap());
    }

    #[tokio::test]
    async fn streak_grows_across_days() {
        let repo = InMemoryRepository::new();
        let source = fixed_source();
        let user = UserId::new(5);

        for day in 0..3 {
            let clock = Clock::fixed(fixed_now() + chrono::Duration::days(day));
            let service = service_with(source.clone(), &repo, clock, AbandonPolicy::Resumable);
            let mut quiz = service.open(user).await.unwrap();
            play_all_correct(&service, &mut quiz).await;
            assert_eq!(quiz.streak(), u32::try_from(day + 1).unwrap());
        }

        let clock = Clock::fixed(fixed_now() + chrono::Duration::days(2));
        let service = service_with(source, &repo, clock, AbandonPolicy::Resumable);
        let stats = service.player_stats(user, 10).await.unwrap();
        assert_eq!(stats.streak, 3);
        assert_eq!(stats.recent.len(), 3);
        assert!(matches!(stats.admission, Admission::Locked { .. }));
    }

    #[tokio::test]
    async fn failed_write_keeps_score_and_finalize_retries() {
        let repo = InMemoryRepository::new();
        let stats = Arc::new(FlakyStats {
            inner: repo.clone(),
            offline: AtomicBool::new(true),
        });
        let service = DailyQuizService::new(
            Clock::fixed(fixed_now()),
            &QuizConfig::default(),
            fixed_source(),
            Arc::new(QuestionBoard::new()),
            stats.clone(),
            Arc::new(repo.clone()),
        );
        let user = UserId::new(6);

        let mut quiz = service.open(user).await.unwrap();
        play_all_correct(&service, &mut quiz).await;
        assert_eq!(quiz.phase(), &Phase::Complete { score: 5 });
        assert!(!quiz.is_persisted());
        assert!(quiz.write_error().is_some());
        assert!(matches!(
            service.finalize(&mut quiz).await,
            Err(DailyQuizError::Write(_))
        ));

        stats.offline.store(false, Ordering::SeqCst);
        service.finalize(&mut quiz).await.unwrap();
        assert!(quiz.is_persisted());
        assert!(quiz.write_error().is_none());
        assert_eq!(repo.list_results(user, 10).await.unwrap().len(), 1);
        assert_eq!(repo.load_stat(user).await.unwrap().unwrap().streak_count, 1);

        service.finalize(&mut quiz).await.unwrap();
        assert_eq!(repo.load_stat(user).await.unwrap().unwrap().streak_count, 1);
    }

    fn flaky_service(
        clock: Clock,
        stats: &Arc<FlakyStats>,
        repo: &InMemoryRepository,
        policy: AbandonPolicy,
    ) -> DailyQuizService {
        let config = QuizConfig {
            abandon_policy: policy,
            ..QuizConfig::default()
        };
        DailyQuizService::new(
            clock,
            &config,
            fixed_source(),
            Arc::new(QuestionBoard::new()),
            stats.clone(),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn late_finalize_keeps_the_completion_day() {
        let repo = InMemoryRepository::new();
        let stats = Arc::new(FlakyStats {
            inner: repo.clone(),
            offline: AtomicBool::new(true),
        });
        let user = UserId::new(7);
        // 12:20 at +05:30, still on the previous quiz day.
        let played_at: DateTime<Utc> = "2024-05-21T06:50:00Z".parse().unwrap();
        let played_day: DateKey = "2024-05-20".parse().unwrap();

        let before = flaky_service(Clock::fixed(played_at), &stats, &repo, AbandonPolicy::Resumable);
        let mut quiz = before.open(user).await.unwrap();
        assert_eq!(quiz.day(), played_day);
        play_all_correct(&before, &mut quiz).await;
        assert!(quiz.write_error().is_some());
        assert_eq!(quiz.completed_at(), Some(played_at));

        stats.offline.store(false, Ordering::SeqCst);
        let after_boundary = played_at + chrono::Duration::minutes(20);
        let after = flaky_service(
            Clock::fixed(after_boundary),
            &stats,
            &repo,
            AbandonPolicy::Resumable,
        );
        after.finalize(&mut quiz).await.unwrap();
        assert!(quiz.is_persisted());

        let results = repo.list_results(user, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].day, played_day);
        let stat = repo.load_stat(user).await.unwrap().unwrap();
        assert_eq!(stat.last_completed_at, Some(played_at));

        let next = after.open(user).await.unwrap();
        assert!(matches!(next.phase(), Phase::Active { index: 0, .. }));
    }

    #[tokio::test]
    async fn fail_day_abandon_that_cannot_be_stored_keeps_quiz_running() {
        let repo = InMemoryRepository::new();
        let stats = Arc::new(FlakyStats {
            inner: repo.clone(),
            offline: AtomicBool::new(true),
        });
        let service = flaky_service(
            Clock::fixed(fixed_now()),
            &stats,
            &repo,
            AbandonPolicy::FailDay,
        );
        let user = UserId::new(8);

        let mut quiz = service.open(user).await.unwrap();
        assert!(matches!(
            service.abandon(&mut quiz).await,
            Err(DailyQuizError::Storage(_))
        ));
        assert!(matches!(quiz.phase(), Phase::Active { index: 0, .. }));
        assert!(repo.load_stat(user).await.unwrap().is_none());

        stats.offline.store(false, Ordering::SeqCst);
        assert!(service.abandon(&mut quiz).await.unwrap());
        assert!(matches!(quiz.phase(), Phase::Failed { unlock_at: Some(_) }));
    }

    #[tokio::test]
    async fn wrong_sized_question_set_is_not_shared() {
        let repo = InMemoryRepository::new();
        let source = Arc::new(ShortSource {
            calls: AtomicUsize::new(0),
        });
        let board = Arc::new(QuestionBoard::new());
        let service = DailyQuizService::new(
            Clock::fixed(fixed_now()),
            &QuizConfig::default(),
            source.clone(),
            board.clone(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );

        let mut quiz = service.open(UserId::new(9)).await.unwrap();
        assert!(matches!(
            quiz.phase(),
            Phase::Error(SessionFault::Structural(_))
        ));
        assert!(board.get(quiz.day()).is_none());

        service.retry(&mut quiz).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
