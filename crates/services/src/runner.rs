//! Timer-driven driver for one daily quiz.

use std::sync::Arc;
use std::time::Duration;

use quiz_core::DateKey;
use quiz_core::session::{Phase, PhaseKind};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::daily_quiz::{DailyQuiz, DailyQuizService};
use crate::error::{DailyQuizError, RunnerError};
use crate::notify::DailyQuestions;
use crate::session_view::QuizSnapshot;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Select(usize),
    Abandon,
    Retry,
    Finalize,
}

/// Owns a daily quiz on a tokio task.
///
/// The task ticks the active question once per second, advances after the
/// feedback delay and applies commands in arrival order. A quiz whose fetch
/// failed starts as soon as another session shares the day's questions.
/// Every change is published as a [`QuizSnapshot`]. Dropping the runner aborts the task; it
/// does not abandon the quiz.
pub struct SessionRunner {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<QuizSnapshot>,
    task: JoinHandle<()>,
}

impl SessionRunner {
    /// Spawn the driver task. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(service: Arc<DailyQuizService>, quiz: DailyQuiz) -> Self {
        let (commands, rx) = mpsc::channel(16);
        let (tx, snapshots) = watch::channel(quiz.snapshot());
        let announcements = service.subscribe_questions();
        let task = tokio::spawn(drive(service, quiz, rx, announcements, tx));
        Self {
            commands,
            snapshots,
            task,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> QuizSnapshot {
        self.snapshots.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<QuizSnapshot> {
        self.snapshots.clone()
    }

    /// # Errors
    ///
    /// Returns `RunnerError::Stopped` if the task is gone.
    pub async fn send(&self, command: SessionCommand) -> Result<(), RunnerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RunnerError::Stopped)
    }

    /// # Errors
    ///
    /// Returns `RunnerError::Stopped` if the task is gone.
    pub async fn select(&self, option: usize) -> Result<(), RunnerError> {
        self.send(SessionCommand::Select(option)).await
    }

    /// # Errors
    ///
    /// Returns `RunnerError::Stopped` if the task is gone.
    pub async fn abandon(&self) -> Result<(), RunnerError> {
        self.send(SessionCommand::Abandon).await
    }

    /// Wait until a published snapshot satisfies `done`.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Stopped` if the task ends first.
    pub async fn wait_for(
        &mut self,
        done: impl FnMut(&QuizSnapshot) -> bool,
    ) -> Result<QuizSnapshot, RunnerError> {
        self.snapshots
            .wait_for(done)
            .await
            .map(|snapshot| snapshot.clone())
            .map_err(|_| RunnerError::Stopped)
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn position(quiz: &DailyQuiz) -> (PhaseKind, usize) {
    let index = match *quiz.phase() {
        Phase::Active { index, .. } | Phase::AnsweredPause { index, .. } => index,
        _ => 0,
    };
    (quiz.phase().kind(), index)
}

fn deadline_for(quiz: &DailyQuiz, feedback_delay: Duration) -> Option<Instant> {
    match quiz.phase() {
        Phase::Active { .. } => Some(Instant::now() + TICK),
        Phase::AnsweredPause { .. } => Some(Instant::now() + feedback_delay),
        _ => None,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn drive(
    service: Arc<DailyQuizService>,
    mut quiz: DailyQuiz,
    mut commands: mpsc::Receiver<SessionCommand>,
    mut announcements: broadcast::Receiver<DailyQuestions>,
    snapshots: watch::Sender<QuizSnapshot>,
) {
    let feedback_delay = service.feedback_delay();
    let mut deadline = deadline_for(&quiz, feedback_delay);
    let mut listening = true;
    let mut command_error = None;

    loop {
        let before = position(&quiz);

        let fired = tokio::select! {
            command = commands.recv() => match command {
                Some(command) => {
                    command_error = apply(&service, &mut quiz, command).await;
                    false
                }
                None => break,
            },
            () = sleep_until_deadline(deadline) => {
                on_timer(&service, &mut quiz).await;
                true
            }
            announced = announcements.recv(), if listening => {
                match announced {
                    Ok(entry) => on_announce(&service, &mut quiz, entry.day).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(user = %quiz.user_id(), skipped, "missed question announcements");
                    }
                    Err(broadcast::error::RecvError::Closed) => listening = false,
                }
                false
            }
        };

        if fired || position(&quiz) != before {
            deadline = deadline_for(&quiz, feedback_delay);
        }
        let mut snapshot = quiz.snapshot();
        snapshot.command_error.clone_from(&command_error);
        snapshots.send_replace(snapshot);
    }

    debug!(user = %quiz.user_id(), "session runner stopped");
}

async fn on_timer(service: &DailyQuizService, quiz: &mut DailyQuiz) {
    let result = match quiz.phase() {
        Phase::Active { .. } => service.tick(quiz),
        Phase::AnsweredPause { .. } => service.advance(quiz).await,
        _ => return,
    };
    if let Err(err) = result {
        warn!(user = %quiz.user_id(), error = %err, "timer transition rejected");
    }
}

/// Another session shared today's questions; a quiz stuck on a failed fetch
/// picks them up.
async fn on_announce(service: &DailyQuizService, quiz: &mut DailyQuiz, day: DateKey) {
    if !matches!(quiz.phase(), Phase::Error(_)) || day != quiz.day() {
        return;
    }
    info!(user = %quiz.user_id(), %day, "questions shared by another session");
    if let Err(err) = service.retry(quiz).await {
        warn!(user = %quiz.user_id(), error = %err, "retry after shared questions failed");
    }
}

/// Apply `command`, returning the error message if it was not carried out.
async fn apply(
    service: &DailyQuizService,
    quiz: &mut DailyQuiz,
    command: SessionCommand,
) -> Option<String> {
    let result = match command {
        SessionCommand::Select(option) => service.select(quiz, option).map(drop),
        SessionCommand::Abandon => service.abandon(quiz).await.map(drop),
        SessionCommand::Retry => service.retry(quiz).await,
        SessionCommand::Finalize => service.finalize(quiz).await,
    };
    let err = result.err()?;
    if matches!(err, DailyQuizError::Session(_)) {
        debug!(user = %quiz.user_id(), ?command, error = %err, "command rejected");
    } else {
        warn!(user = %quiz.user_id(), ?command, error = %err, "command failed");
    }
    Some(err.to_string())
}
