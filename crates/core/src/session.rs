//! Daily quiz session state machine.
//!
//! The session is pure: it never reads the clock or touches storage. The
//! caller feeds it ticks, selections and advance signals and reacts to the
//! returned [`Step`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::Question;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// The question set or progression index is unusable. Terminal for a session.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum StructuralError {
    #[error("question set is empty")]
    EmptyQuestionSet,

    #[error("expected {expected} questions, got {actual}")]
    WrongQuestionCount { expected: usize, actual: usize },

    #[error("question index {index} is out of range for {len} questions")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Why a session is sitting in the `Error` phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionFault {
    /// Questions could not be loaded (fetch failure or timeout).
    Unavailable,
    Structural(StructuralError),
}

/// Operations rejected without changing the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot {action} while the session is {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: PhaseKind,
    },

    #[error("option {option} is out of range for {len} options")]
    OptionOutOfRange { option: usize, len: usize },
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub question_count: usize,
    pub question_time_secs: u32,
    pub points_per_question: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            question_count: 5,
            question_time_secs: 10,
            points_per_question: 10,
        }
    }
}

/// What happens to the day when a session is abandoned mid-quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbandonPolicy {
    /// The user may start a fresh session.
    #[default]
    Resumable,
    /// The day is marked failed until the next unlock boundary.
    FailDay,
}

impl FromStr for AbandonPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resumable" => Ok(Self::Resumable),
            "fail-day" | "fail_day" | "failday" => Ok(Self::FailDay),
            other => Err(format!("unknown abandon policy: {other}")),
        }
    }
}

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Phase {
    Active { index: usize, remaining_secs: u32 },
    AnsweredPause { index: usize, selected: Option<usize> },
    Complete { score: u32 },
    Locked { unlock_at: DateTime<Utc> },
    Failed { unlock_at: Option<DateTime<Utc>> },
    Error(SessionFault),
}

/// Field-less mirror of [`Phase`] for messages and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PhaseKind {
    Active,
    AnsweredPause,
    Complete,
    Locked,
    Failed,
    Error,
}

impl Phase {
    #[must_use]
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Active { .. } => PhaseKind::Active,
            Phase::AnsweredPause { .. } => PhaseKind::AnsweredPause,
            Phase::Complete { .. } => PhaseKind::Complete,
            Phase::Locked { .. } => PhaseKind::Locked,
            Phase::Failed { .. } => PhaseKind::Failed,
            Phase::Error(_) => PhaseKind::Error,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Phase::Active { .. } | Phase::AnsweredPause { .. })
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhaseKind::Active => "active",
            PhaseKind::AnsweredPause => "showing feedback",
            PhaseKind::Complete => "complete",
            PhaseKind::Locked => "locked",
            PhaseKind::Failed => "failed",
            PhaseKind::Error => "in error",
        };
        f.write_str(name)
    }
}

//
// ─── STEP ──────────────────────────────────────────────────────────────────────
//

/// Outcome of a single transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Ticked { remaining_secs: u32 },
    Answered {
        index: usize,
        selected: Option<usize>,
        correct: bool,
    },
    Advanced { index: usize },
    Completed { score: u32, points: u32 },
    Errored(StructuralError),
}

/// One recorded answer, in question order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    pub index: usize,
    pub selected: Option<usize>,
    pub correct: bool,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<Question>,
    settings: SessionSettings,
    current: usize,
    selected: Option<usize>,
    score: u32,
    answers: Vec<AnswerRecord>,
    phase: Phase,
}

impl QuizSession {
    /// Start a session on the given questions.
    ///
    /// An empty or wrongly sized question set yields a session already in the
    /// `Error` phase rather than a `Result`, so callers always have a session
    /// to render.
    #[must_use]
    pub fn start(questions: Vec<Question>, settings: SessionSettings) -> Self {
        let phase = if questions.is_empty() {
            Phase::Error(SessionFault::Structural(
                StructuralError::EmptyQuestionSet,
            ))
        } else if questions.len() != settings.question_count {
            Phase::Error(SessionFault::Structural(
                StructuralError::WrongQuestionCount {
                    expected: settings.question_count,
                    actual: questions.len(),
                },
            ))
        } else {
            Phase::Active {
                index: 0,
                remaining_secs: settings.question_time_secs,
            }
        };
        Self::with_phase(questions, settings, phase)
    }

    #[must_use]
    pub fn locked(unlock_at: DateTime<Utc>, settings: SessionSettings) -> Self {
        Self::with_phase(Vec::new(), settings, Phase::Locked { unlock_at })
    }

    #[must_use]
    pub fn failed(unlock_at: Option<DateTime<Utc>>, settings: SessionSettings) -> Self {
        Self::with_phase(Vec::new(), settings, Phase::Failed { unlock_at })
    }

    /// A session whose questions could not be loaded.
    #[must_use]
    pub fn unavailable(settings: SessionSettings) -> Self {
        Self::with_phase(
            Vec::new(),
            settings,
            Phase::Error(SessionFault::Unavailable),
        )
    }

    fn with_phase(questions: Vec<Question>, settings: SessionSettings, phase: Phase) -> Self {
        Self {
            questions,
            settings,
            current: 0,
            selected: None,
            score: 0,
            answers: Vec::new(),
            phase,
        }
    }

    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Number of correctly answered questions.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.score.saturating_mul(self.settings.points_per_question)
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::Active { index, .. } | Phase::AnsweredPause { index, .. } => {
                self.questions.get(index)
            }
            _ => None,
        }
    }

    /// True while a question is on screen or its feedback is showing.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        !self.phase.is_terminal()
    }

    fn reject(&self, action: &'static str) -> SessionError {
        SessionError::InvalidPhase {
            action,
            phase: self.phase.kind(),
        }
    }

    fn fail_structurally(&mut self, err: StructuralError) -> Step {
        self.phase = Phase::Error(SessionFault::Structural(err.clone()));
        Step::Errored(err)
    }

    fn question_at(&self, index: usize) -> Result<&Question, StructuralError> {
        self.questions
            .get(index)
            .ok_or(StructuralError::IndexOutOfRange {
                index,
                len: self.questions.len(),
            })
    }

    /// Count one second down on the active question.
    ///
    /// Reaching zero answers the question with no selection.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidPhase` unless the session is `Active`.
    pub fn tick(&mut self) -> Result<Step, SessionError> {
        let Phase::Active {
            index,
            remaining_secs,
        } = self.phase
        else {
            return Err(self.reject("tick"));
        };

        let remaining_secs = remaining_secs.saturating_sub(1);
        if remaining_secs == 0 {
            return Ok(self.answer(index, None));
        }
        self.phase = Phase::Active {
            index,
            remaining_secs,
        };
        Ok(Step::Ticked { remaining_secs })
    }

    /// Select an option on the active question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidPhase` unless the session is `Active`, and
    /// `SessionError::OptionOutOfRange` if `option` does not exist.
    pub fn select(&mut self, option: usize) -> Result<Step, SessionError> {
        let Phase::Active { index, .. } = self.phase else {
            return Err(self.reject("select an option"));
        };

        let len = match self.question_at(index) {
            Ok(question) => question.options().len(),
            Err(err) => return Ok(self.fail_structurally(err)),
        };
        if option >= len {
            return Err(SessionError::OptionOutOfRange { option, len });
        }

        Ok(self.answer(index, Some(option)))
    }

    fn answer(&mut self, index: usize, selected: Option<usize>) -> Step {
        let correct = match self.question_at(index) {
            Ok(question) => question.is_correct(selected),
            Err(err) => return self.fail_structurally(err),
        };

        if correct {
            self.score = self.score.saturating_add(1);
        }
        self.selected = selected;
        self.answers.push(AnswerRecord {
            index,
            selected,
            correct,
        });
        self.phase = Phase::AnsweredPause { index, selected };

        Step::Answered {
            index,
            selected,
            correct,
        }
    }

    /// Leave the feedback pause: next question, or completion after the last.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidPhase` unless the session is `AnsweredPause`.
    pub fn advance(&mut self) -> Result<Step, SessionError> {
        let Phase::AnsweredPause { index, .. } = self.phase else {
            return Err(self.reject("advance"));
        };

        if let Err(err) = self.question_at(index) {
            return Ok(self.fail_structurally(err));
        }

        let next = index + 1;
        self.selected = None;
        if next < self.questions.len() {
            self.current = next;
            self.phase = Phase::Active {
                index: next,
                remaining_secs: self.settings.question_time_secs,
            };
            Ok(Step::Advanced { index: next })
        } else {
            self.current = self.questions.len();
            self.phase = Phase::Complete { score: self.score };
            Ok(Step::Completed {
                score: self.score,
                points: self.points(),
            })
        }
    }

    /// Tear the session down mid-quiz.
    ///
    /// Returns `true` if a quiz was in progress (and the session is now
    /// `Failed`); terminal sessions are left alone.
    pub fn abandon(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = Phase::Failed { unlock_at: None };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn question(n: usize) -> Question {
        Question::new(
            format!("Question {n}"),
            vec!["right".into(), "wrong".into(), "also wrong".into()],
            0,
        )
        .unwrap()
    }

    fn five() -> Vec<Question> {
        (0..5).map(question).collect()
    }

    fn settings() -> SessionSettings {
        SessionSettings::default()
    }

    #[test]
    fn starts_on_first_question_with_full_timer() {
        let session = QuizSession::start(five(), settings());
        assert_eq!(
            session.phase(),
            &Phase::Active {
                index: 0,
                remaining_secs: 10
            }
        );
        assert_eq!(session.current_question().unwrap().text(), "Question 0");
    }

    #[test]
    fn empty_set_is_a_structural_error() {
        let session = QuizSession::start(Vec::new(), settings());
        assert_eq!(
            session.phase(),
            &Phase::Error(SessionFault::Structural(
                StructuralError::EmptyQuestionSet
            ))
        );
    }

    #[test]
    fn short_set_is_a_structural_error() {
        let session = QuizSession::start(vec![question(0), question(1)], settings());
        assert!(matches!(
            session.phase(),
            Phase::Error(SessionFault::Structural(
                StructuralError::WrongQuestionCount {
                    expected: 5,
                    actual: 2
                }
            ))
        ));
    }

    #[test]
    fn all_correct_completes_with_full_score() {
        let mut session = QuizSession::start(five(), settings());
        let mut completed = Vec::new();
        for _ in 0..5 {
            session.select(0).unwrap();
            if let Step::Completed { score, points } = session.advance().unwrap() {
                completed.push((score, points));
            }
        }
        assert_eq!(completed, vec![(5, 50)]);
        assert_eq!(session.phase(), &Phase::Complete { score: 5 });
        assert_eq!(session.current_index(), 5);
    }

    #[test]
    fn wrong_answers_never_score() {
        let mut session = QuizSession::start(five(), settings());
        for _ in 0..5 {
            let step = session.select(2).unwrap();
            assert!(matches!(step, Step::Answered { correct: false, .. }));
            session.advance().unwrap();
        }
        assert_eq!(session.score(), 0);
        assert_eq!(session.points(), 0);
    }

    #[test]
    fn timeout_counts_as_wrong_and_advances() {
        let mut session = QuizSession::start(five(), settings());
        for _ in 0..2 {
            session.select(0).unwrap();
            session.advance().unwrap();
        }

        // Question 3 of 5 runs out.
        for _ in 0..9 {
            assert!(matches!(session.tick().unwrap(), Step::Ticked { .. }));
        }
        let step = session.tick().unwrap();
        assert_eq!(
            step,
            Step::Answered {
                index: 2,
                selected: None,
                correct: false
            }
        );
        assert_eq!(session.score(), 2);

        assert_eq!(session.advance().unwrap(), Step::Advanced { index: 3 });
        assert_eq!(
            session.phase(),
            &Phase::Active {
                index: 3,
                remaining_secs: 10
            }
        );
        assert_eq!(session.score(), 2);
    }

    #[test]
    fn selection_out_of_range_is_rejected_without_change() {
        let mut session = QuizSession::start(five(), settings());
        let err = session.select(7).unwrap_err();
        assert_eq!(err, SessionError::OptionOutOfRange { option: 7, len: 3 });
        assert!(matches!(session.phase(), Phase::Active { index: 0, .. }));
    }

    #[test]
    fn cannot_answer_twice_during_feedback() {
        let mut session = QuizSession::start(five(), settings());
        session.select(0).unwrap();
        assert!(session.select(0).is_err());
        assert!(session.tick().is_err());
        assert_eq!(session.score(), 1);
    }

    #[test]
    fn terminal_phases_reject_every_transition() {
        let mut sessions = vec![
            QuizSession::locked(fixed_now(), settings()),
            QuizSession::failed(None, settings()),
            QuizSession::unavailable(settings()),
            QuizSession::start(Vec::new(), settings()),
        ];
        let mut complete = QuizSession::start(five(), settings());
        for _ in 0..5 {
            complete.select(1).unwrap();
            complete.advance().unwrap();
        }
        sessions.push(complete);

        for session in &mut sessions {
            let before = session.phase().clone();
            assert!(session.tick().is_err());
            assert!(session.select(0).is_err());
            assert!(session.advance().is_err());
            assert!(!session.abandon());
            assert_eq!(session.phase(), &before);
        }
    }

    #[test]
    fn abandon_mid_quiz_fails_session() {
        let mut session = QuizSession::start(five(), settings());
        session.select(0).unwrap();
        assert!(session.abandon());
        assert_eq!(session.phase(), &Phase::Failed { unlock_at: None });
    }

    #[test]
    fn answers_are_recorded_in_order() {
        let mut session = QuizSession::start(five(), settings());
        session.select(1).unwrap();
        session.advance().unwrap();
        session.select(0).unwrap();
        let answers = session.answers();
        assert_eq!(answers.len(), 2);
        assert!(!answers[0].correct);
        assert!(answers[1].correct);
        assert_eq!(answers[1].selected, Some(0));
    }

    #[test]
    fn abandon_policy_parses() {
        assert_eq!("fail-day".parse::<AbandonPolicy>().unwrap(), AbandonPolicy::FailDay);
        assert_eq!("Resumable".parse::<AbandonPolicy>().unwrap(), AbandonPolicy::Resumable);
        assert!("sometimes".parse::<AbandonPolicy>().is_err());
    }
}
