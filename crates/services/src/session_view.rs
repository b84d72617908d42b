use chrono::{DateTime, Utc};
use quiz_core::DateKey;
use quiz_core::session::{AnswerRecord, Phase, QuizSession};

/// Presentation-agnostic view of the question on screen.
///
/// The correct index is only revealed while feedback is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub index: usize,
    pub total: usize,
    pub text: String,
    pub options: Vec<String>,
    pub remaining_secs: Option<u32>,
    pub selected: Option<usize>,
    pub correct_index: Option<usize>,
}

impl QuestionView {
    #[must_use]
    pub fn from_session(session: &QuizSession) -> Option<Self> {
        let question = session.current_question()?;
        let (index, remaining_secs, selected, correct_index) = match *session.phase() {
            Phase::Active {
                index,
                remaining_secs,
            } => (index, Some(remaining_secs), None, None),
            Phase::AnsweredPause { index, selected } => {
                (index, None, selected, Some(question.correct_index()))
            }
            _ => return None,
        };
        Some(Self {
            index,
            total: session.questions().len(),
            text: question.text().to_owned(),
            options: question.options().to_vec(),
            remaining_secs,
            selected,
            correct_index,
        })
    }
}

/// Everything a front end needs to render a daily quiz.
///
/// No pre-formatted strings; errors are carried as their messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSnapshot {
    pub day: DateKey,
    pub phase: Phase,
    pub question: Option<QuestionView>,
    pub score: u32,
    pub points: u32,
    pub streak: u32,
    pub answers: Vec<AnswerRecord>,
    pub persisted: bool,
    pub fetch_error: Option<String>,
    pub write_error: Option<String>,
    /// Why the last command sent to a runner was not carried out.
    pub command_error: Option<String>,
}

impl QuizSnapshot {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// When the next quiz opens, for locked or failed sessions.
    #[must_use]
    pub fn unlock_at(&self) -> Option<DateTime<Utc>> {
        match self.phase {
            Phase::Locked { unlock_at } => Some(unlock_at),
            Phase::Failed { unlock_at } => unlock_at,
            _ => None,
        }
    }
}
