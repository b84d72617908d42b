use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuizId, UserId};

/// Title used when the author leaves it blank.
pub const UNTITLED_QUIZ: &str = "Untitled Quiz";

/// Options a fresh question starts with.
pub const DEFAULT_OPTION_COUNT: usize = 4;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DraftError {
    #[error("question {index}: text cannot be empty")]
    EmptyText { index: usize },

    #[error("question {index}: option {option} cannot be empty")]
    EmptyOption { index: usize, option: usize },

    #[error("question {index}: needs at least two options")]
    TooFewOptions { index: usize },

    #[error("question {index}: no correct answer chosen")]
    MissingAnswer { index: usize },

    #[error("question {index}: answer {answer} is out of range")]
    AnswerOutOfRange { index: usize, answer: usize },

    #[error("question {index}: {kind:?} question needs media")]
    MissingMedia { index: usize, kind: QuestionKind },

    #[error("question {index} does not exist")]
    NoSuchQuestion { index: usize },

    #[error("a quiz needs at least one question")]
    LastQuestion,
}

//
// ─── QUESTION KIND ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    #[default]
    Text,
    Image,
    Audio,
    Video,
}

impl QuestionKind {
    /// Detect the kind from a `data:` URL's media type.
    #[must_use]
    pub fn from_data_url(url: &str) -> Self {
        if url.starts_with("data:image/") {
            Self::Image
        } else if url.starts_with("data:audio/") {
            Self::Audio
        } else if url.starts_with("data:video/") {
            Self::Video
        } else {
            Self::Text
        }
    }
}

//
// ─── PUBLISHED QUIZ ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoredQuestion {
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    pub options: Vec<String>,
    pub answer: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    pub id: QuizId,
    pub creator: UserId,
    pub title: String,
    pub questions: Vec<AuthoredQuestion>,
    pub created_at: DateTime<Utc>,
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub kind: QuestionKind,
    pub text: String,
    pub media: Option<String>,
    pub options: Vec<String>,
    pub answer: Option<usize>,
}

impl Default for QuestionDraft {
    fn default() -> Self {
        Self {
            kind: QuestionKind::Text,
            text: String::new(),
            media: None,
            options: vec![String::new(); DEFAULT_OPTION_COUNT],
            answer: None,
        }
    }
}

impl QuestionDraft {
    /// Attach media and derive the question kind from it.
    pub fn set_media(&mut self, data_url: impl Into<String>) {
        let data_url = data_url.into();
        self.kind = QuestionKind::from_data_url(&data_url);
        self.media = Some(data_url);
    }

    /// Set option `option`'s text. Out-of-range options are ignored.
    pub fn set_option(&mut self, option: usize, text: impl Into<String>) {
        if let Some(slot) = self.options.get_mut(option) {
            *slot = text.into();
        }
    }

    fn validate(&self, index: usize) -> Result<AuthoredQuestion, DraftError> {
        if self.text.trim().is_empty() {
            return Err(DraftError::EmptyText { index });
        }
        if self.options.len() < 2 {
            return Err(DraftError::TooFewOptions { index });
        }
        if let Some(option) = self.options.iter().position(|o| o.trim().is_empty()) {
            return Err(DraftError::EmptyOption { index, option });
        }
        let answer = self.answer.ok_or(DraftError::MissingAnswer { index })?;
        if answer >= self.options.len() {
            return Err(DraftError::AnswerOutOfRange { index, answer });
        }
        if self.kind != QuestionKind::Text && self.media.is_none() {
            return Err(DraftError::MissingMedia {
                index,
                kind: self.kind,
            });
        }

        Ok(AuthoredQuestion {
            kind: self.kind,
            text: self.text.clone(),
            media: self.media.clone(),
            options: self.options.clone(),
            answer,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// A quiz being edited. Always holds at least one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizDraft {
    title: String,
    questions: Vec<QuestionDraft>,
    current: usize,
}

impl Default for QuizDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            questions: vec![QuestionDraft::default()],
            current: 0,
        }
    }
}

impl QuizDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[QuestionDraft] {
        &self.questions
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    /// # Errors
    ///
    /// Returns `DraftError::NoSuchQuestion` if `index` is out of range.
    pub fn question_mut(&mut self, index: usize) -> Result<&mut QuestionDraft, DraftError> {
        self.questions
            .get_mut(index)
            .ok_or(DraftError::NoSuchQuestion { index })
    }

    /// Append a blank question and make it current. Returns its index.
    pub fn add_question(&mut self) -> usize {
        self.questions.push(QuestionDraft::default());
        self.current = self.questions.len() - 1;
        self.current
    }

    /// # Errors
    ///
    /// Returns `DraftError::LastQuestion` when only one question is left, or
    /// `DraftError::NoSuchQuestion` if `index` is out of range.
    pub fn remove_question(&mut self, index: usize) -> Result<(), DraftError> {
        if index >= self.questions.len() {
            return Err(DraftError::NoSuchQuestion { index });
        }
        if self.questions.len() == 1 {
            return Err(DraftError::LastQuestion);
        }
        self.questions.remove(index);
        self.current = self.current.saturating_sub(1).min(self.questions.len() - 1);
        Ok(())
    }

    /// Swap a question with its neighbour. Moving past either end is a no-op.
    ///
    /// Returns the question's new index when it moved.
    pub fn move_question(&mut self, index: usize, direction: MoveDirection) -> Option<usize> {
        let target = match direction {
            MoveDirection::Up => index.checked_sub(1)?,
            MoveDirection::Down => index.checked_add(1)?,
        };
        if index >= self.questions.len() || target >= self.questions.len() {
            return None;
        }
        self.questions.swap(index, target);
        self.current = target;
        Some(target)
    }

    /// True when every question would pass validation.
    #[must_use]
    pub fn is_publishable(&self) -> bool {
        self.questions
            .iter()
            .enumerate()
            .all(|(i, q)| q.validate(i).is_ok())
    }

    /// Validate every question and produce the quiz to store.
    ///
    /// # Errors
    ///
    /// Returns the first `DraftError` found, in question order.
    pub fn publish(
        &self,
        id: QuizId,
        creator: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<Quiz, DraftError> {
        let questions = self
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| q.validate(i))
            .collect::<Result<Vec<_>, _>>()?;

        let title = match self.title.trim() {
            "" => UNTITLED_QUIZ.to_owned(),
            t => t.to_owned(),
        };

        Ok(Quiz {
            id,
            creator,
            title,
            questions,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn fill(q: &mut QuestionDraft, text: &str) {
        q.text = text.into();
        for i in 0..q.options.len() {
            q.set_option(i, format!("{text} option {i}"));
        }
        q.answer = Some(1);
    }

    #[test]
    fn new_draft_has_one_blank_question() {
        let draft = QuizDraft::new();
        assert_eq!(draft.questions().len(), 1);
        assert_eq!(draft.questions()[0].options.len(), DEFAULT_OPTION_COUNT);
        assert!(!draft.is_publishable());
    }

    #[test]
    fn media_prefix_sets_kind() {
        assert_eq!(QuestionKind::from_data_url("data:image/png;base64,AA"), QuestionKind::Image);
        assert_eq!(QuestionKind::from_data_url("data:audio/mpeg;base64,AA"), QuestionKind::Audio);
        assert_eq!(QuestionKind::from_data_url("data:video/mp4;base64,AA"), QuestionKind::Video);
        assert_eq!(QuestionKind::from_data_url("https://x/y.png"), QuestionKind::Text);
    }

    #[test]
    fn cannot_remove_last_question() {
        let mut draft = QuizDraft::new();
        assert_eq!(draft.remove_question(0), Err(DraftError::LastQuestion));
    }

    #[test]
    fn add_and_move_questions() {
        let mut draft = QuizDraft::new();
        fill(draft.question_mut(0).unwrap(), "first");
        assert_eq!(draft.add_question(), 1);
        fill(draft.question_mut(1).unwrap(), "second");

        assert_eq!(draft.move_question(1, MoveDirection::Up), Some(0));
        assert_eq!(draft.questions()[0].text, "second");
        assert_eq!(draft.current(), 0);

        assert_eq!(draft.move_question(0, MoveDirection::Up), None);
        assert_eq!(draft.move_question(1, MoveDirection::Down), None);
    }

    #[test]
    fn removing_moves_cursor_back() {
        let mut draft = QuizDraft::new();
        draft.add_question();
        draft.add_question();
        assert_eq!(draft.current(), 2);
        draft.remove_question(2).unwrap();
        assert_eq!(draft.current(), 1);
        assert_eq!(draft.questions().len(), 2);
    }

    #[test]
    fn publish_reports_first_problem() {
        let mut draft = QuizDraft::new();
        fill(draft.question_mut(0).unwrap(), "ok");
        draft.add_question();
        let q = draft.question_mut(1).unwrap();
        fill(q, "broken");
        q.set_option(2, "  ");

        let err = draft
            .publish(QuizId::random(), UserId::new(1), fixed_now())
            .unwrap_err();
        assert_eq!(err, DraftError::EmptyOption { index: 1, option: 2 });
    }

    #[test]
    fn media_question_requires_media() {
        let mut draft = QuizDraft::new();
        let q = draft.question_mut(0).unwrap();
        fill(q, "look");
        q.kind = QuestionKind::Image;
        assert!(matches!(
            draft.publish(QuizId::random(), UserId::new(1), fixed_now()),
            Err(DraftError::MissingMedia { index: 0, .. })
        ));

        draft
            .question_mut(0)
            .unwrap()
            .set_media("data:image/png;base64,AAAA");
        assert!(draft.is_publishable());
    }

    #[test]
    fn blank_title_defaults() {
        let mut draft = QuizDraft::new();
        fill(draft.question_mut(0).unwrap(), "q");
        draft.set_title("   ");
        let quiz = draft
            .publish(QuizId::random(), UserId::new(9), fixed_now())
            .unwrap();
        assert_eq!(quiz.title, UNTITLED_QUIZ);
        assert_eq!(quiz.creator, UserId::new(9));
        assert_eq!(quiz.questions[0].answer, 1);
    }
}
