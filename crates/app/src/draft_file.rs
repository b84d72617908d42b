//! Quiz drafts read from JSON files for `create --file`.

use std::path::Path;

use anyhow::{Context, Result};
use quiz_core::model::QuizDraft;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DraftFile {
    #[serde(default)]
    pub title: String,
    pub questions: Vec<DraftQuestion>,
}

#[derive(Debug, Deserialize)]
pub struct DraftQuestion {
    pub text: String,
    pub options: Vec<String>,
    pub answer: Option<usize>,
    /// `data:` URL for image, audio or video questions.
    #[serde(default)]
    pub media: Option<String>,
}

impl DraftFile {
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid draft in {}", path.display()))
    }

    /// Replay the file through the editor operations. Validation happens when
    /// the draft is published.
    pub fn into_draft(self) -> Result<QuizDraft> {
        let mut draft = QuizDraft::new();
        draft.set_title(self.title);

        for (index, question) in self.questions.into_iter().enumerate() {
            if index > 0 {
                draft.add_question();
            }
            let slot = draft.question_mut(index)?;
            slot.text = question.text;
            slot.options = question.options;
            slot.answer = question.answer;
            if let Some(media) = question.media {
                slot.set_media(media);
            }
        }
        Ok(draft)
    }
}
