use quiz_core::DateKey;
use quiz_core::model::{AuthoredQuestion, QuestionKind, QuizId, UserId};
use serde_json::Value;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Map insert failures, turning unique-key violations into `Conflict`.
pub(crate) fn insert_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
    }
    conn(e)
}

pub(crate) fn user_id_to_i64(id: UserId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("user_id overflow".into()))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    u64::try_from(v)
        .map(UserId::new)
        .map_err(|_| StorageError::Serialization("user_id sign overflow".into()))
}

pub(crate) fn quiz_id_from_str(s: &str) -> Result<QuizId, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn date_key_from_str(s: &str) -> Result<DateKey, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn encode_questions(questions: &[AuthoredQuestion]) -> Result<String, StorageError> {
    serde_json::to_string(questions).map_err(ser)
}

/// Read one stored question, replacing every missing or mistyped field with
/// its placeholder.
fn question_from_value(value: &Value) -> AuthoredQuestion {
    let kind = match value.get("type").and_then(Value::as_str) {
        Some("image") => QuestionKind::Image,
        Some("audio") => QuestionKind::Audio,
        Some("video") => QuestionKind::Video,
        _ => QuestionKind::Text,
    };
    let text = value
        .get("text")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .unwrap_or("No question text")
        .to_owned();
    let options = match value.get("options") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => vec!["No options available".to_owned()],
    };
    AuthoredQuestion {
        kind,
        text,
        media: value.get("media").and_then(Value::as_str).map(str::to_owned),
        options,
        answer: value
            .get("answer")
            .and_then(Value::as_u64)
            .and_then(|a| usize::try_from(a).ok())
            .unwrap_or(0),
    }
}

/// Decode stored quiz questions, filling gaps with placeholders.
///
/// Accepts a JSON array or a JSON string holding an array. Each element is
/// read on its own, so one bad field only affects its question. Anything that
/// cannot be read as a list decodes to no questions.
pub(crate) fn decode_questions(raw: Option<&str>) -> Vec<AuthoredQuestion> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(inner)) => serde_json::from_str::<Value>(&inner).unwrap_or(Value::Null),
        Ok(other) => other,
        Err(_) => Value::Null,
    };
    match value {
        Value::Array(items) => items.iter().map(question_from_value).collect(),
        _ => Vec::new(),
    }
}
