//! Daily question source backed by an HTTP trivia provider.

use async_trait::async_trait;
use quiz_core::DateKey;
use quiz_core::model::Question;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

/// Provides the question set for a quiz day.
///
/// Implementations must return the same questions, in the same order and
/// with the same option placement, for the same day.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// # Errors
    ///
    /// Returns `FetchError` when the questions cannot be loaded or mapped.
    async fn fetch_daily_questions(&self, day: DateKey) -> Result<Vec<Question>, FetchError>;
}

#[derive(Clone)]
pub struct TriviaClient {
    client: Client,
    base_url: Url,
    question_count: usize,
}

impl TriviaClient {
    #[must_use]
    pub fn new(base_url: Url, question_count: usize) -> Self {
        Self {
            client: Client::new(),
            base_url,
            question_count,
        }
    }

    /// `{base}/v2/questions?limit=N&seed=SEED`
    #[must_use]
    pub fn questions_url(&self, day: DateKey) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["v2", "questions"]);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("limit", &self.question_count.to_string())
            .append_pair("seed", &day.seed().to_string());
        url
    }
}

#[async_trait]
impl QuestionSource for TriviaClient {
    async fn fetch_daily_questions(&self, day: DateKey) -> Result<Vec<Question>, FetchError> {
        let url = self.questions_url(day);
        debug!(%day, %url, "requesting trivia questions");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            warn!(%day, status = %response.status(), "trivia request rejected");
            return Err(FetchError::HttpStatus(response.status()));
        }

        let body = response.text().await?;
        let records: Vec<TriviaRecord> =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;

        map_records(records, day.seed(), self.question_count)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriviaRecord {
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
    pub question: TriviaText,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriviaText {
    pub text: String,
}

/// Turn provider records into exactly `count` questions.
///
/// Extra records are ignored. Option placement depends only on `seed` and the
/// question's position.
///
/// # Errors
///
/// Returns `FetchError::Empty` or `FetchError::Incomplete` when too few
/// records arrive, and `FetchError::InvalidQuestion` when one cannot form a
/// valid question.
pub fn map_records(
    records: Vec<TriviaRecord>,
    seed: u64,
    count: usize,
) -> Result<Vec<Question>, FetchError> {
    if records.is_empty() {
        return Err(FetchError::Empty);
    }
    if records.len() < count {
        return Err(FetchError::Incomplete {
            expected: count,
            actual: records.len(),
        });
    }

    records
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(index, record)| {
            let (options, correct_index) = place_options(
                record.correct_answer,
                record.incorrect_answers,
                seed,
                index,
            );
            Question::new(record.question.text, options, correct_index)
                .map_err(|source| FetchError::InvalidQuestion { index, source })
        })
        .collect()
}

/// Shuffle the correct answer in among the incorrect ones.
///
/// Returns the options and the correct answer's index.
#[must_use]
pub fn place_options(
    correct: String,
    incorrect: Vec<String>,
    seed: u64,
    position: usize,
) -> (Vec<String>, usize) {
    let mut options = Vec::with_capacity(incorrect.len() + 1);
    options.push(correct);
    options.extend(incorrect);

    let mut order: Vec<usize> = (0..options.len()).collect();
    let mut rng = StdRng::seed_from_u64(question_seed(seed, position));
    order.shuffle(&mut rng);

    let correct_index = order.iter().position(|&i| i == 0).unwrap_or(0);
    let mut slots: Vec<Option<String>> = options.into_iter().map(Some).collect();
    let placed = order
        .iter()
        .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
        .collect();
    (placed, correct_index)
}

fn question_seed(seed: u64, position: usize) -> u64 {
    seed.wrapping_mul(1_000).wrapping_add(position as u64)
}
