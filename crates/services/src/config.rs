use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use quiz_core::DailySchedule;
use quiz_core::session::{AbandonPolicy, SessionSettings};
use tracing::warn;
use url::Url;

pub const DEFAULT_TRIVIA_URL: &str = "https://the-trivia-api.com";
pub const DEFAULT_SHARE_BASE: &str = "https://farcaster.xyz/frame/quiz";
pub const DEFAULT_FEEDBACK_MS: u64 = 1_000;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 4_000;
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

/// Runtime settings for the daily quiz and the quiz library.
#[derive(Clone, Debug)]
pub struct QuizConfig {
    pub trivia_url: Url,
    pub session: SessionSettings,
    pub feedback_delay: Duration,
    pub fetch_timeout: Duration,
    pub schedule: DailySchedule,
    pub abandon_policy: AbandonPolicy,
    pub share_base: String,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            trivia_url: default_trivia_url(),
            session: SessionSettings::default(),
            feedback_delay: Duration::from_millis(DEFAULT_FEEDBACK_MS),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            schedule: DailySchedule::default(),
            abandon_policy: AbandonPolicy::default(),
            share_base: DEFAULT_SHARE_BASE.to_owned(),
        }
    }
}

impl QuizConfig {
    /// Read `QUIZ_*` environment variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Invalid values are logged and
    /// replaced by their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let trivia_url = lookup("QUIZ_TRIVIA_URL")
            .and_then(|raw| match Url::parse(raw.trim()) {
                Ok(url) if !url.cannot_be_a_base() => Some(url),
                Ok(_) => {
                    warn!("QUIZ_TRIVIA_URL {raw} cannot be a base URL, using default");
                    None
                }
                Err(e) => {
                    warn!("Invalid QUIZ_TRIVIA_URL value: {e}");
                    None
                }
            })
            .unwrap_or(defaults.trivia_url);

        let session = SessionSettings {
            question_count: positive(
                &lookup,
                "QUIZ_QUESTION_COUNT",
                defaults.session.question_count,
            ),
            question_time_secs: positive(
                &lookup,
                "QUIZ_QUESTION_SECS",
                defaults.session.question_time_secs,
            ),
            points_per_question: parse_or(
                &lookup,
                "QUIZ_POINTS_PER_QUESTION",
                defaults.session.points_per_question,
            ),
        };

        let feedback_delay = Duration::from_millis(parse_or(
            &lookup,
            "QUIZ_FEEDBACK_MS",
            DEFAULT_FEEDBACK_MS,
        ));
        let fetch_timeout = Duration::from_millis(positive(
            &lookup,
            "QUIZ_FETCH_TIMEOUT_MS",
            DEFAULT_FETCH_TIMEOUT_MS,
        ));

        let schedule = schedule_from(&lookup).unwrap_or(defaults.schedule);
        let abandon_policy = parse_or(&lookup, "QUIZ_ABANDON_POLICY", defaults.abandon_policy);
        let share_base = lookup("QUIZ_SHARE_BASE")
            .map(|s| s.trim().trim_end_matches('/').to_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.share_base);

        Self {
            trivia_url,
            session,
            feedback_delay,
            fetch_timeout,
            schedule,
            abandon_policy,
            share_base,
        }
    }
}

fn default_trivia_url() -> Url {
    Url::parse(DEFAULT_TRIVIA_URL).expect("default trivia url is valid")
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default");
        default
    })
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Copy,
    T::Err: Display,
{
    let value = parse_or(lookup, key, default);
    if value > T::default() {
        value
    } else {
        warn!("{key} must be positive, using default");
        default
    }
}

fn schedule_from(lookup: &impl Fn(&str) -> Option<String>) -> Option<DailySchedule> {
    let minutes = parse_or(lookup, "QUIZ_UTC_OFFSET_MINUTES", DEFAULT_UTC_OFFSET_MINUTES);
    let reset_time = match lookup("QUIZ_RESET_TIME") {
        Some(raw) => match parse_reset_time(&raw) {
            Some(time) => time,
            None => {
                warn!("Invalid QUIZ_RESET_TIME value {raw:?}, using default");
                DailySchedule::default().reset_time()
            }
        },
        None => DailySchedule::default().reset_time(),
    };

    let schedule = DailySchedule::from_offset_minutes(minutes, reset_time);
    if schedule.is_none() {
        warn!("QUIZ_UTC_OFFSET_MINUTES {minutes} is out of range, using default");
    }
    schedule
}

fn parse_reset_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}
