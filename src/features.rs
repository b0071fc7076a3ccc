//! Non-semantic input features.
//!
//! One immutable record per request. Nothing here reads the meaning of the
//! question — only surface signals: length, punctuation, time of day, and how
//! many times this session has asked before.

use chrono::{Local, Timelike};
use serde::{Deserialize, Serialize};

/// Character-length buckets for the raw question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthCategory {
    Empty,
    VeryShort,
    Short,
    Medium,
    Long,
}

impl LengthCategory {
    fn from_len(char_length: usize) -> Self {
        match char_length {
            0 => Self::Empty,
            1..=5 => Self::VeryShort,
            6..=15 => Self::Short,
            16..=30 => Self::Medium,
            _ => Self::Long,
        }
    }
}

/// Immutable feature snapshot for one request.
///
/// Invariant: `is_midnight`, `is_dawn`, `is_worktime` and `length_category`
/// are derived from `hour` / `char_length` in the constructor and are never
/// set independently. Construct only through [`Features::new`] or
/// [`Features::extract`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Features {
    pub is_empty: bool,
    pub char_length: usize,
    pub has_question_mark: bool,
    pub hour: u32,
    pub attempt_count: usize,
    pub is_midnight: bool,
    pub is_dawn: bool,
    pub is_worktime: bool,
    pub length_category: LengthCategory,
}

impl Features {
    pub fn new(
        is_empty: bool,
        char_length: usize,
        has_question_mark: bool,
        hour: u32,
        attempt_count: usize,
    ) -> Self {
        Self {
            is_empty,
            char_length,
            has_question_mark,
            hour,
            attempt_count,
            is_midnight: hour >= 23 || hour < 5,
            is_dawn: (5..7).contains(&hour),
            is_worktime: (9..18).contains(&hour),
            length_category: LengthCategory::from_len(char_length),
        }
    }

    /// Extract features from raw input at the current wall-clock hour.
    ///
    /// `history_count` is the number of prior requests in this session;
    /// `attempt_count` is 1-based and includes the current call. Any string
    /// input is valid, including empty.
    pub fn extract(question: &str, history_count: usize) -> Self {
        Self::extract_at(question, history_count, Local::now().hour())
    }

    /// Same as [`Features::extract`] with an explicit hour, for callers that
    /// need a pinned clock.
    pub fn extract_at(question: &str, history_count: usize, hour: u32) -> Self {
        let trimmed = question.trim();
        let char_length = trimmed.chars().count();
        let has_question_mark = trimmed.contains('?') || trimmed.contains('？');

        let features = Self::new(
            char_length == 0,
            char_length,
            has_question_mark,
            hour,
            history_count + 1,
        );
        tracing::debug!(?features, "extracted input features");
        features
    }
}
