//! Destiny state machine.
//!
//! Maps a feature record to the asker's psychological state. Pure rules over
//! surface signals — no semantic understanding of the question.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::features::{Features, LengthCategory};

/// Closed set of asker states. Produced fresh per request, never persisted as
/// mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DestinyState {
    Hesitating,
    AlreadyDecided,
    Unwilling,
    MidnightEscape,
    SelfDeception,
    FirstTime,
    Repeated,
    EmptyHeart,
    SeekingConfirmation,
}

/// Classify a feature record into a destiny state.
///
/// Ordered decision list: the first matching rule wins. The rules overlap by
/// construction (a midnight third attempt satisfies both the repeat rule and
/// the midnight rule) and the order below is load-bearing — reordering it is
/// a behavioral change, not a cleanup.
pub fn classify(features: &Features) -> DestinyState {
    use LengthCategory::{Long, Medium, Short, VeryShort};

    // Empty input
    if features.is_empty {
        return if features.attempt_count == 1 {
            DestinyState::EmptyHeart
        } else {
            DestinyState::SelfDeception
        };
    }

    // Midnight + short input
    if features.is_midnight && matches!(features.length_category, VeryShort | Short) {
        return if features.attempt_count > 1 {
            DestinyState::MidnightEscape
        } else {
            DestinyState::FirstTime
        };
    }

    // Asking again and again
    if features.attempt_count >= 3 {
        return if features.has_question_mark {
            DestinyState::Unwilling
        } else {
            DestinyState::Repeated
        };
    }

    // Question mark + medium-or-longer input
    if features.has_question_mark && matches!(features.length_category, Medium | Long) {
        return if features.attempt_count > 1 {
            DestinyState::Hesitating
        } else {
            DestinyState::FirstTime
        };
    }

    // No question mark + short input
    if !features.has_question_mark && matches!(features.length_category, VeryShort | Short) {
        return if features.attempt_count > 1 {
            DestinyState::AlreadyDecided
        } else {
            DestinyState::SeekingConfirmation
        };
    }

    // Long input
    if features.length_category == Long {
        return DestinyState::Hesitating;
    }

    DestinyState::FirstTime
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn feat(
        char_length: usize,
        has_question_mark: bool,
        hour: u32,
        attempt_count: usize,
    ) -> Features {
        Features::new(char_length == 0, char_length, has_question_mark, hour, attempt_count)
    }

    #[test]
    fn empty_first_attempt_is_empty_heart() {
        assert_eq!(classify(&feat(0, false, 14, 1)), DestinyState::EmptyHeart);
    }

    #[test]
    fn empty_repeat_is_self_deception() {
        assert_eq!(classify(&feat(0, false, 14, 2)), DestinyState::SelfDeception);
    }

    #[test]
    fn midnight_short_repeat_is_midnight_escape() {
        assert_eq!(classify(&feat(4, false, 2, 2)), DestinyState::MidnightEscape);
        assert_eq!(classify(&feat(10, true, 23, 3)), DestinyState::MidnightEscape);
    }

    #[test]
    fn midnight_short_first_attempt_is_first_time() {
        assert_eq!(classify(&feat(4, false, 2, 1)), DestinyState::FirstTime);
    }

    #[test]
    fn third_attempt_with_question_mark_is_unwilling() {
        // Daytime, so the midnight rule does not swallow it first.
        assert_eq!(classify(&feat(20, true, 14, 3)), DestinyState::Unwilling);
    }

    #[test]
    fn third_attempt_without_question_mark_is_repeated() {
        assert_eq!(classify(&feat(20, false, 14, 3)), DestinyState::Repeated);
    }

    #[test]
    fn question_mark_medium_repeat_is_hesitating() {
        assert_eq!(classify(&feat(20, true, 14, 2)), DestinyState::Hesitating);
        assert_eq!(classify(&feat(20, true, 14, 1)), DestinyState::FirstTime);
    }

    #[test]
    fn short_statement_repeat_is_already_decided() {
        assert_eq!(classify(&feat(8, false, 14, 2)), DestinyState::AlreadyDecided);
        assert_eq!(classify(&feat(8, false, 14, 1)), DestinyState::SeekingConfirmation);
    }

    #[test]
    fn long_statement_falls_to_hesitating() {
        assert_eq!(classify(&feat(40, false, 14, 1)), DestinyState::Hesitating);
    }

    #[test]
    fn short_question_first_attempt_falls_to_default() {
        // Question mark present but length is short: neither the
        // question-mark rule (wants medium/long) nor the no-question-mark
        // rule applies, so it falls through to the default.
        assert_eq!(classify(&feat(7, true, 14, 1)), DestinyState::FirstTime);
    }

    #[test]
    fn repeat_rule_wins_over_question_mark_rules_at_midnight_with_medium_input() {
        // attempt_count >= 3 with a medium-length question at 02:00: the
        // midnight rule needs a short input so it passes, and the repeat
        // rule fires before the question-mark rule is reached.
        assert_eq!(classify(&feat(20, true, 2, 3)), DestinyState::Unwilling);
    }

    #[test]
    fn classification_is_total() {
        for char_length in [0usize, 3, 10, 20, 40] {
            for has_qmark in [false, true] {
                for hour in 0..24 {
                    for attempt in 1..=5 {
                        // Must never panic; every combination lands on a state.
                        let state = classify(&feat(char_length, has_qmark, hour, attempt));
                        assert!(DestinyState::iter().any(|s| s == state));
                    }
                }
            }
        }
    }
}
