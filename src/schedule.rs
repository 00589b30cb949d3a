//! Exponential-backoff review schedule.
//!
//! Each correct answer doubles the time until the next test:
//! streak 0 -> 1 day, streak 1 -> 2 days, streak 2 -> 4 days, ...
//! An incorrect answer resets the streak and makes the entry due today.

use chrono::{Duration, NaiveDate};

use crate::db::TestingRecord;

/// Interval after the first correct answer, in days
pub const DEFAULT_BASE_INTERVAL: f64 = 1.0;

/// Growth factor applied per consecutive correct answer
pub const DEFAULT_INTERVAL_RATE: f64 = 2.0;

/// Upper bound on a single interval (~100 years). Keeps date arithmetic in
/// range when a caller replays correct answers far past any streak reachable
/// through date-gated reviews.
pub const MAX_INTERVAL_DAYS: i64 = 36_500;

/// Result of applying one review to a testing record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    /// Days added to the test date (None for an incorrect answer)
    pub interval_days: Option<i64>,

    /// Whether the record changed and needs writing back
    pub changed: bool,
}

/// Days until the next test for a record at `streak` consecutive correct
/// answers, BEFORE counting the answer being evaluated.
///
/// Fractional intervals are floored, with a minimum of one day and a cap of
/// `MAX_INTERVAL_DAYS`. With the default base and rate the product is always
/// integral, so the floor only matters if the constants change.
pub fn interval_days(streak: i64) -> i64 {
    let exponent = streak.clamp(0, i32::MAX as i64) as i32;
    let raw = DEFAULT_BASE_INTERVAL * DEFAULT_INTERVAL_RATE.powi(exponent);
    (raw.floor() as i64).clamp(1, MAX_INTERVAL_DAYS)
}

/// Apply one answer to a testing record.
///
/// Correct: advance `test_date` by `interval_days(streak)` and increment the
/// streak. Incorrect: reset the streak to 0 and make the record due `today`,
/// skipping the write when nothing changed.
pub fn apply_review(record: &mut TestingRecord, correct: bool, today: NaiveDate) -> ReviewOutcome {
    if correct {
        let days = interval_days(record.correct_streak);
        record.correct_streak += 1;
        record.test_date = record
            .test_date
            .checked_add_signed(Duration::days(days))
            .unwrap_or(NaiveDate::MAX);

        ReviewOutcome {
            interval_days: Some(days),
            changed: true,
        }
    } else {
        let changed = record.correct_streak != 0 || record.test_date != today;
        record.correct_streak = 0;
        record.test_date = today;

        ReviewOutcome {
            interval_days: None,
            changed,
        }
    }
}
