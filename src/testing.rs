//! Testing scheduler: picks the next due entry, builds the multiple-choice
//! quiz, and applies answer outcomes to the review schedule.

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::Connection;
use std::collections::VecDeque;

use crate::db::{self, Entry};
use crate::error::{Result, TutorError};
use crate::schedule;

/// Maximum number of wrong choices shown next to the tested entry
pub const MAX_DISTRACTORS: usize = 3;

/// One quiz round: the entry under test and the shuffled choice list
/// (tested entry included exactly once).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    pub tested: Entry,
    pub choices: Vec<Entry>,
}

/// Result of one submitted answer, carrying what the reveal view needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub entry: Entry,
    pub is_correct: bool,
}

/// Next quiz for the user on `today`, or `None` when nothing is due.
///
/// Eligible entries are learnt ones whose test date has arrived, taken in
/// catalog order. Distractors are drawn with the caller-supplied RNG so tests
/// can pin the draw.
pub fn select_next<R: Rng>(
    conn: &Connection,
    user_id: i64,
    today: NaiveDate,
    rng: &mut R,
) -> Result<Option<Quiz>> {
    let tested = match db::next_due_entry(conn, user_id, today)? {
        Some(entry) => entry,
        None => return Ok(None),
    };

    let pool = db::get_entries_excluding(conn, tested.id)?;
    let choices = build_choices(tested.clone(), pool, rng);

    Ok(Some(Quiz { tested, choices }))
}

/// Build the choice list: up to `MAX_DISTRACTORS` entries drawn uniformly
/// without replacement from the pool, each pushed to a random end of the list
/// around the tested entry.
///
/// The repeated push-front/push-back placement is NOT a uniform shuffle; it
/// biases later draws toward the ends of the list. The behavior is kept as-is
/// for compatibility.
pub fn build_choices<R: Rng>(tested: Entry, mut pool: Vec<Entry>, rng: &mut R) -> Vec<Entry> {
    let k = MAX_DISTRACTORS.min(pool.len());

    pool.shuffle(rng);
    pool.truncate(k);

    let mut choices = VecDeque::with_capacity(k + 1);
    choices.push_back(tested);

    for distractor in pool {
        if rng.gen_bool(0.5) {
            choices.push_back(distractor);
        } else {
            choices.push_front(distractor);
        }
    }

    choices.into()
}

/// Evaluate a submitted answer and update the entry's review schedule.
///
/// Correctness is id equality with the tested entry. The testing record is a
/// single read-modify-write; the update is skipped when nothing changed.
/// Fails with `NotFound` when the record or entry is absent.
pub fn submit_answer(
    conn: &Connection,
    user_id: i64,
    tested_entry_id: i64,
    chosen_entry_id: i64,
    today: NaiveDate,
) -> Result<Review> {
    let is_correct = chosen_entry_id == tested_entry_id;

    let mut record = db::get_testing_record(conn, user_id, tested_entry_id)?
        .ok_or_else(|| TutorError::not_found("testing record", tested_entry_id))?;

    let outcome = schedule::apply_review(&mut record, is_correct, today);

    if outcome.changed {
        db::update_testing_record(conn, &record)?;
    }

    tracing::debug!(
        "user {} answered entry {} {}: streak {}, next test {}",
        user_id,
        tested_entry_id,
        if is_correct { "correctly" } else { "incorrectly" },
        record.correct_streak,
        record.test_date
    );

    let entry = db::get_entry(conn, tested_entry_id)?
        .ok_or_else(|| TutorError::not_found("entry", tested_entry_id))?;

    Ok(Review { entry, is_correct })
}

/// Reveal view data: the entry and the carried answer flag. Pure read.
pub fn reveal(conn: &Connection, entry_id: i64, answer_correct: bool) -> Result<(Entry, bool)> {
    let entry = db::get_entry(conn, entry_id)?
        .ok_or_else(|| TutorError::not_found("entry", entry_id))?;

    Ok((entry, answer_correct))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use crate::learning;
    use chrono::Duration;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn learn(conn: &mut Connection, user_id: i64, writing: &str) -> i64 {
        let id = entry_id_by_writing(conn, writing);
        db::create_learning_record(conn, user_id, id).unwrap();
        learning::confirm_learnt(conn, user_id, id, today()).unwrap();
        id
    }

    #[test]
    fn test_select_next_only_learnt_entry() {
        // Catalog 日(1) 月(2) 火(3) 水(4); user learnt only 月
        let mut conn = seeded_connection();
        let moon = learn(&mut conn, 1, "月");

        let mut rng = StdRng::seed_from_u64(7);
        let quiz = select_next(&conn, 1, today(), &mut rng).unwrap().unwrap();

        assert_eq!(quiz.tested.id, moon, "Only learnt entry must be tested");
        assert_eq!(
            quiz.choices.iter().filter(|e| e.id == moon).count(),
            1,
            "Tested entry appears exactly once"
        );
        for choice in quiz.choices.iter().filter(|e| e.id != moon) {
            assert!(
                ["日", "火", "水"].contains(&choice.writing.as_str()),
                "Distractors come from the rest of the catalog only"
            );
        }
    }

    #[test]
    fn test_select_next_nothing_due() {
        let mut conn = seeded_connection();
        let moon = learn(&mut conn, 1, "月");

        // Push the only record into the future
        let mut record = db::get_testing_record(&conn, 1, moon).unwrap().unwrap();
        record.test_date = today() + Duration::days(3);
        db::update_testing_record(&conn, &record).unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        assert!(
            select_next(&conn, 1, today(), &mut rng).unwrap().is_none(),
            "Future-dated entries are not due"
        );
    }

    #[test]
    fn test_select_next_catalog_order_among_due() {
        let mut conn = seeded_connection();
        learn(&mut conn, 1, "火");
        let sun = learn(&mut conn, 1, "日");

        let mut rng = StdRng::seed_from_u64(7);
        let quiz = select_next(&conn, 1, today(), &mut rng).unwrap().unwrap();

        assert_eq!(
            quiz.tested.id, sun,
            "Due entries are tested in catalog order"
        );
    }

    #[test]
    fn test_build_choices_properties() {
        let tested = test_entry("日", "sun", 1);
        let pool: Vec<Entry> = (2..=8)
            .map(|i| {
                let mut e = test_entry(&format!("k{}", i), &format!("m{}", i), i);
                e.id = i;
                e
            })
            .collect();

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let choices = build_choices(tested.clone(), pool.clone(), &mut rng);

            assert_eq!(choices.len(), 1 + MAX_DISTRACTORS);
            assert_eq!(
                choices.iter().filter(|e| e.writing == "日").count(),
                1,
                "Tested entry exactly once"
            );

            let mut ids: Vec<i64> = choices.iter().map(|e| e.id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), choices.len(), "No duplicate choices");
        }
    }

    #[test]
    fn test_build_choices_small_pool() {
        let tested = test_entry("日", "sun", 1);
        let mut other = test_entry("月", "moon", 2);
        other.id = 2;

        let mut rng = StdRng::seed_from_u64(3);
        let choices = build_choices(tested.clone(), vec![other], &mut rng);
        assert_eq!(choices.len(), 2, "Pool of 1 gives 2 choices");

        let mut rng = StdRng::seed_from_u64(3);
        let choices = build_choices(tested, vec![], &mut rng);
        assert_eq!(choices.len(), 1, "Empty pool leaves only the tested entry");
    }

    #[test]
    fn test_build_choices_bias_is_preserved() {
        let tested = test_entry("日", "sun", 1);
        let pool: Vec<Entry> = (2..=5)
            .map(|i| {
                let mut e = test_entry(&format!("k{}", i), &format!("m{}", i), i);
                e.id = i;
                e
            })
            .collect();

        // StepRng(0, 0) makes every coin flip land on append, so the tested
        // entry stays pinned at the front instead of being shuffled inward.
        let mut rng = StepRng::new(0, 0);
        let choices = build_choices(tested.clone(), pool.clone(), &mut rng);
        assert_eq!(choices[0].writing, "日");

        // All-prepend pushes it to the back.
        let mut rng = StepRng::new(u64::MAX, 0);
        let choices = build_choices(tested, pool, &mut rng);
        assert_eq!(choices.last().unwrap().writing, "日");
    }

    #[test]
    fn test_submit_answer_correct_advances_schedule() {
        let mut conn = seeded_connection();
        let moon = learn(&mut conn, 1, "月");

        let review = submit_answer(&conn, 1, moon, moon, today()).unwrap();
        assert!(review.is_correct);
        assert_eq!(review.entry.id, moon);

        let record = db::get_testing_record(&conn, 1, moon).unwrap().unwrap();
        assert_eq!(record.correct_streak, 1);
        assert_eq!(record.test_date, today() + Duration::days(1));
    }

    #[test]
    fn test_submit_answer_interval_sequence() {
        let mut conn = seeded_connection();
        let moon = learn(&mut conn, 1, "月");

        // Answer correctly on each due date; gaps must be 1, 2, 4 days
        let mut due = today();
        for expected_gap in [1, 2, 4] {
            submit_answer(&conn, 1, moon, moon, due).unwrap();
            let record = db::get_testing_record(&conn, 1, moon).unwrap().unwrap();
            assert_eq!(record.test_date, due + Duration::days(expected_gap));
            due = record.test_date;
        }

        let record = db::get_testing_record(&conn, 1, moon).unwrap().unwrap();
        assert_eq!(record.correct_streak, 3);
    }

    #[test]
    fn test_submit_answer_incorrect_resets() {
        let mut conn = seeded_connection();
        let moon = learn(&mut conn, 1, "月");
        let sun = entry_id_by_writing(&conn, "日");

        // Build up a streak first
        submit_answer(&conn, 1, moon, moon, today()).unwrap();
        submit_answer(&conn, 1, moon, moon, today()).unwrap();

        let review = submit_answer(&conn, 1, moon, sun, today()).unwrap();
        assert!(!review.is_correct);
        assert_eq!(
            review.entry.id, moon,
            "Reveal shows the tested entry, not the chosen one"
        );

        let record = db::get_testing_record(&conn, 1, moon).unwrap().unwrap();
        assert_eq!(record.correct_streak, 0);
        assert_eq!(record.test_date, today(), "Immediately re-testable");
    }

    #[test]
    fn test_submit_answer_missing_record() {
        let conn = seeded_connection();
        let sun = entry_id_by_writing(&conn, "日");

        let err = submit_answer(&conn, 1, sun, sun, today()).unwrap_err();
        assert!(err.is_not_found(), "No testing record is a caller error");
    }

    #[test]
    fn test_reveal_carries_flag() {
        let conn = seeded_connection();
        let sun = entry_id_by_writing(&conn, "日");

        let (entry, correct) = reveal(&conn, sun, true).unwrap();
        assert_eq!(entry.id, sun);
        assert!(correct);

        let (_, correct) = reveal(&conn, sun, false).unwrap();
        assert!(!correct, "Flag is carried through, not re-derived");
    }

    #[test]
    fn test_reveal_missing_entry() {
        let conn = seeded_connection();
        let err = reveal(&conn, 999, true).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_full_cycle_learn_test_relearn() {
        // Learn an entry, pass its test, fail the next one, and see it come
        // straight back into the due queue.
        let mut conn = seeded_connection();
        let moon = learn(&mut conn, 1, "月");
        let sun = entry_id_by_writing(&conn, "日");

        let mut rng = StdRng::seed_from_u64(42);

        let quiz = select_next(&conn, 1, today(), &mut rng).unwrap().unwrap();
        assert_eq!(quiz.tested.id, moon);
        submit_answer(&conn, 1, moon, moon, today()).unwrap();

        assert!(
            select_next(&conn, 1, today(), &mut rng).unwrap().is_none(),
            "Passed entry is scheduled for tomorrow"
        );

        let tomorrow = today() + Duration::days(1);
        let quiz = select_next(&conn, 1, tomorrow, &mut rng).unwrap().unwrap();
        assert_eq!(quiz.tested.id, moon);
        submit_answer(&conn, 1, moon, sun, tomorrow).unwrap();

        let quiz = select_next(&conn, 1, tomorrow, &mut rng).unwrap().unwrap();
        assert_eq!(quiz.tested.id, moon, "Failed entry is due again immediately");
    }
}
