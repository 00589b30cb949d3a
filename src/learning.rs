//! Learning selector: hands out not-yet-learnt entries in a fixed order and
//! seeds the testing schedule when the user confirms one.

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::{self, Entry};
use crate::error::{Result, TutorError};

/// Next entry for the user to learn, or `None` when everything is learnt.
///
/// Records carrying a per-user custom order come first (ordered by it); the
/// rest follow the catalog order.
pub fn select_next(conn: &Connection, user_id: i64) -> Result<Option<Entry>> {
    db::next_unlearnt_entry(conn, user_id)
}

/// Record that the user has learnt `entry_id` and seed its testing record,
/// dated `today` (immediately due) with a zero streak.
///
/// Fails with `NotFound` when the user has no learning record for the entry.
/// Re-confirming an already-learnt entry is a no-op for the flag, but still
/// ensures the testing record exists. Both writes happen in one transaction.
pub fn confirm_learnt(
    conn: &mut Connection,
    user_id: i64,
    entry_id: i64,
    today: NaiveDate,
) -> Result<()> {
    let tx = conn.transaction().map_err(TutorError::from)?;

    let record = db::get_learning_record(&tx, user_id, entry_id)?
        .ok_or_else(|| TutorError::not_found("learning record", entry_id))?;

    if !record.is_learnt {
        db::set_learnt(&tx, user_id, entry_id)?;
        tracing::debug!("user {} learnt entry {}", user_id, entry_id);
    }

    ensure_testing_record(&tx, user_id, entry_id, today)?;

    tx.commit().map_err(TutorError::from)
}

/// Create the testing record for (user, entry) if it does not exist.
/// Idempotent; safe to call on every confirmation.
pub fn ensure_testing_record(
    conn: &Connection,
    user_id: i64,
    entry_id: i64,
    today: NaiveDate,
) -> Result<bool> {
    let created = db::create_testing_record(conn, user_id, entry_id, today)?;

    if created {
        tracing::debug!(
            "seeded testing record for user {} entry {} due {}",
            user_id,
            entry_id,
            today
        );
    }

    Ok(created)
}
