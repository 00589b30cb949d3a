use anyhow::Context;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TutorError};

/// Date format used for all stored dates (ISO-8601, sorts lexicographically)
const DATE_FMT: &str = "%Y-%m-%d";

/// Catalog item: one Kanji character with its readings and meaning.
/// Created at content-load time; the scheduling engine never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Row id, assigned by the store (0 until inserted)
    #[serde(default)]
    pub id: i64,

    /// The character itself (unique)
    pub writing: String,

    /// On'yomi reading (may be empty)
    #[serde(default)]
    pub on_reading: String,

    /// Kun'yomi reading (may be empty)
    #[serde(default)]
    pub kun_reading: String,

    /// English meaning (unique)
    pub meaning: String,

    /// Fixed global presentation sequence number
    pub order: i64,
}

/// Per-(user, entry) learning state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub id: i64,
    pub entry_id: i64,
    pub user_id: i64,
    pub is_learnt: bool,

    /// Per-user override of the catalog presentation order. Records carrying
    /// an override are presented first, ordered by it.
    pub custom_order: Option<i64>,
}

/// Per-(user, entry) testing state, created when the entry becomes learnt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestingRecord {
    pub id: i64,
    pub entry_id: i64,
    pub user_id: i64,

    /// Date the entry next becomes eligible for testing
    pub test_date: NaiveDate,

    /// Consecutive correct answers; reset to 0 on any incorrect answer
    pub correct_streak: i64,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            writing TEXT UNIQUE NOT NULL,
            on_reading TEXT NOT NULL DEFAULT '',
            kun_reading TEXT NOT NULL DEFAULT '',
            meaning TEXT UNIQUE NOT NULL,
            ordinal INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS learning_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id INTEGER NOT NULL REFERENCES entries(id),
            user_id INTEGER NOT NULL,
            is_learnt INTEGER NOT NULL DEFAULT 0,
            custom_order INTEGER,
            UNIQUE(user_id, entry_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS testing_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id INTEGER NOT NULL REFERENCES entries(id),
            user_id INTEGER NOT NULL,
            test_date TEXT NOT NULL,
            correct_streak INTEGER NOT NULL DEFAULT 0,
            UNIQUE(user_id, entry_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_learning_user ON learning_records(user_id, is_learnt)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_testing_user ON testing_records(user_id, test_date)",
        [],
    )?;

    Ok(())
}

/// Load catalog entries from a CSV file with columns:
/// writing, on_reading, kun_reading, meaning, order
pub fn load_catalog_csv(csv_path: &Path) -> anyhow::Result<Vec<Entry>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open catalog CSV")?;

    let mut entries = Vec::new();

    for result in rdr.deserialize() {
        let entry: Entry = result.context("Failed to deserialize catalog entry")?;
        entries.push(entry);
    }

    Ok(entries)
}

/// Insert catalog entries, skipping ones already present (unique writing).
/// Returns the number actually inserted.
pub fn insert_entries(conn: &Connection, entries: &[Entry]) -> Result<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;

    for entry in entries {
        let result = conn.execute(
            "INSERT INTO entries (writing, on_reading, kun_reading, meaning, ordinal)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.writing,
                entry.on_reading,
                entry.kun_reading,
                entry.meaning,
                entry.order,
            ],
        );

        match result {
            Ok(_) => inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        "catalog import: {} inserted, {} duplicates skipped",
        inserted,
        duplicates
    );

    Ok(inserted)
}

const ENTRY_COLUMNS: &str = "e.id, e.writing, e.on_reading, e.kun_reading, e.meaning, e.ordinal";

fn map_entry(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        writing: row.get(1)?,
        on_reading: row.get(2)?,
        kun_reading: row.get(3)?,
        meaning: row.get(4)?,
        order: row.get(5)?,
    })
}

pub fn get_entry(conn: &Connection, entry_id: i64) -> Result<Option<Entry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.id = ?1"
    ))?;

    let mut rows = stmt.query_map(params![entry_id], map_entry)?;
    rows.next().transpose().map_err(TutorError::from)
}

pub fn get_all_entries(conn: &Connection) -> Result<Vec<Entry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries e ORDER BY e.ordinal ASC"
    ))?;

    let entries = stmt
        .query_map([], map_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(entries)
}

/// Distractor pool for a quiz: every catalog entry except the tested one.
pub fn get_entries_excluding(conn: &Connection, entry_id: i64) -> Result<Vec<Entry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.id != ?1 ORDER BY e.ordinal ASC"
    ))?;

    let entries = stmt
        .query_map(params![entry_id], map_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn entry_count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
    Ok(count)
}

/// Create a learning record for (user, entry) if one does not exist.
/// Returns true if a record was created.
pub fn create_learning_record(conn: &Connection, user_id: i64, entry_id: i64) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO learning_records (entry_id, user_id) VALUES (?1, ?2)",
        params![entry_id, user_id],
    );

    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Assign every catalog entry to a user, skipping existing records.
/// Returns the number of learning records created.
pub fn assign_all_entries(conn: &Connection, user_id: i64) -> Result<usize> {
    let mut created = 0;

    for entry in get_all_entries(conn)? {
        if create_learning_record(conn, user_id, entry.id)? {
            created += 1;
        }
    }

    tracing::info!("assigned {} entries to user {}", created, user_id);

    Ok(created)
}

fn map_learning_record(row: &rusqlite::Row) -> rusqlite::Result<LearningRecord> {
    Ok(LearningRecord {
        id: row.get(0)?,
        entry_id: row.get(1)?,
        user_id: row.get(2)?,
        is_learnt: row.get(3)?,
        custom_order: row.get(4)?,
    })
}

pub fn get_learning_record(
    conn: &Connection,
    user_id: i64,
    entry_id: i64,
) -> Result<Option<LearningRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, entry_id, user_id, is_learnt, custom_order
         FROM learning_records
         WHERE user_id = ?1 AND entry_id = ?2",
    )?;

    let mut rows = stmt.query_map(params![user_id, entry_id], map_learning_record)?;
    rows.next().transpose().map_err(TutorError::from)
}

pub fn set_learnt(conn: &Connection, user_id: i64, entry_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE learning_records SET is_learnt = 1 WHERE user_id = ?1 AND entry_id = ?2",
        params![user_id, entry_id],
    )?;

    Ok(())
}

/// Set or clear the per-user presentation override for an entry.
pub fn set_custom_order(
    conn: &Connection,
    user_id: i64,
    entry_id: i64,
    custom_order: Option<i64>,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE learning_records SET custom_order = ?3 WHERE user_id = ?1 AND entry_id = ?2",
        params![user_id, entry_id, custom_order],
    )?;

    if updated == 0 {
        return Err(TutorError::not_found("learning record", entry_id));
    }

    Ok(())
}

/// Next entry for the user to learn. Records with a custom order come first
/// (ordered by it); the rest follow catalog order.
pub fn next_unlearnt_entry(conn: &Connection, user_id: i64) -> Result<Option<Entry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries e
         JOIN learning_records lr ON lr.entry_id = e.id
         WHERE lr.user_id = ?1 AND lr.is_learnt = 0 AND lr.custom_order IS NOT NULL
         ORDER BY lr.custom_order ASC
         LIMIT 1"
    ))?;

    let mut rows = stmt.query_map(params![user_id], map_entry)?;
    if let Some(entry) = rows.next().transpose()? {
        return Ok(Some(entry));
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries e
         JOIN learning_records lr ON lr.entry_id = e.id
         WHERE lr.user_id = ?1 AND lr.is_learnt = 0 AND lr.custom_order IS NULL
         ORDER BY e.ordinal ASC
         LIMIT 1"
    ))?;

    let mut rows = stmt.query_map(params![user_id], map_entry)?;
    rows.next().transpose().map_err(TutorError::from)
}

/// Next learnt entry due for testing on `today`, in catalog order.
pub fn next_due_entry(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<Option<Entry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries e
         JOIN learning_records lr ON lr.entry_id = e.id AND lr.user_id = ?1
         JOIN testing_records tr ON tr.entry_id = e.id AND tr.user_id = ?1
         WHERE lr.is_learnt = 1 AND tr.test_date <= ?2
         ORDER BY e.ordinal ASC
         LIMIT 1"
    ))?;

    let today_str = today.format(DATE_FMT).to_string();
    let mut rows = stmt.query_map(params![user_id, today_str], map_entry)?;
    rows.next().transpose().map_err(TutorError::from)
}

fn map_testing_record(row: &rusqlite::Row) -> rusqlite::Result<TestingRecord> {
    let test_date_str: String = row.get(3)?;
    let test_date = NaiveDate::parse_from_str(&test_date_str, DATE_FMT)
        .map_err(|_| rusqlite::Error::InvalidQuery)?;

    Ok(TestingRecord {
        id: row.get(0)?,
        entry_id: row.get(1)?,
        user_id: row.get(2)?,
        test_date,
        correct_streak: row.get(4)?,
    })
}

pub fn get_testing_record(
    conn: &Connection,
    user_id: i64,
    entry_id: i64,
) -> Result<Option<TestingRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, entry_id, user_id, test_date, correct_streak
         FROM testing_records
         WHERE user_id = ?1 AND entry_id = ?2",
    )?;

    let mut rows = stmt.query_map(params![user_id, entry_id], map_testing_record)?;
    rows.next().transpose().map_err(TutorError::from)
}

/// Create a testing record for (user, entry) dated `today` with streak 0,
/// unless one already exists. Returns true if a record was created.
pub fn create_testing_record(
    conn: &Connection,
    user_id: i64,
    entry_id: i64,
    today: NaiveDate,
) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO testing_records (entry_id, user_id, test_date, correct_streak)
         VALUES (?1, ?2, ?3, 0)",
        params![entry_id, user_id, today.format(DATE_FMT).to_string()],
    );

    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn update_testing_record(conn: &Connection, record: &TestingRecord) -> Result<()> {
    conn.execute(
        "UPDATE testing_records SET test_date = ?2, correct_streak = ?3 WHERE id = ?1",
        params![
            record.id,
            record.test_date.format(DATE_FMT).to_string(),
            record.correct_streak,
        ],
    )?;

    Ok(())
}

/// (learnt, total) learning-record counts for a user.
pub fn learning_progress(conn: &Connection, user_id: i64) -> Result<(i64, i64)> {
    let learnt = conn.query_row(
        "SELECT COUNT(*) FROM learning_records WHERE user_id = ?1 AND is_learnt = 1",
        params![user_id],
        |row| row.get(0),
    )?;

    let total = conn.query_row(
        "SELECT COUNT(*) FROM learning_records WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;

    Ok((learnt, total))
}

/// Number of learnt entries due for testing on `today`.
pub fn due_count(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM testing_records tr
         JOIN learning_records lr ON lr.entry_id = tr.entry_id AND lr.user_id = tr.user_id
         WHERE tr.user_id = ?1 AND lr.is_learnt = 1 AND tr.test_date <= ?2",
        params![user_id, today.format(DATE_FMT).to_string()],
        |row| row.get(0),
    )?;

    Ok(count)
}
