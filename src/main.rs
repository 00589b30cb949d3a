// Kanji Tutor - seeding and progress CLI
// import: load the Kanji catalog from CSV
// assign: give a user a learning record for every catalog entry
// stats:  print a user's learning/testing progress

use anyhow::{bail, Result};
use chrono::Local;
use rusqlite::Connection;
use std::env;
use std::path::PathBuf;

use kanji_tutor::{
    assign_all_entries, due_count, entry_count, insert_entries, learning_progress,
    load_catalog_csv, setup_database,
};

fn db_path() -> PathBuf {
    env::var("KANJI_TUTOR_DB")
        .unwrap_or_else(|_| "kanji-tutor.db".to_string())
        .into()
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("KANJI_TUTOR_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") => {
            let csv = args
                .get(2)
                .map(PathBuf::from)
                .ok_or_else(|| anyhow::anyhow!("Usage: kanji-tutor import <catalog.csv>"))?;
            run_import(&csv)
        }
        Some("assign") => {
            let user_id: i64 = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Usage: kanji-tutor assign <user_id>"))?
                .parse()?;
            run_assign(user_id)
        }
        Some("stats") => {
            let user_id: i64 = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Usage: kanji-tutor stats <user_id>"))?
                .parse()?;
            run_stats(user_id)
        }
        _ => {
            eprintln!("Usage: kanji-tutor <import|assign|stats> ...");
            eprintln!("  import <catalog.csv>   Load the Kanji catalog");
            eprintln!("  assign <user_id>       Assign the full catalog to a user");
            eprintln!("  stats  <user_id>       Show a user's progress");
            bail!("no command given");
        }
    }
}

fn run_import(csv_path: &std::path::Path) -> Result<()> {
    println!("📚 Kanji Tutor - Catalog Import");

    // 1. Load CSV
    let entries = load_catalog_csv(csv_path)?;
    println!("✓ Loaded {} entries from {:?}", entries.len(), csv_path);

    // 2. Setup database
    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    // 3. Insert entries (duplicates skipped)
    let inserted = insert_entries(&conn, &entries)?;
    println!("✓ Inserted: {} entries", inserted);
    println!("✓ Skipped duplicates: {}", entries.len() - inserted);

    // 4. Verify count
    let count = entry_count(&conn)?;
    println!("✓ Catalog contains {} entries", count);

    Ok(())
}

fn run_assign(user_id: i64) -> Result<()> {
    println!("📝 Kanji Tutor - Assign catalog to user {}", user_id);

    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;

    let created = assign_all_entries(&conn, user_id)?;
    println!("✓ Created {} learning records", created);

    let (learnt, total) = learning_progress(&conn, user_id)?;
    println!("✓ User {} now has {} records ({} learnt)", user_id, total, learnt);

    Ok(())
}

fn run_stats(user_id: i64) -> Result<()> {
    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;

    let today = Local::now().date_naive();
    let (learnt, total) = learning_progress(&conn, user_id)?;
    let due = due_count(&conn, user_id, today)?;

    println!("📊 Kanji Tutor - user {}", user_id);
    println!("   Assigned entries: {}", total);
    println!("   Learnt:           {}", learnt);
    println!("   Due for testing:  {}", due);

    Ok(())
}
