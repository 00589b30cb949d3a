// Kanji Tutor - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod db;
pub mod error;
pub mod learning;
pub mod schedule;
pub mod testing;

// Re-export commonly used types
pub use db::{
    assign_all_entries, create_learning_record, due_count, entry_count, get_all_entries,
    get_entry, insert_entries, learning_progress, load_catalog_csv, set_custom_order,
    setup_database, Entry, LearningRecord, TestingRecord,
};
pub use error::TutorError;
pub use schedule::{DEFAULT_BASE_INTERVAL, DEFAULT_INTERVAL_RATE, MAX_INTERVAL_DAYS};
pub use testing::{Quiz, Review, MAX_DISTRACTORS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
