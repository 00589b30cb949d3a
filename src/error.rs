// Kanji Tutor - Error taxonomy
// NotFound is a caller/data error (4xx at the server boundary);
// storage failures propagate unmodified and are fatal for the request.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TutorError {
    /// A referenced record or catalog entry does not exist.
    /// `what` names the kind ("entry", "learning record", "testing record").
    #[error("{what} not found for id {id}")]
    NotFound { what: &'static str, id: i64 },

    /// Storage-layer failure, propagated unmodified.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl TutorError {
    pub fn not_found(what: &'static str, id: i64) -> Self {
        TutorError::NotFound { what, id }
    }

    /// True for caller/data errors, false for storage failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TutorError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, TutorError>;
