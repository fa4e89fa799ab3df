// Error taxonomy for the commute store
//
// Only write-side and startup failures surface here. Read failures and
// optional migration failures are logged and degraded inside the store.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Opening the database, creating the base table or reading the
    /// schema version failed
    #[error("failed to initialize commute storage: {0}")]
    Init(#[source] rusqlite::Error),

    /// Insert, update, delete or clear failed
    #[error("failed to write commute data: {0}")]
    Write(#[from] rusqlite::Error),

    /// A snapshot record could not be inserted; the whole import was rolled back
    #[error("import failed at record {index}: {source}")]
    Import {
        index: usize,
        #[source]
        source: rusqlite::Error,
    },

    /// A snapshot could not be parsed
    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_from_rusqlite() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Write(_)));
        assert!(err.to_string().starts_with("failed to write commute data"));
    }

    #[test]
    fn test_import_error_names_index() {
        let err = StoreError::Import {
            index: 3,
            source: rusqlite::Error::QueryReturnedNoRows,
        };
        assert!(err.to_string().contains("record 3"));
    }
}
