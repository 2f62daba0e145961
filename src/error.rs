use polars::prelude::PolarsError;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("unable to read input: {0}")]
    Read(#[from] PolarsError),

    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("key column '{column}' is not present in the input header")]
    MissingColumn { column: String },

    #[error("row {row} has an empty key")]
    MissingKey { row: usize },

    #[error("rows {first} and {row} share the sort key '{key}'")]
    DuplicateKey { key: String, first: usize, row: usize },

    /// Single-document pairing against a collection that holds several documents.
    #[error("expected at most one target document, collection holds {count}")]
    AmbiguousTarget { count: u64 },
}
