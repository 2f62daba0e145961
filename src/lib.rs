#![deny(clippy::all)]

pub mod conversion;
pub mod error;
pub mod source;
pub mod store;
pub mod sync;

use std::path::Path;

pub use crate::error::{Result, SyncError};
pub use crate::source::{read_rows, Row};
pub use crate::store::{DocumentStore, MongoStore, UpdateOutcome};
pub use crate::sync::{Pairing, RowOutcome, SyncReport, Synchronizer};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// mongodb style connection string. `mongodb://<user>:<password>@host.domain`
    pub connection_str: String,
    /// the name of the mongodb database
    pub db: String,
    /// the name of the mongodb collection
    pub collection: String,
    /// how input rows are paired with documents. Defaults to joining the `email` column on `email`.
    pub pairing: Pairing,
    /// fields removed from every written document. Defaults to `latitude` and `longitude`.
    pub unset_fields: Vec<String>,
    /// field delimiter of the input file
    pub delimiter: u8,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            connection_str: "mongodb://localhost:27017".to_string(),
            db: "roommatefinder".to_string(),
            collection: "users".to_string(),
            pairing: Pairing::default(),
            unset_fields: conversion::LEGACY_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            delimiter: b',',
        }
    }
}

/// Reads `path` to completion, then connects and applies every row.
///
/// `on_row` is called after each write with what the write did.
pub fn sync_file<F>(path: &Path, options: &SyncOptions, on_row: F) -> Result<SyncReport>
where
    F: FnMut(&RowOutcome),
{
    let rows = read_rows(path, options.delimiter)?;
    tracing::info!(path = %path.display(), rows = rows.len(), "loaded input");

    let store = MongoStore::connect(options)?;
    Synchronizer::new(store, options.pairing.clone())
        .with_unset_fields(options.unset_fields.clone())
        .run(&rows, on_row)
}
