use std::collections::HashMap;
use std::fmt;

use mongodb::bson::{doc, Bson, Document};

use crate::conversion::{update_document, LEGACY_FIELDS};
use crate::error::{Result, SyncError};
use crate::source::Row;
use crate::store::DocumentStore;

/// How input rows are paired with documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing {
    /// Join the row's `column` against the document field `field`, upserting
    /// documents for keys that are not in the collection yet. When several
    /// rows share a key the last one wins.
    Keyed { column: String, field: String },
    /// Upsert into the only document of the collection. Rejected when the
    /// collection holds more than one document. Every row is written to that
    /// same document, so the last row wins. The configured legacy fields are
    /// unset here too, unless the synchronizer is given an empty list.
    Single,
    /// Pair rows and documents by position after sorting both by `sort_field`.
    /// Every row must carry a distinct, non-empty value in that column.
    /// The shorter sequence wins; extra rows or documents are left alone.
    Positional { sort_field: String },
}

impl Default for Pairing {
    fn default() -> Self {
        Pairing::Keyed {
            column: "email".to_string(),
            field: "email".to_string(),
        }
    }
}

/// Result of writing a single row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowOutcome {
    pub row: usize,
    pub matched: u64,
    pub modified: u64,
    pub upserted_id: Option<Bson>,
}

impl fmt::Display for RowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.upserted_id {
            Some(id) => write!(f, "row {}: inserted new document {}", self.row, id),
            None if self.matched == 0 => write!(f, "row {}: no matching document", self.row),
            None => write!(
                f,
                "row {}: matched {}, modified {}",
                self.row, self.matched, self.modified
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub outcomes: Vec<RowOutcome>,
    /// Rows left without a document by positional pairing.
    pub unpaired_rows: usize,
    /// Documents left without a row by positional pairing.
    pub unpaired_documents: usize,
}

impl SyncReport {
    pub fn inserted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.upserted_id.is_some()).count()
    }

    pub fn matched(&self) -> u64 {
        self.outcomes.iter().map(|o| o.matched).sum()
    }

    pub fn modified(&self) -> u64 {
        self.outcomes.iter().map(|o| o.modified).sum()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows written: {} matched, {} modified, {} inserted",
            self.outcomes.len(),
            self.matched(),
            self.modified(),
            self.inserted()
        )?;
        if self.unpaired_rows > 0 || self.unpaired_documents > 0 {
            write!(
                f,
                " ({} rows and {} documents unpaired)",
                self.unpaired_rows, self.unpaired_documents
            )?;
        }
        Ok(())
    }
}

/// Applies rows to a collection, one `update_one` per paired row.
pub struct Synchronizer<S> {
    store: S,
    pairing: Pairing,
    unset_fields: Vec<String>,
}

impl<S: DocumentStore> Synchronizer<S> {
    pub fn new(store: S, pairing: Pairing) -> Self {
        Synchronizer {
            store,
            pairing,
            unset_fields: LEGACY_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Fields removed from every written document. Empty disables `$unset`.
    pub fn with_unset_fields(mut self, unset_fields: Vec<String>) -> Self {
        self.unset_fields = unset_fields;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Writes `rows` in order, calling `on_row` after each write returns.
    ///
    /// Everything that can be rejected up front (missing key column, empty or
    /// duplicate sort keys, several documents for single pairing) is checked
    /// before the first write. A failed write aborts the remaining rows.
    pub fn run<F>(&self, rows: &[Row], mut on_row: F) -> Result<SyncReport>
    where
        F: FnMut(&RowOutcome),
    {
        let mut report = SyncReport::default();
        let targets = self.resolve(rows, &mut report)?;

        tracing::info!(rows = rows.len(), paired = targets.len(), "applying rows");
        for (row, filter, upsert) in targets {
            let update = update_document(row, &self.unset_fields);
            let res = self.store.update_one(filter, update, upsert)?;
            let outcome = RowOutcome {
                row: row.position,
                matched: res.matched,
                modified: res.modified,
                upserted_id: res.upserted_id,
            };
            tracing::debug!(
                row = outcome.row,
                matched = outcome.matched,
                modified = outcome.modified,
                "row applied"
            );
            on_row(&outcome);
            report.outcomes.push(outcome);
        }
        Ok(report)
    }

    /// Pairs every row with a filter, and whether the write may insert.
    fn resolve<'r>(
        &self,
        rows: &'r [Row],
        report: &mut SyncReport,
    ) -> Result<Vec<(&'r Row, Document, bool)>> {
        match &self.pairing {
            Pairing::Keyed { column, field } => {
                require_column(rows, column)?;
                let mut seen = HashMap::new();
                rows.iter()
                    .map(|row| match row.value(column) {
                        "" => Err(SyncError::MissingKey { row: row.position }),
                        key => {
                            if let Some(first) = seen.insert(key, row.position) {
                                tracing::warn!(
                                    key,
                                    first,
                                    row = row.position,
                                    "repeated join key, the later row wins"
                                );
                            }
                            Ok((row, doc! { field.as_str(): key }, true))
                        }
                    })
                    .collect()
            }
            Pairing::Single => {
                let count = self.store.count()?;
                if count > 1 {
                    return Err(SyncError::AmbiguousTarget { count });
                }
                Ok(rows.iter().map(|row| (row, Document::new(), true)).collect())
            }
            Pairing::Positional { sort_field } => {
                require_column(rows, sort_field)?;
                let mut seen = HashMap::new();
                for row in rows {
                    match row.value(sort_field) {
                        "" => return Err(SyncError::MissingKey { row: row.position }),
                        key => {
                            if let Some(first) = seen.insert(key, row.position) {
                                return Err(SyncError::DuplicateKey {
                                    key: key.to_string(),
                                    first,
                                    row: row.position,
                                });
                            }
                        }
                    }
                }

                let ids = self.store.sorted_ids(sort_field)?;
                let mut sorted: Vec<&Row> = rows.iter().collect();
                sorted.sort_by(|a, b| a.value(sort_field).cmp(b.value(sort_field)));

                report.unpaired_rows = sorted.len().saturating_sub(ids.len());
                report.unpaired_documents = ids.len().saturating_sub(sorted.len());
                if report.unpaired_rows > 0 || report.unpaired_documents > 0 {
                    tracing::warn!(
                        rows = sorted.len(),
                        documents = ids.len(),
                        "row and document counts differ, pairing truncated to the shorter"
                    );
                }

                Ok(sorted
                    .into_iter()
                    .zip(ids)
                    .map(|(row, id)| (row, doc! { "_id": id }, false))
                    .collect())
            }
        }
    }
}

fn require_column(rows: &[Row], column: &str) -> Result<()> {
    if !rows.is_empty() && !rows.iter().any(|r| r.columns().any(|c| c == column)) {
        return Err(SyncError::MissingColumn {
            column: column.to_string(),
        });
    }
    Ok(())
}
