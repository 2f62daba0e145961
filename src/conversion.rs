use mongodb::bson::{doc, Bson, Document};

use crate::source::Row;

/// Columns copied from a row into its target document.
pub const RECOGNIZED_COLUMNS: [&str; 8] = [
    "address",
    "address_line",
    "city",
    "state",
    "country",
    "zipcode",
    "email",
    "phone",
];

/// Deprecated geocoordinate fields removed from synchronized documents by default.
pub const LEGACY_FIELDS: [&str; 2] = ["latitude", "longitude"];

#[derive(Debug)]
#[repr(transparent)]
pub struct Wrap<T>(pub T);

impl<T> Clone for Wrap<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Wrap(self.0.clone())
    }
}
impl<T> From<T> for Wrap<T> {
    fn from(t: T) -> Self {
        Wrap(t)
    }
}

/// The `$set` body of a row: every recognized column, trimmed, `""` when absent.
impl From<&Row> for Wrap<Document> {
    fn from(row: &Row) -> Self {
        let fields = RECOGNIZED_COLUMNS
            .iter()
            .map(|col| (col.to_string(), Bson::String(row.value(col).to_string())));
        Wrap(Document::from_iter(fields))
    }
}

/// Builds the full update for a row.
///
/// `$unset` is only present when there are legacy fields to drop, an empty
/// `$unset` is rejected by the server.
pub fn update_document<S: AsRef<str>>(row: &Row, unset_fields: &[S]) -> Document {
    let set: Wrap<Document> = row.into();
    let mut update = doc! { "$set": set.0 };

    if !unset_fields.is_empty() {
        let unset = unset_fields
            .iter()
            .map(|f| (f.as_ref().to_string(), Bson::String(String::new())));
        update.insert("$unset", Document::from_iter(unset));
    }
    update
}
