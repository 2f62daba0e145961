use mongodb::{
    bson::{doc, Bson, Document},
    options::{ClientOptions, CountOptions, FindOptions, UpdateOptions},
    sync::{Client, Collection},
};

use crate::error::Result;
use crate::SyncOptions;

/// What a single `update_one` did to the collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    /// `_id` of the document created by an upsert.
    pub upserted_id: Option<Bson>,
}

/// The operations the synchronizer needs from a document collection.
pub trait DocumentStore {
    fn count(&self) -> Result<u64>;

    /// `_id`s of every document, ordered by `sort_field` ascending, then `_id`.
    fn sorted_ids(&self, sort_field: &str) -> Result<Vec<Bson>>;

    fn update_one(&self, filter: Document, update: Document, upsert: bool)
        -> Result<UpdateOutcome>;
}

pub struct MongoStore {
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connects and pings the server so an unreachable server fails before any write.
    pub fn connect(options: &SyncOptions) -> Result<Self> {
        let mut client_options = ClientOptions::parse(&options.connection_str)?;
        client_options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        let client = Client::with_options(client_options)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)?;

        let database = client.database(&options.db);
        let collection = database.collection::<Document>(&options.collection);
        tracing::info!(db = %options.db, collection = %options.collection, "connected to mongodb");
        Ok(MongoStore { collection })
    }
}

impl DocumentStore for MongoStore {
    fn count(&self) -> Result<u64> {
        let n = self
            .collection
            .count_documents(None, CountOptions::default())?;
        Ok(n)
    }

    fn sorted_ids(&self, sort_field: &str) -> Result<Vec<Bson>> {
        let find_options = FindOptions::builder()
            .sort(doc! { sort_field: 1, "_id": 1 })
            .projection(doc! { "_id": 1 })
            .build();

        let cursor = self.collection.find(None, find_options)?;
        let mut ids = Vec::new();
        for doc in cursor {
            if let Some(id) = doc?.get("_id") {
                ids.push(id.clone());
            }
        }
        Ok(ids)
    }

    fn update_one(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome> {
        let update_options = UpdateOptions::builder().upsert(upsert).build();
        let res = self.collection.update_one(filter, update, update_options)?;
        Ok(UpdateOutcome {
            matched: res.matched_count,
            modified: res.modified_count,
            upserted_id: res.upserted_id,
        })
    }
}

/// In-memory collection that follows the server's `update_one` semantics for
/// equality filters and `$set` / `$unset` updates.
#[cfg(test)]
pub(crate) mod memory {
    use std::cell::RefCell;
    use std::cmp::Ordering;

    use mongodb::bson::{oid::ObjectId, Bson, Document};

    use super::{DocumentStore, UpdateOutcome};
    use crate::error::Result;

    #[derive(Default)]
    pub(crate) struct MemoryStore {
        docs: RefCell<Vec<Document>>,
        pub(crate) updates: RefCell<usize>,
    }

    impl MemoryStore {
        pub(crate) fn with_documents(docs: Vec<Document>) -> Self {
            let docs = docs
                .into_iter()
                .map(|mut d| {
                    if !d.contains_key("_id") {
                        d.insert("_id", ObjectId::new());
                    }
                    d
                })
                .collect();
            MemoryStore {
                docs: RefCell::new(docs),
                updates: RefCell::new(0),
            }
        }

        pub(crate) fn documents(&self) -> Vec<Document> {
            self.docs.borrow().clone()
        }

        fn apply(target: &mut Document, update: &Document) {
            if let Ok(set) = update.get_document("$set") {
                for (k, v) in set {
                    target.insert(k.clone(), v.clone());
                }
            }
            if let Ok(unset) = update.get_document("$unset") {
                for k in unset.keys() {
                    target.remove(k);
                }
            }
        }
    }

    /// Server sort order for the value types used here: missing and null,
    /// then numbers, then strings, then object ids.
    fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
        fn rank(v: Option<&Bson>) -> u8 {
            match v {
                None | Some(Bson::Null) => 0,
                Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => 1,
                Some(Bson::String(_)) => 2,
                Some(Bson::ObjectId(_)) => 3,
                Some(_) => 4,
            }
        }
        fn number(v: &Bson) -> f64 {
            match v {
                Bson::Int32(n) => f64::from(*n),
                Bson::Int64(n) => *n as f64,
                Bson::Double(n) => *n,
                _ => 0.0,
            }
        }

        rank(a).cmp(&rank(b)).then_with(|| match (a, b) {
            (Some(Bson::String(x)), Some(Bson::String(y))) => x.cmp(y),
            (Some(Bson::ObjectId(x)), Some(Bson::ObjectId(y))) => x.bytes().cmp(&y.bytes()),
            (Some(x), Some(y)) if rank(a) == 1 => number(x).total_cmp(&number(y)),
            _ => Ordering::Equal,
        })
    }

    impl DocumentStore for MemoryStore {
        fn count(&self) -> Result<u64> {
            Ok(self.docs.borrow().len() as u64)
        }

        fn sorted_ids(&self, sort_field: &str) -> Result<Vec<Bson>> {
            let docs = self.docs.borrow();
            let mut sorted: Vec<&Document> = docs.iter().collect();
            sorted.sort_by(|a, b| {
                compare_values(a.get(sort_field), b.get(sort_field))
                    .then_with(|| compare_values(a.get("_id"), b.get("_id")))
            });
            Ok(sorted
                .into_iter()
                .filter_map(|d| d.get("_id").cloned())
                .collect())
        }

        fn update_one(
            &self,
            filter: Document,
            update: Document,
            upsert: bool,
        ) -> Result<UpdateOutcome> {
            *self.updates.borrow_mut() += 1;
            let mut docs = self.docs.borrow_mut();
            let pos = docs
                .iter()
                .position(|d| filter.iter().all(|(k, v)| d.get(k) == Some(v)));

            match pos {
                Some(idx) => {
                    let before = docs[idx].clone();
                    Self::apply(&mut docs[idx], &update);
                    Ok(UpdateOutcome {
                        matched: 1,
                        modified: u64::from(docs[idx] != before),
                        upserted_id: None,
                    })
                }
                None if upsert => {
                    let id = Bson::ObjectId(ObjectId::new());
                    let mut created = Document::new();
                    created.insert("_id", id.clone());
                    for (k, v) in &filter {
                        created.insert(k.clone(), v.clone());
                    }
                    Self::apply(&mut created, &update);
                    docs.push(created);
                    Ok(UpdateOutcome {
                        upserted_id: Some(id),
                        ..UpdateOutcome::default()
                    })
                }
                None => Ok(UpdateOutcome::default()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::{doc, oid::ObjectId};

    use super::memory::MemoryStore;
    use super::*;

    fn oid(last: u8) -> ObjectId {
        let mut bytes = [0u8; 12];
        bytes[11] = last;
        ObjectId::from_bytes(bytes)
    }

    #[test]
    fn memory_ids_follow_server_sort_order() {
        let store = MemoryStore::with_documents(vec![
            doc! { "_id": oid(5), "email": "b@x.io" },
            doc! { "_id": oid(4), "email": "a@x.io" },
            doc! { "_id": oid(3), "email": 7 },
            doc! { "_id": oid(9) },
            doc! { "_id": oid(1), "email": "b@x.io" },
        ]);

        let ids = store.sorted_ids("email").unwrap();
        let expected: Vec<Bson> = [9, 3, 4, 1, 5]
            .into_iter()
            .map(|n| Bson::ObjectId(oid(n)))
            .collect();
        assert_eq!(ids, expected);
    }
}
