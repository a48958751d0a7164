//! In-memory collaborators for tests: a record store over plain vectors, a
//! blob store that never touches disk, and a router that renders symbolic
//! routes as query strings.

use crate::{
    error::EngineError,
    field::relation::{RelationKind, Relationship},
    record::{Record, Related},
    routing::{ParamMap, Router},
    storage::BlobStorage,
    store::{RecordStore, SearchQuery},
    value::{FileUpload, Value},
};
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
    sync::Mutex,
};

///
/// MemoryStore
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: Mutex<BTreeMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(self, entity: &str, records: Vec<Record>) -> Self {
        self.entities
            .lock()
            .unwrap()
            .entry(entity.to_string())
            .or_default()
            .extend(records);
        self
    }

    pub fn records(&self, entity: &str) -> Vec<Record> {
        self.entities
            .lock()
            .unwrap()
            .get(entity)
            .cloned()
            .unwrap_or_default()
    }
}

impl RecordStore for MemoryStore {
    fn find(&self, entity: &str, key: &Value) -> Result<Option<Record>, EngineError> {
        Ok(self
            .records(entity)
            .into_iter()
            .find(|record| record.key() == Some(key)))
    }

    fn create(&self, entity: &str, mut record: Record) -> Result<Record, EngineError> {
        let mut entities = self.entities.lock().unwrap();
        let rows = entities.entry(entity.to_string()).or_default();

        if record.key().is_none() {
            record.set_key(Value::Uint(rows.len() as u64 + 1));
        }
        rows.push(record.clone());
        Ok(record)
    }

    fn update(&self, entity: &str, record: Record) -> Result<Record, EngineError> {
        let mut entities = self.entities.lock().unwrap();
        let rows = entities.entry(entity.to_string()).or_default();

        let key = record.key().cloned().unwrap_or(Value::Null);
        match rows.iter_mut().find(|row| row.key() == Some(&key)) {
            Some(slot) => {
                *slot = record.clone();
                Ok(record)
            }
            None => Err(EngineError::not_found(entity, key)),
        }
    }

    fn load_relation(
        &self,
        record: &Record,
        relationship: &Relationship,
    ) -> Result<Related, EngineError> {
        match relationship.kind {
            RelationKind::OneToOne => {
                let Some(key) = record.get(&relationship.foreign_key) else {
                    return Ok(Related::One(None));
                };
                Ok(match self.find(&relationship.related, key)? {
                    Some(related) => Related::one(related),
                    None => Related::One(None),
                })
            }
            RelationKind::OneToMany => {
                let Some(key) = record.key() else {
                    return Ok(Related::Many(Vec::new()));
                };
                let rows = self
                    .records(&relationship.related)
                    .into_iter()
                    .filter(|row| row.get(&relationship.foreign_key) == Some(key))
                    .collect();
                Ok(Related::Many(rows))
            }
            RelationKind::Polymorphic => {
                let tag = relationship
                    .morph_type_column
                    .as_deref()
                    .and_then(|column| record.get(column))
                    .map(Value::to_key_string)
                    .unwrap_or_default();
                let Some(target) = relationship.morph_map.get(&tag) else {
                    return Ok(Related::One(None));
                };
                let Some(key) = record.get(&relationship.foreign_key) else {
                    return Ok(Related::One(None));
                };
                Ok(match self.find(&target.related, key)? {
                    Some(related) => Related::one(related),
                    None => Related::One(None),
                })
            }
        }
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Record>, EngineError> {
        let term = query.term.to_lowercase();

        let hits = self
            .records(&query.entity)
            .into_iter()
            .filter(|record| {
                let term_hit = match (&query.term_column, term.is_empty()) {
                    (_, true) | (None, _) => true,
                    (Some(column), false) => record
                        .get(column)
                        .map(Value::to_key_string)
                        .is_some_and(|text| text.to_lowercase().contains(&term)),
                };

                term_hit
                    && query
                        .filters
                        .iter()
                        .all(|filter| record.get(&filter.column) == Some(&filter.value))
            })
            .take(query.limit)
            .collect();

        Ok(hits)
    }
}

///
/// MemoryBlobs
///

#[derive(Debug, Default)]
pub struct MemoryBlobs {
    written: Mutex<Vec<String>>,
    sequence: AtomicU64,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

impl BlobStorage for MemoryBlobs {
    fn store(
        &self,
        upload: &FileUpload,
        dir: &str,
        _disk: &str,
        keep_name: bool,
    ) -> Result<String, EngineError> {
        let name = if keep_name {
            upload.file_name.clone()
        } else {
            let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
            format!("{seq}_{}", upload.file_name)
        };

        let path = if dir.is_empty() {
            name
        } else {
            format!("{}/{name}", dir.trim_end_matches('/'))
        };

        self.written.lock().unwrap().push(path.clone());
        Ok(path)
    }

    fn url(&self, disk: &str, path: &str) -> Result<String, EngineError> {
        Ok(format!("/storage/{disk}/{path}"))
    }
}

///
/// StaticRouter
///

#[derive(Debug, Default)]
pub struct StaticRouter;

impl Router for StaticRouter {
    fn to(&self, action: &str, params: &ParamMap) -> Result<String, EngineError> {
        let query: Vec<String> = params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();

        Ok(format!("/{action}?{}", query.join("&")))
    }
}

pub mod fixtures {
    use super::MemoryStore;
    use crate::field::relation::{Relationship, SearchSource};
    use crate::field::Field;
    use crate::record::Record;
    use crate::tree::FieldTree;
    use crate::value::Value;

    /// Three cities across two countries, keyed 1..=3.
    pub fn city_store() -> MemoryStore {
        MemoryStore::new().seed(
            "cities",
            vec![
                Record::new()
                    .with_key(1_u64)
                    .with("name", "Porto")
                    .with("country_id", Value::Uint(5)),
                Record::new()
                    .with_key(2_u64)
                    .with("name", "Madrid")
                    .with("country_id", Value::Uint(7)),
                Record::new()
                    .with_key(3_u64)
                    .with("name", "Lisbon")
                    .with("country_id", Value::Uint(5)),
            ],
        )
    }

    /// A city picker searching by name, dependent on the submitted
    /// country, over [`city_store`].
    pub fn cities_schema() -> (FieldTree, MemoryStore) {
        let relationship = Relationship::one_to_one("city", "cities")
            .search_column("name")
            .async_search(SearchSource::new().associated_with("country_id"));

        let tree = FieldTree::new(vec![Field::belongs_to(relationship)]).unwrap();
        (tree, city_store())
    }
}
