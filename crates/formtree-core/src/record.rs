use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// Related
///
/// A relation that has been loaded onto a record. `One` distinguishes
/// "loaded and absent" from "never loaded" (the latter is simply missing
/// from the record's relation map).
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Related {
    One(Option<Box<Record>>),
    Many(Vec<Record>),
}

impl Related {
    #[must_use]
    pub fn one(record: Record) -> Self {
        Self::One(Some(Box::new(record)))
    }

    #[must_use]
    pub const fn none() -> Self {
        Self::One(None)
    }

    #[must_use]
    pub const fn as_one(&self) -> Option<&Record> {
        match self {
            Self::One(Some(record)) => Some(record),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_many(&self) -> Option<&[Record]> {
        match self {
            Self::Many(records) => Some(records),
            _ => None,
        }
    }
}

///
/// Record
///
/// An untyped entity instance. Attributes are ordered key/value entries;
/// relations loaded by a resolver hang off the record by relation name so
/// later passes can tell "loaded" from "not yet fetched". The primary key
/// is stamped by whichever store produced the record.
///

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<Value>,
    attributes: Vec<(String, Value)>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    related: BTreeMap<String, Related>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(&column.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<Value>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_related(mut self, name: impl Into<String>, related: Related) -> Self {
        self.related.insert(name.into(), related);
        self
    }

    #[must_use]
    pub const fn key(&self) -> Option<&Value> {
        self.key.as_ref()
    }

    /// Wire form of the primary key, empty string when unset.
    #[must_use]
    pub fn key_string(&self) -> String {
        self.key.as_ref().map(Value::to_key_string).unwrap_or_default()
    }

    pub fn set_key(&mut self, key: Value) {
        self.key = Some(key);
    }

    /// Direct attribute lookup by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.iter().find(|(k, _)| k == column).map(|(_, v)| v)
    }

    /// Dotted lookup across nested attribute values and loaded relations.
    /// `author.name` first tries a nested attribute, then the loaded
    /// `author` relation's `name` attribute.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        if let Some(value) = self.get(head) {
            return match rest {
                Some(rest) => value.get_path(rest),
                None => Some(value),
            };
        }

        let related = self.related.get(head)?.as_one()?;
        match rest {
            Some(rest) => related.get_path(rest),
            None => None,
        }
    }

    pub fn set(&mut self, column: &str, value: Value) {
        match self.attributes.iter_mut().find(|(k, _)| k == column) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((column.to_string(), value)),
        }
    }

    /// Dotted write into nested attribute values, creating intermediate maps.
    pub fn set_path(&mut self, path: &str, value: Value) {
        match path.split_once('.') {
            None => self.set(path, value),
            Some((head, rest)) => {
                if self.get(head).is_none() {
                    self.set(head, Value::Map(Vec::new()));
                }
                if let Some((_, slot)) =
                    self.attributes.iter_mut().find(|(k, _)| k == head)
                {
                    slot.set_path(rest, value);
                }
            }
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let index = self.attributes.iter().position(|(k, _)| k == column)?;
        Some(self.attributes.remove(index).1)
    }

    #[must_use]
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(k, _)| k.as_str())
    }

    /// Attribute snapshot as a map value, entry order preserved.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Map(self.attributes.clone())
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    #[must_use]
    pub fn related(&self, name: &str) -> Option<&Related> {
        self.related.get(name)
    }

    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.related.contains_key(name)
    }

    pub fn set_related(&mut self, name: impl Into<String>, related: Related) {
        self.related.insert(name.into(), related);
    }

    pub fn unload_related(&mut self, name: &str) -> Option<Related> {
        self.related.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut record = Record::new().with("title", "first");
        record.set("title", Value::Text("second".to_string()));

        assert_eq!(record.get("title"), Some(&Value::Text("second".to_string())));
        assert_eq!(record.columns().count(), 1);
    }

    #[test]
    fn get_path_prefers_attributes_then_relations() {
        let author = Record::new().with("name", "ada");
        let mut post = Record::new().with("title", "hello");
        post.set_related("author", Related::one(author));

        assert_eq!(post.get_path("title"), Some(&Value::Text("hello".to_string())));
        assert_eq!(
            post.get_path("author.name"),
            Some(&Value::Text("ada".to_string()))
        );
        assert_eq!(post.get_path("author.missing"), None);
        assert_eq!(post.get_path("editor.name"), None);
    }

    #[test]
    fn loaded_none_differs_from_not_loaded() {
        let mut record = Record::new();
        assert!(!record.is_loaded("author"));

        record.set_related("author", Related::none());
        assert!(record.is_loaded("author"));
        assert_eq!(record.related("author").and_then(Related::as_one), None);
    }

    #[test]
    fn key_is_stamped_separately_from_attributes() {
        let record = Record::new().with_key(7_u64).with("title", "x");

        assert_eq!(record.key(), Some(&Value::Uint(7)));
        assert_eq!(record.key_string(), "7");
        assert_eq!(Record::new().key_string(), "");
    }

    #[test]
    fn set_path_builds_nested_attribute() {
        let mut record = Record::new();
        record.set_path("meta.seo.title", Value::Text("x".to_string()));

        assert_eq!(
            record.get_path("meta.seo.title"),
            Some(&Value::Text("x".to_string()))
        );
    }
}
