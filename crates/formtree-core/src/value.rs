use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, SeqAccess, Visitor},
    ser::{SerializeMap, SerializeSeq},
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// MapValueError
///
/// Invariant violations for `Value::Map` construction.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum MapValueError {
    #[error("map contains duplicate key: {key}")]
    DuplicateKey { key: String },
}

///
/// FileUpload
///
/// A file submitted with the request, before it is handed to blob storage.
/// The engine never inspects the bytes; it only validates the extension.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Lowercased extension of the submitted file name, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }

        Some(ext.to_ascii_lowercase())
    }
}

///
/// Value
///
/// The exchange currency of the engine: record attributes, submitted form
/// values, defaults, and filter operands are all `Value`s.
///
/// Null → the attribute is absent or cleared.
/// Map  → entry order is preserved (submitted field order matters).
///

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    /// Ordered list of values; used for multi-value fields and
    /// one-to-many transport. Order is preserved.
    List(Vec<Self>),
    /// Ordered key/value entries. Keys are unique when built through
    /// [`Value::map`].
    Map(Vec<(String, Self)>),
    /// An uploaded file travelling through the apply pipeline.
    Upload(FileUpload),
}

impl Value {
    /// Build a map value, rejecting duplicate keys.
    pub fn map(
        entries: impl IntoIterator<Item = (String, Self)>,
    ) -> Result<Self, MapValueError> {
        let mut out: Vec<(String, Self)> = Vec::new();
        for (key, value) in entries {
            if out.iter().any(|(k, _)| *k == key) {
                return Err(MapValueError::DuplicateKey { key });
            }
            out.push((key, value));
        }

        Ok(Self::Map(out))
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Upload(_) => "upload",
        }
    }

    /// Absent-or-cleared test: `Null`, empty text, empty list, empty map.
    /// Numeric zero and `false` are values, not emptiness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&[(String, Self)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_upload(&self) -> Option<&FileUpload> {
        match self {
            Self::Upload(upload) => Some(upload),
            _ => None,
        }
    }

    /// Wire representation of a record key or option value.
    #[must_use]
    pub fn to_key_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Uint(u) => u.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(_) | Self::Map(_) => String::new(),
            Self::Upload(upload) => upload.file_name.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Map entry access
    // ------------------------------------------------------------------

    /// Read a direct map entry by key.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Insert or replace a direct map entry, preserving entry order.
    /// Non-map values are replaced by a fresh map first.
    pub fn entry_set(&mut self, key: &str, value: Self) {
        if !matches!(self, Self::Map(_)) {
            *self = Self::Map(Vec::new());
        }
        let Self::Map(entries) = self else {
            unreachable!()
        };

        match entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => entries.push((key.to_string(), value)),
        }
    }

    // ------------------------------------------------------------------
    // Dotted-path access
    // ------------------------------------------------------------------

    /// Read a nested value by dotted path. Numeric segments index lists.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Self> {
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                Self::Map(_) => current.entry(segment)?,
                Self::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Write a nested value by dotted path, creating intermediate maps.
    /// Numeric segments index existing lists and never grow them.
    pub fn set_path(&mut self, path: &str, value: Self) {
        let segments: Vec<&str> = path.split('.').collect();
        Self::set_segments(self, &segments, value);
    }

    fn set_segments(current: &mut Self, segments: &[&str], value: Self) {
        let Some((segment, rest)) = segments.split_first() else {
            *current = value;
            return;
        };

        if let Self::List(items) = current {
            if let Ok(index) = segment.parse::<usize>() {
                if let Some(slot) = items.get_mut(index) {
                    Self::set_segments(slot, rest, value);
                }
                return;
            }
        }

        if rest.is_empty() {
            current.entry_set(segment, value);
            return;
        }

        if !matches!(current, Self::Map(_)) {
            *current = Self::Map(Vec::new());
        }
        let Self::Map(entries) = current else {
            return;
        };

        match entries.iter_mut().find(|(k, _)| k == segment) {
            Some((_, slot)) => {
                if !matches!(slot, Self::Map(_) | Self::List(_)) {
                    *slot = Self::Map(Vec::new());
                }
                Self::set_segments(slot, rest, value);
            }
            None => {
                entries.push((segment.to_string(), Self::Map(Vec::new())));
                if let Some((_, slot)) = entries.last_mut() {
                    Self::set_segments(slot, rest, value);
                }
            }
        }
    }
}

/// Syntax check for dotted attribute paths, run once at schema build.
pub fn validate_path(path: &str) -> bool {
    !path.is_empty() && path.split('.').all(|segment| !segment.is_empty())
}

// ------------------------------------------------------------------
// Conversions
// ------------------------------------------------------------------

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Self::Uint(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<FileUpload> for Value {
    fn from(upload: FileUpload) -> Self {
        Self::Upload(upload)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key_string())
    }
}

// ------------------------------------------------------------------
// Serde: natural JSON shape (maps as objects, uploads as file names)
// ------------------------------------------------------------------

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Uint(u) => serializer.serialize_u64(*u),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Upload(upload) => serializer.serialize_str(&upload.file_name),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a form value")
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
        d.deserialize_any(Self)
    }

    fn visit_bool<E>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E>(self, i: i64) -> Result<Value, E> {
        Ok(Value::Int(i))
    }

    fn visit_u64<E>(self, u: u64) -> Result<Value, E> {
        Ok(Value::Uint(u))
    }

    fn visit_f64<E>(self, f: f64) -> Result<Value, E> {
        Ok(Value::Float(f))
    }

    fn visit_str<E>(self, s: &str) -> Result<Value, E> {
        Ok(Value::Text(s.to_string()))
    }

    fn visit_string<E>(self, s: String) -> Result<Value, E> {
        Ok(Value::Text(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }

        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut entries = Vec::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            entries.push((key, value));
        }

        Ok(Value::Map(entries))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        d.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Value {
        Value::Map(vec![
            ("title".to_string(), Value::Text("hello".to_string())),
            (
                "author".to_string(),
                Value::Map(vec![("name".to_string(), Value::Text("ada".to_string()))]),
            ),
            (
                "tags".to_string(),
                Value::List(vec![Value::Text("a".to_string()), Value::Text("b".to_string())]),
            ),
        ])
    }

    #[test]
    fn map_rejects_duplicate_keys() {
        let err = Value::map(vec![
            ("a".to_string(), Value::Int(1)),
            ("a".to_string(), Value::Int(2)),
        ])
        .unwrap_err();

        assert_eq!(err, MapValueError::DuplicateKey { key: "a".to_string() });
    }

    #[test]
    fn get_path_resolves_maps_and_lists() {
        let v = nested();

        assert_eq!(v.get_path("title"), Some(&Value::Text("hello".to_string())));
        assert_eq!(v.get_path("author.name"), Some(&Value::Text("ada".to_string())));
        assert_eq!(v.get_path("tags.1"), Some(&Value::Text("b".to_string())));
        assert_eq!(v.get_path("author.missing"), None);
        assert_eq!(v.get_path("tags.9"), None);
    }

    #[test]
    fn set_path_creates_intermediate_maps() {
        let mut v = Value::Map(Vec::new());
        v.set_path("author.name", Value::Text("ada".to_string()));
        v.set_path("author.role", Value::Text("admin".to_string()));

        assert_eq!(v.get_path("author.name"), Some(&Value::Text("ada".to_string())));
        assert_eq!(v.get_path("author.role"), Some(&Value::Text("admin".to_string())));
    }

    #[test]
    fn set_path_replaces_scalar_intermediate() {
        let mut v = Value::Map(vec![("author".to_string(), Value::Int(1))]);
        v.set_path("author.name", Value::Text("ada".to_string()));

        assert_eq!(v.get_path("author.name"), Some(&Value::Text("ada".to_string())));
    }

    #[test]
    fn emptiness_counts_absence_not_zero() {
        assert!(Value::Null.is_empty());
        assert!(Value::Text(String::new()).is_empty());
        assert!(Value::List(Vec::new()).is_empty());
        assert!(!Value::Int(0).is_empty());
        assert!(!Value::Bool(false).is_empty());
    }

    #[test]
    fn upload_extension_is_lowercased() {
        let upload = FileUpload::new("Photo.JPG", vec![1, 2]);
        assert_eq!(upload.extension().as_deref(), Some("jpg"));

        assert_eq!(FileUpload::new("noext", Vec::new()).extension(), None);
        assert_eq!(FileUpload::new(".hidden", Vec::new()).extension(), None);
    }

    #[test]
    fn serializes_to_natural_json() {
        let v = nested();
        let json = serde_json::to_string(&v).unwrap();

        assert_eq!(
            json,
            r#"{"title":"hello","author":{"name":"ada"},"tags":["a","b"]}"#
        );
    }

    #[test]
    fn deserializes_from_natural_json() {
        let v: Value = serde_json::from_str(r#"{"n":null,"b":true,"i":-3,"s":"x"}"#).unwrap();

        assert_eq!(v.get_path("n"), Some(&Value::Null));
        assert_eq!(v.get_path("b"), Some(&Value::Bool(true)));
        assert_eq!(v.get_path("i"), Some(&Value::Int(-3)));
        assert_eq!(v.get_path("s"), Some(&Value::Text("x".to_string())));
    }

    #[test]
    fn path_syntax_validation() {
        assert!(validate_path("a.b.c"));
        assert!(!validate_path(""));
        assert!(!validate_path("a..b"));
        assert!(!validate_path(".a"));
    }
}
