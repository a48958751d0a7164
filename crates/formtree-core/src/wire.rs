use crate::error::{EngineError, ErrorClass, ErrorOrigin};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};
use std::fmt;

///
/// AttrBag
///
/// Ordered element attributes for a rendered control. Insertion order is
/// preserved so emitted markup data is deterministic; setting an existing
/// name replaces in place.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttrBag {
    entries: Vec<(String, String)>,
}

impl AttrBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Builder form of [`AttrBag::set`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(index).1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for AttrBag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct AttrBagVisitor;

impl<'de> Visitor<'de> for AttrBagVisitor {
    type Value = AttrBag;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an attribute map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<AttrBag, A::Error> {
        let mut bag = AttrBag::new();
        while let Some((name, value)) = access.next_entry::<String, String>()? {
            bag.set(name, value);
        }

        Ok(bag)
    }
}

impl<'de> Deserialize<'de> for AttrBag {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        d.deserialize_map(AttrBagVisitor)
    }
}

///
/// AsyncCallback
///
/// Client-side hook descriptor shipped as JSON in `data-async-callback`.
/// Names are JS function identifiers the client runtime resolves; unknown
/// extra properties pass through untouched.
///

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncCallback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_request: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_response: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_handler: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_response: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_callback: Option<String>,

    #[serde(flatten, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AsyncCallback {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn before_request(mut self, js_fn: impl Into<String>) -> Self {
        self.before_request = Some(js_fn.into());
        self
    }

    #[must_use]
    pub fn before_response(mut self, js_fn: impl Into<String>) -> Self {
        self.before_response = Some(js_fn.into());
        self
    }

    #[must_use]
    pub fn response_handler(mut self, js_fn: impl Into<String>) -> Self {
        self.response_handler = Some(js_fn.into());
        self
    }

    #[must_use]
    pub fn after_response(mut self, js_fn: impl Into<String>) -> Self {
        self.after_response = Some(js_fn.into());
        self
    }

    #[must_use]
    pub fn error_callback(mut self, js_fn: impl Into<String>) -> Self {
        self.error_callback = Some(js_fn.into());
        self
    }

    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.before_request.is_none()
            && self.before_response.is_none()
            && self.response_handler.is_none()
            && self.after_response.is_none()
            && self.error_callback.is_none()
            && self.extra.is_empty()
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(|err| {
            EngineError::new(ErrorClass::Internal, ErrorOrigin::Action, err.to_string())
        })
    }
}

/// Client event name normalization: trimmed, internal whitespace collapsed
/// to single spaces, lowercased. Applied before events reach attributes.
#[must_use]
pub fn normalize_event(event: &str) -> String {
    event
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Comma-joined normalized event list for `data-async-events`.
#[must_use]
pub fn join_events(events: &[String]) -> String {
    events
        .iter()
        .map(|event| normalize_event(event))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place_and_keeps_order() {
        let mut bag = AttrBag::new();
        bag.set("class", "btn");
        bag.set("data-id", "1");
        bag.set("class", "btn primary");

        assert_eq!(bag.get("class"), Some("btn primary"));
        let names: Vec<&str> = bag.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["class", "data-id"]);
    }

    #[test]
    fn attr_bag_serializes_as_object() {
        let bag = AttrBag::new().with("a", "1").with("b", "2");

        assert_eq!(serde_json::to_string(&bag).unwrap(), r#"{"a":"1","b":"2"}"#);
    }

    #[test]
    fn callback_json_is_camel_case_and_sparse() {
        let callback = AsyncCallback::new()
            .response_handler("handleRows")
            .property("silent", serde_json::Value::Bool(true));

        assert_eq!(
            callback.to_json().unwrap(),
            r#"{"responseHandler":"handleRows","silent":true}"#
        );
        assert_eq!(AsyncCallback::new().to_json().unwrap(), "{}");
    }

    #[test]
    fn events_normalize_and_join() {
        let events = vec!["Table_Updated:Main".to_string(), "  Modal   Toggled ".to_string()];

        assert_eq!(join_events(&events), "table_updated:main,modal toggled");
    }
}
