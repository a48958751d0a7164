use crate::value::Value;
use serde::{Deserialize, Serialize};

///
/// OptionProperties
///
/// Extra payload on an option; currently only the resolved image URL.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct OptionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl OptionProperties {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.image.is_none()
    }
}

///
/// OptionItem
///
/// One selectable option on the wire: stringly `value`, human `label`.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub value: String,
    pub label: String,

    #[serde(default, skip_serializing_if = "OptionProperties::is_empty")]
    pub properties: OptionProperties,
}

impl OptionItem {
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            properties: OptionProperties::default(),
        }
    }

    #[must_use]
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.properties.image = Some(url.into());
        self
    }
}

///
/// OptionGroup
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OptionGroup {
    pub label: String,
    pub options: Vec<OptionItem>,
}

///
/// SelectOptions
///
/// Flat options and labeled groups, in declaration order. Grouping is
/// presentation only; lookups always work over the flattened set.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SelectOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    options: Vec<OptionItem>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    groups: Vec<OptionGroup>,
}

impl SelectOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn option(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.options.push(OptionItem::new(value, label));
        self
    }

    #[must_use]
    pub fn push(mut self, item: OptionItem) -> Self {
        self.options.push(item);
        self
    }

    #[must_use]
    pub fn group(mut self, label: impl Into<String>, options: Vec<OptionItem>) -> Self {
        self.groups.push(OptionGroup {
            label: label.into(),
            options,
        });
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty() && self.groups.is_empty()
    }

    /// Flat view: direct options first, then group options, all in
    /// declaration order.
    pub fn flatten(&self) -> impl Iterator<Item = &OptionItem> {
        self.options
            .iter()
            .chain(self.groups.iter().flat_map(|group| group.options.iter()))
    }

    #[must_use]
    pub fn label_for(&self, value: &str) -> Option<&str> {
        self.flatten()
            .find(|item| item.value == value)
            .map(|item| item.label.as_str())
    }

    /// Resolved label per stored key of a multi value, unknown keys as
    /// empty strings.
    #[must_use]
    pub fn labels(&self, value: &Value) -> Vec<String> {
        Self::multi_keys(value)
            .iter()
            .map(|key| self.label_for(key).unwrap_or_default().to_string())
            .collect()
    }

    /// Read-only projection of a stored value. Single values resolve to
    /// their label (empty when unknown). Multi values tolerate a stored
    /// JSON array string, resolve each entry, and join with commas.
    #[must_use]
    pub fn preview(&self, value: &Value, multiple: bool) -> String {
        if multiple {
            return self.labels(value).join(",");
        }

        if value.is_null() {
            return String::new();
        }

        self.label_for(&value.to_key_string()).unwrap_or_default().to_string()
    }

    fn multi_keys(value: &Value) -> Vec<String> {
        match value {
            Value::Null => Vec::new(),
            Value::List(items) => items.iter().map(Value::to_key_string).collect(),
            Value::Text(text) => {
                // Stored multi-selects sometimes arrive as a JSON-encoded
                // array string.
                if let Ok(decoded) = serde_json::from_str::<Vec<serde_json::Value>>(text) {
                    decoded
                        .iter()
                        .map(|item| match item {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect()
                } else {
                    vec![text.clone()]
                }
            }
            other => vec![other.to_key_string()],
        }
    }
}
