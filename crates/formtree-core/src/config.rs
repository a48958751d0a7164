use serde::{Deserialize, Serialize};

///
/// EngineConfig
///
/// Engine-wide defaults. Every field has a serde default so a partial
/// config from any serde source (json, yaml, env layer) only overrides what
/// it names.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Result cap for async option search when the request carries no limit.
    pub async_search_limit: usize,

    /// Default blob disk for file fields that do not set one.
    pub upload_disk: String,

    /// Default directory under the disk for stored uploads.
    pub upload_dir: String,

    /// Reserved request columns stripped by the apply pipeline before any
    /// field sees the submission.
    pub excluded_columns: Vec<String>,

    /// Route action names resolved through the `Router` contract.
    pub route_method_action: String,
    pub route_search_action: String,
    pub route_reactive_action: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            async_search_limit: 15,
            upload_disk: "public".to_string(),
            upload_dir: String::new(),
            excluded_columns: vec![
                "_redirect".to_string(),
                "_without-redirect".to_string(),
                "_method".to_string(),
                "_component_name".to_string(),
                "_async_field".to_string(),
            ],
            route_method_action: "async.method".to_string(),
            route_search_action: "async.search".to_string(),
            route_reactive_action: "async.reactive".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_source_only_overrides_named_fields() {
        let config: EngineConfig = serde_json::from_str(r#"{"async_search_limit": 25}"#)
            .expect("valid config json");

        assert_eq!(config.async_search_limit, 25);
        assert_eq!(config.upload_disk, "public");
        assert!(config.excluded_columns.contains(&"_method".to_string()));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();

        assert_eq!(config.async_search_limit, 15);
        assert_eq!(config.excluded_columns.len(), 5);
        assert_eq!(config.route_search_action, "async.search");
    }
}
