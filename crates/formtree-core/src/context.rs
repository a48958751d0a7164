use crate::{
    config::EngineConfig,
    error::{EngineError, ErrorClass, ErrorOrigin},
    routing::{Endpoints, Router},
    storage::BlobStorage,
    store::RecordStore,
    translate::{NoTranslate, Translator},
    value::Value,
};
use std::sync::Arc;

///
/// FormContext
///
/// Everything request-scoped, in one explicit object: the submitted input,
/// the collaborator seams, and the engine config. Field trees stay immutable
/// schema; a context is built per invocation and threaded through every
/// operation, so concurrent requests never share mutable state.
///

#[derive(Clone)]
pub struct FormContext {
    input: Value,
    resource: String,
    config: EngineConfig,
    store: Option<Arc<dyn RecordStore + Send + Sync>>,
    storage: Option<Arc<dyn BlobStorage + Send + Sync>>,
    router: Option<Arc<dyn Router + Send + Sync>>,
    translator: Arc<dyn Translator + Send + Sync>,
}

impl FormContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            input: Value::Map(Vec::new()),
            resource: String::new(),
            config: EngineConfig::default(),
            store: None,
            storage: None,
            router: None,
            translator: Arc::new(NoTranslate),
        }
    }

    #[must_use]
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn RecordStore + Send + Sync>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn BlobStorage + Send + Sync>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn with_router(mut self, router: Arc<dyn Router + Send + Sync>) -> Self {
        self.router = Some(router);
        self
    }

    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn Translator + Send + Sync>) -> Self {
        self.translator = translator;
        self
    }

    // ------------------------------------------------------------------
    // Request input
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn input(&self) -> &Value {
        &self.input
    }

    /// Submitted value under a (dotted) column, `None` when absent.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.input.get_path(column)
    }

    #[must_use]
    pub fn has_value(&self, column: &str) -> bool {
        self.value(column).is_some()
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Same collaborators and config, different input. Used when a nested
    /// sub-tree (one row of a collection) is processed against its own
    /// slice of the submitted values.
    #[must_use]
    pub fn scoped(&self, input: Value) -> Self {
        let mut scoped = self.clone();
        scoped.input = input;
        scoped
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    #[must_use]
    pub fn store(&self) -> Option<&(dyn RecordStore + Send + Sync)> {
        self.store.as_deref()
    }

    pub fn require_store(&self) -> Result<&(dyn RecordStore + Send + Sync), EngineError> {
        self.store.as_deref().ok_or_else(|| {
            EngineError::new(
                ErrorClass::Config,
                ErrorOrigin::Store,
                "no record store configured",
            )
        })
    }

    pub fn require_storage(&self) -> Result<&(dyn BlobStorage + Send + Sync), EngineError> {
        self.storage.as_deref().ok_or_else(|| {
            EngineError::new(
                ErrorClass::Config,
                ErrorOrigin::Storage,
                "no blob storage configured",
            )
        })
    }

    #[must_use]
    pub fn storage(&self) -> Option<&(dyn BlobStorage + Send + Sync)> {
        self.storage.as_deref()
    }

    /// URL builders when a router is installed.
    #[must_use]
    pub fn endpoints(&self) -> Option<Endpoints<'_>> {
        self.router
            .as_deref()
            .map(|router| Endpoints::new(router, &self.config))
    }

    #[must_use]
    pub fn translate(&self, key: &str) -> String {
        self.translator.get(key)
    }
}

impl Default for FormContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_input_lookup() {
        let ctx = FormContext::new().with_input(Value::Map(vec![(
            "author".to_string(),
            Value::Map(vec![("name".to_string(), Value::Text("ada".to_string()))]),
        )]));

        assert_eq!(
            ctx.value("author.name"),
            Some(&Value::Text("ada".to_string()))
        );
        assert!(!ctx.has_value("author.email"));
    }

    #[test]
    fn missing_collaborators_surface_as_config_errors() {
        let ctx = FormContext::new();

        assert!(ctx.require_store().err().unwrap().is_config());
        assert!(ctx.require_storage().err().unwrap().is_config());
        assert!(ctx.endpoints().is_none());
        assert_eq!(ctx.translate("formtree.search"), "formtree.search");
    }
}
