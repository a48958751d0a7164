use crate::{
    error::EngineError,
    field::relation::Relationship,
    record::{Record, Related},
    value::Value,
};

///
/// SearchFilter
///
/// Equality constraint pushed onto a search query. Custom query hooks may
/// add their own; the engine itself only ever adds the dependent-field
/// filter derived from `associated_with`.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SearchFilter {
    pub column: String,
    pub value: Value,
}

impl SearchFilter {
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

///
/// SearchQuery
///
/// The resolved shape handed to `RecordStore::search`. Built by the search
/// service, then optionally reshaped by the field's query hook before
/// execution.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SearchQuery {
    pub entity: String,
    pub term_column: Option<String>,
    pub term: String,
    pub limit: usize,
    pub filters: Vec<SearchFilter>,
}

impl SearchQuery {
    #[must_use]
    pub fn new(entity: impl Into<String>, limit: usize) -> Self {
        Self {
            entity: entity.into(),
            term_column: None,
            term: String::new(),
            limit,
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_term(mut self, column: impl Into<String>, term: impl Into<String>) -> Self {
        self.term_column = Some(column.into());
        self.term = term.into();
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: SearchFilter) -> Self {
        self.filters.push(filter);
        self
    }
}

///
/// RecordStore
///
/// The persistence seam. The engine expresses resolution needs through this
/// contract only; it never owns query building, caching, or transactions.
/// `find` returning `None` is the structured not-found outcome.
///

pub trait RecordStore {
    fn find(&self, entity: &str, key: &Value) -> Result<Option<Record>, EngineError>;

    fn create(&self, entity: &str, record: Record) -> Result<Record, EngineError>;

    fn update(&self, entity: &str, record: Record) -> Result<Record, EngineError>;

    /// Fetch the records behind a relationship on `record`, without
    /// mutating the record. Absent related rows yield empty projections.
    fn load_relation(
        &self,
        record: &Record,
        relationship: &Relationship,
    ) -> Result<Related, EngineError>;

    fn search(&self, query: &SearchQuery) -> Result<Vec<Record>, EngineError>;
}
