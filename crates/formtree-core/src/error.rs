use std::fmt;
use thiserror::Error as ThisError;

///
/// EngineError
///
/// Structured runtime error with a stable classification.
/// Carries the optional identity of the field that produced it so forms can
/// report failures per field instead of swallowing them.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct EngineError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Dotted column path of the field the error belongs to, when known.
    pub field: Option<String>,
}

impl EngineError {
    /// Construct an error from its classification and message.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            field: None,
        }
    }

    /// Attach the dotted column path of the field that raised the error.
    #[must_use]
    pub fn for_field(mut self, column: impl Into<String>) -> Self {
        self.field = Some(column.into());
        self
    }

    /// Construct a store-origin not-found outcome for a record key.
    pub fn not_found(entity: impl fmt::Display, key: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::NotFound,
            ErrorOrigin::Store,
            format!("record not found: {entity}[{key}]"),
        )
    }

    /// Construct a store-origin internal error.
    pub fn store_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Store, message)
    }

    /// Construct a storage-origin internal error (blob side).
    pub fn storage_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Storage, message)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self.class, ErrorClass::Config)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
///
/// Error taxonomy:
/// Config     → fatal at schema build, never per-request recoverable.
/// Validation → aborts the single save that triggered it; names the input.
/// NotFound   → structured empty outcome, no partial data.
/// Pipeline   → caught at the apply-pipeline boundary.
/// Internal   → collaborator or invariant failure.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Config,
    Validation,
    NotFound,
    Pipeline,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Pipeline => "pipeline",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Schema,
    Field,
    Relation,
    Search,
    Apply,
    Action,
    Store,
    Storage,
    Routing,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Schema => "schema",
            Self::Field => "field",
            Self::Relation => "relation",
            Self::Search => "search",
            Self::Apply => "apply",
            Self::Action => "action",
            Self::Store => "store",
            Self::Storage => "storage",
            Self::Routing => "routing",
        };
        write!(f, "{label}")
    }
}

///
/// SchemaError
///
/// Violations detected while building a field tree. Always fatal: a tree
/// that fails these checks is misconfigured, not mis-submitted.
///

#[derive(Clone, Debug, ThisError)]
pub enum SchemaError {
    #[error("duplicate column among siblings: {column}")]
    DuplicateColumn { column: String },

    #[error("field column must be non-empty")]
    EmptyColumn,

    #[error("morph types required: polymorphic field {column} has an empty type map")]
    MorphTypesRequired { column: String },

    #[error("async search on {column} requires a search column")]
    SearchColumnRequired { column: String },

    #[error("invalid attribute path: {path}")]
    BadPath { path: String },
}

impl From<SchemaError> for EngineError {
    fn from(err: SchemaError) -> Self {
        let field = match &err {
            SchemaError::DuplicateColumn { column }
            | SchemaError::MorphTypesRequired { column }
            | SchemaError::SearchColumnRequired { column } => Some(column.clone()),
            SchemaError::EmptyColumn | SchemaError::BadPath { .. } => None,
        };

        Self {
            class: ErrorClass::Config,
            origin: ErrorOrigin::Schema,
            message: err.to_string(),
            field,
        }
    }
}

///
/// FieldError
///
/// Per-save failures raised by a single field's save behavior.
///

#[derive(Clone, Debug, ThisError)]
pub enum FieldError {
    #[error("{extension} not allowed")]
    ExtensionNotAllowed { column: String, extension: String },

    #[error("expected an uploaded file for {column}")]
    UploadExpected { column: String },

    #[error("expected {expected} for {column}")]
    ValueShape {
        column: String,
        expected: &'static str,
    },
}

impl FieldError {
    fn column(&self) -> &str {
        match self {
            Self::ExtensionNotAllowed { column, .. }
            | Self::UploadExpected { column }
            | Self::ValueShape { column, .. } => column,
        }
    }
}

impl From<FieldError> for EngineError {
    fn from(err: FieldError) -> Self {
        let column = err.column().to_string();

        Self::new(ErrorClass::Validation, ErrorOrigin::Field, err.to_string()).for_field(column)
    }
}

///
/// RelationError
///

#[derive(Clone, Debug, ThisError)]
pub enum RelationError {
    #[error("unknown morph type tag {tag} on {column}")]
    UnknownTypeTag { column: String, tag: String },

    #[error("relation {name} is not loaded and no store was provided")]
    NotLoaded { name: String },
}

impl From<RelationError> for EngineError {
    fn from(err: RelationError) -> Self {
        let field = match &err {
            RelationError::UnknownTypeTag { column, .. } => Some(column.clone()),
            RelationError::NotLoaded { .. } => None,
        };

        Self {
            class: ErrorClass::Validation,
            origin: ErrorOrigin::Relation,
            message: err.to_string(),
            field,
        }
    }
}

///
/// SearchError
///

#[derive(Clone, Debug, ThisError)]
pub enum SearchError {
    #[error("unknown search field: {field}")]
    UnknownField { field: String },

    #[error("field {field} is not configured for async search")]
    NotSearchable { field: String },
}

impl From<SearchError> for EngineError {
    fn from(err: SearchError) -> Self {
        let field = match &err {
            SearchError::UnknownField { field } | SearchError::NotSearchable { field } => {
                field.clone()
            }
        };

        Self {
            class: ErrorClass::Validation,
            origin: ErrorOrigin::Search,
            message: err.to_string(),
            field: Some(field),
        }
    }
}

///
/// CastError
///

#[derive(Clone, Debug, ThisError)]
pub enum CastError {
    #[error("submitted values must cast to a map, got {found}")]
    UnexpectedShape { found: &'static str },
}

impl From<CastError> for EngineError {
    fn from(err: CastError) -> Self {
        Self::new(ErrorClass::Pipeline, ErrorOrigin::Apply, err.to_string())
    }
}

///
/// RoutingError
///

#[derive(Clone, Debug, ThisError)]
pub enum RoutingError {
    #[error("unknown route action: {action}")]
    UnknownAction { action: String },
}

impl From<RoutingError> for EngineError {
    fn from(err: RoutingError) -> Self {
        Self::new(ErrorClass::Config, ErrorOrigin::Routing, err.to_string())
    }
}
