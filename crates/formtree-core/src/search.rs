use crate::{
    context::FormContext,
    error::{EngineError, SearchError},
    field::{
        relation::{ImageColumn, Relationship, SearchSource},
        select::OptionItem,
        FieldKind,
    },
    record::Record,
    store::{SearchFilter, SearchQuery},
    tree::FieldTree,
    value::Value,
};
use serde::{Deserialize, Serialize};

///
/// SearchRequest
///
/// One async option-search invocation as submitted by the client: which
/// (dotted) field of which resource, the typed term, the current value of
/// the dependent field when one is declared, and an optional limit.
///

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub resource: String,
    pub field: String,
    #[serde(default)]
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_with: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl SearchRequest {
    #[must_use]
    pub fn new(resource: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            field: field.into(),
            term: String::new(),
            associated_with: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    #[must_use]
    pub fn associated_with(mut self, value: impl Into<Value>) -> Self {
        self.associated_with = Some(value.into());
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

///
/// AsyncSearchService
///
/// Turns a search request against one relationship field into store-ready
/// queries and option items. Owns no state beyond the schema it serves.
///

pub struct AsyncSearchService<'a> {
    tree: &'a FieldTree,
}

impl<'a> AsyncSearchService<'a> {
    #[must_use]
    pub const fn new(tree: &'a FieldTree) -> Self {
        Self { tree }
    }

    /// Resolve the requested field, build the query, run it through the
    /// store, and project the hits into options.
    pub fn search(
        &self,
        ctx: &FormContext,
        request: &SearchRequest,
    ) -> Result<Vec<OptionItem>, EngineError> {
        let id = self.tree.lookup_path(&request.field).ok_or_else(|| {
            EngineError::from(SearchError::UnknownField {
                field: request.field.clone(),
            })
        })?;

        let field = self.tree.field(id).ok_or_else(|| {
            EngineError::from(SearchError::UnknownField {
                field: request.field.clone(),
            })
        })?;

        let Some(relationship) = field.kind.relationship() else {
            return Err(SearchError::NotSearchable {
                field: request.field.clone(),
            }
            .into());
        };
        let Some(source) = &relationship.search else {
            return Err(SearchError::NotSearchable {
                field: request.field.clone(),
            }
            .into());
        };

        let is_morph = matches!(&field.kind, FieldKind::MorphTo(_));
        let (entity, term_column) = target_of(ctx, is_morph, relationship)?;

        let limit = request
            .limit
            .or(source.limit)
            .unwrap_or(ctx.config().async_search_limit);

        let mut query = SearchQuery::new(entity, limit);
        if let Some(column) = &term_column {
            query = query.with_term(column.as_str(), request.term.as_str());
        }

        match &source.query {
            Some(hook) => hook(&mut query, request),
            None => {
                if let (Some(column), Some(value)) =
                    (&source.associated_with, &request.associated_with)
                {
                    query = query.filter(SearchFilter::eq(column.as_str(), value.clone()));
                }
            }
        }

        let records = ctx.require_store()?.search(&query)?;
        tracing::debug!(field = %request.field, hits = records.len(), "async option search");

        let mut options = Vec::with_capacity(records.len());
        for record in &records {
            options.push(option_of(ctx, record, source, term_column.as_deref())?);
        }

        Ok(options)
    }
}

fn option_of(
    ctx: &FormContext,
    record: &Record,
    source: &SearchSource,
    term_column: Option<&str>,
) -> Result<OptionItem, EngineError> {
    let label = match &source.label {
        Some(hook) => hook(record),
        None => term_column
            .and_then(|column| record.get(column))
            .map(Value::to_key_string)
            .unwrap_or_default(),
    };

    let mut item = OptionItem::new(record.key_string(), label);

    if let Some(image) = &source.image {
        if let Some(url) = image_url(ctx, record, image)? {
            item = item.with_image(url);
        }
    }

    Ok(item)
}

/// Entity and term column for the query. Polymorphic fields resolve both
/// through the morph map, keyed by the type tag the client submitted
/// alongside the request (falling back to the first declared type).
fn target_of(
    ctx: &FormContext,
    is_morph: bool,
    relationship: &Relationship,
) -> Result<(String, Option<String>), EngineError> {
    if is_morph {
        let tag = relationship
            .morph_type_column
            .as_deref()
            .and_then(|column| ctx.value(column))
            .map(Value::to_key_string)
            .filter(|tag| !tag.is_empty())
            .or_else(|| relationship.morph_map.first_tag().map(ToString::to_string))
            .unwrap_or_default();

        let target = relationship.morph_target(&tag)?;
        return Ok((target.related.clone(), Some(target.search_column.clone())));
    }

    Ok((
        relationship.related.clone(),
        relationship.display_column().map(ToString::to_string),
    ))
}

/// Public URL of a record's option image. A multi-valued column
/// contributes its first entry; empty values and a missing blob storage
/// both degrade to no image.
fn image_url(
    ctx: &FormContext,
    record: &Record,
    image: &ImageColumn,
) -> Result<Option<String>, EngineError> {
    let first = match record.get(&image.column) {
        None => None,
        Some(Value::List(items)) => items.first().map(Value::to_key_string),
        Some(other) => Some(other.to_key_string()),
    };

    let Some(path) = first.filter(|path| !path.is_empty()) else {
        return Ok(None);
    };
    let Some(storage) = ctx.storage() else {
        return Ok(None);
    };

    let full = join_dir(&image.dir, &path);
    storage.url(&image.disk, &full).map(Some)
}

fn join_dir(dir: &str, path: &str) -> String {
    let trimmed = dir.trim_end_matches('/');
    if trimmed.is_empty() {
        path.to_string()
    } else {
        format!("{trimmed}/{path}")
    }
}
