use crate::{
    context::FormContext,
    error::{EngineError, RelationError},
    record::{Record, Related},
    search::SearchRequest,
    store::SearchQuery,
    value::Value,
};
use convert_case::{Case, Casing};
use std::{fmt, sync::Arc};

/// Reshapes the option search query before execution.
pub type SearchQueryHook = Arc<dyn Fn(&mut SearchQuery, &SearchRequest) + Send + Sync>;

/// Formats a related record into an option label.
pub type SearchLabelHook = Arc<dyn Fn(&Record) -> String + Send + Sync>;

///
/// RelationKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    Polymorphic,
}

///
/// ImageColumn
///
/// Option-image augmentation: which related column holds the stored path
/// and where it lives.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageColumn {
    pub column: String,
    pub disk: String,
    pub dir: String,
}

impl ImageColumn {
    #[must_use]
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            disk: "public".to_string(),
            dir: String::new(),
        }
    }

    #[must_use]
    pub fn disk(mut self, disk: impl Into<String>) -> Self {
        self.disk = disk.into();
        self
    }

    #[must_use]
    pub fn dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = dir.into();
        self
    }
}

///
/// SearchSource
///
/// Async-search capability on a relationship: which column to match, how
/// many options to return, the dependent column, and the optional hooks
/// that replace the default query and label.
///

#[derive(Clone, Default)]
pub struct SearchSource {
    pub column: Option<String>,
    pub limit: Option<usize>,
    pub associated_with: Option<String>,
    pub query: Option<SearchQueryHook>,
    pub label: Option<SearchLabelHook>,
    pub image: Option<ImageColumn>,
}

impl SearchSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn associated_with(mut self, column: impl Into<String>) -> Self {
        self.associated_with = Some(column.into());
        self
    }

    #[must_use]
    pub fn query(mut self, hook: SearchQueryHook) -> Self {
        self.query = Some(hook);
        self
    }

    #[must_use]
    pub fn label(mut self, hook: SearchLabelHook) -> Self {
        self.label = Some(hook);
        self
    }

    #[must_use]
    pub fn image(mut self, image: ImageColumn) -> Self {
        self.image = Some(image);
        self
    }
}

impl fmt::Debug for SearchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchSource")
            .field("column", &self.column)
            .field("limit", &self.limit)
            .field("associated_with", &self.associated_with)
            .field("query", &self.query.is_some())
            .field("label", &self.label.is_some())
            .field("image", &self.image)
            .finish()
    }
}

///
/// MorphTarget
///
/// One concrete type behind a polymorphic relation: the related entity,
/// the column used for search and display, and the human label.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MorphTarget {
    pub related: String,
    pub search_column: String,
    pub label: String,
}

///
/// MorphMap
///
/// Ordered type-tag registry for a polymorphic relation. The first entry
/// is the default type offered to the form. Must be non-empty by the time
/// the tree is built.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MorphMap {
    targets: Vec<(String, MorphTarget)>,
}

impl MorphMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type tag with its search column. The related entity is
    /// the tag itself and the label derives from the tag's short name.
    #[must_use]
    pub fn target(mut self, tag: impl Into<String>, search_column: impl Into<String>) -> Self {
        let tag = tag.into();
        let target = MorphTarget {
            related: tag.clone(),
            search_column: search_column.into(),
            label: short_label(&tag),
        };
        self.targets.push((tag, target));
        self
    }

    /// Register a type tag with an explicit label.
    #[must_use]
    pub fn target_labeled(
        mut self,
        tag: impl Into<String>,
        search_column: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        let tag = tag.into();
        let target = MorphTarget {
            related: tag.clone(),
            search_column: search_column.into(),
            label: label.into(),
        };
        self.targets.push((tag, target));
        self
    }

    /// Full-control registration, for aliased tags whose related entity
    /// differs from the stored tag.
    #[must_use]
    pub fn push(mut self, tag: impl Into<String>, target: MorphTarget) -> Self {
        self.targets.push((tag.into(), target));
        self
    }

    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&MorphTarget> {
        self.targets.iter().find(|(t, _)| t == tag).map(|(_, target)| target)
    }

    /// The default type offered when the record carries none.
    #[must_use]
    pub fn first_tag(&self) -> Option<&str> {
        self.targets.first().map(|(tag, _)| tag.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MorphTarget)> {
        self.targets.iter().map(|(tag, target)| (tag.as_str(), target))
    }

    /// (tag, label) pairs for the type select, in declaration order.
    #[must_use]
    pub fn type_options(&self) -> Vec<(String, String)> {
        self.targets
            .iter()
            .map(|(tag, target)| (tag.clone(), target.label.clone()))
            .collect()
    }
}

/// Human label from the last segment of a type path:
/// `app::models::post_tag` becomes `Post Tag`.
#[must_use]
pub fn short_label(path: &str) -> String {
    let segment = path
        .rsplit(['.', '/', ':', '\\'])
        .next()
        .unwrap_or(path);

    segment.to_case(Case::Title)
}

///
/// Relationship
///
/// Descriptor for how one field relates two record types. Polymorphic
/// relations resolve the related type per record through the morph map.
///

#[derive(Clone, Debug)]
pub struct Relationship {
    pub kind: RelationKind,
    /// Relation name on the parent, also the submitted input key.
    pub name: String,
    /// Related entity; empty for polymorphic (per-record via morph map).
    pub related: String,
    /// One-to-one and polymorphic: key column on the parent.
    /// One-to-many: key column on the child pointing back.
    pub foreign_key: String,
    /// Display/search column of the related entity.
    pub search_column: Option<String>,
    /// Polymorphic only: column holding the type tag.
    pub morph_type_column: Option<String>,
    pub morph_map: MorphMap,
    pub search: Option<SearchSource>,
}

impl Relationship {
    #[must_use]
    pub fn one_to_one(name: impl Into<String>, related: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: RelationKind::OneToOne,
            foreign_key: format!("{name}_id"),
            name,
            related: related.into(),
            search_column: None,
            morph_type_column: None,
            morph_map: MorphMap::new(),
            search: None,
        }
    }

    #[must_use]
    pub fn one_to_many(
        name: impl Into<String>,
        related: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::OneToMany,
            name: name.into(),
            related: related.into(),
            foreign_key: foreign_key.into(),
            search_column: None,
            morph_type_column: None,
            morph_map: MorphMap::new(),
            search: None,
        }
    }

    #[must_use]
    pub fn polymorphic(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: RelationKind::Polymorphic,
            foreign_key: format!("{name}_id"),
            morph_type_column: Some(format!("{name}_type")),
            name,
            related: String::new(),
            search_column: None,
            morph_map: MorphMap::new(),
            search: None,
        }
    }

    #[must_use]
    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = column.into();
        self
    }

    #[must_use]
    pub fn search_column(mut self, column: impl Into<String>) -> Self {
        self.search_column = Some(column.into());
        self
    }

    #[must_use]
    pub fn morph_map(mut self, map: MorphMap) -> Self {
        self.morph_map = map;
        self
    }

    /// Enable async option search for this relationship.
    #[must_use]
    pub fn async_search(mut self, source: SearchSource) -> Self {
        self.search = Some(source);
        self
    }

    #[must_use]
    pub const fn is_polymorphic(&self) -> bool {
        matches!(self.kind, RelationKind::Polymorphic)
    }

    /// Column used to label related records: the async-search column when
    /// configured, else the declared search column.
    #[must_use]
    pub fn display_column(&self) -> Option<&str> {
        self.search
            .as_ref()
            .and_then(|source| source.column.as_deref())
            .or(self.search_column.as_deref())
    }

    pub fn morph_target(&self, tag: &str) -> Result<&MorphTarget, RelationError> {
        self.morph_map
            .get(tag)
            .ok_or_else(|| RelationError::UnknownTypeTag {
                column: self.name.clone(),
                tag: tag.to_string(),
            })
    }
}

// ------------------------------------------------------------------
// Resolution
// ------------------------------------------------------------------

/// Single related record: the loaded relation when present, otherwise
/// fetched through the store. Absent related rows are `None`, not errors.
pub fn resolve_one(
    ctx: &FormContext,
    record: &Record,
    relationship: &Relationship,
) -> Result<Option<Record>, EngineError> {
    if let Some(related) = record.related(&relationship.name) {
        return Ok(related.as_one().cloned());
    }

    let Some(store) = ctx.store() else {
        return Err(RelationError::NotLoaded {
            name: relationship.name.clone(),
        }
        .into());
    };

    match store.load_relation(record, relationship)? {
        Related::One(related) => Ok(related.map(|boxed| *boxed)),
        Related::Many(mut records) => Ok(records.drain(..).next()),
    }
}

/// Related collection, loaded on demand like [`resolve_one`].
pub fn resolve_many(
    ctx: &FormContext,
    record: &Record,
    relationship: &Relationship,
) -> Result<Vec<Record>, EngineError> {
    if let Some(related) = record.related(&relationship.name) {
        return Ok(related.as_many().map(<[Record]>::to_vec).unwrap_or_default());
    }

    let Some(store) = ctx.store() else {
        return Err(RelationError::NotLoaded {
            name: relationship.name.clone(),
        }
        .into());
    };

    match store.load_relation(record, relationship)? {
        Related::Many(records) => Ok(records),
        Related::One(related) => Ok(related.map(|boxed| vec![*boxed]).unwrap_or_default()),
    }
}

/// Polymorphic resolution: read the type tag and key off the record, map
/// the tag to its target, fetch the related record. An empty tag or key is
/// the empty state; an unknown tag is a validation error.
pub fn resolve_morph<'r>(
    ctx: &FormContext,
    record: &Record,
    relationship: &'r Relationship,
) -> Result<Option<(&'r MorphTarget, Record)>, EngineError> {
    let Some(type_column) = relationship.morph_type_column.as_deref() else {
        return Ok(None);
    };

    let tag = record.get(type_column).map(Value::to_key_string).unwrap_or_default();
    let key = record.get(&relationship.foreign_key).cloned().unwrap_or(Value::Null);

    if tag.is_empty() || key.is_empty() {
        return Ok(None);
    }

    let target = relationship.morph_target(&tag)?;
    let store = ctx.require_store()?;

    Ok(store
        .find(&target.related, &key)?
        .map(|related| (target, related)))
}

/// Read-only morph projection: `Label(display value)`, empty when the pair
/// does not resolve.
pub fn morph_preview(
    ctx: &FormContext,
    record: &Record,
    relationship: &Relationship,
) -> Result<String, EngineError> {
    let Some((target, related)) = resolve_morph(ctx, record, relationship)? else {
        return Ok(String::new());
    };

    let display = related
        .get(&target.search_column)
        .map(Value::to_key_string)
        .unwrap_or_default();

    Ok(format!("{}({display})", target.label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_label_takes_last_segment_in_title_case() {
        assert_eq!(short_label("app::models::post_tag"), "Post Tag");
        assert_eq!(short_label("App\\Models\\Post"), "Post");
        assert_eq!(short_label("users"), "Users");
    }

    #[test]
    fn morph_map_defaults_label_from_tag() {
        let map = MorphMap::new()
            .target("app.post", "title")
            .target_labeled("app.user", "name", "User");

        assert_eq!(map.get("app.post").map(|t| t.label.as_str()), Some("Post"));
        assert_eq!(map.get("app.user").map(|t| t.label.as_str()), Some("User"));
        assert_eq!(map.first_tag(), Some("app.post"));
        assert_eq!(
            map.type_options(),
            vec![
                ("app.post".to_string(), "Post".to_string()),
                ("app.user".to_string(), "User".to_string()),
            ]
        );
    }

    #[test]
    fn polymorphic_derives_key_and_type_columns() {
        let rel = Relationship::polymorphic("commentable");

        assert_eq!(rel.foreign_key, "commentable_id");
        assert_eq!(rel.morph_type_column.as_deref(), Some("commentable_type"));
        assert!(rel.is_polymorphic());
    }

    #[test]
    fn unknown_tag_is_a_validation_error() {
        let rel = Relationship::polymorphic("commentable")
            .morph_map(MorphMap::new().target("posts", "title"));

        let err: EngineError = rel.morph_target("videos").unwrap_err().into();
        assert_eq!(err.field.as_deref(), Some("commentable"));
        assert!(err.message.contains("videos"));
    }

    #[test]
    fn display_column_prefers_async_search_column() {
        let rel = Relationship::one_to_one("author", "users")
            .search_column("email")
            .async_search(SearchSource::new().column("name"));

        assert_eq!(rel.display_column(), Some("name"));
    }
}
