pub mod file;
pub mod relation;
pub mod select;

use crate::{
    context::FormContext,
    error::{EngineError, ErrorClass, ErrorOrigin, FieldError},
    record::{Record, Related},
    tree::{FieldId, FieldTree},
    value::Value,
    visibility::{Operator, ShowWhenRule},
    wire::AttrBag,
};
use convert_case::{Case, Casing};
use file::FileSettings;
use relation::Relationship;
use select::SelectOptions;
use std::{fmt, sync::Arc};

/// Mutating hook run around a field's write phase.
pub type ApplyHook = Arc<dyn Fn(&FormContext, &mut Record) -> Result<(), EngineError> + Send + Sync>;

/// Replaces the column read when a field's editable value comes from
/// somewhere else than its own column.
pub type ValueSourceHook = Arc<dyn Fn(&FormContext, &Record) -> Value + Send + Sync>;

/// Visibility predicate evaluated alongside the declarative conditions.
pub type CanSeeHook = Arc<dyn Fn(&FormContext, &Record) -> bool + Send + Sync>;

///
/// FieldKind
///
/// The variant payloads a field can carry. Capability data lives on the
/// variant, never as loose flags on the field itself.
///

#[derive(Clone, Debug)]
pub enum FieldKind {
    Text { mask: Option<String> },
    Email { mask: Option<String> },
    Phone { mask: Option<String> },
    Hidden,
    Select {
        options: SelectOptions,
        multiple: bool,
        searchable: bool,
    },
    File(FileSettings),
    Image(FileSettings),
    BelongsTo(Relationship),
    HasMany {
        relationship: Relationship,
        only_count: bool,
    },
    MorphTo(Relationship),
}

impl FieldKind {
    /// The relationship payload, for the three relation variants.
    #[must_use]
    pub const fn relationship(&self) -> Option<&Relationship> {
        match self {
            Self::BelongsTo(rel) | Self::MorphTo(rel) => Some(rel),
            Self::HasMany { relationship, .. } => Some(relationship),
            _ => None,
        }
    }
}

///
/// Field
///
/// One schema node: a column, how it renders, and how submitted input for
/// it lands on a record. Fields carry no request state; everything
/// per-invocation arrives through the `FormContext`.
///

#[derive(Clone)]
pub struct Field {
    pub column: String,
    pub label: String,
    pub kind: FieldKind,
    pub default_value: Value,
    pub attributes: AttrBag,
    pub show_when: Vec<ShowWhenRule>,
    pub can_see: Option<CanSeeHook>,
    pub hint: Option<String>,
    pub placeholder: Option<String>,
    pub required: bool,
    pub nullable: bool,
    pub sortable: bool,
    pub removable: bool,
    pub reactive: bool,
    pub can_save: bool,
    /// Badge color for the decorated index projection.
    pub badge: Option<String>,
    pub before_apply: Option<ApplyHook>,
    pub after_apply: Option<ApplyHook>,
    pub on_apply: Option<ApplyHook>,
    pub value_source: Option<ValueSourceHook>,
    /// Nested schema, drained into the arena at tree build.
    pub(crate) children: Vec<Field>,
}

impl Field {
    fn base(column: impl Into<String>, kind: FieldKind) -> Self {
        let column = column.into();
        let label = column.to_case(Case::Sentence);

        Self {
            column,
            label,
            kind,
            default_value: Value::Null,
            attributes: AttrBag::new(),
            show_when: Vec::new(),
            can_see: None,
            hint: None,
            placeholder: None,
            required: false,
            nullable: false,
            sortable: false,
            removable: false,
            reactive: false,
            can_save: true,
            badge: None,
            before_apply: None,
            after_apply: None,
            on_apply: None,
            value_source: None,
            children: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn text(column: impl Into<String>) -> Self {
        Self::base(column, FieldKind::Text { mask: None })
    }

    #[must_use]
    pub fn email(column: impl Into<String>) -> Self {
        Self::base(column, FieldKind::Email { mask: None })
    }

    #[must_use]
    pub fn phone(column: impl Into<String>) -> Self {
        Self::base(column, FieldKind::Phone { mask: None })
    }

    #[must_use]
    pub fn hidden(column: impl Into<String>) -> Self {
        Self::base(column, FieldKind::Hidden)
    }

    #[must_use]
    pub fn select(column: impl Into<String>, options: SelectOptions) -> Self {
        Self::base(
            column,
            FieldKind::Select {
                options,
                multiple: false,
                searchable: false,
            },
        )
    }

    #[must_use]
    pub fn file(column: impl Into<String>, settings: FileSettings) -> Self {
        Self::base(column, FieldKind::File(settings))
    }

    #[must_use]
    pub fn image(column: impl Into<String>, settings: FileSettings) -> Self {
        Self::base(column, FieldKind::Image(settings))
    }

    /// One-to-one field; writes the relationship's foreign key column.
    #[must_use]
    pub fn belongs_to(relationship: Relationship) -> Self {
        let column = relationship.foreign_key.clone();
        let label = relationship.name.to_case(Case::Sentence);

        let mut field = Self::base(column, FieldKind::BelongsTo(relationship));
        field.label = label;
        field
    }

    /// One-to-many field over a nested sub-tree; addressed by the
    /// relationship name.
    #[must_use]
    pub fn has_many(relationship: Relationship) -> Self {
        let column = relationship.name.clone();

        Self::base(
            column,
            FieldKind::HasMany {
                relationship,
                only_count: false,
            },
        )
    }

    /// Polymorphic one-to-one field; writes the key and type tag columns
    /// as a pair.
    #[must_use]
    pub fn morph_to(relationship: Relationship) -> Self {
        let column = relationship.foreign_key.clone();
        let label = relationship.name.to_case(Case::Sentence);

        let mut field = Self::base(column, FieldKind::MorphTo(relationship));
        field.label = label;
        field
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    #[must_use]
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub const fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    #[must_use]
    pub const fn removable(mut self) -> Self {
        self.removable = true;
        self
    }

    #[must_use]
    pub const fn reactive(mut self) -> Self {
        self.reactive = true;
        self
    }

    #[must_use]
    pub const fn can_save(mut self, can: bool) -> Self {
        self.can_save = can;
        self
    }

    #[must_use]
    pub fn badge(mut self, color: impl Into<String>) -> Self {
        self.badge = Some(color.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.set(name, value);
        self
    }

    /// Input mask, for the masked scalar kinds; no-op elsewhere.
    #[must_use]
    pub fn mask(mut self, mask: impl Into<String>) -> Self {
        if let FieldKind::Text { mask: slot }
        | FieldKind::Email { mask: slot }
        | FieldKind::Phone { mask: slot } = &mut self.kind
        {
            *slot = Some(mask.into());
        }
        self
    }

    /// Multi-value toggle, for selects and file fields.
    #[must_use]
    pub fn multiple(mut self) -> Self {
        match &mut self.kind {
            FieldKind::Select { multiple, .. } => *multiple = true,
            FieldKind::File(settings) | FieldKind::Image(settings) => settings.multiple = true,
            _ => {}
        }
        self
    }

    #[must_use]
    pub fn searchable(mut self) -> Self {
        if let FieldKind::Select { searchable, .. } = &mut self.kind {
            *searchable = true;
        }
        self
    }

    /// Collapse the one-to-many index projection to a count.
    #[must_use]
    pub fn only_count(mut self) -> Self {
        if let FieldKind::HasMany { only_count, .. } = &mut self.kind {
            *only_count = true;
        }
        self
    }

    #[must_use]
    pub fn show_when(mut self, column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.show_when.push(ShowWhenRule::new(column, operator, value));
        self
    }

    #[must_use]
    pub fn can_see<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FormContext, &Record) -> bool + Send + Sync + 'static,
    {
        self.can_see = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn before_apply<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FormContext, &mut Record) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.before_apply = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn after_apply<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FormContext, &mut Record) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.after_apply = Some(Arc::new(hook));
        self
    }

    /// Replaces the default write behavior entirely.
    #[must_use]
    pub fn on_apply<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FormContext, &mut Record) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.on_apply = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn value_source<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FormContext, &Record) -> Value + Send + Sync + 'static,
    {
        self.value_source = Some(Arc::new(hook));
        self
    }

    /// Nested schema under a relationship field.
    #[must_use]
    pub fn fields(mut self, fields: Vec<Self>) -> Self {
        self.children = fields;
        self
    }

    // ------------------------------------------------------------------
    // Visibility
    // ------------------------------------------------------------------

    /// All declarative conditions must hold and the `can_see` predicate
    /// (when set) must agree; a field with neither is always visible.
    #[must_use]
    pub fn is_visible(&self, ctx: &FormContext, record: &Record) -> bool {
        if !self.show_when.iter().all(|rule| rule.matches(ctx, record)) {
            return false;
        }

        self.can_see
            .as_ref()
            .is_none_or(|hook| hook(ctx, record))
    }

    // ------------------------------------------------------------------
    // Presentation
    // ------------------------------------------------------------------

    /// Custom attributes merged with the presentation hints the kind
    /// implies: `accept` for upload allow-lists, `data-mask`,
    /// `data-associated-with` and `data-async-url` for async search.
    pub fn view_attributes(&self, ctx: &FormContext) -> Result<AttrBag, EngineError> {
        let mut attrs = self.attributes.clone();

        if self.required {
            attrs.set("required", "required");
        }
        if let Some(placeholder) = &self.placeholder {
            attrs.set("placeholder", placeholder.as_str());
        }

        match &self.kind {
            FieldKind::Text { mask } | FieldKind::Email { mask } | FieldKind::Phone { mask } => {
                if let Some(mask) = mask {
                    attrs.set("data-mask", mask.as_str());
                }
            }
            FieldKind::Hidden => {
                attrs.set("type", "hidden");
            }
            FieldKind::Select {
                multiple,
                searchable,
                ..
            } => {
                if *multiple {
                    attrs.set("multiple", "multiple");
                }
                if *searchable {
                    attrs.set("data-searchable", "true");
                }
            }
            FieldKind::File(settings) | FieldKind::Image(settings) => {
                let accept = settings.accept();
                if !accept.is_empty() {
                    attrs.set("accept", accept);
                }
                if settings.multiple {
                    attrs.set("multiple", "multiple");
                }
            }
            FieldKind::BelongsTo(rel) | FieldKind::MorphTo(rel) => {
                if let Some(search) = &rel.search {
                    if let Some(associated) = &search.associated_with {
                        attrs.set("data-associated-with", associated.as_str());
                    }
                    if let Some(endpoints) = ctx.endpoints() {
                        let url = endpoints.async_search_url(
                            ctx.resource(),
                            &self.column,
                            &Vec::new(),
                        )?;
                        attrs.set("data-async-url", url);
                    }
                }
            }
            FieldKind::HasMany { .. } => {}
        }

        Ok(attrs)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("column", &self.column)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("can_save", &self.can_save)
            .finish_non_exhaustive()
    }
}

// ------------------------------------------------------------------
// Field operations
//
// Uniform over every kind, addressed through the tree because nested
// relationship fields need their arena children.
// ------------------------------------------------------------------

impl FieldTree {
    fn require_field(&self, id: FieldId) -> Result<&Field, EngineError> {
        self.field(id).ok_or_else(|| {
            EngineError::new(
                ErrorClass::Internal,
                ErrorOrigin::Schema,
                "field id out of range",
            )
        })
    }

    /// Editable value for the form. Relationship fields resolve the
    /// related record(s) on demand; anything empty falls back to the
    /// field's configured default.
    pub fn form_view_value(
        &self,
        id: FieldId,
        ctx: &FormContext,
        record: &Record,
    ) -> Result<Value, EngineError> {
        let field = self.require_field(id)?;

        if let Some(source) = &field.value_source {
            return Ok(with_default(source(ctx, record), field));
        }

        let value = match &field.kind {
            FieldKind::File(settings) | FieldKind::Image(settings) => {
                file::form_view_value(record, &field.column, settings)
            }
            FieldKind::BelongsTo(rel) => {
                let related = resolve_one_if_reachable(ctx, record, rel)?;
                related
                    .and_then(|r| r.key().cloned())
                    .or_else(|| record.get_path(&field.column).cloned())
                    .unwrap_or(Value::Null)
            }
            FieldKind::HasMany { relationship, .. } => {
                let rows = resolve_many_if_reachable(ctx, record, relationship)?;
                Value::List(rows.iter().map(Record::to_value).collect())
            }
            FieldKind::MorphTo(rel) => record
                .get(&rel.foreign_key)
                .cloned()
                .unwrap_or(Value::Null),
            _ => record
                .get_path(&field.column)
                .cloned()
                .unwrap_or(Value::Null),
        };

        Ok(with_default(value, field))
    }

    /// Read-only projection for lists. `wrapped` selects the decorated
    /// form: with a badge color configured, the value travels inside a
    /// `{ color, value }` map.
    pub fn index_view_value(
        &self,
        id: FieldId,
        ctx: &FormContext,
        record: &Record,
        wrapped: bool,
    ) -> Result<Value, EngineError> {
        let field = self.require_field(id)?;

        let inner = match &field.kind {
            FieldKind::Select {
                options, multiple, ..
            } => {
                let stored = record.get_path(&field.column).cloned().unwrap_or(Value::Null);
                Value::Text(options.preview(&stored, *multiple))
            }
            FieldKind::File(settings) | FieldKind::Image(settings) => {
                if settings.multiple {
                    record
                        .get(&field.column)
                        .cloned()
                        .unwrap_or_else(|| Value::List(Vec::new()))
                } else {
                    Value::Text(
                        record
                            .get(&field.column)
                            .map(Value::to_key_string)
                            .unwrap_or_default(),
                    )
                }
            }
            FieldKind::BelongsTo(rel) => {
                Value::Text(belongs_to_display(ctx, record, rel)?)
            }
            FieldKind::MorphTo(rel) => {
                Value::Text(relation::morph_preview(ctx, record, rel)?)
            }
            FieldKind::HasMany {
                relationship,
                only_count,
            } => self.has_many_projection(id, ctx, record, relationship, *only_count)?,
            _ => Value::Text(
                record
                    .get_path(&field.column)
                    .map(Value::to_key_string)
                    .unwrap_or_default(),
            ),
        };

        if wrapped {
            if let Some(color) = &field.badge {
                return Ok(Value::Map(vec![
                    ("color".to_string(), Value::Text(color.clone())),
                    ("value".to_string(), inner),
                ]));
            }
        }

        Ok(inner)
    }

    /// Flattened export cell. Multi-valued fields join with `;`;
    /// one-to-many always exports empty.
    pub fn export_view_value(
        &self,
        id: FieldId,
        ctx: &FormContext,
        record: &Record,
    ) -> Result<String, EngineError> {
        let field = self.require_field(id)?;

        let text = match &field.kind {
            FieldKind::HasMany { .. } => String::new(),
            FieldKind::File(settings) | FieldKind::Image(settings) => {
                file::export_view_value(record, &field.column, settings)
            }
            FieldKind::Select {
                options, multiple, ..
            } => {
                let stored = record.get_path(&field.column).cloned().unwrap_or(Value::Null);
                if *multiple {
                    options.labels(&stored).join(";")
                } else {
                    options.preview(&stored, false)
                }
            }
            FieldKind::BelongsTo(rel) => belongs_to_display(ctx, record, rel)?,
            FieldKind::MorphTo(rel) => relation::morph_preview(ctx, record, rel)?,
            _ => record
                .get_path(&field.column)
                .map(Value::to_key_string)
                .unwrap_or_default(),
        };

        Ok(text)
    }

    /// Default write behavior for one field. Scalars take the submitted
    /// value, else null when nullable, else the empty string. Files and
    /// relations defer to their kind rules.
    pub fn save_field(
        &self,
        id: FieldId,
        ctx: &FormContext,
        record: &mut Record,
    ) -> Result<(), EngineError> {
        let field = self.require_field(id)?;

        if !field.can_save {
            return Ok(());
        }

        match &field.kind {
            FieldKind::File(settings) | FieldKind::Image(settings) => {
                file::save(ctx, &field.column, settings, record)
            }
            FieldKind::MorphTo(rel) => save_morph(ctx, field, rel, record),
            FieldKind::HasMany { relationship, .. } => {
                self.save_has_many(id, ctx, field, relationship, record)
            }
            _ => {
                record.set_path(&field.column, scalar_request_value(ctx, field));
                Ok(())
            }
        }
    }

    /// Hooked write: `before_apply`, then the field's own apply (the
    /// `on_apply` override or the default save), then `after_apply`. A
    /// field with `can_save == false` still runs both hooks but never
    /// mutates the record. The default save only runs when the field was
    /// actually submitted or carries an explicit default; a field absent
    /// from the request leaves the record untouched.
    pub fn apply_field(
        &self,
        id: FieldId,
        ctx: &FormContext,
        record: &mut Record,
    ) -> Result<(), EngineError> {
        let field = self.require_field(id)?;

        if let Some(hook) = &field.before_apply {
            hook(ctx, record)?;
        }

        if field.can_save {
            match &field.on_apply {
                Some(hook) => hook(ctx, record)?,
                None => {
                    if has_request_value(ctx, field) || !field.default_value.is_empty() {
                        self.save_field(id, ctx, record)?;
                    }
                }
            }
        }

        if let Some(hook) = &field.after_apply {
            hook(ctx, record)?;
        }

        Ok(())
    }

    fn has_many_projection(
        &self,
        id: FieldId,
        ctx: &FormContext,
        record: &Record,
        relationship: &Relationship,
        only_count: bool,
    ) -> Result<Value, EngineError> {
        let rows = resolve_many_if_reachable(ctx, record, relationship)?;

        if only_count {
            return Ok(Value::Text(rows.len().to_string()));
        }

        let child_ids: Vec<FieldId> = self.children(id).to_vec();

        let columns: Vec<(String, Value)> = child_ids
            .iter()
            .filter_map(|child_id| self.field(*child_id))
            .map(|child| (child.column.clone(), Value::Text(child.label.clone())))
            .collect();

        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut cells = Vec::with_capacity(child_ids.len());
            for child_id in &child_ids {
                let child = self.require_field(*child_id)?;
                let cell = self.index_view_value(*child_id, ctx, row, false)?;
                cells.push((child.column.clone(), cell));
            }
            values.push(Value::Map(cells));
        }

        Ok(Value::Map(vec![
            ("columns".to_string(), Value::Map(columns)),
            ("values".to_string(), Value::List(values)),
        ]))
    }

    fn save_has_many(
        &self,
        id: FieldId,
        ctx: &FormContext,
        field: &Field,
        relationship: &Relationship,
        record: &mut Record,
    ) -> Result<(), EngineError> {
        let rows = match ctx.value(&field.column) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::List(rows)) => rows.clone(),
            Some(_) => {
                return Err(FieldError::ValueShape {
                    column: field.column.clone(),
                    expected: "a list of nested row values",
                }
                .into());
            }
        };

        let child_ids: Vec<FieldId> = self.children(id).to_vec();
        let mut related = Vec::with_capacity(rows.len());

        for row in rows {
            let row_ctx = ctx.scoped(row);
            let mut row_record = Record::new();
            for child_id in &child_ids {
                self.apply_field(*child_id, &row_ctx, &mut row_record)?;
            }
            related.push(row_record);
        }

        record.set_related(relationship.name.as_str(), Related::Many(related));
        Ok(())
    }
}

/// Empty resolves resolve to the configured default, when one is set.
fn with_default(value: Value, field: &Field) -> Value {
    if value.is_empty() && !field.default_value.is_empty() {
        field.default_value.clone()
    } else {
        value
    }
}

fn scalar_request_value(ctx: &FormContext, field: &Field) -> Value {
    match ctx.value(&field.column) {
        Some(value) => value.clone(),
        None if !field.default_value.is_empty() => field.default_value.clone(),
        None if field.nullable => Value::Null,
        None => Value::Text(String::new()),
    }
}

/// Whether the request carries anything for this field. File kinds also
/// count their retained-path companion input; polymorphic kinds also
/// count the type tag column.
fn has_request_value(ctx: &FormContext, field: &Field) -> bool {
    if ctx.has_value(&field.column) {
        return true;
    }

    match &field.kind {
        FieldKind::File(_) | FieldKind::Image(_) => {
            ctx.has_value(&format!("hidden_{}", field.column))
        }
        FieldKind::MorphTo(rel) => rel
            .morph_type_column
            .as_deref()
            .is_some_and(|column| ctx.has_value(column)),
        _ => false,
    }
}

/// Resolves only when the relation is already loaded or a store can load
/// it; a plain record with neither stays unresolved instead of erroring.
fn resolve_one_if_reachable(
    ctx: &FormContext,
    record: &Record,
    relationship: &Relationship,
) -> Result<Option<Record>, EngineError> {
    if record.is_loaded(&relationship.name) || ctx.store().is_some() {
        relation::resolve_one(ctx, record, relationship)
    } else {
        Ok(None)
    }
}

fn resolve_many_if_reachable(
    ctx: &FormContext,
    record: &Record,
    relationship: &Relationship,
) -> Result<Vec<Record>, EngineError> {
    if record.is_loaded(&relationship.name) || ctx.store().is_some() {
        relation::resolve_many(ctx, record, relationship)
    } else {
        Ok(Vec::new())
    }
}

fn belongs_to_display(
    ctx: &FormContext,
    record: &Record,
    relationship: &Relationship,
) -> Result<String, EngineError> {
    let related = resolve_one_if_reachable(ctx, record, relationship)?;

    Ok(related
        .map(|r| match relationship.display_column() {
            Some(column) => r.get(column).map(Value::to_key_string).unwrap_or_default(),
            None => r.key_string(),
        })
        .unwrap_or_default())
}

/// Polymorphic write: both the type tag and the key are resolved and
/// validated before either column is touched, so a bad tag leaves the
/// record unchanged.
fn save_morph(
    ctx: &FormContext,
    field: &Field,
    relationship: &Relationship,
    record: &mut Record,
) -> Result<(), EngineError> {
    let Some(type_column) = relationship.morph_type_column.as_deref() else {
        return Err(EngineError::new(
            ErrorClass::Config,
            ErrorOrigin::Relation,
            "polymorphic relationship without a type column",
        )
        .for_field(&field.column));
    };

    let submitted_tag = ctx
        .value(type_column)
        .map(Value::to_key_string)
        .unwrap_or_default();
    let current_tag = record
        .get(type_column)
        .map(Value::to_key_string)
        .unwrap_or_default();

    let tag = if submitted_tag.is_empty() {
        if current_tag.is_empty() {
            relationship.morph_map.first_tag().unwrap_or_default().to_string()
        } else {
            current_tag
        }
    } else {
        relationship.morph_target(&submitted_tag)?;
        submitted_tag
    };

    let key = match ctx.value(&relationship.foreign_key) {
        Some(value) => value.clone(),
        None if field.nullable => Value::Null,
        None => Value::Text(String::new()),
    };

    record.set(type_column, Value::Text(tag));
    record.set(&relationship.foreign_key, key);
    Ok(())
}
