use crate::{
    context::FormContext,
    error::SchemaError,
    field::{Field, FieldKind},
    record::Record,
    value::Value,
};

///
/// FieldId
///
/// Arena index of one field node. Ids are only meaningful against the tree
/// that produced them.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FieldId(usize);

///
/// FieldNode
///

#[derive(Clone, Debug)]
pub struct FieldNode {
    pub field: Field,
    pub parent: Option<FieldId>,
    pub children: Vec<FieldId>,
}

///
/// FieldTree
///
/// Immutable form schema: fields in an arena with parent/child links,
/// insertion order preserved at every level. Built once, validated once,
/// then shared freely across requests.
///

#[derive(Clone, Debug)]
pub struct FieldTree {
    nodes: Vec<FieldNode>,
    roots: Vec<FieldId>,
}

impl FieldTree {
    /// Build and validate a tree from declared fields. Checks are fatal:
    /// sibling columns must be unique per level, polymorphic fields need a
    /// non-empty type map, and an async-search relationship needs a
    /// resolvable search column.
    pub fn new(fields: Vec<Field>) -> Result<Self, SchemaError> {
        let mut tree = Self {
            nodes: Vec::new(),
            roots: Vec::new(),
        };

        check_level(&fields)?;
        for field in fields {
            let id = tree.insert(None, field)?;
            tree.roots.push(id);
        }

        Ok(tree)
    }

    fn insert(&mut self, parent: Option<FieldId>, mut field: Field) -> Result<FieldId, SchemaError> {
        check_kind(&field)?;

        let children = std::mem::take(&mut field.children);
        check_level(&children)?;

        let id = FieldId(self.nodes.len());
        self.nodes.push(FieldNode {
            field,
            parent,
            children: Vec::new(),
        });

        let mut child_ids = Vec::with_capacity(children.len());
        for child in children {
            child_ids.push(self.insert(Some(id), child)?);
        }
        self.nodes[id.0].children = child_ids;

        Ok(id)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    #[must_use]
    pub fn get(&self, id: FieldId) -> Option<&FieldNode> {
        self.nodes.get(id.0)
    }

    #[must_use]
    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.get(id).map(|node| &node.field)
    }

    #[must_use]
    pub fn roots(&self) -> &[FieldId] {
        &self.roots
    }

    #[must_use]
    pub fn children(&self, id: FieldId) -> &[FieldId] {
        self.get(id).map(|node| node.children.as_slice()).unwrap_or_default()
    }

    #[must_use]
    pub fn parent_of(&self, id: FieldId) -> Option<FieldId> {
        self.get(id)?.parent
    }

    /// Total node count across all levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level field by column name.
    #[must_use]
    pub fn find_by_column(&self, column: &str) -> Option<FieldId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.field(*id).is_some_and(|field| field.column == column))
    }

    /// First relationship field with the given relation name, searched at
    /// every depth in declaration order.
    #[must_use]
    pub fn find_by_relation(&self, name: &str) -> Option<FieldId> {
        self.nodes
            .iter()
            .position(|node| {
                node.field
                    .kind
                    .relationship()
                    .is_some_and(|rel| rel.name == name)
            })
            .map(FieldId)
    }

    /// Resolve a dotted path segment by segment through nested levels.
    #[must_use]
    pub fn lookup_path(&self, path: &str) -> Option<FieldId> {
        let mut level: &[FieldId] = &self.roots;
        let mut found = None;

        for segment in path.split('.') {
            let id = level
                .iter()
                .copied()
                .find(|id| self.field(*id).is_some_and(|field| field.column == segment))?;
            found = Some(id);
            level = self.children(id);
        }

        found
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// The plain top-level field list, in declaration order.
    #[must_use]
    pub fn only_fields(&self) -> Vec<FieldId> {
        self.roots.clone()
    }

    /// Top-level fields whose visibility conditions hold for this request.
    #[must_use]
    pub fn only_visible(&self, ctx: &FormContext, record: &Record) -> Vec<FieldId> {
        self.roots
            .iter()
            .copied()
            .filter(|id| {
                self.field(*id)
                    .is_some_and(|field| field.is_visible(ctx, record))
            })
            .collect()
    }

    /// Top-level fields minus an exclusion list of column names.
    #[must_use]
    pub fn except_excluded(&self, excluded: &[String]) -> Vec<FieldId> {
        self.roots
            .iter()
            .copied()
            .filter(|id| {
                self.field(*id)
                    .is_some_and(|field| !excluded.iter().any(|column| *column == field.column))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Depth-first visit of every field with its dotted path, nesting
    /// levels joined by `.` in declaration order.
    pub fn walk<F>(&self, mut f: F)
    where
        F: FnMut(&Field, &str),
    {
        for id in &self.roots {
            self.walk_from(*id, "", &mut f);
        }
    }

    fn walk_from<F>(&self, id: FieldId, prefix: &str, f: &mut F)
    where
        F: FnMut(&Field, &str),
    {
        let Some(node) = self.get(id) else {
            return;
        };

        let path = if prefix.is_empty() {
            node.field.column.clone()
        } else {
            format!("{prefix}.{}", node.field.column)
        };

        f(&node.field, &path);

        for child in &node.children {
            self.walk_from(*child, &path, f);
        }
    }

    /// Recompute every parent link from the child lists. Rerunning on an
    /// unchanged tree yields identical links.
    pub fn stamp_parents(&mut self) {
        let links: Vec<(FieldId, Vec<FieldId>)> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (FieldId(index), node.children.clone()))
            .collect();

        for node in &mut self.nodes {
            node.parent = None;
        }

        for (parent, children) in links {
            for child in children {
                if let Some(node) = self.nodes.get_mut(child.0) {
                    node.parent = Some(parent);
                }
            }
        }
    }

    /// Current values of the reactive top-level fields, keyed by column:
    /// the payload a reactive refresh round-trips to the client.
    #[must_use]
    pub fn reactive_values(&self, ctx: &FormContext, record: &Record) -> Value {
        let mut entries = Vec::new();

        for id in &self.roots {
            let Some(field) = self.field(*id) else {
                continue;
            };
            if !field.reactive {
                continue;
            }

            let value = ctx
                .value(&field.column)
                .cloned()
                .or_else(|| record.get_path(&field.column).cloned())
                .unwrap_or(Value::Null);
            entries.push((field.column.clone(), value));
        }

        Value::Map(entries)
    }
}

fn check_level(fields: &[Field]) -> Result<(), SchemaError> {
    let mut seen: Vec<&str> = Vec::new();

    for field in fields {
        if field.column.is_empty() {
            return Err(SchemaError::EmptyColumn);
        }
        if seen.contains(&field.column.as_str()) {
            return Err(SchemaError::DuplicateColumn {
                column: field.column.clone(),
            });
        }
        seen.push(&field.column);
    }

    Ok(())
}

fn check_kind(field: &Field) -> Result<(), SchemaError> {
    match &field.kind {
        FieldKind::MorphTo(rel) => {
            if rel.morph_map.is_empty() {
                return Err(SchemaError::MorphTypesRequired {
                    column: field.column.clone(),
                });
            }
        }
        FieldKind::BelongsTo(rel)
        | FieldKind::HasMany {
            relationship: rel, ..
        } => {
            if rel.search.is_some() && rel.display_column().is_none() {
                return Err(SchemaError::SearchColumnRequired {
                    column: field.column.clone(),
                });
            }
        }
        _ => {}
    }

    Ok(())
}
