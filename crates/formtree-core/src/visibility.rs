use crate::{context::FormContext, record::Record, tree::FieldTree, value::Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// Operator
///
/// Comparison vocabulary shared between server-side evaluation and the
/// serialized client rules. Wire names are the comparison symbols.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
    #[serde(rename = "contains")]
    Contains,
}

impl Operator {
    /// Loose comparison matching what the client runtime does with form
    /// values: numbers compare across int/uint/float, and text compares
    /// against the wire form of scalars.
    #[must_use]
    pub fn evaluate(self, current: &Value, expected: &Value) -> bool {
        match self {
            Self::Equals => loose_eq(current, expected),
            Self::NotEquals => !loose_eq(current, expected),
            Self::Gt => compare(current, expected).is_some_and(std::cmp::Ordering::is_gt),
            Self::Gte => compare(current, expected).is_some_and(std::cmp::Ordering::is_ge),
            Self::Lt => compare(current, expected).is_some_and(std::cmp::Ordering::is_lt),
            Self::Lte => compare(current, expected).is_some_and(std::cmp::Ordering::is_le),
            Self::In => expected
                .as_list()
                .is_some_and(|items| items.iter().any(|item| loose_eq(current, item))),
            Self::NotIn => !expected
                .as_list()
                .is_some_and(|items| items.iter().any(|item| loose_eq(current, item))),
            Self::Contains => match current {
                Value::Text(text) => text.contains(&expected.to_key_string()),
                Value::List(items) => items.iter().any(|item| loose_eq(item, expected)),
                _ => false,
            },
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => {
            let f = *i as f64;
            Some(f)
        }
        Value::Uint(u) => {
            let f = *u as f64;
            Some(f)
        }
        Value::Float(f) => Some(*f),
        Value::Text(text) => text.parse().ok(),
        _ => None,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }

    // null only equals null; it never coerces into "" or 0
    if a.is_null() || b.is_null() {
        return false;
    }

    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x == y;
    }

    matches!((a, b), (Value::Text(_), _) | (_, Value::Text(_)))
        && a.to_key_string() == b.to_key_string()
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }

    match (a, b) {
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

///
/// ShowWhenRule
///
/// One visibility condition on a field: show the field while the value
/// under `column` satisfies the comparison.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShowWhenRule {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

impl ShowWhenRule {
    #[must_use]
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// Server-side evaluation: submitted input takes precedence over the
    /// record's stored attribute; a value found in neither counts as null.
    #[must_use]
    pub fn matches(&self, ctx: &FormContext, record: &Record) -> bool {
        let current = ctx
            .value(&self.column)
            .or_else(|| record.get_path(&self.column));

        self.operator
            .evaluate(current.unwrap_or(&Value::Null), &self.value)
    }
}

///
/// VisibilityRule
///
/// A collected rule on the wire: the dotted path of the dependent field
/// plus its condition, keyed under the column it depends on.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRule {
    pub field: String,
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

///
/// VisibilityMap
///
/// All conditional fields of a tree, grouped by the (dotted) column their
/// conditions depend on, so the client can re-evaluate exactly the rules
/// affected by one changed input.
///

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VisibilityMap {
    #[serde(flatten)]
    rules: BTreeMap<String, Vec<VisibilityRule>>,
}

impl VisibilityMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rule: VisibilityRule) {
        self.rules.entry(rule.column.clone()).or_default().push(rule);
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&[VisibilityRule]> {
        self.rules.get(column).map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Total rule count across all depended-on columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[VisibilityRule])> {
        self.rules
            .iter()
            .map(|(column, rules)| (column.as_str(), rules.as_slice()))
    }
}

/// Collect every conditional field at every nesting depth. Paths inside a
/// relationship sub-tree are prefixed with `relation_name.` on both the
/// dependent field and the column it depends on.
#[must_use]
pub fn collect(tree: &FieldTree) -> VisibilityMap {
    let mut map = VisibilityMap::new();

    tree.walk(|field, path| {
        let prefix = match path.rsplit_once('.') {
            Some((parents, _)) => format!("{parents}."),
            None => String::new(),
        };

        for rule in &field.show_when {
            map.insert(VisibilityRule {
                field: path.to_string(),
                column: format!("{prefix}{}", rule.column),
                operator: rule.operator,
                value: rule.value.clone(),
            });
        }
    });

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_compares_numbers_across_types() {
        assert!(Operator::Equals.evaluate(&Value::Uint(5), &Value::Int(5)));
        assert!(Operator::Equals.evaluate(&Value::Text("5".to_string()), &Value::Int(5)));
        assert!(!Operator::Equals.evaluate(&Value::Text("5a".to_string()), &Value::Int(5)));
    }

    #[test]
    fn null_current_only_matches_null() {
        assert!(Operator::Equals.evaluate(&Value::Null, &Value::Null));
        assert!(!Operator::Equals.evaluate(&Value::Null, &Value::Text(String::new())));
        assert!(!Operator::Equals.evaluate(&Value::Text(String::new()), &Value::Null));
        assert!(!Operator::Equals.evaluate(&Value::Null, &Value::Int(0)));
        assert!(Operator::NotEquals.evaluate(&Value::Null, &Value::Int(1)));
    }

    #[test]
    fn ordering_operators() {
        assert!(Operator::Gt.evaluate(&Value::Int(6), &Value::Uint(5)));
        assert!(Operator::Lte.evaluate(&Value::Float(5.0), &Value::Int(5)));
        assert!(!Operator::Gt.evaluate(&Value::Bool(true), &Value::Int(0)));
    }

    #[test]
    fn membership_and_contains() {
        let set = Value::List(vec![Value::Int(1), Value::Int(2)]);

        assert!(Operator::In.evaluate(&Value::Uint(2), &set));
        assert!(Operator::NotIn.evaluate(&Value::Uint(3), &set));
        assert!(Operator::Contains.evaluate(
            &Value::Text("hello world".to_string()),
            &Value::Text("world".to_string())
        ));
        assert!(Operator::Contains.evaluate(&set, &Value::Uint(1)));
    }

    #[test]
    fn operator_wire_names_are_symbols() {
        assert_eq!(serde_json::to_string(&Operator::Gte).unwrap(), r#"">=""#);
        assert_eq!(
            serde_json::from_str::<Operator>(r#""not in""#).unwrap(),
            Operator::NotIn
        );
    }

    #[test]
    fn collect_prefixes_nested_paths_on_both_sides() {
        use crate::field::relation::Relationship;
        use crate::field::Field;

        let tree = FieldTree::new(vec![
            Field::text("kind"),
            Field::text("subtitle").show_when("kind", Operator::Equals, "article"),
            Field::has_many(Relationship::one_to_many("comments", "comments", "post_id")).fields(
                vec![
                    Field::text("body"),
                    Field::has_many(Relationship::one_to_many(
                        "replies", "replies", "comment_id",
                    ))
                    .fields(vec![
                        Field::text("mood"),
                        Field::text("tone").show_when("mood", Operator::Equals, "calm"),
                    ]),
                ],
            ),
        ])
        .unwrap();

        let map = collect(&tree);
        assert_eq!(map.len(), 2);

        let top = map.get("kind").unwrap();
        assert_eq!(top[0].field, "subtitle");

        let nested = map.get("comments.replies.mood").unwrap();
        assert_eq!(nested[0].field, "comments.replies.tone");
        assert_eq!(nested[0].operator, Operator::Equals);
    }

    #[test]
    fn rule_reads_input_before_record() {
        let rule = ShowWhenRule::new("status", Operator::Equals, "draft");
        let record = Record::new().with("status", "published");

        let ctx = FormContext::new().with_input(Value::Map(vec![(
            "status".to_string(),
            Value::Text("draft".to_string()),
        )]));
        assert!(rule.matches(&ctx, &record));

        let ctx = FormContext::new();
        assert!(!rule.matches(&ctx, &record));
    }
}
