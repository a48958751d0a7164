use crate::{
    context::FormContext,
    error::{CastError, EngineError},
    field::Field,
    record::Record,
    tree::FieldTree,
    value::Value,
};
use std::sync::Arc;

/// Record hook run around the per-field phase of a pipeline.
pub type PipelineHook = Arc<dyn Fn(&FormContext, &mut Record) -> Result<(), EngineError> + Send + Sync>;

/// The one hook that sees the whole result: the mutated working record and
/// the field set that produced it. Persistence belongs here.
pub type OuterHook =
    Arc<dyn Fn(&FormContext, &mut Record, &[&Field]) -> Result<(), EngineError> + Send + Sync>;

///
/// Caster
///
/// Shapes raw submitted values into a record the pipeline can work on.
/// Hosts with their own model layer install a caster that builds theirs.
///

pub trait Caster {
    fn cast(&self, values: &Value) -> Result<Record, EngineError>;
}

///
/// RecordCaster
///
/// Default caster: a submitted map becomes a record attribute for
/// attribute. Anything that is not a map (or null) refuses to cast, so a
/// malformed submission fails before any field runs.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct RecordCaster;

impl Caster for RecordCaster {
    fn cast(&self, values: &Value) -> Result<Record, EngineError> {
        match values {
            Value::Map(entries) => {
                let mut record = Record::new();
                for (column, value) in entries {
                    record.set(column, value.clone());
                }
                Ok(record)
            }
            Value::Null => Ok(Record::new()),
            other => Err(CastError::UnexpectedShape {
                found: other.type_name(),
            }
            .into()),
        }
    }
}

///
/// ApplyStage
///
/// Where in the pipeline a failure happened; carried into the warn log of
/// the swallowing entry point.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApplyStage {
    Cast,
    Filter,
    Fields,
    Outer,
    Settle,
}

///
/// ApplyPipeline
///
/// Drives one form submission onto a record: cast the raw values, filter
/// the applicable fields, run every field's hooked apply in declaration
/// order, hand the result to the outer hook, settle. All mutation happens
/// on a working copy cast from the submitted values; the caller's record
/// is never touched, so a failing run leaves nothing half-applied. Blob
/// stores written by file fields are outside that guarantee.
///

pub struct ApplyPipeline<'a> {
    tree: &'a FieldTree,
    caster: Arc<dyn Caster + Send + Sync>,
    exclude: Vec<String>,
    redirect: Option<String>,
    without_redirect: bool,
    submit: Option<String>,
    before: Option<PipelineHook>,
    after: Option<PipelineHook>,
    outer: Option<OuterHook>,
}

impl<'a> ApplyPipeline<'a> {
    #[must_use]
    pub fn new(tree: &'a FieldTree) -> Self {
        Self {
            tree,
            caster: Arc::new(RecordCaster),
            exclude: Vec::new(),
            redirect: None,
            without_redirect: false,
            submit: None,
            before: None,
            after: None,
            outer: None,
        }
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    #[must_use]
    pub fn caster(mut self, caster: Arc<dyn Caster + Send + Sync>) -> Self {
        self.caster = caster;
        self
    }

    /// Exclude one more column from the per-field phase, on top of the
    /// reserved defaults from `EngineConfig`.
    #[must_use]
    pub fn exclude(mut self, column: impl Into<String>) -> Self {
        self.exclude.push(column.into());
        self
    }

    #[must_use]
    pub fn redirect(mut self, uri: impl Into<String>) -> Self {
        self.redirect = Some(uri.into());
        self
    }

    #[must_use]
    pub const fn without_redirect(mut self) -> Self {
        self.without_redirect = true;
        self
    }

    #[must_use]
    pub fn submit(mut self, label: impl Into<String>) -> Self {
        self.submit = Some(label.into());
        self
    }

    #[must_use]
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FormContext, &mut Record) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FormContext, &mut Record) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn outer<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FormContext, &mut Record, &[&Field]) -> Result<(), EngineError>
            + Send
            + Sync
            + 'static,
    {
        self.outer = Some(Arc::new(hook));
        self
    }

    // ------------------------------------------------------------------
    // Form chrome
    // ------------------------------------------------------------------

    /// Reserved hidden fields the form carries for the redirect behavior.
    #[must_use]
    pub fn hidden_fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();

        if let Some(uri) = &self.redirect {
            fields.push(Field::hidden("_redirect").default_value(uri.as_str()));
        }
        if self.without_redirect {
            fields.push(Field::hidden("_without-redirect").default_value("1"));
        }

        fields
    }

    /// The submit button label, falling back to the translated default.
    #[must_use]
    pub fn submit_label(&self, ctx: &FormContext) -> String {
        self.submit
            .clone()
            .unwrap_or_else(|| ctx.translate("formtree.save"))
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Run the pipeline, re-raising the first failure unchanged.
    pub fn try_apply(&self, ctx: &FormContext, base: &Record) -> Result<Record, EngineError> {
        self.run(ctx, base).map_err(|(_, error)| error)
    }

    /// Run the pipeline, swallowing failures: a failed run is logged with
    /// its stage and reported as `false`.
    pub fn apply(&self, ctx: &FormContext, base: &Record) -> bool {
        match self.run(ctx, base) {
            Ok(_) => true,
            Err((stage, error)) => {
                tracing::warn!(stage = ?stage, error = %error, "form apply failed");
                false
            }
        }
    }

    fn run(&self, ctx: &FormContext, base: &Record) -> Result<Record, (ApplyStage, EngineError)> {
        // Cast
        let mut working = self
            .caster
            .cast(ctx.input())
            .map_err(|error| (ApplyStage::Cast, error))?;
        if let Some(key) = base.key() {
            working.set_key(key.clone());
        }

        // Filter
        let excluded = self.excluded_columns(ctx);
        for column in &excluded {
            working.remove(column);
        }
        let field_ids = self.tree.except_excluded(&excluded);

        // Per-field apply, declaration order
        if let Some(hook) = &self.before {
            hook(ctx, &mut working).map_err(|error| (ApplyStage::Fields, error))?;
        }
        for id in &field_ids {
            self.tree
                .apply_field(*id, ctx, &mut working)
                .map_err(|error| (ApplyStage::Fields, error))?;
        }

        // Outer, with the mutated record and the filtered field set
        if let Some(outer) = &self.outer {
            let fields: Vec<&Field> = field_ids
                .iter()
                .filter_map(|id| self.tree.field(*id))
                .collect();
            outer(ctx, &mut working, &fields).map_err(|error| (ApplyStage::Outer, error))?;
        }

        // Settle
        if let Some(hook) = &self.after {
            hook(ctx, &mut working).map_err(|error| (ApplyStage::Settle, error))?;
        }

        Ok(working)
    }

    fn excluded_columns(&self, ctx: &FormContext) -> Vec<String> {
        let mut all = ctx.config().excluded_columns.clone();
        for column in &self.exclude {
            if !all.contains(column) {
                all.push(column.clone());
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorClass, ErrorOrigin};
    use crate::field::Field;
    use std::sync::Mutex;

    fn input(entries: Vec<(&str, Value)>) -> Value {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    #[test]
    fn applies_fields_and_returns_the_working_record() {
        let tree = FieldTree::new(vec![Field::text("title"), Field::text("body").nullable()])
            .unwrap();
        let pipeline = ApplyPipeline::new(&tree);

        let ctx = FormContext::new().with_input(input(vec![
            ("title", Value::Text("hello".to_string())),
            ("_method", Value::Text("PUT".to_string())),
        ]));
        let base = Record::new().with_key(12_u64).with("title", "old");

        let result = pipeline.try_apply(&ctx, &base).unwrap();

        assert_eq!(result.key(), Some(&Value::Uint(12)));
        assert_eq!(result.get("title"), Some(&Value::Text("hello".to_string())));
        // reserved column stripped at the filter stage
        assert_eq!(result.get("_method"), None);
        // untouched caller record
        assert_eq!(base.get("title"), Some(&Value::Text("old".to_string())));
    }

    #[test]
    fn partial_submission_leaves_unsubmitted_columns_absent() {
        let tree = FieldTree::new(vec![Field::text("title"), Field::text("notes")]).unwrap();
        let pipeline = ApplyPipeline::new(&tree);

        let ctx = FormContext::new()
            .with_input(input(vec![("title", Value::Text("hello".to_string()))]));

        let result = pipeline.try_apply(&ctx, &Record::new()).unwrap();

        assert_eq!(result.get("title"), Some(&Value::Text("hello".to_string())));
        // never submitted, never defaulted: the column stays untouched
        assert_eq!(result.get("notes"), None);
    }

    #[test]
    fn explicit_default_fills_an_unsubmitted_column() {
        let tree = FieldTree::new(vec![
            Field::text("title"),
            Field::text("status").default_value("draft"),
        ])
        .unwrap();
        let pipeline = ApplyPipeline::new(&tree);

        let ctx = FormContext::new()
            .with_input(input(vec![("title", Value::Text("hello".to_string()))]));

        let result = pipeline.try_apply(&ctx, &Record::new()).unwrap();
        assert_eq!(result.get("status"), Some(&Value::Text("draft".to_string())));
    }

    #[test]
    fn hook_order_is_before_fields_outer_settle() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let push = |seen: &Arc<Mutex<Vec<String>>>, tag: &str| {
            let seen = Arc::clone(seen);
            let tag = tag.to_string();
            move |_: &FormContext, _: &mut Record| {
                seen.lock().unwrap().push(tag.clone());
                Ok(())
            }
        };

        let tree = FieldTree::new(vec![
            Field::text("first")
                .before_apply(push(&seen, "before:first"))
                .after_apply(push(&seen, "after:first")),
            Field::text("second").before_apply(push(&seen, "before:second")),
        ])
        .unwrap();

        let outer_seen = Arc::clone(&seen);
        let settle_seen = Arc::clone(&seen);
        let value_seen = Arc::clone(&seen);

        let pipeline = ApplyPipeline::new(&tree)
            .before(move |_, _| {
                value_seen.lock().unwrap().push("before".to_string());
                Ok(())
            })
            .outer(move |_, _, fields| {
                outer_seen
                    .lock()
                    .unwrap()
                    .push(format!("outer:{}", fields.len()));
                Ok(())
            })
            .after(move |_, _| {
                settle_seen.lock().unwrap().push("settle".to_string());
                Ok(())
            });

        let ctx = FormContext::new().with_input(input(vec![]));
        assert!(pipeline.apply(&ctx, &Record::new()));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "before",
                "before:first",
                "after:first",
                "before:second",
                "outer:2",
                "settle",
            ]
        );
    }

    #[test]
    fn malformed_input_fails_at_cast_with_pipeline_class() {
        let tree = FieldTree::new(vec![Field::text("title")]).unwrap();
        let pipeline = ApplyPipeline::new(&tree);

        let ctx = FormContext::new().with_input(Value::List(vec![Value::Int(1)]));

        let err = pipeline.try_apply(&ctx, &Record::new()).unwrap_err();
        assert_eq!(err.class, ErrorClass::Pipeline);
        assert_eq!(err.origin, ErrorOrigin::Apply);
        assert!(err.message.contains("list"));

        assert!(!pipeline.apply(&ctx, &Record::new()));
    }

    #[test]
    fn try_apply_re_raises_the_original_field_error() {
        let tree = FieldTree::new(vec![Field::text("title").on_apply(|_, _| {
            Err(EngineError::new(
                ErrorClass::Validation,
                ErrorOrigin::Field,
                "title is taken",
            ))
        })])
        .unwrap();
        let pipeline = ApplyPipeline::new(&tree);
        let ctx = FormContext::new().with_input(input(vec![]));

        let err = pipeline.try_apply(&ctx, &Record::new()).unwrap_err();
        assert_eq!(err.message, "title is taken");

        assert!(!pipeline.apply(&ctx, &Record::new()));
    }

    #[test]
    fn builder_exclusions_skip_the_field_entirely() {
        let tree = FieldTree::new(vec![Field::text("title"), Field::text("internal")]).unwrap();
        let pipeline = ApplyPipeline::new(&tree).exclude("internal");

        let ctx = FormContext::new().with_input(input(vec![
            ("title", Value::Text("t".to_string())),
            ("internal", Value::Text("secret".to_string())),
        ]));

        let result = pipeline.try_apply(&ctx, &Record::new()).unwrap();
        assert_eq!(result.get("internal"), None);
    }

    #[test]
    fn redirect_chrome_materializes_as_hidden_fields() {
        let tree = FieldTree::new(vec![Field::text("title")]).unwrap();
        let pipeline = ApplyPipeline::new(&tree).redirect("/posts");

        let hidden = pipeline.hidden_fields();
        assert_eq!(hidden.len(), 1);
        assert_eq!(hidden[0].column, "_redirect");
        assert_eq!(hidden[0].default_value, Value::Text("/posts".to_string()));

        let both = ApplyPipeline::new(&tree)
            .redirect("/posts")
            .without_redirect();
        assert_eq!(both.hidden_fields().len(), 2);
    }

    #[test]
    fn submit_label_falls_back_through_the_translator() {
        let tree = FieldTree::new(vec![]).unwrap();
        let ctx = FormContext::new();

        assert_eq!(
            ApplyPipeline::new(&tree).submit_label(&ctx),
            "formtree.save"
        );
        assert_eq!(
            ApplyPipeline::new(&tree).submit("Publish").submit_label(&ctx),
            "Publish"
        );
    }
}
