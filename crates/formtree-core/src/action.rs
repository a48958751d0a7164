use crate::{
    context::FormContext,
    error::{EngineError, ErrorClass, ErrorOrigin},
    record::Record,
    routing::ParamMap,
    wire::{AsyncCallback, AttrBag, join_events},
};
use derive_more::Display;
use std::{fmt, sync::Arc};

/// Per-row URL producer for buttons rendered inside list contexts.
pub type UrlHook = Arc<dyn Fn(&Record) -> String + Send + Sync>;

/// Attribute names owned by async mode. `purge_async` removes exactly
/// these, so anything a caller set stays put.
const ASYNC_ATTRS: &[&str] = &[
    "x-data",
    "data-async-url",
    "data-async-method",
    "data-async-events",
    "data-async-selector",
    "data-async-callback",
];

/// Payload keys never forwarded by a dispatched client event.
const RESERVED_EVENT_EXCLUDES: &[&str] = &["_component_name", "_token", "_method"];

///
/// HttpMethod
///

#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum HttpMethod {
    #[default]
    #[display("GET")]
    Get,
    #[display("POST")]
    Post,
    #[display("PUT")]
    Put,
    #[display("PATCH")]
    Patch,
    #[display("DELETE")]
    Delete,
}

///
/// UrlSource
///
/// A button target is either a fixed string or a function of the current
/// record; list contexts use the latter for per-row URLs.
///

#[derive(Clone)]
pub enum UrlSource {
    Literal(String),
    Producer(UrlHook),
}

impl UrlSource {
    #[must_use]
    pub fn resolve(&self, record: Option<&Record>) -> String {
        match self {
            Self::Literal(url) => url.clone(),
            Self::Producer(hook) => record.map(|r| hook(r)).unwrap_or_default(),
        }
    }
}

///
/// Surface
///
/// The one nested interactive component a button may own. `async_form`
/// records whether the form inside submits asynchronously itself; attaching
/// such a surface purges the owning button's async mode so only one async
/// request is ever in flight per click.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Surface {
    Modal { title: String, async_form: bool },
    OffCanvas { title: String, async_form: bool },
}

impl Surface {
    #[must_use]
    pub fn modal(title: impl Into<String>) -> Self {
        Self::Modal {
            title: title.into(),
            async_form: false,
        }
    }

    #[must_use]
    pub fn off_canvas(title: impl Into<String>) -> Self {
        Self::OffCanvas {
            title: title.into(),
            async_form: false,
        }
    }

    /// Mark the nested form as submitting asynchronously.
    #[must_use]
    pub const fn async_form(mut self) -> Self {
        match &mut self {
            Self::Modal { async_form, .. } | Self::OffCanvas { async_form, .. } => {
                *async_form = true;
            }
        }
        self
    }

    #[must_use]
    pub const fn is_async_form(&self) -> bool {
        match self {
            Self::Modal { async_form, .. } | Self::OffCanvas { async_form, .. } => *async_form,
        }
    }
}

///
/// ActionButton
///
/// A client control that triggers a pipeline operation: a label, a target
/// URL, and a declarative attribute set the client runtime consumes. Async
/// mode, bulk mode, event dispatch, and the nested surface all reduce to
/// attributes; nothing here renders markup.
///

#[derive(Clone)]
pub struct ActionButton {
    pub label: String,
    pub url: UrlSource,
    pub attributes: AttrBag,
    is_async: bool,
    async_method: Option<String>,
    is_bulk: bool,
    bulk_for: Option<String>,
    surface: Option<Surface>,
}

impl ActionButton {
    #[must_use]
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: UrlSource::Literal(url.into()),
            attributes: AttrBag::new(),
            is_async: false,
            async_method: None,
            is_bulk: false,
            bulk_for: None,
            surface: None,
        }
    }

    /// Button whose target depends on the current record.
    #[must_use]
    pub fn for_record<F>(label: impl Into<String>, url: F) -> Self
    where
        F: Fn(&Record) -> String + Send + Sync + 'static,
    {
        let mut button = Self::new(label, "#");
        button.url = UrlSource::Producer(Arc::new(url));
        button
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.set(name, value);
        self
    }

    /// Open the target in a new tab.
    #[must_use]
    pub fn blank(self) -> Self {
        self.attribute("target", "_blank")
    }

    /// Switch on async mode: the click becomes a request against the
    /// button's URL instead of a navigation. `selectors` name the DOM
    /// scopes to refresh, `events` re-dispatch after completion, and the
    /// callback descriptor travels as JSON.
    pub fn async_mode(
        mut self,
        method: HttpMethod,
        selectors: &[&str],
        events: &[String],
        callback: Option<&AsyncCallback>,
    ) -> Result<Self, EngineError> {
        self.is_async = true;

        self.attributes.set("x-data", "actionButton");
        self.attributes
            .set("data-async-url", self.url.resolve(None));
        self.attributes
            .set("data-async-method", method.to_string());
        if !events.is_empty() {
            self.attributes.set("data-async-events", join_events(events));
        }
        if !selectors.is_empty() {
            self.attributes
                .set("data-async-selector", selectors.join(","));
        }
        if let Some(callback) = callback {
            if !callback.is_empty() {
                self.attributes
                    .set("data-async-callback", callback.to_json()?);
            }
        }
        self.attributes.set("x-on:click.prevent", "request");

        Ok(self)
    }

    /// Point the button at a named server method and switch async on. The
    /// URL goes through the router contract; a record key in the context
    /// parameters travels as `resourceItem`.
    pub fn method(
        mut self,
        ctx: &FormContext,
        method: impl Into<String>,
        params: &ParamMap,
        selectors: &[&str],
        events: &[String],
        callback: Option<&AsyncCallback>,
    ) -> Result<Self, EngineError> {
        let method = method.into();
        let endpoints = ctx.endpoints().ok_or_else(|| {
            EngineError::new(
                ErrorClass::Config,
                ErrorOrigin::Action,
                "no router configured for a method button",
            )
        })?;

        let url = endpoints.method_url(ctx.resource(), &method, params)?;
        self.url = UrlSource::Literal(url);
        self.async_method = Some(method);

        self.async_mode(HttpMethod::Get, selectors, events, callback)
    }

    /// Mark the button as operating over the selection of a named
    /// component instead of a single record. The attributes stay off while
    /// a surface owns the interaction.
    #[must_use]
    pub fn bulk(mut self, for_component: impl Into<String>) -> Self {
        self.is_bulk = true;
        self.bulk_for = Some(for_component.into());

        if self.surface.is_none() {
            self.attributes.set("data-button-type", "bulk-button");
            if let Some(component) = &self.bulk_for {
                self.attributes.set("data-for-component", component.as_str());
            }
        }

        self
    }

    /// Turn the click into a client event dispatch. Reserved payload keys
    /// are always excluded on top of the caller's list.
    #[must_use]
    pub fn dispatch_event(mut self, events: &[String], exclude: &[&str]) -> Self {
        if !self.attributes.has("x-data") {
            self.attributes.set("x-data", "actionButton");
        }

        let mut excludes: Vec<&str> = exclude.to_vec();
        for reserved in RESERVED_EVENT_EXCLUDES {
            if !excludes.contains(reserved) {
                excludes.push(reserved);
            }
        }

        self.attributes.set(
            "x-on:click.prevent",
            format!("dispatchEvents(`{}`,`{}`)", join_events(events), excludes.join(",")),
        );

        self
    }

    /// Attach the nested surface, replacing any previous one. A surface
    /// with an async form takes over the request; the button's own async
    /// mode is purged so a click issues exactly one request.
    #[must_use]
    pub fn with_surface(mut self, surface: Surface) -> Self {
        if surface.is_async_form() {
            self.purge_async();
        }

        self.attributes.remove("data-button-type");
        self.attributes.remove("data-for-component");
        self.surface = Some(surface);
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn url(&self, record: Option<&Record>) -> String {
        self.url.resolve(record)
    }

    #[must_use]
    pub const fn is_async(&self) -> bool {
        self.is_async
    }

    #[must_use]
    pub fn is_async_method(&self) -> bool {
        self.async_method.is_some()
    }

    #[must_use]
    pub fn async_method(&self) -> Option<&str> {
        self.async_method.as_deref()
    }

    #[must_use]
    pub const fn is_bulk(&self) -> bool {
        self.is_bulk
    }

    #[must_use]
    pub fn bulk_for(&self) -> Option<&str> {
        self.bulk_for.as_deref()
    }

    #[must_use]
    pub const fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    // ------------------------------------------------------------------
    // Async purge
    // ------------------------------------------------------------------

    /// Drop async mode and every attribute it set; attributes the caller
    /// added stay. The click binding goes only when it is still the async
    /// `request` binding.
    pub fn purge_async(&mut self) {
        self.is_async = false;

        for name in ASYNC_ATTRS {
            self.attributes.remove(name);
        }

        if self.attributes.get("x-on:click.prevent") == Some("request") {
            self.attributes.remove("x-on:click.prevent");
        }
    }

    /// Purge, reporting whether the button was async before.
    pub fn purge_async_tap(&mut self) -> bool {
        let was_async = self.is_async;
        self.purge_async();
        was_async
    }
}

impl fmt::Debug for ActionButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionButton")
            .field("label", &self.label)
            .field("attributes", &self.attributes)
            .field("is_async", &self.is_async)
            .field("is_bulk", &self.is_bulk)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_support::StaticRouter, value::Value};

    fn async_button() -> ActionButton {
        ActionButton::new("Approve", "/approve")
            .async_mode(
                HttpMethod::Post,
                &["#table", "#sidebar"],
                &["table_updated".to_string()],
                Some(&AsyncCallback::new().response_handler("onApproved")),
            )
            .unwrap()
    }

    #[test]
    fn async_mode_attaches_the_full_attribute_set() {
        let button = async_button();

        assert!(button.is_async());
        assert_eq!(button.attributes.get("x-data"), Some("actionButton"));
        assert_eq!(button.attributes.get("data-async-url"), Some("/approve"));
        assert_eq!(button.attributes.get("data-async-method"), Some("POST"));
        assert_eq!(
            button.attributes.get("data-async-selector"),
            Some("#table,#sidebar")
        );
        assert_eq!(
            button.attributes.get("data-async-events"),
            Some("table_updated")
        );
        assert_eq!(
            button.attributes.get("data-async-callback"),
            Some(r#"{"responseHandler":"onApproved"}"#)
        );
        assert_eq!(button.attributes.get("x-on:click.prevent"), Some("request"));
    }

    #[test]
    fn per_record_urls_resolve_against_the_row() {
        let button = ActionButton::for_record("Edit", |record| {
            format!("/posts/{}/edit", record.key_string())
        });

        let record = Record::new().with_key(7_u64);
        assert_eq!(button.url(Some(&record)), "/posts/7/edit");
        assert_eq!(button.url(None), "");
    }

    #[test]
    fn method_routes_through_the_endpoint_builder() {
        let ctx = FormContext::new()
            .with_resource("posts")
            .with_router(Arc::new(StaticRouter));

        let button = ActionButton::new("Publish", "#")
            .method(
                &ctx,
                "publish",
                &vec![("id".to_string(), "3".to_string())],
                &[],
                &[],
                None,
            )
            .unwrap();

        assert!(button.is_async());
        assert!(button.is_async_method());
        assert_eq!(button.async_method(), Some("publish"));
        assert_eq!(
            button.url(None),
            "/async.method?resource=posts&method=publish&id=3"
        );
    }

    #[test]
    fn method_without_a_router_is_a_config_error() {
        let err = ActionButton::new("Publish", "#")
            .method(&FormContext::new(), "publish", &vec![], &[], &[], None)
            .unwrap_err();

        assert!(err.is_config());
    }

    #[test]
    fn bulk_marks_the_selection_component() {
        let button = ActionButton::new("Delete", "/mass-delete").bulk("index-table");

        assert!(button.is_bulk());
        assert_eq!(
            button.attributes.get("data-button-type"),
            Some("bulk-button")
        );
        assert_eq!(
            button.attributes.get("data-for-component"),
            Some("index-table")
        );
    }

    #[test]
    fn dispatch_event_always_excludes_reserved_keys() {
        let button = ActionButton::new("Refresh", "#")
            .dispatch_event(&["Table_Updated".to_string()], &["password"]);

        assert_eq!(button.attributes.get("x-data"), Some("actionButton"));
        assert_eq!(
            button.attributes.get("x-on:click.prevent"),
            Some("dispatchEvents(`table_updated`,`password,_component_name,_token,_method`)")
        );
    }

    #[test]
    fn purge_async_removes_only_async_attributes() {
        let mut button = async_button().attribute("class", "btn-primary");

        assert!(button.purge_async_tap());
        assert!(!button.is_async());
        assert!(!button.purge_async_tap());

        for name in ASYNC_ATTRS {
            assert!(!button.attributes.has(name), "{name} should be gone");
        }
        assert!(!button.attributes.has("x-on:click.prevent"));
        assert_eq!(button.attributes.get("class"), Some("btn-primary"));
    }

    #[test]
    fn purge_keeps_a_caller_click_binding() {
        let mut button = async_button().attribute("x-on:click.prevent", "openMenu");

        button.purge_async();
        assert_eq!(
            button.attributes.get("x-on:click.prevent"),
            Some("openMenu")
        );
    }

    #[test]
    fn async_form_surface_purges_the_outer_button() {
        let button = async_button().with_surface(Surface::modal("Edit post").async_form());

        assert!(!button.is_async());
        assert!(!button.attributes.has("data-async-url"));
        assert!(matches!(button.surface(), Some(Surface::Modal { .. })));
    }

    #[test]
    fn plain_surface_leaves_async_mode_alone() {
        let button = async_button().with_surface(Surface::off_canvas("Filters"));

        assert!(button.is_async());
        assert_eq!(button.attributes.get("data-async-url"), Some("/approve"));
    }

    #[test]
    fn surface_replaces_bulk_attributes() {
        let button = ActionButton::new("Delete", "/mass-delete")
            .bulk("index-table")
            .with_surface(Surface::modal("Confirm"));

        assert!(button.is_bulk());
        assert!(!button.attributes.has("data-button-type"));
        assert!(!button.attributes.has("data-for-component"));
    }

    #[test]
    fn url_source_literal_ignores_the_record() {
        let source = UrlSource::Literal("/fixed".to_string());
        let record = Record::new().with("id", Value::Uint(1));

        assert_eq!(source.resolve(Some(&record)), "/fixed");
    }
}
