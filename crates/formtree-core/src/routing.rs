use crate::{config::EngineConfig, error::EngineError};

/// Ordered route parameters; order is preserved into the built URL.
pub type ParamMap = Vec<(String, String)>;

///
/// Router
///
/// URL construction seam. `action` is a symbolic route name from
/// `EngineConfig`; the host decides what the URL actually looks like.
///

pub trait Router {
    fn to(&self, action: &str, params: &ParamMap) -> Result<String, EngineError>;
}

///
/// Endpoints
///
/// The only place engine code turns intent into URLs. Everything async
/// (method calls, option search, reactive refresh) goes through here, never
/// through hand-concatenated strings.
///

pub struct Endpoints<'a> {
    router: &'a dyn Router,
    config: &'a EngineConfig,
}

impl<'a> Endpoints<'a> {
    #[must_use]
    pub const fn new(router: &'a dyn Router, config: &'a EngineConfig) -> Self {
        Self { router, config }
    }

    /// URL invoking a named server method on a resource.
    pub fn method_url(
        &self,
        resource: &str,
        method: &str,
        params: &ParamMap,
    ) -> Result<String, EngineError> {
        let mut all: ParamMap = vec![
            ("resource".to_string(), resource.to_string()),
            ("method".to_string(), method.to_string()),
        ];
        all.extend(params.iter().cloned());

        self.router.to(&self.config.route_method_action, &all)
    }

    /// URL serving option search for one (dotted) field of a resource.
    pub fn async_search_url(
        &self,
        resource: &str,
        field: &str,
        params: &ParamMap,
    ) -> Result<String, EngineError> {
        let mut all: ParamMap = vec![
            ("resource".to_string(), resource.to_string()),
            ("field".to_string(), field.to_string()),
        ];
        all.extend(params.iter().cloned());

        self.router.to(&self.config.route_search_action, &all)
    }

    /// URL refreshing reactive field state for a component.
    pub fn reactive_url(&self, resource: &str, component: &str) -> Result<String, EngineError> {
        let params: ParamMap = vec![
            ("resource".to_string(), resource.to_string()),
            ("component".to_string(), component.to_string()),
        ];

        self.router.to(&self.config.route_reactive_action, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RoutingError;

    struct QueryRouter;

    impl Router for QueryRouter {
        fn to(&self, action: &str, params: &ParamMap) -> Result<String, EngineError> {
            if action.is_empty() {
                return Err(RoutingError::UnknownAction {
                    action: action.to_string(),
                }
                .into());
            }

            let query: Vec<String> =
                params.iter().map(|(k, v)| format!("{k}={v}")).collect();
            Ok(format!("/{}?{}", action, query.join("&")))
        }
    }

    #[test]
    fn search_url_carries_resource_and_field_first() {
        let config = EngineConfig::default();
        let endpoints = Endpoints::new(&QueryRouter, &config);

        let url = endpoints
            .async_search_url("cities", "country_id", &vec![])
            .unwrap();

        assert_eq!(url, "/async.search?resource=cities&field=country_id");
    }

    #[test]
    fn method_url_appends_extra_params_in_order() {
        let config = EngineConfig::default();
        let endpoints = Endpoints::new(&QueryRouter, &config);

        let url = endpoints
            .method_url(
                "posts",
                "publish",
                &vec![("id".to_string(), "3".to_string())],
            )
            .unwrap();

        assert_eq!(url, "/async.method?resource=posts&method=publish&id=3");
    }
}
