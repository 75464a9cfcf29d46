//! Routing contract and the default segment router.
//!
//! The kernel does not match URLs itself. A [`Router`] turns a request into a
//! [`RouteMatch`]; the kernel copies it onto the request before dispatching.
//!
//! [`SegmentRouter`] covers the conventional layout:
//!
//! ```text
//! <base path>/[module/]controller/action[/key/value...]
//! ```
//!
//! The first segment is a module only if it names one of the allowed modules
//! (compared after title-casing). Missing segments fall back to the route
//! defaults.

use serde_json::Value;
use thiserror::Error;

use crate::naming::title_case;
use crate::request::{Params, Request, RouteDefaults};

/// Result of routing a request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteMatch {
    pub module: String,
    pub controller: String,
    /// `None` leaves the request's current action name in place.
    pub action: Option<String>,
    /// Extra parameters extracted from the path.
    pub params: Params,
}

impl RouteMatch {
    pub fn new(module: impl Into<String>, controller: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            controller: controller.into(),
            ..Default::default()
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Copies the match onto `request`. Route params overwrite request params.
    pub fn apply(self, request: &mut Request) {
        request
            .set_module_name(self.module)
            .set_controller_name(self.controller);
        if let Some(action) = self.action {
            request.set_action_name(action);
        }
        if !self.params.is_empty() {
            request.merge_params(self.params);
        }
    }
}

/// Routing failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("no route matches '{0}'")]
    NoMatch(String),

    #[error("route for '{uri}' is invalid: {reason}")]
    Invalid { uri: String, reason: String },
}

/// Resolves a request to a module, controller and action.
pub trait Router {
    fn route(&self, request: &Request) -> Result<RouteMatch, RouteError>;
}

impl<F> Router for F
where
    F: Fn(&Request) -> Result<RouteMatch, RouteError>,
{
    fn route(&self, request: &Request) -> Result<RouteMatch, RouteError> {
        self(request)
    }
}

/// Path-segment router.
#[derive(Debug, Clone, Default)]
pub struct SegmentRouter {
    modules: Vec<String>,
    defaults: RouteDefaults,
}

impl SegmentRouter {
    /// `modules` are the allowed module names, as they appear in the
    /// configuration (title-cased).
    pub fn new<I, S>(modules: I, defaults: RouteDefaults) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: modules.into_iter().map(Into::into).collect(),
            defaults,
        }
    }

    fn is_module(&self, segment: &str) -> bool {
        let titled = title_case(segment);
        self.modules.iter().any(|m| *m == titled)
    }
}

/// Path below the script directory, split into non-empty segments.
fn segments(request: &Request) -> Vec<&str> {
    let path = request.path();
    let base = request.base_path();
    let relative = match path.strip_prefix(base) {
        Some(rest) if base.len() > 1 && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => path,
    };
    relative.split('/').filter(|s| !s.is_empty()).collect()
}

impl Router for SegmentRouter {
    fn route(&self, request: &Request) -> Result<RouteMatch, RouteError> {
        let mut segments = segments(request).into_iter().peekable();

        let module = if segments.peek().is_some_and(|first| self.is_module(first)) {
            segments.next().unwrap_or_default()
        } else {
            self.defaults.module.as_str()
        };
        let controller = segments.next().unwrap_or(self.defaults.controller.as_str());
        let action = segments.next().unwrap_or(self.defaults.action.as_str());

        let rest: Vec<&str> = segments.collect();
        if rest.len() % 2 != 0 {
            return Err(RouteError::Invalid {
                uri: request.request_uri().to_string(),
                reason: format!("parameter '{}' has no value", rest[rest.len() - 1]),
            });
        }

        let mut route = RouteMatch::new(module, controller).with_action(action);
        for pair in rest.chunks(2) {
            route = route.with_param(pair[0], pair[1]);
        }
        log::debug!(
            "routed '{}' to {}/{}/{}",
            request.request_uri(),
            route.module,
            route.controller,
            action
        );
        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router() -> SegmentRouter {
        SegmentRouter::new(["Default", "Blog"], RouteDefaults::default())
    }

    fn route(uri: &str) -> Result<RouteMatch, RouteError> {
        router().route(&Request::builder().uri(uri).build())
    }

    #[test]
    fn test_root_uses_defaults() {
        let route = route("/").unwrap();
        assert_eq!(route.module, "default");
        assert_eq!(route.controller, "index");
        assert_eq!(route.action.as_deref(), Some("index"));
        assert!(route.params.is_empty());
    }

    #[test]
    fn test_module_controller_action() {
        let route = route("/blog/post/show").unwrap();
        assert_eq!(route.module, "blog");
        assert_eq!(route.controller, "post");
        assert_eq!(route.action.as_deref(), Some("show"));
    }

    #[test]
    fn test_unknown_first_segment_is_controller() {
        let route = route("/news/latest").unwrap();
        assert_eq!(route.module, "default");
        assert_eq!(route.controller, "news");
        assert_eq!(route.action.as_deref(), Some("latest"));
    }

    #[test]
    fn test_key_value_params() {
        let route = route("/blog/post/show/id/3/lang/en?ignored=1").unwrap();
        assert_eq!(route.params.get("id"), Some(&json!("3")));
        assert_eq!(route.params.get("lang"), Some(&json!("en")));
        assert!(!route.params.contains_key("ignored"));
    }

    #[test]
    fn test_dangling_param_is_invalid() {
        let err = route("/blog/post/show/id").unwrap_err();
        assert!(matches!(err, RouteError::Invalid { .. }));
    }

    #[test]
    fn test_path_relative_to_base_path() {
        let request = Request::builder()
            .uri("/shop/blog/post/list")
            .server_var("SCRIPT_NAME", "/shop/index.cgi")
            .build();
        assert_eq!(request.base_path(), "/shop");
        let route = router().route(&request).unwrap();
        assert_eq!(route.module, "blog");
        assert_eq!(route.controller, "post");
        assert_eq!(route.action.as_deref(), Some("list"));
    }

    #[test]
    fn test_apply_copies_onto_request() {
        let mut request = Request::builder().get_param("id", "1").build();
        RouteMatch::new("blog", "post")
            .with_param("id", "7")
            .apply(&mut request);

        assert_eq!(request.module_name(), "blog");
        assert_eq!(request.controller_name(), "post");
        assert_eq!(request.action_name(), "index");
        assert_eq!(request.param("id"), Some(json!("7")));
    }

    #[test]
    fn test_closure_router() {
        let fixed = |_: &Request| {
            Ok::<_, RouteError>(RouteMatch::new("default", "error").with_action("missing"))
        };
        let route = fixed.route(&Request::default()).unwrap();
        assert_eq!(route.controller, "error");
    }
}
