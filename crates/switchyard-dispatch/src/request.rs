//! The incoming HTTP request.
//!
//! A [`Request`] holds the merged GET/POST parameters (with provenance), the
//! server environment, cookies and the module/controller/action triple the
//! router resolved. URL facets (base path, base URL, host, scheme) are derived
//! from the server environment on first access and cached.
//!
//! # Parameter Precedence
//!
//! On construction, POST values win over GET values with the same name. The
//! name stays tagged as both, so `is_get` and `is_post` both answer true:
//!
//! ```rust
//! use switchyard_dispatch::Request;
//! use serde_json::json;
//!
//! let request = Request::builder()
//!     .post_param("q", json!("post"))
//!     .get_param("q", json!("get"))
//!     .build();
//!
//! assert_eq!(request.param("q"), Some(json!("post")));
//! assert!(request.is_post("q") && request.is_get("q"));
//! ```
//!
//! # Route Defaults
//!
//! Module, controller and action start out as the [`RouteDefaults`] the
//! request was built with. There is no process-wide default; build requests
//! through a [`RequestFactory`] to share one set of defaults.

use std::collections::{HashMap, HashSet};

use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter map type.
pub type Params = Map<String, Value>;

/// Server variables every request carries, with their fallback values.
pub const SERVER_DEFAULTS: [(&str, &str); 5] = [
    ("REQUEST_URI", ""),
    ("SCRIPT_NAME", ""),
    ("HTTP_HOST", "localhost"),
    ("SERVER_NAME", ""),
    ("HTTPS", ""),
];

/// Module, controller and action names used when the router sets none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteDefaults {
    pub module: String,
    pub controller: String,
    pub action: String,
}

impl Default for RouteDefaults {
    fn default() -> Self {
        Self {
            module: "default".into(),
            controller: "index".into(),
            action: "index".into(),
        }
    }
}

/// An HTTP request being dispatched.
#[derive(Debug, Clone)]
pub struct Request {
    params: Params,
    post_names: HashSet<String>,
    get_names: HashSet<String>,
    server: HashMap<String, String>,
    cookies: HashMap<String, String>,
    headers: Option<http::HeaderMap>,
    module_name: String,
    controller_name: String,
    action_name: String,
    dispatched: bool,
    base_path: OnceCell<String>,
    base_url: OnceCell<String>,
    host: OnceCell<String>,
    scheme: OnceCell<String>,
}

impl Default for Request {
    fn default() -> Self {
        Request::builder().build()
    }
}

impl Request {
    /// Creates a request from raw inputs with the stock route defaults.
    pub fn new(
        post: Params,
        get: Params,
        server: HashMap<String, String>,
        cookies: HashMap<String, String>,
    ) -> Self {
        Self::with_defaults(post, get, server, cookies, &RouteDefaults::default())
    }

    /// Creates a request from raw inputs with explicit route defaults.
    pub fn with_defaults(
        post: Params,
        get: Params,
        server: HashMap<String, String>,
        cookies: HashMap<String, String>,
        defaults: &RouteDefaults,
    ) -> Self {
        let post_names = post.keys().cloned().collect();
        let get_names = get.keys().cloned().collect();

        let mut params = get;
        params.extend(post);

        let mut merged_server: HashMap<String, String> = SERVER_DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        merged_server.extend(server);

        Self {
            params,
            post_names,
            get_names,
            server: merged_server,
            cookies,
            headers: None,
            module_name: defaults.module.clone(),
            controller_name: defaults.controller.clone(),
            action_name: defaults.action.clone(),
            dispatched: false,
            base_path: OnceCell::new(),
            base_url: OnceCell::new(),
            host: OnceCell::new(),
            scheme: OnceCell::new(),
        }
    }

    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Builds a request from the head of an `http` request.
    ///
    /// `REQUEST_URI`, `REQUEST_METHOD`, `HTTP_HOST` and `HTTPS` are taken from
    /// the request line and headers; the header map becomes the fallback
    /// header source. Parameters are left to the caller.
    pub fn from_http(parts: &http::request::Parts, defaults: &RouteDefaults) -> Self {
        let mut server = HashMap::new();
        let uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        server.insert("REQUEST_URI".to_string(), uri);
        server.insert("REQUEST_METHOD".to_string(), parts.method.as_str().to_string());

        let host = parts
            .headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()));
        if let Some(host) = host {
            server.insert("HTTP_HOST".to_string(), host);
        }
        if parts.uri.scheme() == Some(&http::uri::Scheme::HTTPS) {
            server.insert("HTTPS".to_string(), "on".to_string());
        }

        let cookies = parts
            .headers
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect();

        let mut request =
            Self::with_defaults(Params::new(), Params::new(), server, cookies, defaults);
        request.headers = Some(parts.headers.clone());
        request
    }

    // --- parameters ---

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Returns a parameter with surrounding whitespace trimmed.
    ///
    /// Arrays and objects pass through untouched. Missing, null and empty
    /// string values yield `None`.
    pub fn param(&self, name: &str) -> Option<Value> {
        match self.params.get(name)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(Value::String(s.trim().to_string())),
            other => Some(other.clone()),
        }
    }

    /// Like [`param`](Self::param), falling back to `default`.
    pub fn param_or(&self, name: &str, default: impl Into<Value>) -> Value {
        self.param(name).unwrap_or_else(|| default.into())
    }

    /// Trimmed string parameter, if it is a non-empty string.
    pub fn param_str(&self, name: &str) -> Option<String> {
        match self.param(name)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a parameter exactly as stored; null counts as missing.
    pub fn raw_param(&self, name: &str) -> Option<&Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Replaces all parameters. Provenance tags are left as they are.
    pub fn set_params(&mut self, params: Params) -> &mut Self {
        self.params = params;
        self
    }

    /// Merges parameters in; given values overwrite existing ones.
    pub fn merge_params(&mut self, params: Params) -> &mut Self {
        self.params.extend(params);
        self
    }

    /// Sets a parameter and tags it as POST, dropping any GET tag.
    pub fn set_post_param(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        self.get_names.remove(&name);
        self.params.insert(name.clone(), value.into());
        self.post_names.insert(name);
        self
    }

    /// Sets a parameter and tags it as GET, unless it is already a POST
    /// parameter, in which case nothing changes.
    pub fn set_get_param(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        if !self.is_post(&name) {
            self.params.insert(name.clone(), value.into());
            self.get_names.insert(name);
        }
        self
    }

    pub fn is_post(&self, name: &str) -> bool {
        self.post_names.contains(name)
    }

    pub fn is_get(&self, name: &str) -> bool {
        self.get_names.contains(name)
    }

    // --- route ---

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn set_module_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.module_name = name.into();
        self
    }

    pub fn controller_name(&self) -> &str {
        &self.controller_name
    }

    pub fn set_controller_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.controller_name = name.into();
        self
    }

    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    pub fn set_action_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.action_name = name.into();
        self
    }

    // --- server environment ---

    pub fn request_uri(&self) -> &str {
        self.server("REQUEST_URI").unwrap_or_default()
    }

    /// Changes the request URI. Cached base URL is recomputed on next access.
    pub fn set_request_uri(&mut self, uri: impl Into<String>) -> &mut Self {
        self.server.insert("REQUEST_URI".into(), uri.into());
        self.base_url = OnceCell::new();
        self
    }

    pub fn method(&self) -> Option<&str> {
        self.server("REQUEST_METHOD")
    }

    pub fn server(&self, name: &str) -> Option<&str> {
        self.server.get(name).map(String::as_str)
    }

    pub fn server_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.server(name).unwrap_or(default)
    }

    pub fn server_vars(&self) -> &HashMap<String, String> {
        &self.server
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn cookie_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.cookie(name).unwrap_or(default)
    }

    /// Looks up a header, first as `HTTP_<NAME>` in the server environment,
    /// then in the attached header map.
    pub fn header(&self, name: &str) -> Option<&str> {
        let key = format!("HTTP_{}", name.replace('-', "_").to_uppercase());
        if let Some(value) = self.server(&key).filter(|v| !v.is_empty()) {
            return Some(value);
        }
        let lookup = name.replace('_', "-");
        self.headers
            .as_ref()?
            .get(lookup.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    }

    pub fn set_headers(&mut self, headers: http::HeaderMap) -> &mut Self {
        self.headers = Some(headers);
        self
    }

    pub fn is_xml_http_request(&self) -> bool {
        self.header("X-Requested-With") == Some("XMLHttpRequest")
    }

    // --- derived URL facets ---

    /// Directory portion of `SCRIPT_NAME`, with `\` normalised to `/`.
    pub fn base_path(&self) -> &str {
        self.base_path
            .get_or_init(|| dirname(self.server_or("SCRIPT_NAME", "")))
    }

    pub fn set_base_path(&mut self, base_path: impl Into<String>) -> &mut Self {
        self.base_path = OnceCell::from(base_path.into());
        self.base_url = OnceCell::new();
        self
    }

    /// URL prefix the application is mounted under, always ending in `/`
    /// when derived from the request URI.
    pub fn base_url(&self) -> &str {
        self.base_url
            .get_or_init(|| derive_base_url(self.base_path(), self.request_uri()))
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        self.base_url = OnceCell::from(base_url.into());
        self
    }

    /// `HTTP_HOST`, or `SERVER_NAME` when the host header is empty.
    pub fn host(&self) -> &str {
        self.host.get_or_init(|| {
            match self.server("HTTP_HOST").filter(|h| !h.is_empty()) {
                Some(host) => host.to_string(),
                None => self.server_or("SERVER_NAME", "").to_string(),
            }
        })
    }

    pub fn set_host(&mut self, host: impl Into<String>) -> &mut Self {
        self.host = OnceCell::from(host.into());
        self
    }

    /// `https` when `HTTPS` is exactly `on`, otherwise `http`.
    pub fn scheme(&self) -> &str {
        self.scheme.get_or_init(|| {
            if self.server("HTTPS") == Some("on") {
                "https".to_string()
            } else {
                "http".to_string()
            }
        })
    }

    pub fn set_scheme(&mut self, scheme: impl Into<String>) -> &mut Self {
        self.scheme = OnceCell::from(scheme.into());
        self
    }

    /// Query component of the request URI, or `""`.
    pub fn query(&self) -> &str {
        split_uri(self.request_uri()).1.unwrap_or_default()
    }

    /// Fragment component of the request URI, or `""`.
    pub fn fragment(&self) -> &str {
        split_uri(self.request_uri()).2.unwrap_or_default()
    }

    /// Path component of the request URI.
    pub fn path(&self) -> &str {
        split_uri(self.request_uri()).0
    }

    // --- dispatch state ---

    pub fn set_dispatched(&mut self, dispatched: bool) -> &mut Self {
        self.dispatched = dispatched;
        self
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }
}

/// Splits a URI into path, query and fragment.
///
/// The first `#` starts the fragment; the query is whatever follows the first
/// `?` before it. Later delimiters are literal.
fn split_uri(uri: &str) -> (&str, Option<&str>, Option<&str>) {
    let (before_fragment, fragment) = match uri.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (uri, None),
    };
    match before_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query), fragment),
        None => (before_fragment, None, fragment),
    }
}

/// Parent directory of a `/`-separated path, `\` normalised first.
///
/// `""` stays empty, a top-level entry yields `/`, a bare name yields `.`.
fn dirname(path: &str) -> String {
    let path = path.replace('\\', "/");
    if path.is_empty() {
        return String::new();
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    match trimmed.rfind('/') {
        None => ".".to_string(),
        Some(idx) => {
            let parent = trimmed[..idx].trim_end_matches('/');
            if parent.is_empty() {
                "/".to_string()
            } else {
                parent.to_string()
            }
        }
    }
}

fn derive_base_url(base_path: &str, uri: &str) -> String {
    if !base_path.is_empty() && uri.starts_with(base_path) {
        let mut end = base_path.len();
        if base_path != "/" {
            end += uri[end..].chars().next().map_or(0, char::len_utf8);
        }
        return uri[..end].to_string();
    }

    let mut url = uri;
    if let Some(pos) = uri.find('?').filter(|pos| *pos > 0) {
        url = &uri[..pos];
    }
    if url.ends_with('/') {
        url.to_string()
    } else {
        let parent = dirname(url);
        if parent.ends_with('/') {
            parent
        } else {
            format!("{parent}/")
        }
    }
}

/// Builder for [`Request`].
#[derive(Debug, Default)]
pub struct RequestBuilder {
    post: Params,
    get: Params,
    server: HashMap<String, String>,
    cookies: HashMap<String, String>,
    headers: Option<http::HeaderMap>,
    defaults: RouteDefaults,
}

impl RequestBuilder {
    pub fn post_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.post.insert(name.into(), value.into());
        self
    }

    pub fn get_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.get.insert(name.into(), value.into());
        self
    }

    pub fn post(mut self, params: Params) -> Self {
        self.post.extend(params);
        self
    }

    pub fn get(mut self, params: Params) -> Self {
        self.get.extend(params);
        self
    }

    pub fn server_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.server.insert(name.into(), value.into());
        self
    }

    pub fn uri(self, uri: impl Into<String>) -> Self {
        self.server_var("REQUEST_URI", uri)
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: http::HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn defaults(mut self, defaults: RouteDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn build(self) -> Request {
        let mut request =
            Request::with_defaults(self.post, self.get, self.server, self.cookies, &self.defaults);
        request.headers = self.headers;
        request
    }
}

/// Creates requests sharing one set of [`RouteDefaults`].
#[derive(Debug, Clone, Default)]
pub struct RequestFactory {
    defaults: RouteDefaults,
}

impl RequestFactory {
    pub fn new(defaults: RouteDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &RouteDefaults {
        &self.defaults
    }

    pub fn builder(&self) -> RequestBuilder {
        Request::builder().defaults(self.defaults.clone())
    }

    pub fn create(
        &self,
        post: Params,
        get: Params,
        server: HashMap<String, String>,
        cookies: HashMap<String, String>,
    ) -> Request {
        Request::with_defaults(post, get, server, cookies, &self.defaults)
    }

    pub fn from_http(&self, parts: &http::request::Parts) -> Request {
        Request::from_http(parts, &self.defaults)
    }
}
