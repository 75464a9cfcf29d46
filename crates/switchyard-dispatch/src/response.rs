//! Response value returned by controller actions.

use http::StatusCode;

/// An HTTP response: status, ordered headers and a text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: String,
}

impl Default for Response {
    fn default() -> Self {
        Self::empty()
    }
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// `200 OK` with no body.
    pub fn empty() -> Self {
        Self::new(StatusCode::OK, String::new())
    }

    /// `200 OK` with an HTML body.
    pub fn html(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body).with_header("Content-Type", "text/html; charset=utf-8")
    }

    /// `200 OK` with a plain text body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body).with_header("Content-Type", "text/plain; charset=utf-8")
    }

    /// `302 Found` pointing at `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(StatusCode::FOUND, String::new()).with_header("Location", location)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing any existing values of that name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Appends a header value without touching existing ones.
    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<String>) -> &mut Self {
        self.body = body.into();
        self
    }

    pub fn into_body(self) -> String {
        self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Converts into an `http::Response`.
    ///
    /// Fails if a header name or value is not valid HTTP.
    pub fn into_http(self) -> Result<http::Response<String>, http::Error> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_empty_ok() {
        let response = Response::default();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
        assert!(response.headers().is_empty());
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut response = Response::html("<p>hi</p>");
        response.set_header("content-type", "application/json");
        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_append_header_keeps_existing() {
        let mut response = Response::empty();
        response
            .append_header("Set-Cookie", "a=1")
            .append_header("Set-Cookie", "b=2");
        assert_eq!(response.headers().len(), 2);
        assert_eq!(response.header("set-cookie"), Some("a=1"));
    }

    #[test]
    fn test_redirect() {
        let response = Response::redirect("/blog");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header("Location"), Some("/blog"));
        assert!(!response.is_success());
    }

    #[test]
    fn test_into_http() {
        let http = Response::text("done")
            .with_status(StatusCode::CREATED)
            .into_http()
            .unwrap();
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers()["content-type"], "text/plain; charset=utf-8");
        assert_eq!(http.body(), "done");
    }

    #[test]
    fn test_into_http_rejects_invalid_header() {
        let response = Response::empty().with_header("bad header", "x");
        assert!(response.into_http().is_err());
    }
}
