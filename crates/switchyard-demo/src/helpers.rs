use switchyard::{escape_html, Value, ViewHelper};

/// `url(module, controller, action, key, value, ...)` builds a segment URL
/// under `base`. Segments are HTML-escaped; the joined URL is marked safe.
pub struct UrlHelper {
    base: String,
}

impl UrlHelper {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ViewHelper for UrlHelper {
    fn invoke(&self, args: &[Value]) -> Result<Value, minijinja::Error> {
        let mut url = self.base.clone();
        for arg in args {
            url.push('/');
            url.push_str(&escape_html(&arg.to_string()));
        }
        if url.is_empty() {
            url.push('/');
        }
        Ok(Value::from_safe_string(url))
    }
}
