//! Error types for view rendering.
//!
//! [`RenderError`] is the error type of every fallible renderer operation. It
//! abstracts over the underlying template engine's errors so callers can match
//! on the distinct resolution failures (missing template, unknown helper,
//! undeclared variable under the strict policy) without depending on MiniJinja.

use std::path::PathBuf;

use thiserror::Error;

use crate::plugin::PluginError;

/// Error type for rendering operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No template file exists for the requested name.
    #[error("template not found: {name} (looked for {})", path.display())]
    TemplateNotFound {
        /// The template name as passed to `render`
        name: String,
        /// The file path that was looked up
        path: PathBuf,
    },

    /// No template path has been configured on the renderer.
    #[error("template path not set, cannot render {0}")]
    TemplatePathNotSet(String),

    /// A variable was accessed that was never declared (strict policy only).
    #[error("undeclared template variable: {0}")]
    UndeclaredVariable(String),

    /// A helper lookup failed.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Template syntax error or evaluation failure.
    #[error("template error: {0}")]
    Template(String),

    /// Data serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error while reading a template file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::Serialization(err.to_string())
    }
}

/// Marker attached as the source of a MiniJinja error raised for an
/// undeclared variable, so the conversion below can recover the name.
#[derive(Debug, Error)]
#[error("undeclared template variable: {0}")]
pub(crate) struct UndeclaredVariable(pub(crate) String);

// Helper and variable failures raised inside template functions travel as the
// source of a minijinja::Error; recover them here.
impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;
        use std::error::Error as _;

        let mut source = err.source();
        while let Some(cause) = source {
            if let Some(plugin) = cause.downcast_ref::<PluginError>() {
                return RenderError::Plugin(plugin.clone());
            }
            if let Some(UndeclaredVariable(name)) = cause.downcast_ref::<UndeclaredVariable>() {
                return RenderError::UndeclaredVariable(name.clone());
            }
            source = cause.source();
        }

        match err.kind() {
            ErrorKind::BadSerialization => RenderError::Serialization(err.to_string()),
            _ => RenderError::Template(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenderError::TemplateNotFound {
            name: "foo".to_string(),
            path: PathBuf::from("/views/foo.jinja"),
        };
        assert!(err.to_string().contains("template not found"));
        assert!(err.to_string().contains("/views/foo.jinja"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let render_err: RenderError = io_err.into();
        assert!(matches!(render_err, RenderError::Io(_)));
    }

    #[test]
    fn test_plugin_error_recovered_from_minijinja_source() {
        let mj_err = minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, "helper failed")
            .with_source(PluginError::UnknownPlugin("missing".into()));
        let render_err: RenderError = mj_err.into();
        assert!(matches!(
            render_err,
            RenderError::Plugin(PluginError::UnknownPlugin(ref name)) if name == "missing"
        ));
    }

    #[test]
    fn test_undeclared_variable_recovered_from_minijinja_source() {
        let mj_err = minijinja::Error::new(minijinja::ErrorKind::UndefinedError, "undefined")
            .with_source(UndeclaredVariable("title".into()));
        let render_err: RenderError = mj_err.into();
        assert!(matches!(render_err, RenderError::UndeclaredVariable(ref n) if n == "title"));
    }

    #[test]
    fn test_syntax_error_maps_to_template() {
        let mj_err = minijinja::Error::new(minijinja::ErrorKind::SyntaxError, "unexpected end");
        let render_err: RenderError = mj_err.into();
        assert!(matches!(render_err, RenderError::Template(_)));
    }
}
