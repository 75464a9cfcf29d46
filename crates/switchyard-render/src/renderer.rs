//! View renderer.
//!
//! This module provides [`Renderer`], which resolves a template name to a file
//! under a configured directory and renders it with the renderer's variables.
//!
//! # Template Resolution
//!
//! A template name maps to exactly one file:
//!
//! ```text
//! <template path>/<name>.<extension>
//! ```
//!
//! The extension is fixed per renderer (`jinja` unless configured otherwise).
//! Names may contain `/` to address subdirectories. A missing file is a
//! [`RenderError::TemplateNotFound`].
//!
//! # Variables
//!
//! Variables passed to [`Renderer::render`] are merged into the renderer's
//! scope and stay there for later renders. Inside templates `{{ name }}` is
//! HTML-escaped; use `raw("name")` for the unescaped value.
//!
//! ```rust,no_run
//! use switchyard_render::{Renderer, Vars};
//! use serde_json::json;
//!
//! let mut renderer = Renderer::new();
//! renderer.set_template_path("views/index");
//!
//! let mut vars = Vars::new();
//! vars.insert("name".into(), json!("World"));
//! let html = renderer.render("show", Some(vars))?;
//! # Ok::<(), switchyard_render::RenderError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::engine::{escape_html, ViewEngine};
use crate::error::RenderError;
use crate::plugin::{PluginBroker, ViewHelper};
use crate::scope::{Diagnostic, Diagnostics, UndefinedPolicy, VarLookup, Vars};

/// Default template file extension.
pub const DEFAULT_TEMPLATE_EXTENSION: &str = "jinja";

/// Renders file-based view templates.
#[derive(Debug, Clone)]
pub struct Renderer {
    template_path: Option<PathBuf>,
    extension: String,
    vars: Vars,
    plugins: Option<Arc<PluginBroker>>,
    policy: UndefinedPolicy,
    diagnostics: Diagnostics,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    /// Creates a renderer with no template path and the default extension.
    pub fn new() -> Self {
        Self {
            template_path: None,
            extension: DEFAULT_TEMPLATE_EXTENSION.to_string(),
            vars: Vars::new(),
            plugins: None,
            policy: UndefinedPolicy::default(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Sets the template file extension (without the leading dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn set_template_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.template_path = Some(path.into());
        self
    }

    pub fn template_path(&self) -> Option<&Path> {
        self.template_path.as_deref()
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Replaces all variables.
    pub fn set_vars(&mut self, vars: Vars) -> &mut Self {
        self.vars = vars;
        self
    }

    /// Declares a single variable.
    pub fn assign(&mut self, name: impl Into<String>, value: impl Serialize) -> Result<&mut Self, RenderError> {
        self.vars.insert(name.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Merges variables into the scope; later values win.
    pub fn merge_vars(&mut self, vars: Vars) -> &mut Self {
        self.vars.extend(vars);
        self
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    pub fn set_plugin_broker(&mut self, broker: Arc<PluginBroker>) -> &mut Self {
        self.plugins = Some(broker);
        self
    }

    pub fn plugin_broker(&self) -> Option<&Arc<PluginBroker>> {
        self.plugins.as_ref()
    }

    pub fn set_undefined_policy(&mut self, policy: UndefinedPolicy) -> &mut Self {
        self.policy = policy;
        self
    }

    pub fn undefined_policy(&self) -> UndefinedPolicy {
        self.policy
    }

    /// Resolves a helper through the plugin broker.
    pub fn plugin(&self, name: &str) -> Result<Arc<dyn ViewHelper>, RenderError> {
        match &self.plugins {
            Some(broker) => Ok(broker.get(name)?),
            None => Err(crate::PluginError::UnknownPlugin(name.to_string()).into()),
        }
    }

    /// Three-way variable lookup without side effects.
    pub fn lookup(&self, name: &str) -> VarLookup<'_> {
        VarLookup::from_vars(&self.vars, name)
    }

    /// Returns a variable's raw value.
    ///
    /// Null and undeclared variables both yield `None`; an undeclared one also
    /// records a [`Diagnostic`].
    pub fn raw(&self, name: &str) -> Option<&serde_json::Value> {
        let lookup = self.lookup(name);
        if !lookup.is_declared() {
            self.diagnostics.undeclared(name, None);
        }
        lookup.value()
    }

    /// Like [`raw`](Self::raw), but an undeclared variable is an error.
    pub fn try_raw(&self, name: &str) -> Result<Option<&serde_json::Value>, RenderError> {
        match self.lookup(name) {
            VarLookup::Undeclared => Err(RenderError::UndeclaredVariable(name.to_string())),
            found => Ok(found.value()),
        }
    }

    /// Returns a variable HTML-escaped. Non-string values are escaped in
    /// their JSON text form.
    pub fn escape(&self, name: &str) -> Option<String> {
        self.raw(name).map(|value| match value {
            serde_json::Value::String(s) => escape_html(s),
            other => escape_html(&other.to_string()),
        })
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.snapshot()
    }

    /// Drains the recorded diagnostics.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.take()
    }

    /// File path a template name resolves to.
    pub fn template_file(&self, name: &str) -> Result<PathBuf, RenderError> {
        let base = self
            .template_path
            .as_ref()
            .ok_or_else(|| RenderError::TemplatePathNotSet(name.to_string()))?;
        Ok(base.join(format!("{}.{}", name, self.extension)))
    }

    /// Renders a template, first merging `vars` into the scope.
    pub fn render(&mut self, name: &str, vars: Option<Vars>) -> Result<String, RenderError> {
        if let Some(vars) = vars {
            self.merge_vars(vars);
        }

        let path = self.template_file(name)?;
        if !path.is_file() {
            return Err(RenderError::TemplateNotFound {
                name: name.to_string(),
                path,
            });
        }
        log::debug!("rendering template {name} from {}", path.display());
        let source = std::fs::read_to_string(&path)?;

        let mut engine = ViewEngine::new(self.policy, self.diagnostics.clone());
        engine.register_accessors(Arc::new(self.vars.clone()), name);
        if let Some(broker) = &self.plugins {
            engine.register_plugins(broker.clone());
        }
        engine.render(name, source, &self.vars)
    }

    /// Renders a template with a serializable value as its variables.
    ///
    /// The value must serialize to a map.
    pub fn render_with<T: Serialize>(&mut self, name: &str, data: &T) -> Result<String, RenderError> {
        match serde_json::to_value(data)? {
            serde_json::Value::Object(map) => self.render(name, Some(map.into_iter().collect())),
            serde_json::Value::Null => self.render(name, None),
            other => Err(RenderError::Serialization(format!(
                "template data must be a map, got {other}"
            ))),
        }
    }
}
