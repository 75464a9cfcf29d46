//! # Switchyard Render - view templates for the dispatch core
//!
//! `switchyard-render` renders the view side of an action: a template name is
//! resolved to a file under the renderer's template path, evaluated with
//! MiniJinja against the renderer's variables, and can call named view
//! helpers supplied by a [`PluginBroker`].
//!
//! ## Core Concepts
//!
//! - [`Renderer`]: template path, variable scope, rendering
//! - [`PluginBroker`]: lazily instantiated, case-insensitive helper registry
//! - [`ViewHelper`]: what a helper implements (closures qualify)
//! - [`VarLookup`]: declared / null / undeclared variable lookup
//! - [`UndefinedPolicy`]: lenient (diagnostic) or strict (error) handling of
//!   undeclared variables
//!
//! ## Template Functions
//!
//! | Call | Result |
//! |------|--------|
//! | `{{ name }}` | variable, HTML-escaped |
//! | `{{ raw("name") }}` | variable, unescaped |
//! | `{{ escape("name") }}` | variable, HTML-escaped |
//! | `{{ myhelper(1, 2) }}` | helper registered as `myhelper` |
//! | `{{ plugin("myhelper", 1, 2) }}` | same, name resolved at call time |
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use minijinja::Value;
//! use switchyard_render::{PluginBroker, Renderer};
//!
//! let broker = PluginBroker::new().register_instance("year", |_: &[Value]| {
//!     Ok::<_, minijinja::Error>(Value::from(2024))
//! });
//!
//! let mut renderer = Renderer::new();
//! renderer.set_template_path("views/default/index");
//! renderer.set_plugin_broker(Arc::new(broker));
//! let html = renderer.render("footer", None)?;
//! # Ok::<(), switchyard_render::RenderError>(())
//! ```

mod engine;
mod error;
pub mod plugin;
pub mod renderer;
pub mod scope;

pub use engine::escape_html;
pub use error::RenderError;
pub use plugin::{PluginBroker, PluginError, PluginFactory, ViewHelper};
pub use renderer::{Renderer, DEFAULT_TEMPLATE_EXTENSION};
pub use scope::{Diagnostic, Diagnostics, UndefinedPolicy, VarLookup, Vars};

// Helpers build and return MiniJinja values.
pub use minijinja::Value;
