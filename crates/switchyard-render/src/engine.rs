//! MiniJinja environment setup for view templates.
//!
//! [`ViewEngine`] wraps a MiniJinja [`Environment`] configured for HTML views:
//!
//! - Auto-escaping is always HTML, so `{{ name }}` is escaped.
//! - `raw("name")` returns a variable unescaped, `escape("name")` escaped.
//! - `plugin("name", ...)` and every registered helper name call into the
//!   [`PluginBroker`].
//!
//! Variables a template references but that were never declared are reported
//! before evaluation: recorded as a diagnostic under the lenient policy,
//! rejected under the strict one.

use std::collections::HashSet;
use std::sync::Arc;

use minijinja::value::Rest;
use minijinja::{
    escape_formatter, AutoEscape, Environment, Error, ErrorKind, HtmlEscape, UndefinedBehavior,
    Value,
};

use crate::error::{RenderError, UndeclaredVariable};
use crate::plugin::{PluginBroker, PluginError};
use crate::scope::{Diagnostics, UndefinedPolicy, VarLookup, Vars};

/// Escapes `&`, `<`, `>`, `"`, `'` and `/` for HTML output.
pub fn escape_html(text: &str) -> String {
    HtmlEscape(text).to_string()
}

/// Converts a variable to a template value, marking strings as already safe.
fn unescaped(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::String(s) => Value::from_safe_string(s.clone()),
        other => Value::from_serialize(other),
    }
}

fn display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn plugin_error(err: PluginError) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string()).with_source(err)
}

/// Per-render template environment.
pub struct ViewEngine {
    env: Environment<'static>,
    policy: UndefinedPolicy,
    diagnostics: Diagnostics,
}

impl ViewEngine {
    pub fn new(policy: UndefinedPolicy, diagnostics: Diagnostics) -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        // Null variables are declared, they print as nothing rather than `none`.
        env.set_formatter(|out, state, value| {
            if value.is_none() {
                Ok(())
            } else {
                escape_formatter(out, state, value)
            }
        });
        env.set_undefined_behavior(match policy {
            UndefinedPolicy::Lenient => UndefinedBehavior::Lenient,
            UndefinedPolicy::Strict => UndefinedBehavior::Strict,
        });
        Self {
            env,
            policy,
            diagnostics,
        }
    }

    /// Registers `raw` and `escape` over a snapshot of the variables.
    pub fn register_accessors(&mut self, vars: Arc<Vars>, template: &str) {
        let policy = self.policy;

        let raw_vars = vars.clone();
        let raw_diagnostics = self.diagnostics.clone();
        let raw_template = template.to_string();
        self.env.add_function("raw", move |name: String| -> Result<Value, Error> {
            match VarLookup::from_vars(&raw_vars, &name) {
                VarLookup::Value(v) => Ok(unescaped(v)),
                VarLookup::Null => Ok(Value::from(())),
                VarLookup::Undeclared => undeclared(
                    policy,
                    &raw_diagnostics,
                    &name,
                    &raw_template,
                ),
            }
        });

        let esc_diagnostics = self.diagnostics.clone();
        let esc_template = template.to_string();
        self.env.add_function("escape", move |name: String| -> Result<Value, Error> {
            match VarLookup::from_vars(&vars, &name) {
                VarLookup::Value(v) => Ok(Value::from_safe_string(escape_html(&display(v)))),
                VarLookup::Null => Ok(Value::from(())),
                VarLookup::Undeclared => undeclared(
                    policy,
                    &esc_diagnostics,
                    &name,
                    &esc_template,
                ),
            }
        });
    }

    /// Exposes the broker's helpers as template functions.
    pub fn register_plugins(&mut self, broker: Arc<PluginBroker>) {
        let names: Vec<String> = broker.names().map(str::to_string).collect();
        for name in names {
            let helpers = broker.clone();
            let key = name.clone();
            self.env
                .add_function(name.clone(), move |args: Rest<Value>| -> Result<Value, Error> {
                    helpers.get(&key).map_err(plugin_error)?.invoke(&args)
                });
        }

        self.env.add_function(
            "plugin",
            move |name: String, args: Rest<Value>| -> Result<Value, Error> {
                broker.get(&name).map_err(plugin_error)?.invoke(&args)
            },
        );
    }

    /// Compiles and renders a template against `vars`.
    pub fn render(&mut self, name: &str, source: String, vars: &Vars) -> Result<String, RenderError> {
        self.env.add_template_owned(name.to_string(), source)?;
        let template = self.env.get_template(name)?;

        // Builtins such as `range`, the accessors and helper names are all globals.
        let globals: HashSet<&str> = self.env.globals().map(|(key, _)| key).collect();
        let mut referenced: Vec<String> = template
            .undeclared_variables(false)
            .into_iter()
            .filter(|var| !vars.contains_key(var) && !globals.contains(var.as_str()))
            .collect();
        referenced.sort();

        if let Some(first) = referenced.first() {
            if self.policy == UndefinedPolicy::Strict {
                return Err(RenderError::UndeclaredVariable(first.clone()));
            }
            for var in &referenced {
                self.diagnostics.undeclared(var, Some(name));
            }
        }

        let context: serde_json::Map<String, serde_json::Value> = vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(template.render(Value::from_serialize(&context))?)
    }
}

fn undeclared(
    policy: UndefinedPolicy,
    diagnostics: &Diagnostics,
    name: &str,
    template: &str,
) -> Result<Value, Error> {
    match policy {
        UndefinedPolicy::Lenient => {
            diagnostics.undeclared(name, Some(template));
            Ok(Value::from(()))
        }
        UndefinedPolicy::Strict => Err(Error::new(
            ErrorKind::UndefinedError,
            format!("undeclared template variable: {name}"),
        )
        .with_source(UndeclaredVariable(name.to_string()))),
    }
}
