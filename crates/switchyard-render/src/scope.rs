//! Template variable scope and diagnostics.
//!
//! A lookup distinguishes three outcomes, so callers can decide between strict
//! and lenient handling themselves:
//!
//! | Outcome | Meaning |
//! |---------|---------|
//! | [`VarLookup::Value`] | declared with a non-null value |
//! | [`VarLookup::Null`] | declared, value is null |
//! | [`VarLookup::Undeclared`] | never declared |
//!
//! Lenient access of an undeclared variable records a [`Diagnostic`] and logs a
//! warning instead of failing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

/// Variables visible to a template.
pub type Vars = BTreeMap<String, Value>;

/// Result of looking up a variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarLookup<'a> {
    Value(&'a Value),
    Null,
    Undeclared,
}

impl<'a> VarLookup<'a> {
    pub fn from_vars(vars: &'a Vars, name: &str) -> Self {
        match vars.get(name) {
            Some(Value::Null) => VarLookup::Null,
            Some(value) => VarLookup::Value(value),
            None => VarLookup::Undeclared,
        }
    }

    /// The value, if declared and non-null.
    pub fn value(self) -> Option<&'a Value> {
        match self {
            VarLookup::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_declared(self) -> bool {
        !matches!(self, VarLookup::Undeclared)
    }
}

/// How undeclared variables are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UndefinedPolicy {
    /// Record a diagnostic and continue with an absent value.
    #[default]
    Lenient,
    /// Fail with [`RenderError::UndeclaredVariable`](crate::RenderError::UndeclaredVariable).
    Strict,
}

/// A non-fatal problem noticed while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The undeclared variable name
    pub variable: String,
    /// Template being rendered, if the access happened inside one
    pub template: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.template {
            Some(t) => write!(f, "undeclared variable `{}` in template {}", self.variable, t),
            None => write!(f, "undeclared variable `{}`", self.variable),
        }
    }
}

/// Shared diagnostic sink. Cloning shares the underlying list.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    inner: Arc<Mutex<Vec<Diagnostic>>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn undeclared(&self, variable: &str, template: Option<&str>) {
        let diagnostic = Diagnostic {
            variable: variable.to_string(),
            template: template.map(str::to_string),
        };
        log::warn!("{diagnostic}");
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
