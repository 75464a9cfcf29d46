//! Typed state containers handed to actions.
//!
//! A dispatch sees two [`Extensions`]: the app's, shared by every request
//! behind an `Rc`, and a request-scoped one that starts empty and is dropped
//! with the dispatch. Both are keyed by type, one value per type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Lifetime of the values in an [`Extensions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateScope {
    /// Configured at build time, read-only during dispatch.
    App,
    /// Filled by `preDispatch` listeners or the action itself.
    Request,
}

impl fmt::Display for StateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StateScope::App => "app",
            StateScope::Request => "request",
        })
    }
}

/// A required value was never inserted.
#[derive(Debug, Error)]
#[error("no {type_name} in {scope} state")]
pub struct MissingState {
    pub type_name: &'static str,
    pub scope: StateScope,
}

struct Entry {
    type_name: &'static str,
    value: Box<dyn Any>,
}

/// Values keyed by type.
///
/// ```rust
/// use switchyard_dispatch::DispatchContext;
///
/// struct ApiClient { base_url: String }
///
/// let mut ctx = DispatchContext::default();
/// ctx.extensions.insert(ApiClient { base_url: "https://api.example.com".into() });
///
/// let api = ctx.extensions.require::<ApiClient>()?;
/// assert_eq!(api.base_url, "https://api.example.com");
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct Extensions {
    scope: StateScope,
    entries: HashMap<TypeId, Entry>,
}

impl Default for Extensions {
    fn default() -> Self {
        Self::new()
    }
}

impl Extensions {
    /// An empty request-scoped container.
    pub fn new() -> Self {
        Self::scoped(StateScope::Request)
    }

    /// An empty app-scoped container.
    pub fn app() -> Self {
        Self::scoped(StateScope::App)
    }

    pub fn scoped(scope: StateScope) -> Self {
        Self {
            scope,
            entries: HashMap::new(),
        }
    }

    pub fn scope(&self) -> StateScope {
        self.scope
    }

    /// Inserts a value, returning the previous value of that type.
    pub fn insert<T: 'static>(&mut self, value: T) -> Option<T> {
        let entry = Entry {
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        };
        self.entries
            .insert(TypeId::of::<T>(), entry)
            .and_then(|old| old.value.downcast().ok().map(|b| *b))
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast_ref())
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast_mut())
    }

    /// Like [`get`](Self::get), but a missing value is a [`MissingState`].
    pub fn require<T: 'static>(&self) -> Result<&T, MissingState> {
        let scope = self.scope;
        self.get::<T>().ok_or_else(|| missing::<T>(scope))
    }

    pub fn require_mut<T: 'static>(&mut self) -> Result<&mut T, MissingState> {
        let scope = self.scope;
        self.get_mut::<T>().ok_or_else(|| missing::<T>(scope))
    }

    /// Returns the value of type `T`, inserting `init()` first if absent.
    pub fn get_or_insert_with<T: 'static, F: FnOnce() -> T>(&mut self, init: F) -> &mut T {
        let entry = self.entries.entry(TypeId::of::<T>()).or_insert_with(|| Entry {
            type_name: std::any::type_name::<T>(),
            value: Box::new(init()),
        });
        let type_name = entry.type_name;
        match entry.value.downcast_mut() {
            Some(value) => value,
            None => unreachable!("entry keyed by TypeId of {type_name}"),
        }
    }

    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast().ok().map(|b| *b))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Type names of the stored values, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|e| e.type_name).collect();
        names.sort_unstable();
        names
    }
}

fn missing<T>(scope: StateScope) -> MissingState {
    MissingState {
        type_name: std::any::type_name::<T>(),
        scope,
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("scope", &self.scope)
            .field("types", &self.type_names())
            .finish()
    }
}
