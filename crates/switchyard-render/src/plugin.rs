//! Named view helpers, resolved lazily.
//!
//! A [`PluginBroker`] maps helper names to either a factory or a pre-built
//! instance. Factories run on first lookup and the instance is cached, so each
//! helper is built at most once for the lifetime of the broker.
//!
//! Names are case-insensitive: `"MyViewHelper"` and `"myviewhelper"` address the
//! same entry.
//!
//! ```rust
//! use std::sync::Arc;
//! use minijinja::Value;
//! use switchyard_render::{PluginBroker, ViewHelper};
//!
//! #[derive(Default)]
//! struct Greeting;
//!
//! impl ViewHelper for Greeting {
//!     fn invoke(&self, _args: &[Value]) -> Result<Value, minijinja::Error> {
//!         Ok(Value::from("hello"))
//!     }
//! }
//!
//! let broker = PluginBroker::new().register_type::<Greeting>("greeting");
//! let helper = broker.get("Greeting").unwrap();
//! assert_eq!(helper.invoke(&[]).unwrap().to_string(), "hello");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use minijinja::Value;
use once_cell::sync::OnceCell;
use thiserror::Error;

/// A helper callable from templates.
pub trait ViewHelper: Send + Sync {
    /// Invokes the helper with the arguments passed in the template call.
    fn invoke(&self, args: &[Value]) -> Result<Value, minijinja::Error>;
}

impl<F> ViewHelper for F
where
    F: Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync,
{
    fn invoke(&self, args: &[Value]) -> Result<Value, minijinja::Error> {
        self(args)
    }
}

/// Factory producing a helper instance.
pub type PluginFactory = Arc<dyn Fn() -> Arc<dyn ViewHelper> + Send + Sync>;

/// Errors raised by helper resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PluginError {
    /// No helper is registered under this name.
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),
}

enum PluginEntry {
    Factory {
        create: PluginFactory,
        instance: OnceCell<Arc<dyn ViewHelper>>,
    },
    Instance(Arc<dyn ViewHelper>),
}

impl PluginEntry {
    fn resolve(&self, name: &str) -> Arc<dyn ViewHelper> {
        match self {
            PluginEntry::Instance(helper) => helper.clone(),
            PluginEntry::Factory { create, instance } => instance
                .get_or_init(|| {
                    log::debug!("instantiating view helper {name}");
                    create()
                })
                .clone(),
        }
    }

    fn is_instantiated(&self) -> bool {
        match self {
            PluginEntry::Instance(_) => true,
            PluginEntry::Factory { instance, .. } => instance.get().is_some(),
        }
    }
}

/// Registry of view helpers keyed by lower-cased name.
#[derive(Default)]
pub struct PluginBroker {
    entries: BTreeMap<String, PluginEntry>,
}

impl PluginBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a helper type that is built with `Default` on first use.
    pub fn register_type<T>(self, name: &str) -> Self
    where
        T: ViewHelper + Default + 'static,
    {
        self.register_factory(name, || Arc::new(T::default()) as Arc<dyn ViewHelper>)
    }

    /// Registers a factory that is invoked on first use.
    pub fn register_factory<F>(mut self, name: &str, create: F) -> Self
    where
        F: Fn() -> Arc<dyn ViewHelper> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.to_lowercase(),
            PluginEntry::Factory {
                create: Arc::new(create),
                instance: OnceCell::new(),
            },
        );
        self
    }

    /// Registers an already built helper.
    pub fn register_instance<H>(mut self, name: &str, helper: H) -> Self
    where
        H: ViewHelper + 'static,
    {
        self.entries
            .insert(name.to_lowercase(), PluginEntry::Instance(Arc::new(helper)));
        self
    }

    /// Looks up a helper by name, instantiating it if needed.
    pub fn get(&self, name: &str) -> Result<Arc<dyn ViewHelper>, PluginError> {
        let key = name.to_lowercase();
        self.entries
            .get(&key)
            .map(|entry| entry.resolve(&key))
            .ok_or_else(|| PluginError::UnknownPlugin(name.to_string()))
    }

    /// Returns true if a helper is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Returns true once the helper behind `name` has been built.
    pub fn is_instantiated(&self, name: &str) -> bool {
        self.entries
            .get(&name.to_lowercase())
            .is_some_and(PluginEntry::is_instantiated)
    }

    /// Registered helper names, lower-cased and sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, PluginFactory)> for PluginBroker {
    fn from_iter<I: IntoIterator<Item = (String, PluginFactory)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(name, create)| {
                (
                    name.to_lowercase(),
                    PluginEntry::Factory {
                        create,
                        instance: OnceCell::new(),
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

impl fmt::Debug for PluginBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginBroker")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MyViewHelper;

    impl ViewHelper for MyViewHelper {
        fn invoke(&self, _args: &[Value]) -> Result<Value, minijinja::Error> {
            Ok(Value::from("MyViewHelper has been invoked!"))
        }
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let broker = PluginBroker::new().register_type::<MyViewHelper>("MyViewHelper");
        assert!(broker.get("myviewhelper").is_ok());
        assert!(broker.get("MYVIEWHELPER").is_ok());
        assert_eq!(broker.names().collect::<Vec<_>>(), vec!["myviewhelper"]);
    }

    #[test]
    fn test_unknown_plugin() {
        let broker = PluginBroker::new();
        let err = broker.get("nope").err().unwrap();
        assert_eq!(err, PluginError::UnknownPlugin("nope".into()));
        assert_eq!(err.to_string(), "unknown plugin: nope");
    }

    #[test]
    fn test_factory_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let broker = PluginBroker::new().register_factory("counted", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(MyViewHelper) as Arc<dyn ViewHelper>
        });

        assert!(!broker.is_instantiated("counted"));
        let first = broker.get("counted").unwrap();
        let second = broker.get("Counted").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(broker.is_instantiated("counted"));
    }

    #[test]
    fn test_closure_instance() {
        let broker = PluginBroker::new().register_instance("upper", |args: &[Value]| {
            let text = args.first().map(|v| v.to_string()).unwrap_or_default();
            Ok::<_, minijinja::Error>(Value::from(text.to_uppercase()))
        });

        let helper = broker.get("upper").unwrap();
        let out = helper.invoke(&[Value::from("abc")]).unwrap();
        assert_eq!(out.to_string(), "ABC");
        assert!(broker.is_instantiated("upper"));
    }

    #[test]
    fn test_from_iterator() {
        let factory: PluginFactory = Arc::new(|| Arc::new(MyViewHelper) as Arc<dyn ViewHelper>);
        let broker: PluginBroker = vec![("Helper".to_string(), factory)].into_iter().collect();
        assert!(broker.contains("helper"));
        assert_eq!(broker.len(), 1);
    }
}
