//! Controller types.
//!
//! This module provides the types a controller works with: the [`Controller`]
//! trait the kernel executes, the [`DispatchContext`] handed to every action,
//! and the [`ControllerRegistry`] that maps class names to factories.
//!
//! # State Management: App State vs Extensions
//!
//! [`DispatchContext`] provides two mechanisms for state injection:
//!
//! | Field | Mutability | Lifetime | Purpose |
//! |-------|------------|----------|---------|
//! | `app_state` | Immutable (`&`) | App lifetime (shared via Rc) | Database, Config, API clients |
//! | `extensions` | Mutable (`&mut`) | Request lifetime | Per-request state, user scope |
//!
//! **App State** is configured once on the kernel and shared by every dispatch.
//! **Extensions** start empty per request; `preDispatch` listeners fill them
//! and the action reads them back:
//!
//! ```rust
//! use switchyard_dispatch::EventDispatcher;
//!
//! struct UserScope { user_id: String }
//! #[derive(Default)]
//! struct Timings(Vec<&'static str>);
//!
//! let events = EventDispatcher::new().on_pre_dispatch(|_event, request, ctx| {
//!     let user_id = request.param_str("user").unwrap_or_default();
//!     ctx.extensions.insert(UserScope { user_id });
//!     ctx.extensions.get_or_insert_with(Timings::default).0.push("pre");
//!     Ok(())
//! });
//! ```
//!
//! # Class Names
//!
//! Controllers are not discovered by reflection. Each class name the naming
//! pattern can produce must be registered with a factory:
//!
//! ```rust
//! use switchyard_dispatch::{ActionController, ControllerRegistry, Response};
//!
//! let registry = ControllerRegistry::new().register_factory(r"Blog\PostController", || {
//!     Ok(Box::new(ActionController::new().action("show", |_req, _ctx| {
//!         Ok(Some(Response::text("post")))
//!     })))
//! });
//! assert!(registry.contains(r"\Blog\PostController"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use switchyard_render::{RenderError, Renderer, Vars};

use crate::naming::{action_key, qualify};
use crate::request::Request;
use crate::response::Response;
use crate::state::Extensions;

/// Context passed to controller actions.
///
/// Carries the resolved route, the view renderer prepared for this
/// controller, and the two state containers.
#[derive(Debug)]
pub struct DispatchContext {
    /// Module name as routed.
    pub module: String,
    /// Controller name as routed.
    pub controller: String,
    /// Action name as routed.
    pub action: String,
    /// Fully qualified controller class name.
    pub class_name: String,
    /// Immutable app-level state shared across all dispatches.
    pub app_state: Rc<Extensions>,
    /// Mutable per-request state. Each dispatch gets a fresh instance.
    pub extensions: Extensions,
    /// Renderer with the template path of the dispatched controller.
    pub view: Renderer,
}

impl DispatchContext {
    pub fn new(app_state: Rc<Extensions>) -> Self {
        Self {
            module: String::new(),
            controller: String::new(),
            action: String::new(),
            class_name: String::new(),
            app_state,
            extensions: Extensions::new(),
            view: Renderer::new(),
        }
    }

    /// Renders a view template into a `200` HTML response.
    pub fn render(&mut self, template: &str, vars: Option<Vars>) -> Result<Response, RenderError> {
        self.view.render(template, vars).map(Response::html)
    }

    /// Renders the template named after the current action.
    pub fn render_action(&mut self, vars: Option<Vars>) -> Result<Response, RenderError> {
        let template = self.action.clone();
        self.render(&template, vars)
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new(Rc::new(Extensions::app()))
    }
}

/// Result of executing an action.
///
/// `Ok(None)` means the action produced no response of its own.
pub type ActionResult = Result<Option<Response>, anyhow::Error>;

/// Trait for controllers.
///
/// A controller instance lives for one dispatch. Actions take `&mut self`.
///
/// # Example
///
/// ```rust
/// use switchyard_dispatch::{ActionResult, Controller, DispatchContext, Request, Response};
///
/// #[derive(Default)]
/// struct IndexController { hits: u32 }
///
/// impl Controller for IndexController {
///     fn execute(&mut self, action: &str, _req: &mut Request, _ctx: &mut DispatchContext) -> ActionResult {
///         self.hits += 1;
///         Ok(Some(Response::text(format!("{action} #{}", self.hits))))
///     }
/// }
/// ```
pub trait Controller {
    /// Runs `action`. The kernel only calls this for actions
    /// [`has_action`](Self::has_action) accepts.
    fn execute(
        &mut self,
        action: &str,
        request: &mut Request,
        ctx: &mut DispatchContext,
    ) -> ActionResult;

    /// Whether this controller implements `action`.
    fn has_action(&self, action: &str) -> bool {
        let _ = action;
        true
    }

    /// Concrete type name, for logging.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Closure type for an [`ActionController`] action.
pub type ActionFn = Box<dyn FnMut(&mut Request, &mut DispatchContext) -> ActionResult>;

/// A controller assembled from named action closures.
///
/// Action names are matched with case and `-`/`_` ignored, so `show-all`,
/// `show_all` and `showAll` address the same action.
#[derive(Default)]
pub struct ActionController {
    actions: BTreeMap<String, ActionFn>,
}

impl ActionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an action, replacing any action with the same normalised name.
    pub fn action<F>(mut self, name: &str, f: F) -> Self
    where
        F: FnMut(&mut Request, &mut DispatchContext) -> ActionResult + 'static,
    {
        self.actions.insert(action_key(name), Box::new(f));
        self
    }

    /// Normalised action names.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

impl Controller for ActionController {
    fn execute(
        &mut self,
        action: &str,
        request: &mut Request,
        ctx: &mut DispatchContext,
    ) -> ActionResult {
        match self.actions.get_mut(&action_key(action)) {
            Some(f) => f(request, ctx),
            None => Err(anyhow::anyhow!("action '{action}' is not defined")),
        }
    }

    fn has_action(&self, action: &str) -> bool {
        self.actions.contains_key(&action_key(action))
    }
}

impl fmt::Debug for ActionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionController")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Factory producing a fresh controller instance.
pub type ControllerFactory = Rc<dyn Fn() -> Result<Box<dyn Controller>, anyhow::Error>>;

/// Maps fully qualified class names to controller factories.
///
/// Names are qualified on registration and lookup, so `Blog\PostController`
/// and `\Blog\PostController` are the same key. Matching is otherwise exact.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    factories: HashMap<String, ControllerFactory>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a controller type built with `Default`.
    pub fn register<C>(self, class_name: &str) -> Self
    where
        C: Controller + Default + 'static,
    {
        self.register_factory(class_name, || Ok(Box::new(C::default())))
    }

    /// Registers a factory. A factory error makes the class not instantiable.
    pub fn register_factory<F>(mut self, class_name: &str, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Controller>, anyhow::Error> + 'static,
    {
        self.insert(class_name, factory);
        self
    }

    /// In-place form of [`register_factory`](Self::register_factory).
    pub fn insert<F>(&mut self, class_name: &str, factory: F)
    where
        F: Fn() -> Result<Box<dyn Controller>, anyhow::Error> + 'static,
    {
        self.factories.insert(qualify(class_name), Rc::new(factory));
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.factories.contains_key(&qualify(class_name))
    }

    /// Builds a controller. `None` if the class is not registered.
    pub fn instantiate(
        &self,
        class_name: &str,
    ) -> Option<Result<Box<dyn Controller>, anyhow::Error>> {
        let factory = self.factories.get(&qualify(class_name))?;
        log::debug!("instantiating controller {class_name}");
        Some(factory())
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ControllerRegistry")
            .field("classes", &names)
            .finish()
    }
}
