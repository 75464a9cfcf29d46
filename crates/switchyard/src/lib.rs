//! # Switchyard - MVC dispatch for web applications
//!
//! Switchyard takes an HTTP request to a controller action and back to a
//! response. It provides:
//!
//! - A request model with GET/POST provenance, server environment, cookies and
//!   derived base path/URL, host and scheme
//! - Module/controller/action resolution driven by naming patterns
//! - Typed dispatch events (`route`, `preDispatch`, `postDispatch`,
//!   `dispatchError`, `response`)
//! - View rendering with MiniJinja and a lazily populated view helper broker
//!
//! The pieces live in `switchyard-dispatch` and `switchyard-render`; this
//! crate re-exports them and adds [`App`], which wires a kernel together and
//! maps failures to HTTP status codes.
//!
//! ## Core Concepts
//!
//! - [`App`] / [`AppBuilder`]: registration and the error boundary
//! - [`HttpKernel`]: routing, resolution and dispatch
//! - [`Request`] / [`RequestFactory`]: the request model
//! - [`Controller`] / [`ActionController`]: what actions are attached to
//! - [`EventDispatcher`]: dispatch listeners
//! - [`Renderer`] / [`PluginBroker`]: views and view helpers
//! - [`KernelConfig`]: YAML configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use switchyard::{ActionController, App, Response};
//!
//! let app = App::builder()
//!     .config_file("app.yaml")
//!     .module_controller("blog", "post", || {
//!         ActionController::new()
//!             .action("show", |req, ctx| {
//!                 let id = req.param_str("id").unwrap_or_default();
//!                 ctx.view.assign("id", id)?;
//!                 Ok(Some(ctx.render_action(None)?))
//!             })
//!             .action("index", |_req, _ctx| Ok(Some(Response::text("posts"))))
//!     })?
//!     .build()?;
//!
//! let mut request = app.request_factory().builder().uri("/blog/post/show/id/7").build();
//! println!("{}", app.respond(&mut request).body());
//! # Ok::<(), switchyard::SetupError>(())
//! ```

mod app;
mod setup;

pub use app::{status_for, App, AppBuilder};
pub use setup::SetupError;

pub use switchyard_dispatch::naming;
pub use switchyard_dispatch::{
    ActionController, ActionFn, ActionResult, ConfigError, Controller, ControllerEvent,
    ControllerFactory, ControllerListener, ControllerRegistry, DispatchContext,
    DispatchErrorEvent, DispatchErrorListener, DispatchState, EventDispatcher, EventError,
    EventName, Extensions, HttpKernel, KernelConfig, KernelError, MissingState, Params, Request,
    RequestBuilder, RequestEvent, RequestFactory, Response, ResponseEvent, ResponseListener,
    RouteDefaults, RouteError, RouteListener, RouteMatch, Router, SegmentRouter, StateScope,
    DEFAULT_CONTROLLER_CLASS_PATTERN, DEFAULT_CONTROLLER_DIR_PATTERN,
    DEFAULT_CONTROLLER_FILE_PATTERN, SERVER_DEFAULTS,
};

pub use switchyard_render::{
    escape_html, Diagnostic, Diagnostics, PluginBroker, PluginError, PluginFactory, RenderError,
    Renderer, UndefinedPolicy, Value, VarLookup, Vars, ViewHelper, DEFAULT_TEMPLATE_EXTENSION,
};
