//! Request model, controller resolution and dispatch for MVC web applications.
//!
//! `switchyard-dispatch` takes an HTTP request from routing to a response:
//!
//! - **Request**: merged GET/POST parameters with provenance, server
//!   environment, cookies, derived base path/URL, host and scheme
//! - **Routing**: the [`Router`] contract plus a default [`SegmentRouter`]
//! - **Controller resolution**: `%Module%`/`%Controller%` patterns for
//!   controller directories and class names, a registry mapping class names
//!   to factories
//! - **Events**: typed listeners for `route`, `preDispatch`, `postDispatch`,
//!   `dispatchError` and `response`
//! - **Kernel**: [`HttpKernel`] ties the above together
//!
//! Views are rendered with `switchyard-render`; every action gets a
//! [`Renderer`](switchyard_render::Renderer) pointed at its controller's view
//! directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use switchyard_dispatch::{
//!     ActionController, ControllerRegistry, HttpKernel, KernelConfig, Response,
//! };
//!
//! let controllers = ControllerRegistry::new().register_factory(r"\Default\IndexController", || {
//!     Ok(Box::new(ActionController::new().action("index", |_req, _ctx| {
//!         Ok(Some(Response::text("Hello")))
//!     })))
//! });
//!
//! let config = KernelConfig::load_from_yaml("app.yaml")?;
//! let kernel = HttpKernel::new(config, controllers).with_segment_router();
//!
//! let mut request = kernel.request_factory().builder().uri("/").build();
//! let response = kernel.handle(&mut request)?;
//! assert_eq!(response.body(), "Hello");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod controller;
mod error;
mod event;
mod kernel;
pub mod naming;
mod request;
mod response;
mod router;
mod state;

pub use config::{
    ConfigError, KernelConfig, DEFAULT_CONTROLLER_CLASS_PATTERN, DEFAULT_CONTROLLER_DIR_PATTERN,
    DEFAULT_CONTROLLER_FILE_PATTERN,
};

pub use controller::{
    ActionController, ActionFn, ActionResult, Controller, ControllerFactory, ControllerRegistry,
    DispatchContext,
};

pub use error::KernelError;

pub use event::{
    ControllerEvent, ControllerListener, DispatchErrorEvent, DispatchErrorListener,
    EventDispatcher, EventError, EventName, RequestEvent, ResponseEvent, ResponseListener,
    RouteListener,
};

pub use kernel::{DispatchState, HttpKernel};

pub use request::{Params, Request, RequestBuilder, RequestFactory, RouteDefaults, SERVER_DEFAULTS};

pub use response::Response;

pub use router::{RouteError, RouteMatch, Router, SegmentRouter};

pub use state::{Extensions, MissingState, StateScope};
