//! Application builder and boundary handling.
//!
//! [`App`] owns an [`HttpKernel`] and adds the boundary policy the kernel
//! leaves to its caller: [`App::respond`] never fails, it turns resolution
//! errors into `404 Not Found` and everything else into
//! `500 Internal Server Error`.
//!
//! ```rust
//! use switchyard::{ActionController, App, Response};
//!
//! let root = tempfile::tempdir()?;
//! let controllers = root.path().join("modules/Default/controllers");
//! std::fs::create_dir_all(&controllers)?;
//! std::fs::write(controllers.join("IndexController.rs"), "")?;
//!
//! let app = App::builder()
//!     .root(root.path())
//!     .module_controller("default", "index", || {
//!         ActionController::new().action("index", |_req, _ctx| Ok(Some(Response::text("home"))))
//!     })?
//!     .build()?;
//!
//! let mut request = app.request_factory().builder().uri("/").build();
//! assert_eq!(app.respond(&mut request).body(), "home");
//!
//! let mut missing = app.request_factory().builder().uri("/nowhere/else").build();
//! assert_eq!(app.respond(&mut missing).status(), http::StatusCode::NOT_FOUND);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use http::StatusCode;
use log::{error, info};

use switchyard_dispatch::{
    ActionController, ConfigError, Controller, ControllerEvent, ControllerRegistry, DispatchContext,
    DispatchErrorEvent, EventDispatcher, EventError, Extensions, HttpKernel, KernelConfig,
    KernelError, Request, RequestEvent, RequestFactory, Response, ResponseEvent, Router,
};
use switchyard_render::{PluginBroker, ViewHelper};

use crate::setup::SetupError;

/// A configured application.
#[derive(Debug)]
pub struct App {
    kernel: HttpKernel,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn kernel(&self) -> &HttpKernel {
        &self.kernel
    }

    pub fn config(&self) -> &KernelConfig {
        self.kernel.config()
    }

    pub fn request_factory(&self) -> RequestFactory {
        self.kernel.request_factory()
    }

    /// Routes and dispatches, returning kernel errors as they are.
    pub fn handle(&self, request: &mut Request) -> Result<Response, KernelError> {
        self.kernel.handle(request)
    }

    /// Routes and dispatches, mapping failures to an error response.
    pub fn respond(&self, request: &mut Request) -> Response {
        match self.kernel.handle(request) {
            Ok(response) => response,
            Err(err) => error_response(request, &err),
        }
    }

    /// Serves an `http` request. Parameters beyond what the router extracts
    /// from the path are taken from `params`.
    pub fn respond_http(
        &self,
        request: http::Request<()>,
        params: switchyard_dispatch::Params,
    ) -> Result<http::Response<String>, http::Error> {
        let (parts, ()) = request.into_parts();
        let mut request = self.request_factory().from_http(&parts);
        request.merge_params(params);
        self.respond(&mut request).into_http()
    }
}

/// Status code the boundary uses for a kernel error.
pub fn status_for(err: &KernelError) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn error_response(request: &Request, err: &KernelError) -> Response {
    let status = status_for(err);
    if status == StatusCode::NOT_FOUND {
        info!("{} {}: {err}", status.as_u16(), request.request_uri());
    } else {
        error!("{} {}: {err:#}", status.as_u16(), request.request_uri());
    }
    let reason = status.canonical_reason().unwrap_or("Error");
    Response::text(reason).with_status(status)
}

type PendingController = (String, String, Rc<dyn Fn() -> ActionController>);

/// Builder for [`App`].
pub struct AppBuilder {
    config: Option<KernelConfig>,
    config_file: Option<PathBuf>,
    root: Option<PathBuf>,
    controllers: ControllerRegistry,
    pending: Vec<PendingController>,
    plugins: PluginBroker,
    events: EventDispatcher,
    router: Option<Box<dyn FnOnce(HttpKernel) -> HttpKernel>>,
    app_state: Extensions,
}

impl std::fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppBuilder")
            .field("config_file", &self.config_file)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            config_file: None,
            root: None,
            controllers: ControllerRegistry::new(),
            pending: Vec::new(),
            plugins: PluginBroker::new(),
            events: EventDispatcher::new(),
            router: None,
            app_state: Extensions::app(),
        }
    }

    /// Uses `config` as the kernel configuration. Cannot be combined with
    /// [`config_file`](Self::config_file).
    pub fn config(mut self, config: KernelConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Loads the kernel configuration from a YAML file at build time.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Overrides the configuration's root directory.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Registers a controller type under a class name.
    pub fn controller<C>(mut self, class_name: &str) -> Result<Self, SetupError>
    where
        C: Controller + Default + 'static,
    {
        self.ensure_new_controller(class_name)?;
        self.controllers = self.controllers.register::<C>(class_name);
        Ok(self)
    }

    /// Registers a controller factory under a class name.
    pub fn controller_factory<F>(mut self, class_name: &str, factory: F) -> Result<Self, SetupError>
    where
        F: Fn() -> Result<Box<dyn Controller>, anyhow::Error> + 'static,
    {
        self.ensure_new_controller(class_name)?;
        self.controllers.insert(class_name, factory);
        Ok(self)
    }

    /// Registers an [`ActionController`] for a module/controller pair.
    ///
    /// The class name is derived from the configured class pattern when the
    /// app is built.
    pub fn module_controller<F>(
        mut self,
        module: &str,
        controller: &str,
        factory: F,
    ) -> Result<Self, SetupError>
    where
        F: Fn() -> ActionController + 'static,
    {
        let duplicate = self
            .pending
            .iter()
            .any(|(m, c, _)| m.eq_ignore_ascii_case(module) && c.eq_ignore_ascii_case(controller));
        if duplicate {
            return Err(SetupError::DuplicateController(format!("{module}/{controller}")));
        }
        let factory: Rc<dyn Fn() -> ActionController> = Rc::new(factory);
        self.pending
            .push((module.to_string(), controller.to_string(), factory));
        Ok(self)
    }

    /// Registers a view helper type, built on first use.
    pub fn plugin<T>(mut self, name: &str) -> Result<Self, SetupError>
    where
        T: ViewHelper + Default + 'static,
    {
        self.ensure_new_plugin(name)?;
        self.plugins = self.plugins.register_type::<T>(name);
        Ok(self)
    }

    /// Registers a view helper factory, run on first use.
    pub fn plugin_factory<F>(mut self, name: &str, create: F) -> Result<Self, SetupError>
    where
        F: Fn() -> Arc<dyn ViewHelper> + Send + Sync + 'static,
    {
        self.ensure_new_plugin(name)?;
        self.plugins = self.plugins.register_factory(name, create);
        Ok(self)
    }

    /// Registers an already built view helper.
    pub fn plugin_instance<H>(mut self, name: &str, helper: H) -> Result<Self, SetupError>
    where
        H: ViewHelper + 'static,
    {
        self.ensure_new_plugin(name)?;
        self.plugins = self.plugins.register_instance(name, helper);
        Ok(self)
    }

    /// Routes with a custom router instead of the segment router.
    pub fn router<R: Router + 'static>(mut self, router: R) -> Self {
        self.router = Some(Box::new(move |kernel: HttpKernel| kernel.with_router(router)));
        self
    }

    /// Skips routing; requests are dispatched with the names they carry.
    pub fn without_router(mut self) -> Self {
        self.router = Some(Box::new(|kernel| kernel));
        self
    }

    /// Adds app-lifetime state, visible to actions as `ctx.app_state`.
    pub fn app_state<T: 'static>(mut self, value: T) -> Self {
        self.app_state.insert(value);
        self
    }

    /// Replaces all event listeners.
    pub fn events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn on_route<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut RequestEvent<'_>) -> Result<(), EventError> + 'static,
    {
        self.events = self.events.on_route(f);
        self
    }

    pub fn on_pre_dispatch<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ControllerEvent, &mut Request, &mut DispatchContext) -> Result<(), EventError>
            + 'static,
    {
        self.events = self.events.on_pre_dispatch(f);
        self
    }

    pub fn on_post_dispatch<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ControllerEvent, &mut Request, &mut DispatchContext) -> Result<(), EventError>
            + 'static,
    {
        self.events = self.events.on_post_dispatch(f);
        self
    }

    pub fn on_dispatch_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&DispatchErrorEvent<'_>) -> Result<(), EventError> + 'static,
    {
        self.events = self.events.on_dispatch_error(f);
        self
    }

    pub fn on_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ResponseEvent<'_>) -> Result<(), EventError> + 'static,
    {
        self.events = self.events.on_response(f);
        self
    }

    fn ensure_new_controller(&self, class_name: &str) -> Result<(), SetupError> {
        if self.controllers.contains(class_name) {
            return Err(SetupError::DuplicateController(class_name.to_string()));
        }
        Ok(())
    }

    fn ensure_new_plugin(&self, name: &str) -> Result<(), SetupError> {
        if self.plugins.contains(name) {
            return Err(SetupError::DuplicatePlugin(name.to_string()));
        }
        Ok(())
    }

    /// Builds the application.
    pub fn build(self) -> Result<App, SetupError> {
        let mut config = match (self.config, self.config_file) {
            (Some(_), Some(path)) => return Err(ConfigError::Conflict { path }.into()),
            (Some(config), None) => config,
            (None, Some(path)) => KernelConfig::load_from_yaml(&path)?,
            (None, None) => KernelConfig::default(),
        };
        if let Some(root) = self.root {
            config.root = Some(root);
        }
        config.check()?;

        let mut controllers = self.controllers;
        let mut seen: HashSet<String> = controllers.class_names().map(str::to_string).collect();
        for (module, controller, factory) in self.pending {
            let class_name = switchyard_dispatch::naming::controller_class_name(
                &config.controller_class_pattern,
                &module,
                &controller,
            );
            if !seen.insert(class_name.clone()) {
                return Err(SetupError::DuplicateController(class_name));
            }
            controllers.insert(&class_name, move || {
                Ok(Box::new(factory()) as Box<dyn Controller>)
            });
        }

        let mut kernel = HttpKernel::new(config, controllers)
            .with_events(self.events)
            .with_app_state(self.app_state);
        if !self.plugins.is_empty() {
            kernel = kernel.with_plugins(Arc::new(self.plugins));
        }
        kernel = match self.router {
            Some(install) => install(kernel),
            None => kernel.with_segment_router(),
        };

        Ok(App { kernel })
    }
}
