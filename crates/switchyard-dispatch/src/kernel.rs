//! The dispatch kernel.
//!
//! [`HttpKernel`] turns a routed [`Request`] into a [`Response`]:
//!
//! ```text
//! Routed
//!   → ControllerResolved      class name + controller directory checked, instance built
//!   → PreDispatchPublished    listeners may swap the controller
//!   → Executed                action ran
//!   → PostDispatchPublished
//!   → Dispatched              request flagged as dispatched
//! ```
//!
//! Any failure ends in `DispatchFailed` and is returned to the caller.
//! Resolution never falls back to a default: an unknown module, a missing
//! directory or an unregistered class are each a distinct [`KernelError`].
//!
//! Module names are title-cased before the allow-list check, and the check is
//! exact against the configured names. Class names are computed purely from
//! the pattern, so a syntactically valid class name does not imply the module
//! is allowed.

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, warn};
use switchyard_render::{PluginBroker, Renderer, UndefinedPolicy};

use crate::config::KernelConfig;
use crate::controller::{Controller, ControllerRegistry, DispatchContext};
use crate::error::KernelError;
use crate::event::{
    ControllerEvent, DispatchErrorEvent, EventDispatcher, EventName, RequestEvent, ResponseEvent,
};
use crate::naming::{controller_class_name, substitute, title_case};
use crate::request::{Request, RequestFactory};
use crate::response::Response;
use crate::router::{Router, SegmentRouter};
use crate::state::Extensions;

/// Stage of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Routed,
    ControllerResolved,
    PreDispatchPublished,
    Executed,
    PostDispatchPublished,
    Dispatched,
    DispatchFailed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Routed => "routed",
            DispatchState::ControllerResolved => "controller-resolved",
            DispatchState::PreDispatchPublished => "pre-dispatch-published",
            DispatchState::Executed => "executed",
            DispatchState::PostDispatchPublished => "post-dispatch-published",
            DispatchState::Dispatched => "dispatched",
            DispatchState::DispatchFailed => "dispatch-failed",
        };
        f.write_str(name)
    }
}

fn enter(state: DispatchState, target: &str) {
    debug!("{target}: {state}");
}

/// Resolves, instantiates and runs controllers.
pub struct HttpKernel {
    config: KernelConfig,
    controllers: ControllerRegistry,
    router: Option<Rc<dyn Router>>,
    events: EventDispatcher,
    plugins: Option<Arc<PluginBroker>>,
    app_state: Rc<Extensions>,
}

impl HttpKernel {
    pub fn new(config: KernelConfig, controllers: ControllerRegistry) -> Self {
        Self {
            config,
            controllers,
            router: None,
            events: EventDispatcher::new(),
            plugins: None,
            app_state: Rc::new(Extensions::app()),
        }
    }

    /// Routes with `router` in [`handle`](Self::handle).
    pub fn with_router<R: Router + 'static>(mut self, router: R) -> Self {
        self.router = Some(Rc::new(router));
        self
    }

    /// Routes with a [`SegmentRouter`] over the configured modules.
    pub fn with_segment_router(self) -> Self {
        let router = SegmentRouter::new(self.config.modules.clone(), self.config.defaults.clone());
        self.with_router(router)
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// Plugin broker handed to every view renderer.
    pub fn with_plugins(mut self, plugins: Arc<PluginBroker>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    /// App-lifetime state visible to every action as `ctx.app_state`.
    pub fn with_app_state(mut self, app_state: Extensions) -> Self {
        self.app_state = Rc::new(app_state);
        self
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn has_router(&self) -> bool {
        self.router.is_some()
    }

    /// Request factory carrying this kernel's route defaults.
    pub fn request_factory(&self) -> RequestFactory {
        RequestFactory::new(self.config.defaults.clone())
    }

    /// Directory holding the controllers of `module`.
    ///
    /// Fails if the title-cased module is not an allowed module, if the
    /// directory does not exist, or if the controller's file does not exist.
    /// Clearing the controller file pattern skips the file check.
    pub fn controller_path(&self, module: &str, controller: &str) -> Result<PathBuf, KernelError> {
        let module_name = title_case(module);
        if !self.config.modules.iter().any(|m| *m == module_name) {
            return Err(KernelError::UnknownModule(module_name));
        }

        let dir = self
            .config
            .resolve(substitute(&self.config.controller_dir_pattern, module, controller));
        if !dir.is_dir() {
            return Err(KernelError::ControllerPathNotFound {
                module: module_name,
                path: dir,
            });
        }

        if let Some(pattern) = &self.config.controller_file_pattern {
            let file = dir.join(substitute(pattern, module, controller));
            if !file.is_file() {
                return Err(KernelError::ControllerFileNotFound {
                    controller: title_case(controller),
                    path: file,
                });
            }
        }
        Ok(dir)
    }

    /// Fully qualified controller class name. No I/O.
    pub fn controller_class_name(&self, module: &str, controller: &str) -> String {
        controller_class_name(&self.config.controller_class_pattern, module, controller)
    }

    /// Template directory for a controller's views, if configured.
    pub fn view_path(&self, module: &str, controller: &str) -> Option<PathBuf> {
        self.config
            .view_dir_pattern
            .as_ref()
            .map(|pattern| self.config.resolve(substitute(pattern, module, controller)))
    }

    fn view_renderer(&self, module: &str, controller: &str) -> Renderer {
        let mut view = Renderer::new().with_extension(self.config.template_extension.as_str());
        if let Some(path) = self.view_path(module, controller) {
            view.set_template_path(path);
        }
        if let Some(plugins) = &self.plugins {
            view.set_plugin_broker(plugins.clone());
        }
        view.set_undefined_policy(if self.config.strict_variables {
            UndefinedPolicy::Strict
        } else {
            UndefinedPolicy::Lenient
        });
        view
    }

    fn instantiate(&self, class_name: &str) -> Result<Box<dyn Controller>, KernelError> {
        match self.controllers.instantiate(class_name) {
            None => Err(KernelError::ControllerClassNotFound(class_name.to_string())),
            Some(Err(source)) => Err(KernelError::ControllerNotInstantiable {
                class: class_name.to_string(),
                source,
            }),
            Some(Ok(controller)) => Ok(controller),
        }
    }

    /// Dispatches an already routed request.
    ///
    /// An action returning `Ok(None)` yields an empty `200` response. An
    /// action error is published as `dispatchError` and returned as
    /// [`KernelError::Controller`] unchanged.
    pub fn dispatch(&self, request: &mut Request) -> Result<Response, KernelError> {
        let target = format!(
            "{}/{}/{}",
            request.module_name(),
            request.controller_name(),
            request.action_name()
        );
        enter(DispatchState::Routed, &target);

        match self.run(request, &target) {
            Ok(response) => {
                request.set_dispatched(true);
                enter(DispatchState::Dispatched, &target);
                Ok(response)
            }
            Err(err) => {
                warn!("dispatch of {target} failed: {err}");
                enter(DispatchState::DispatchFailed, &target);
                Err(err)
            }
        }
    }

    fn run(&self, request: &mut Request, target: &str) -> Result<Response, KernelError> {
        let module = request.module_name().to_string();
        let controller_name = request.controller_name().to_string();

        let class_name = self.controller_class_name(&module, &controller_name);
        let controller_dir = self.controller_path(&module, &controller_name)?;
        let controller = self.instantiate(&class_name)?;
        debug!(
            "{target}: {class_name} from {} ({})",
            controller_dir.display(),
            controller.type_name()
        );
        enter(DispatchState::ControllerResolved, target);

        let mut ctx = DispatchContext::new(self.app_state.clone());
        ctx.module = module.clone();
        ctx.controller = controller_name.clone();
        ctx.action = request.action_name().to_string();
        ctx.class_name = class_name.clone();
        ctx.view = self.view_renderer(&module, &controller_name);

        let mut event = ControllerEvent::new(EventName::PreDispatch, controller);
        self.events.publish_controller(&mut event, request, &mut ctx)?;
        let mut controller = event.into_controller();
        enter(DispatchState::PreDispatchPublished, target);

        // Listeners may forward to another action.
        let action = request.action_name().to_string();
        ctx.action = action.clone();
        if !controller.has_action(&action) {
            return Err(KernelError::ActionNotFound {
                class: class_name,
                action,
            });
        }

        let response = match controller.execute(&action, request, &mut ctx) {
            Ok(response) => response.unwrap_or_default(),
            Err(err) => {
                let event = DispatchErrorEvent::new(request, &ctx, &err);
                if let Err(listener_err) = self.events.publish_dispatch_error(&event) {
                    warn!("{target}: dispatchError listener failed: {listener_err}");
                }
                return Err(KernelError::Controller(err));
            }
        };
        enter(DispatchState::Executed, target);

        let mut event = ControllerEvent::new(EventName::PostDispatch, controller);
        self.events.publish_controller(&mut event, request, &mut ctx)?;
        enter(DispatchState::PostDispatchPublished, target);

        Ok(response)
    }

    /// Routes, dispatches and publishes the response.
    ///
    /// Without a router the request's current names are dispatched as they
    /// are.
    pub fn handle(&self, request: &mut Request) -> Result<Response, KernelError> {
        if let Some(router) = &self.router {
            let route = router.route(request)?;
            route.apply(request);
        }
        self.events.publish_route(&mut RequestEvent::new(request))?;

        let response = self.dispatch(request)?;

        let mut event = ResponseEvent::new(request, response);
        self.events.publish_response(&mut event)?;
        Ok(event.into_response())
    }
}

impl fmt::Debug for HttpKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpKernel")
            .field("config", &self.config)
            .field("controllers", &self.controllers)
            .field("has_router", &self.router.is_some())
            .field("events", &self.events)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ActionController, ActionResult};
    use std::cell::RefCell;
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        config: KernelConfig,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        for (module, controller) in [("Default", "Index"), ("Test", "Default"), ("News", "Index")] {
            let controllers = dir.path().join("modules").join(module).join("controllers");
            fs::create_dir_all(&controllers).unwrap();
            fs::write(controllers.join(format!("{controller}Controller.rs")), "").unwrap();
        }
        let config = KernelConfig::default()
            .with_root(dir.path())
            .with_modules(["Default", "Test", "Blog"]);
        Fixture { _dir: dir, config }
    }

    fn hello_controllers() -> ControllerRegistry {
        ControllerRegistry::new().register_factory(r"\Default\IndexController", || {
            Ok(Box::new(
                ActionController::new()
                    .action("index", |_, _| Ok(Some(Response::text("hello"))))
                    .action("silent", |_, _| Ok(None))
                    .action("fail", |_, _| Err(anyhow::anyhow!("boom"))),
            ))
        })
    }

    #[test]
    fn test_controller_path() {
        let fx = fixture();
        let kernel = HttpKernel::new(fx.config.clone(), ControllerRegistry::new());
        let path = kernel.controller_path("Test", "Default").unwrap();
        assert_eq!(path, fx.config.resolve("modules/Test/controllers"));

        // case-folded module token
        assert_eq!(kernel.controller_path("tESt", "Default").unwrap(), path);
    }

    #[test]
    fn test_controller_path_errors() {
        let fx = fixture();
        let kernel = HttpKernel::new(fx.config.clone(), ControllerRegistry::new());

        assert!(matches!(
            kernel.controller_path("Blog", "Index"),
            Err(KernelError::ControllerPathNotFound { ref module, .. }) if module == "Blog"
        ));
        assert!(matches!(
            kernel.controller_path("News", "Index"),
            Err(KernelError::UnknownModule(ref m)) if m == "News"
        ));
    }

    #[test]
    fn test_controller_file_must_exist_by_default() {
        let fx = fixture();
        let kernel = HttpKernel::new(fx.config.clone(), ControllerRegistry::new());

        assert!(kernel.controller_path("Default", "index").is_ok());
        let err = kernel.controller_path("Default", "Blog").unwrap_err();
        assert!(matches!(
            err,
            KernelError::ControllerFileNotFound { ref controller, ref path }
                if controller == "Blog" && path.ends_with("BlogController.rs")
        ));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_controller_file_pattern() {
        let fx = fixture();
        let controllers = fx.config.resolve("modules/Default/controllers");
        fs::write(controllers.join("Blog.ctl"), "").unwrap();
        let mut config = fx.config.clone();
        config.controller_file_pattern = Some("%Controller%.ctl".into());
        let kernel = HttpKernel::new(config.clone(), ControllerRegistry::new());
        assert!(kernel.controller_path("Default", "blog").is_ok());
        assert!(kernel.controller_path("Default", "index").is_err());

        config.controller_file_pattern = None;
        let kernel = HttpKernel::new(config, ControllerRegistry::new());
        assert!(kernel.controller_path("Default", "missing").is_ok());
    }

    #[test]
    fn test_dispatch_executes_action() {
        let fx = fixture();
        let kernel = HttpKernel::new(fx.config.clone(), hello_controllers());
        let mut request = Request::default();

        let response = kernel.dispatch(&mut request).unwrap();
        assert_eq!(response.body(), "hello");
        assert!(request.is_dispatched());
    }

    #[test]
    fn test_action_without_response_is_empty_ok() {
        let fx = fixture();
        let kernel = HttpKernel::new(fx.config.clone(), hello_controllers());
        let mut request = Request::default();
        request.set_action_name("silent");

        let response = kernel.dispatch(&mut request).unwrap();
        assert_eq!(response, Response::empty());
    }

    #[test]
    fn test_unregistered_class() {
        let fx = fixture();
        let kernel = HttpKernel::new(fx.config.clone(), ControllerRegistry::new());
        let mut request = Request::default();
        let err = kernel.dispatch(&mut request).unwrap_err();
        assert!(matches!(err, KernelError::ControllerClassNotFound(ref c) if c == r"\Default\IndexController"));
        assert!(!request.is_dispatched());
    }

    #[test]
    fn test_unknown_action() {
        let fx = fixture();
        let kernel = HttpKernel::new(fx.config.clone(), hello_controllers());
        let mut request = Request::default();
        request.set_action_name("missing");
        assert!(matches!(
            kernel.dispatch(&mut request),
            Err(KernelError::ActionNotFound { ref action, .. }) if action == "missing"
        ));
    }

    #[test]
    fn test_controller_error_propagates_after_event() {
        let fx = fixture();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let events = EventDispatcher::new().on_dispatch_error(move |event| {
            sink.borrow_mut().push(event.error().to_string());
            Ok(())
        });
        let kernel = HttpKernel::new(fx.config.clone(), hello_controllers()).with_events(events);

        let mut request = Request::default();
        request.set_action_name("fail");
        let err = kernel.dispatch(&mut request).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(err.controller_error().is_some());
        assert_eq!(*seen.borrow(), vec!["boom"]);
        assert!(!request.is_dispatched());
    }

    #[test]
    fn test_pre_dispatch_listener_replaces_controller() {
        #[derive(Default)]
        struct Replacement;

        impl Controller for Replacement {
            fn execute(&mut self, action: &str, _: &mut Request, _: &mut DispatchContext) -> ActionResult {
                Ok(Some(Response::text(format!("replaced {action}"))))
            }
        }

        let fx = fixture();
        let events = EventDispatcher::new()
            .on_pre_dispatch(|event, _, _| {
                event.set_controller(Box::new(Replacement));
                Ok(())
            })
            .on_post_dispatch(|event, _, _| {
                assert!(event.controller().type_name().ends_with("Replacement"));
                Ok(())
            });
        let kernel = HttpKernel::new(fx.config.clone(), hello_controllers()).with_events(events);

        let response = kernel.dispatch(&mut Request::default()).unwrap();
        assert_eq!(response.body(), "replaced index");
    }

    #[test]
    fn test_pre_dispatch_listener_error_aborts() {
        let fx = fixture();
        let events = EventDispatcher::new()
            .on_pre_dispatch(|_, _, _| Err(crate::EventError::pre_dispatch("denied")));
        let kernel = HttpKernel::new(fx.config.clone(), hello_controllers()).with_events(events);

        let mut request = Request::default();
        let err = kernel.dispatch(&mut request).unwrap_err();
        assert!(matches!(err, KernelError::Event(ref e) if e.message == "denied"));
        assert!(!request.is_dispatched());
    }

    #[test]
    fn test_handle_routes_and_publishes_response() {
        let fx = fixture();
        let events = EventDispatcher::new().on_response(|event| {
            event.response_mut().set_header("X-Handled", "1");
            Ok(())
        });
        let kernel = HttpKernel::new(fx.config.clone(), hello_controllers())
            .with_segment_router()
            .with_events(events);

        let mut request = kernel.request_factory().builder().uri("/index/index").build();
        let response = kernel.handle(&mut request).unwrap();
        assert_eq!(response.body(), "hello");
        assert_eq!(response.header("x-handled"), Some("1"));
    }

    #[test]
    fn test_view_renderer_uses_config() {
        let fx = fixture();
        let mut config = fx.config.clone();
        config.view_dir_pattern = Some("modules/%Module%/views/%Controller%".into());
        config.template_extension = "html".into();
        config.strict_variables = true;
        let kernel = HttpKernel::new(config, ControllerRegistry::new());

        let view = kernel.view_renderer("blog", "post-list");
        assert_eq!(
            view.template_path(),
            Some(fx.config.resolve("modules/Blog/views/PostList").as_path())
        );
        assert_eq!(view.extension(), "html");
        assert_eq!(view.undefined_policy(), UndefinedPolicy::Strict);
    }

    #[test]
    fn test_dispatch_state_display() {
        assert_eq!(DispatchState::PreDispatchPublished.to_string(), "pre-dispatch-published");
        assert_eq!(DispatchState::DispatchFailed.to_string(), "dispatch-failed");
    }
}
