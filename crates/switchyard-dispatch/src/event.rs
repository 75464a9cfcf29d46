//! Dispatch lifecycle events.
//!
//! Listeners run custom code at fixed points of a request's life without
//! touching controller logic.
//!
//! # Pipeline Position
//!
//! ```text
//! incoming request
//!   → router
//!   → ROUTE ← (inspect or rewrite the routed names)
//!   → controller resolved + instantiated
//!   → PRE-DISPATCH ← (auth checks, extension injection, controller swap)
//!   → action
//!       ↘ DISPATCH-ERROR ← (action failed; error is still returned)
//!   → POST-DISPATCH ← (inspect the controller after the action)
//!   → RESPONSE ← (replace or decorate the response)
//! ```
//!
//! Listeners of one phase run in registration order. The first listener that
//! returns an error stops the remaining ones and fails the dispatch.
//!
//! Controller-carrying events always hold a controller. A pre-dispatch
//! listener may swap it; the kernel executes whatever the event holds after
//! all listeners ran.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::controller::{Controller, DispatchContext};
use crate::request::Request;
use crate::response::Response;

/// Identifies a lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    Route,
    PreDispatch,
    PostDispatch,
    DispatchError,
    Response,
}

impl EventName {
    /// Wire identifier of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Route => "route",
            EventName::PreDispatch => "preDispatch",
            EventName::PostDispatch => "postDispatch",
            EventName::DispatchError => "dispatchError",
            EventName::Response => "response",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event carrying the controller of the current dispatch.
pub struct ControllerEvent {
    name: EventName,
    controller: Box<dyn Controller>,
}

impl ControllerEvent {
    pub fn new(name: EventName, controller: Box<dyn Controller>) -> Self {
        Self { name, controller }
    }

    pub fn name(&self) -> EventName {
        self.name
    }

    pub fn controller(&self) -> &dyn Controller {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> &mut dyn Controller {
        self.controller.as_mut()
    }

    /// Replaces the controller, returning the previous one.
    pub fn set_controller(&mut self, controller: Box<dyn Controller>) -> Box<dyn Controller> {
        std::mem::replace(&mut self.controller, controller)
    }

    pub fn into_controller(self) -> Box<dyn Controller> {
        self.controller
    }
}

impl fmt::Debug for ControllerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerEvent")
            .field("name", &self.name)
            .field("controller", &self.controller.type_name())
            .finish()
    }
}

/// Route phase event. Listeners see the request after routing.
#[derive(Debug)]
pub struct RequestEvent<'a> {
    request: &'a mut Request,
}

impl<'a> RequestEvent<'a> {
    pub fn new(request: &'a mut Request) -> Self {
        Self { request }
    }

    pub fn name(&self) -> EventName {
        EventName::Route
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        self.request
    }
}

/// Response phase event. Listeners may replace the response.
#[derive(Debug)]
pub struct ResponseEvent<'a> {
    request: &'a Request,
    response: Response,
}

impl<'a> ResponseEvent<'a> {
    pub fn new(request: &'a Request, response: Response) -> Self {
        Self { request, response }
    }

    pub fn name(&self) -> EventName {
        EventName::Response
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn set_response(&mut self, response: Response) -> Response {
        std::mem::replace(&mut self.response, response)
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

/// Published when an action fails, before the error is returned.
#[derive(Debug)]
pub struct DispatchErrorEvent<'a> {
    request: &'a Request,
    context: &'a DispatchContext,
    error: &'a anyhow::Error,
}

impl<'a> DispatchErrorEvent<'a> {
    pub fn new(request: &'a Request, context: &'a DispatchContext, error: &'a anyhow::Error) -> Self {
        Self {
            request,
            context,
            error,
        }
    }

    pub fn name(&self) -> EventName {
        EventName::DispatchError
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn context(&self) -> &DispatchContext {
        self.context
    }

    pub fn error(&self) -> &anyhow::Error {
        self.error
    }
}

/// Error returned by a listener.
#[derive(Debug, Error)]
#[error("{name} listener failed: {message}")]
pub struct EventError {
    /// The phase whose listener failed
    pub name: EventName,
    /// Human-readable error message
    pub message: String,
    /// The underlying error source, if any
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl EventError {
    pub fn new(name: EventName, message: impl Into<String>) -> Self {
        Self {
            name,
            message: message.into(),
            source: None,
        }
    }

    pub fn route(message: impl Into<String>) -> Self {
        Self::new(EventName::Route, message)
    }

    pub fn pre_dispatch(message: impl Into<String>) -> Self {
        Self::new(EventName::PreDispatch, message)
    }

    pub fn post_dispatch(message: impl Into<String>) -> Self {
        Self::new(EventName::PostDispatch, message)
    }

    pub fn response(message: impl Into<String>) -> Self {
        Self::new(EventName::Response, message)
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        self.source = Some(source.into());
        self
    }
}

/// Route listener.
pub type RouteListener = Rc<dyn Fn(&mut RequestEvent<'_>) -> Result<(), EventError>>;

/// Pre- and post-dispatch listener.
///
/// Receives mutable access to the controller event, the request and the
/// [`DispatchContext`], so it can swap the controller or inject extensions.
pub type ControllerListener =
    Rc<dyn Fn(&mut ControllerEvent, &mut Request, &mut DispatchContext) -> Result<(), EventError>>;

/// Dispatch error listener.
pub type DispatchErrorListener = Rc<dyn Fn(&DispatchErrorEvent<'_>) -> Result<(), EventError>>;

/// Response listener.
pub type ResponseListener = Rc<dyn Fn(&mut ResponseEvent<'_>) -> Result<(), EventError>>;

/// Listener registry for all lifecycle phases.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    route: Vec<RouteListener>,
    pre_dispatch: Vec<ControllerListener>,
    post_dispatch: Vec<ControllerListener>,
    dispatch_error: Vec<DispatchErrorListener>,
    response: Vec<ResponseListener>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        EVENT_NAMES.iter().all(|name| self.listener_count(*name) == 0)
    }

    pub fn listener_count(&self, name: EventName) -> usize {
        match name {
            EventName::Route => self.route.len(),
            EventName::PreDispatch => self.pre_dispatch.len(),
            EventName::PostDispatch => self.post_dispatch.len(),
            EventName::DispatchError => self.dispatch_error.len(),
            EventName::Response => self.response.len(),
        }
    }

    pub fn on_route<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut RequestEvent<'_>) -> Result<(), EventError> + 'static,
    {
        self.route.push(Rc::new(f));
        self
    }

    /// Adds a pre-dispatch listener.
    ///
    /// # Example
    ///
    /// ```rust
    /// use switchyard_dispatch::{EventDispatcher, EventError};
    ///
    /// let events = EventDispatcher::new().on_pre_dispatch(|_event, request, _ctx| {
    ///     if request.cookie("session").is_none() {
    ///         return Err(EventError::pre_dispatch("not signed in"));
    ///     }
    ///     Ok(())
    /// });
    /// ```
    pub fn on_pre_dispatch<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ControllerEvent, &mut Request, &mut DispatchContext) -> Result<(), EventError>
            + 'static,
    {
        self.pre_dispatch.push(Rc::new(f));
        self
    }

    pub fn on_post_dispatch<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ControllerEvent, &mut Request, &mut DispatchContext) -> Result<(), EventError>
            + 'static,
    {
        self.post_dispatch.push(Rc::new(f));
        self
    }

    pub fn on_dispatch_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&DispatchErrorEvent<'_>) -> Result<(), EventError> + 'static,
    {
        self.dispatch_error.push(Rc::new(f));
        self
    }

    pub fn on_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ResponseEvent<'_>) -> Result<(), EventError> + 'static,
    {
        self.response.push(Rc::new(f));
        self
    }

    pub fn publish_route(&self, event: &mut RequestEvent<'_>) -> Result<(), EventError> {
        log::trace!("publishing {} to {} listeners", EventName::Route, self.route.len());
        for listener in &self.route {
            listener(event)?;
        }
        Ok(())
    }

    /// Publishes a controller event to the listeners of its phase.
    ///
    /// Only `PreDispatch` and `PostDispatch` have controller listeners; other
    /// names reach nobody.
    pub fn publish_controller(
        &self,
        event: &mut ControllerEvent,
        request: &mut Request,
        ctx: &mut DispatchContext,
    ) -> Result<(), EventError> {
        let listeners = match event.name() {
            EventName::PreDispatch => &self.pre_dispatch,
            EventName::PostDispatch => &self.post_dispatch,
            _ => return Ok(()),
        };
        log::trace!("publishing {} to {} listeners", event.name(), listeners.len());
        for listener in listeners {
            listener(event, request, ctx)?;
        }
        Ok(())
    }

    pub fn publish_dispatch_error(&self, event: &DispatchErrorEvent<'_>) -> Result<(), EventError> {
        log::trace!(
            "publishing {} to {} listeners",
            EventName::DispatchError,
            self.dispatch_error.len()
        );
        for listener in &self.dispatch_error {
            listener(event)?;
        }
        Ok(())
    }

    pub fn publish_response(&self, event: &mut ResponseEvent<'_>) -> Result<(), EventError> {
        log::trace!("publishing {} to {} listeners", EventName::Response, self.response.len());
        for listener in &self.response {
            listener(event)?;
        }
        Ok(())
    }
}

const EVENT_NAMES: [EventName; 5] = [
    EventName::Route,
    EventName::PreDispatch,
    EventName::PostDispatch,
    EventName::DispatchError,
    EventName::Response,
];

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("route_count", &self.route.len())
            .field("pre_dispatch_count", &self.pre_dispatch.len())
            .field("post_dispatch_count", &self.post_dispatch.len())
            .field("dispatch_error_count", &self.dispatch_error.len())
            .field("response_count", &self.response.len())
            .finish()
    }
}
