use std::path::PathBuf;

use thiserror::Error;

use crate::event::EventError;
use crate::router::RouteError;

/// Errors produced while resolving and dispatching a request.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("module '{0}' is not an allowed module")]
    UnknownModule(String),

    #[error("controller path '{}' for module '{module}' does not exist", path.display())]
    ControllerPathNotFound { module: String, path: PathBuf },

    #[error("controller file '{}' does not exist", path.display())]
    ControllerFileNotFound { controller: String, path: PathBuf },

    #[error("controller class '{0}' is not registered")]
    ControllerClassNotFound(String),

    #[error("controller class '{class}' could not be instantiated")]
    ControllerNotInstantiable {
        class: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("action '{action}' not found in controller '{class}'")]
    ActionNotFound { class: String, action: String },

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Event(#[from] EventError),

    /// An action failed. The controller's error is passed through untouched.
    #[error(transparent)]
    Controller(anyhow::Error),
}

impl KernelError {
    /// Whether the request addressed something that does not exist, as
    /// opposed to something that failed while running.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            KernelError::UnknownModule(_)
                | KernelError::ControllerPathNotFound { .. }
                | KernelError::ControllerFileNotFound { .. }
                | KernelError::ControllerClassNotFound(_)
                | KernelError::ActionNotFound { .. }
                | KernelError::Route(_)
        )
    }

    /// The controller's error, if an action failed.
    pub fn controller_error(&self) -> Option<&anyhow::Error> {
        match self {
            KernelError::Controller(err) => Some(err),
            _ => None,
        }
    }
}
