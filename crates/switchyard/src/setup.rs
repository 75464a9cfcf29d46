//! Setup error types.

use thiserror::Error;

use switchyard_dispatch::ConfigError;

/// Error type for application setup.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Two controllers registered under one class name.
    #[error("duplicate controller: {0}")]
    DuplicateController(String),

    /// Two helpers registered under one (case-insensitive) name.
    #[error("duplicate view helper: {0}")]
    DuplicatePlugin(String),
}
