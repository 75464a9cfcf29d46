//! Kernel configuration.
//!
//! ```yaml
//! root: /srv/app
//! modules: [Default, Blog]
//! controller_dir_pattern: modules/%Module%/controllers
//! controller_class_pattern: '%Module%\%Controller%Controller'
//! controller_file_pattern: '%Controller%Controller.rs'
//! view_dir_pattern: modules/%Module%/views/%Controller%
//! template_extension: jinja
//! strict_variables: false
//! defaults:
//!   module: default
//!   controller: index
//!   action: index
//! ```
//!
//! Relative directory patterns are resolved against `root` when it is set.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::naming::title_case;
use crate::request::RouteDefaults;

pub const DEFAULT_CONTROLLER_DIR_PATTERN: &str = "modules/%Module%/controllers";
pub const DEFAULT_CONTROLLER_CLASS_PATTERN: &str = r"%Module%\%Controller%Controller";
pub const DEFAULT_CONTROLLER_FILE_PATTERN: &str = "%Controller%Controller.rs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("both an inline config and config file {path} were given")]
    Conflict { path: PathBuf },
}

/// Controller resolution and view settings for [`HttpKernel`](crate::HttpKernel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "KernelConfig::validate_default_module"))]
pub struct KernelConfig {
    /// Base directory for relative patterns.
    pub root: Option<PathBuf>,
    /// Allowed modules, title-cased.
    #[validate(length(min = 1))]
    pub modules: Vec<String>,
    /// Controller directory, with `%Module%`.
    #[validate(length(min = 1))]
    pub controller_dir_pattern: String,
    /// Controller class name, with `%Module%` and `%Controller%`.
    #[validate(length(min = 1))]
    pub controller_class_pattern: String,
    /// Controller file relative to the controller directory, with
    /// `%Controller%`. The file must exist; `null` skips the check.
    pub controller_file_pattern: Option<String>,
    /// View template directory, with `%Module%` and `%Controller%`.
    pub view_dir_pattern: Option<String>,
    #[validate(length(min = 1))]
    pub template_extension: String,
    /// Fail renders that reference undeclared variables instead of
    /// recording a diagnostic.
    pub strict_variables: bool,
    pub defaults: RouteDefaults,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            root: None,
            modules: vec!["Default".to_string()],
            controller_dir_pattern: DEFAULT_CONTROLLER_DIR_PATTERN.to_string(),
            controller_class_pattern: DEFAULT_CONTROLLER_CLASS_PATTERN.to_string(),
            controller_file_pattern: Some(DEFAULT_CONTROLLER_FILE_PATTERN.to_string()),
            view_dir_pattern: None,
            template_extension: switchyard_render::DEFAULT_TEMPLATE_EXTENSION.to_string(),
            strict_variables: false,
            defaults: RouteDefaults::default(),
        }
    }
}

impl KernelConfig {
    pub fn load_from_yaml<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let conf_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Conf file read from {}", path.display());
        let mut conf = Self::from_yaml(&conf_str)?;
        if conf.root.is_none() {
            conf.root = path.parent().map(Path::to_path_buf);
        }
        Ok(conf)
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self, ConfigError> {
        trace!("Read conf file: {conf_str}");
        let conf: KernelConfig = serde_yaml::from_str(conf_str)?;
        trace!("Loaded conf: {conf:?}");
        conf.check()?;
        Ok(conf)
    }

    /// Runs the field and default-module rules.
    pub fn check(&self) -> Result<(), ConfigError> {
        Ok(self.validate()?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = modules.into_iter().map(Into::into).collect();
        self
    }

    /// Joins `path` onto `root` unless it is absolute or no root is set.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn validate_default_module(&self) -> Result<(), ValidationError> {
        let module = title_case(&self.defaults.module);
        if self.modules.iter().any(|m| *m == module) {
            Ok(())
        } else {
            Err(ValidationError::new("default_module_not_allowed"))
        }
    }
}
