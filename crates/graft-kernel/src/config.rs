//! Kernel configuration

use crate::error::ConfigError;
use graft_host::TEMPLATE_OWNER_MARKER;
use graft_template::TemplateId;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a migration scan does when one owner fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPolicy {
    /// Abort the scan and propagate the error
    #[default]
    FailFast,
    /// Record the failure in the report and visit the remaining owners
    Continue,
}

/// Kernel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Prefix of the container created for each template instance
    pub container_prefix: String,
    /// Marker capability identifying template owners in the document
    pub owner_marker: String,
    /// Set a capitalized `label` property on every built node
    pub label_nodes: bool,
    /// Clear the container when a build fails instead of leaving it partial
    pub rollback_on_error: bool,
    pub scan_policy: ScanPolicy,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            container_prefix: "CUSTOM_NODE_".to_string(),
            owner_marker: TEMPLATE_OWNER_MARKER.to_string(),
            label_nodes: true,
            rollback_on_error: true,
            scan_policy: ScanPolicy::FailFast,
        }
    }
}

impl KernelConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML; missing keys keep their defaults
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed TOML or mistyped keys
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Read`] if the file cannot be read, otherwise as [`KernelConfig::from_toml_str`]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    #[must_use]
    pub fn with_container_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.container_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_owner_marker(mut self, marker: impl Into<String>) -> Self {
        self.owner_marker = marker.into();
        self
    }

    #[must_use]
    pub fn with_label_nodes(mut self, enabled: bool) -> Self {
        self.label_nodes = enabled;
        self
    }

    #[must_use]
    pub fn with_rollback_on_error(mut self, enabled: bool) -> Self {
        self.rollback_on_error = enabled;
        self
    }

    #[must_use]
    pub fn with_scan_policy(mut self, policy: ScanPolicy) -> Self {
        self.scan_policy = policy;
        self
    }

    /// Canonical container name of a template's instance
    #[must_use]
    pub fn container_name(&self, template: &TemplateId) -> String {
        format!("{}{}", self.container_prefix, template)
    }
}
