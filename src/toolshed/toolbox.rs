//! Installed tool lookup.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ToolReference;
use crate::error::ConfigError;

/// Read-only view of the locally installed tools.
///
/// Passed explicitly to whatever needs missing-tool detection.
#[cfg_attr(test, mockall::automock)]
pub trait Toolbox: Send + Sync {
    /// Whether a tool with exactly this id is installed.
    fn has_tool(&self, tool_id: &str) -> bool;

    /// Whether `tool_id` references a tool-shed tool that is not installed.
    fn is_missing_shed_tool(&self, tool_id: &str) -> bool {
        ToolReference::is_shed_guid(tool_id) && !self.has_tool(tool_id)
    }
}

/// An entry of the toolbox file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledTool {
    /// Tool id or tool-shed guid.
    pub id: String,
    /// Installed version, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Toolbox snapshot loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct InstalledToolbox {
    tool_ids: HashSet<String>,
}

impl InstalledToolbox {
    /// Build from a list of tool ids.
    #[must_use]
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a JSON array of [`InstalledTool`] from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for `TOOLBOX_PATH` if the file
    /// cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let invalid = |reason: String| ConfigError::InvalidValue {
            var: "TOOLBOX_PATH".into(),
            reason,
        };
        let raw = std::fs::read_to_string(path)
            .map_err(|e| invalid(format!("cannot read {}: {e}", path.display())))?;
        let tools: Vec<InstalledTool> = serde_json::from_str(&raw)
            .map_err(|e| invalid(format!("cannot parse {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), tools = tools.len(), "toolbox loaded");
        Ok(Self::from_ids(tools.into_iter().map(|t| t.id)))
    }

    /// Number of installed tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tool_ids.len()
    }

    /// Whether nothing is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tool_ids.is_empty()
    }
}

impl Toolbox for InstalledToolbox {
    fn has_tool(&self, tool_id: &str) -> bool {
        self.tool_ids.contains(tool_id)
    }
}
