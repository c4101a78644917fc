//! Tool shed support.
//!
//! This module provides:
//! - [`ToolReference`]: a tool-shed guid split into its parts
//! - [`ToolShedRegistry`]: the ordered list of configured tool sheds
//! - [`Toolbox`] / [`InstalledToolbox`]: which tools are installed locally
//!
//! A tool-shed guid looks like
//! `toolshed.g2.bx.psu.edu/repos/devteam/fastqc/fastqc/0.73`, i.e.
//! `{host}/repos/{owner}/{repository}/{tool}/{version}`.

mod registry;
mod toolbox;

pub use registry::ToolShedRegistry;
pub use toolbox::{InstalledTool, InstalledToolbox, Toolbox};

#[cfg(test)]
pub use toolbox::MockToolbox;

use std::fmt;
use std::str::FromStr;

use crate::error::ToolIdError;

/// Number of `/`-separated fields in a tool-shed guid.
pub const GUID_FIELDS: usize = 6;

/// A tool-shed guid decomposed into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolReference {
    /// Tool shed host (may include a port or path prefix).
    pub toolshed: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repository: String,
    /// Tool id inside the repository.
    pub tool: String,
    /// Tool version.
    pub version: String,
}

impl ToolReference {
    /// Whether `tool_id` has the shape of a tool-shed guid (as opposed to a
    /// built-in tool id such as `cat1`).
    #[must_use]
    pub fn is_shed_guid(tool_id: &str) -> bool {
        tool_id.contains("/repos/")
    }
}

impl FromStr for ToolReference {
    type Err = ToolIdError;

    fn from_str(tool_id: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = tool_id.split('/').collect();
        match parts.as_slice() {
            [toolshed, _, owner, repository, tool, version] => Ok(Self {
                toolshed: (*toolshed).to_string(),
                owner: (*owner).to_string(),
                repository: (*repository).to_string(),
                tool: (*tool).to_string(),
                version: (*version).to_string(),
            }),
            _ => Err(ToolIdError::Malformed {
                tool_id: tool_id.to_string(),
                fields: parts.len(),
            }),
        }
    }
}

impl fmt::Display for ToolReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/repos/{}/{}/{}/{}",
            self.toolshed, self.owner, self.repository, self.tool, self.version
        )
    }
}
