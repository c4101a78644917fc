//! Regrouping of missing tools by tool-shed repository.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::ToolIdError;
use crate::toolshed::{ToolReference, ToolShedRegistry};

/// Identity of a tool-shed repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RepositoryKey {
    toolshed: String,
    owner: String,
    repository: String,
}

/// The workflows needing tools from one tool-shed repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryGroup {
    /// Configured shed URL without trailing slash, `null` if the host is
    /// not configured.
    pub shed: Option<String>,
    /// Repository name.
    pub repository: String,
    /// Repository owner.
    pub owner: String,
    /// Missing tool guids from this repository, first-seen order.
    pub tools: IndexSet<String>,
    /// Names of the workflows using them, first-seen order.
    pub workflows: IndexSet<String>,
}

/// Group missing tools by the repository they come from.
///
/// `workflows` yields `(workflow name, missing tool guids)` pairs. Groups are
/// returned in the order their repository is first encountered.
///
/// # Errors
///
/// Returns [`ToolIdError::Malformed`] for a guid without six fields.
pub fn group_by_repository<'a, I, T>(
    workflows: I,
    registry: &ToolShedRegistry,
) -> Result<Vec<RepositoryGroup>, ToolIdError>
where
    I: IntoIterator<Item = (&'a str, T)>,
    T: IntoIterator<Item = &'a String>,
{
    let mut groups: IndexMap<RepositoryKey, RepositoryGroup> = IndexMap::new();

    for (workflow_name, tool_ids) in workflows {
        for tool_id in tool_ids {
            let reference: ToolReference = tool_id.parse()?;
            let key = RepositoryKey {
                toolshed: reference.toolshed,
                owner: reference.owner,
                repository: reference.repository,
            };
            let group = groups.entry(key).or_insert_with_key(|key| RepositoryGroup {
                shed: registry
                    .resolve(&key.toolshed)
                    .map(|url| url.trim_end_matches('/').to_string()),
                repository: key.repository.clone(),
                owner: key.owner.clone(),
                tools: IndexSet::new(),
                workflows: IndexSet::new(),
            });
            group.tools.insert(tool_id.clone());
            group.workflows.insert(workflow_name.to_string());
        }
    }

    Ok(groups.into_values().collect())
}
