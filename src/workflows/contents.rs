//! Tool enumeration over workflow versions.

use serde::{Deserialize, Serialize};

use crate::storage::{StoredWorkflowVersion, WorkflowStep};

/// A tool referenced by a workflow step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowTool {
    /// Tool id or tool-shed guid.
    pub tool_id: String,
    /// Requested version.
    pub tool_version: Option<String>,
}

/// Inspects workflow contents.
#[cfg_attr(test, mockall::automock)]
pub trait WorkflowContents: Send + Sync {
    /// Every distinct tool used by a workflow version, subworkflows included,
    /// in first-use order.
    fn get_all_tools(&self, workflow: &StoredWorkflowVersion) -> Vec<WorkflowTool>;
}

/// Walks the stored step tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepToolCollector;

impl WorkflowContents for StepToolCollector {
    fn get_all_tools(&self, workflow: &StoredWorkflowVersion) -> Vec<WorkflowTool> {
        let mut tools = Vec::new();
        collect(&workflow.steps, &mut tools);
        tools
    }
}

fn collect(steps: &[WorkflowStep], tools: &mut Vec<WorkflowTool>) {
    for step in steps {
        match (step.step_type.as_str(), &step.subworkflow) {
            ("subworkflow", Some(inner)) => collect(inner, tools),
            ("tool", _) => {
                if let Some(tool_id) = &step.tool_id {
                    let tool = WorkflowTool {
                        tool_id: tool_id.clone(),
                        tool_version: step.tool_version.clone(),
                    };
                    if !tools.contains(&tool) {
                        tools.push(tool);
                    }
                }
            }
            _ => {}
        }
    }
}
