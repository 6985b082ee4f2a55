use serde::{Deserialize, Serialize};

/// Permission levels a group can hold on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionLevel {
    Read = 4,
    ReadExecute = 5,
    ReadWriteExecute = 7,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPermission {
    pub group_id: i64,
    pub level: PermissionLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<GroupPermission>,
}

impl Project {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            permissions: Vec::new(),
        }
    }

    pub fn with_permission(mut self, group_id: i64, level: PermissionLevel) -> Self {
        self.permissions.push(GroupPermission { group_id, level });
        self
    }

    /// Highest level granted to `group_id`, if any.
    pub fn level_for(&self, group_id: i64) -> Option<PermissionLevel> {
        self.permissions
            .iter()
            .filter(|p| p.group_id == group_id)
            .map(|p| p.level)
            .max()
    }
}

/// A workflow node run: the parent of the jobs a worker executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRun {
    pub id: i64,
    pub project_key: String,
    pub workflow_name: String,
}

/// Owning context resolved for a job before its result is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub project_key: String,
    pub node_run_id: i64,
}
