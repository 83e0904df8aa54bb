use crate::model::{Audit, CustomData, Id};
use serde::{Deserialize, Serialize};

/// A named line of history inside a project (a "ref" in the legacy API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Composite `org:project:branch`
    pub id: Id,
    pub org: Id,
    pub project: Id,
    pub name: String,
    /// Local id of the branch this one was created from
    pub parent: Option<Id>,
    #[serde(default)]
    pub tag: bool,
    #[serde(default)]
    pub custom: CustomData,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Branch {
    pub fn local_id(&self) -> &str {
        crate::model::composite_id::local_id(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchInput {
    pub id: Id,
    pub name: String,
    pub parent: Option<Id>,
    pub tag: bool,
    #[serde(default)]
    pub custom: CustomData,
}
