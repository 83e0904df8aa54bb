use crate::model::{Audit, CustomData, Id};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Org {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub custom: CustomData,
    #[serde(flatten)]
    pub audit: Audit,
}

/// Create/replace payload for an organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgInput {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub custom: CustomData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Composite `org:project`
    pub id: Id,
    pub org: Id,
    pub name: String,
    #[serde(default)]
    pub custom: CustomData,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Project {
    pub fn local_id(&self) -> &str {
        crate::model::composite_id::local_id(&self.id)
    }
}

/// Create/replace payload for a project; `id` is the local project id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInput {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub custom: CustomData,
}
