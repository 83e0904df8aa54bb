//! Hierarchical backend identifiers: `org:project[:branch[:element]]`.
//!
//! The backend keys everything below an organization by a composite id. The
//! legacy API only ever sees the last segment.

use crate::error::{AdapterError, Result};
use crate::model::Id;
use serde::{Deserialize, Serialize};

/// Reserved segment separator
pub const DELIMITER: char = ':';

fn check_segment(segment: &str) -> Result<&str> {
    if segment.is_empty() || segment.contains(DELIMITER) {
        return Err(AdapterError::MalformedIdentifier(segment.to_string()));
    }
    Ok(segment)
}

/// Join segments in fixed order, dropping trailing absent ones.
pub fn build(
    org_id: &str,
    project_id: &str,
    branch_id: Option<&str>,
    element_id: Option<&str>,
) -> Result<String> {
    let mut segments = vec![check_segment(org_id)?, check_segment(project_id)?];
    match (branch_id, element_id) {
        (Some(branch), Some(element)) => {
            segments.push(check_segment(branch)?);
            segments.push(check_segment(element)?);
        }
        (Some(branch), None) => segments.push(check_segment(branch)?),
        (None, Some(element)) => {
            return Err(AdapterError::MalformedIdentifier(format!(
                "element '{}' requires a branch segment",
                element
            )))
        }
        (None, None) => {}
    }
    Ok(segments.join(&DELIMITER.to_string()))
}

/// Split a composite id back into its segments.
pub fn parse(composite_id: &str) -> Result<Vec<String>> {
    if !composite_id.contains(DELIMITER) {
        return Err(AdapterError::MalformedIdentifier(composite_id.to_string()));
    }
    Ok(composite_id.split(DELIMITER).map(str::to_string).collect())
}

/// The externally visible id: the last segment.
pub fn local_id(composite_id: &str) -> &str {
    composite_id.rsplit(DELIMITER).next().unwrap_or(composite_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectScope {
    pub org_id: Id,
    pub project_id: Id,
}

impl ProjectScope {
    pub fn new(org_id: impl Into<Id>, project_id: impl Into<Id>) -> Result<Self> {
        let scope = Self {
            org_id: org_id.into(),
            project_id: project_id.into(),
        };
        build(&scope.org_id, &scope.project_id, None, None)?;
        Ok(scope)
    }

    pub fn key(&self) -> String {
        format!("{}{}{}", self.org_id, DELIMITER, self.project_id)
    }

    pub fn branch(&self, branch_id: impl Into<Id>) -> Result<BranchScope> {
        BranchScope::new(self.org_id.clone(), self.project_id.clone(), branch_id)
    }

    pub fn branch_key(&self, branch_id: &str) -> Result<String> {
        build(&self.org_id, &self.project_id, Some(branch_id), None)
    }
}

/// Org/project/branch triple every element and artifact lives under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchScope {
    pub org_id: Id,
    pub project_id: Id,
    pub branch_id: Id,
}

impl BranchScope {
    pub fn new(
        org_id: impl Into<Id>,
        project_id: impl Into<Id>,
        branch_id: impl Into<Id>,
    ) -> Result<Self> {
        let scope = Self {
            org_id: org_id.into(),
            project_id: project_id.into(),
            branch_id: branch_id.into(),
        };
        build(&scope.org_id, &scope.project_id, Some(&scope.branch_id), None)?;
        Ok(scope)
    }

    pub fn project(&self) -> ProjectScope {
        ProjectScope {
            org_id: self.org_id.clone(),
            project_id: self.project_id.clone(),
        }
    }

    pub fn key(&self) -> String {
        [&self.org_id, &self.project_id, &self.branch_id]
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(&DELIMITER.to_string())
    }

    /// Composite id of an element (or artifact) in this branch
    pub fn element_key(&self, local_id: &str) -> Result<String> {
        build(
            &self.org_id,
            &self.project_id,
            Some(&self.branch_id),
            Some(local_id),
        )
    }
}
