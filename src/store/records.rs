//! Turning write payloads into stored entities.
//!
//! Both stores share these so replace semantics (audit carry-over, parent
//! tristate, master branch bootstrap) do not drift between them.

use crate::error::{AdapterError, Result};
use crate::model::{
    composite_id, Artifact, ArtifactInput, Audit, Branch, BranchInput, BranchScope, Element,
    ElementInput, Org, OrgInput, Project, ProjectInput, ProjectScope, UserContext, MASTER_BRANCH,
};

/// Existing audit with a modification stamp, or a fresh one
fn stamped(user: &UserContext, existing: Option<&Audit>) -> Audit {
    let mut audit = existing
        .cloned()
        .unwrap_or_else(|| Audit::created_by(&user.user_id));
    audit.touch(&user.user_id);
    audit
}

pub fn org_record(user: &UserContext, input: OrgInput, existing: Option<&Org>) -> Result<Org> {
    if input.id.is_empty() || input.id.contains(composite_id::DELIMITER) {
        return Err(AdapterError::MalformedIdentifier(input.id));
    }
    Ok(Org {
        audit: stamped(user, existing.map(|org| &org.audit)),
        id: input.id,
        name: input.name,
        custom: input.custom,
    })
}

pub fn project_record(
    user: &UserContext,
    scope: &ProjectScope,
    input: ProjectInput,
    existing: Option<&Project>,
) -> Project {
    Project {
        id: scope.key(),
        org: scope.org_id.clone(),
        name: input.name,
        custom: input.custom,
        audit: stamped(user, existing.map(|project| &project.audit)),
    }
}

/// Branch every project starts with
pub fn master_branch(user: &UserContext, scope: &ProjectScope) -> Result<Branch> {
    Ok(Branch {
        id: scope.branch_key(MASTER_BRANCH)?,
        org: scope.org_id.clone(),
        project: scope.project_id.clone(),
        name: "Master".to_string(),
        parent: None,
        tag: false,
        custom: Default::default(),
        audit: Audit::created_by(&user.user_id),
    })
}

pub fn branch_record(user: &UserContext, scope: &ProjectScope, input: BranchInput) -> Result<Branch> {
    Ok(Branch {
        id: scope.branch_key(&input.id)?,
        org: scope.org_id.clone(),
        project: scope.project_id.clone(),
        name: input.name,
        parent: input.parent,
        tag: input.tag,
        custom: input.custom,
        audit: Audit::created_by(&user.user_id),
    })
}

/// Copy of an element re-keyed onto another branch
pub fn branch_copy(element: &Element, target: &BranchScope) -> Result<Element> {
    let mut copy = element.clone();
    copy.id = target.element_key(element.local_id())?;
    copy.branch = target.branch_id.clone();
    Ok(copy)
}

/// Replace semantics: every field comes from the input except the parent,
/// which an absent `ownerId` leaves as stored
pub fn element_record(
    user: &UserContext,
    scope: &BranchScope,
    input: ElementInput,
    existing: Option<&Element>,
) -> Result<Element> {
    let current_parent = existing.and_then(|element| element.parent.clone());
    Ok(Element {
        id: scope.element_key(&input.id)?,
        org: scope.org_id.clone(),
        project: scope.project_id.clone(),
        branch: scope.branch_id.clone(),
        name: input.name.unwrap_or_default(),
        documentation: input.documentation.unwrap_or_default(),
        parent: input.parent.apply_to(current_parent),
        element_type: input.element_type.unwrap_or_default(),
        custom: input.custom,
        audit: stamped(user, existing.map(|element| &element.audit)),
    })
}

pub fn artifact_record(
    user: &UserContext,
    scope: &BranchScope,
    input: ArtifactInput,
    existing: Option<&Artifact>,
) -> Result<Artifact> {
    Ok(Artifact {
        id: scope.element_key(&input.id)?,
        org: scope.org_id.clone(),
        project: scope.project_id.clone(),
        branch: scope.branch_id.clone(),
        name: input.name.unwrap_or_default(),
        content_type: input.content_type,
        location: input.location,
        custom: input.custom,
        audit: stamped(user, existing.map(|artifact| &artifact.audit)),
    })
}
