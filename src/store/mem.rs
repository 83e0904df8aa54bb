use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::error::{AdapterError, Result};
use crate::logic::element_filter;
use crate::model::{
    composite_id, Artifact, ArtifactInput, Blob, Branch, BranchInput, BranchScope, Element,
    ElementInput, ElementQuery, Id, Org, OrgInput, Project, ProjectInput, ProjectScope,
    UserContext,
};
use crate::store::records;
use crate::store::traits::{
    ArtifactStore, Backend, BranchStore, ElementStore, OrgStore, ProjectStore,
};

#[derive(Debug, Default)]
struct MemoryState {
    orgs: BTreeMap<Id, Org>,
    /// Keyed by composite id throughout
    projects: BTreeMap<Id, Project>,
    branches: BTreeMap<Id, Branch>,
    elements: BTreeMap<Id, Element>,
    artifacts: BTreeMap<Id, Artifact>,
    /// Keyed by (project key, blob id)
    blobs: BTreeMap<(Id, String), Blob>,
}

impl MemoryState {
    fn require_org(&self, org_id: &str) -> Result<()> {
        if self.orgs.contains_key(org_id) {
            Ok(())
        } else {
            Err(AdapterError::not_found(format!("Org '{}' not found", org_id)))
        }
    }

    fn require_project(&self, scope: &ProjectScope) -> Result<()> {
        self.require_org(&scope.org_id)?;
        if self.projects.contains_key(&scope.key()) {
            Ok(())
        } else {
            Err(AdapterError::not_found(format!(
                "Project '{}' not found",
                scope.project_id
            )))
        }
    }

    fn require_branch(&self, scope: &BranchScope) -> Result<()> {
        self.require_project(&scope.project())?;
        if self.branches.contains_key(&scope.key()) {
            Ok(())
        } else {
            Err(AdapterError::not_found(format!(
                "Branch '{}' not found",
                scope.branch_id
            )))
        }
    }

    /// Entries whose composite key starts with `prefix:`
    fn scoped<'a, T>(map: &'a BTreeMap<Id, T>, prefix: &str) -> impl Iterator<Item = &'a T> + 'a {
        let prefix = format!("{}{}", prefix, composite_id::DELIMITER);
        map.range(prefix.clone()..)
            .take_while(move |(key, _)| key.starts_with(&prefix))
            .map(|(_, value)| value)
    }
}

fn selected(ids: Option<&[Id]>, local_id: &str) -> bool {
    ids.map_or(true, |ids| ids.iter().any(|id| id == local_id))
}

/// Build every record of a write batch without touching the stored map.
/// A later entry with the same key replaces the earlier one of the batch.
fn stage_batch<I, T>(
    stored: &BTreeMap<Id, T>,
    inputs: Vec<I>,
    key_of: impl Fn(&I) -> Result<Id>,
    mut build: impl FnMut(I, Option<&T>) -> Result<T>,
) -> Result<Vec<(Id, T)>> {
    let mut staged: Vec<(Id, T)> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let key = key_of(&input)?;
        let existing = staged
            .iter()
            .rev()
            .find(|(staged_key, _)| *staged_key == key)
            .map(|(_, record)| record)
            .or_else(|| stored.get(&key));
        let record = build(input, existing)?;
        staged.push((key, record));
    }
    Ok(staged)
}

/// Write a fully validated batch
fn commit_batch<T: Clone>(stored: &mut BTreeMap<Id, T>, staged: Vec<(Id, T)>) -> Vec<T> {
    staged
        .into_iter()
        .map(|(key, record)| {
            stored.insert(key, record.clone());
            record
        })
        .collect()
}

/// In-process backend used for development and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl OrgStore for MemoryStore {
    async fn find_orgs(&self, _user: &UserContext, ids: Option<&[Id]>) -> Result<Vec<Org>> {
        let state = self.state.read();
        Ok(match ids {
            Some(ids) => ids.iter().filter_map(|id| state.orgs.get(id).cloned()).collect(),
            None => state.orgs.values().cloned().collect(),
        })
    }

    async fn create_or_replace_orgs(
        &self,
        user: &UserContext,
        orgs: Vec<OrgInput>,
    ) -> Result<Vec<Org>> {
        let mut state = self.state.write();
        let staged = stage_batch(
            &state.orgs,
            orgs,
            |input| Ok(input.id.clone()),
            |input, existing| records::org_record(user, input, existing),
        )?;
        Ok(commit_batch(&mut state.orgs, staged))
    }
}

#[async_trait::async_trait]
impl ProjectStore for MemoryStore {
    async fn find_projects(
        &self,
        _user: &UserContext,
        org_id: &Id,
        ids: Option<&[Id]>,
    ) -> Result<Vec<Project>> {
        let state = self.state.read();
        state.require_org(org_id)?;
        Ok(MemoryState::scoped(&state.projects, org_id)
            .filter(|project| selected(ids, project.local_id()))
            .cloned()
            .collect())
    }

    async fn find_all_projects(&self, _user: &UserContext) -> Result<Vec<Project>> {
        Ok(self.state.read().projects.values().cloned().collect())
    }

    async fn lookup_project(&self, _user: &UserContext, project_id: &Id) -> Result<Option<Project>> {
        let state = self.state.read();
        Ok(state
            .projects
            .values()
            .find(|project| project.local_id() == project_id)
            .cloned())
    }

    async fn create_or_replace_projects(
        &self,
        user: &UserContext,
        org_id: &Id,
        projects: Vec<ProjectInput>,
    ) -> Result<Vec<Project>> {
        let mut state = self.state.write();
        state.require_org(org_id)?;
        let staged = stage_batch(
            &state.projects,
            projects,
            |input| Ok(ProjectScope::new(org_id.clone(), input.id.clone())?.key()),
            |input, existing| {
                let scope = ProjectScope::new(org_id.clone(), input.id.clone())?;
                Ok(records::project_record(user, &scope, input, existing))
            },
        )?;
        let masters = staged
            .iter()
            .map(|(_, project)| {
                records::master_branch(user, &ProjectScope::new(org_id.clone(), project.local_id())?)
            })
            .collect::<Result<Vec<_>>>()?;

        for master in masters {
            state.branches.entry(master.id.clone()).or_insert(master);
        }
        Ok(commit_batch(&mut state.projects, staged))
    }
}

#[async_trait::async_trait]
impl BranchStore for MemoryStore {
    async fn find_branches(
        &self,
        _user: &UserContext,
        scope: &ProjectScope,
        ids: Option<&[Id]>,
    ) -> Result<Vec<Branch>> {
        let state = self.state.read();
        state.require_project(scope)?;
        Ok(MemoryState::scoped(&state.branches, &scope.key())
            .filter(|branch| selected(ids, branch.local_id()))
            .cloned()
            .collect())
    }

    async fn create_branches(
        &self,
        user: &UserContext,
        scope: &ProjectScope,
        branches: Vec<BranchInput>,
    ) -> Result<Vec<Branch>> {
        let mut state = self.state.write();
        state.require_project(scope)?;
        let mut written: Vec<Branch> = Vec::with_capacity(branches.len());
        let mut copies: Vec<Element> = Vec::new();
        for input in branches {
            let branch = records::branch_record(user, scope, input)?;
            let is_known = |key: &str| {
                state.branches.contains_key(key) || written.iter().any(|b| b.id == key)
            };
            if is_known(&branch.id) {
                return Err(AdapterError::bad_request(format!(
                    "Branch '{}' already exists",
                    branch.local_id()
                )));
            }
            if let Some(parent) = &branch.parent {
                let parent_key = scope.branch(parent.clone())?.key();
                if !is_known(&parent_key) {
                    return Err(AdapterError::not_found(format!(
                        "Parent branch '{}' not found",
                        parent
                    )));
                }
                // A new branch starts as a copy of its parent's elements
                let target = scope.branch(branch.local_id())?;
                let inherited = MemoryState::scoped(&state.elements, &parent_key)
                    .chain(copies.iter().filter(|copy| copy.branch == *parent))
                    .map(|element| records::branch_copy(element, &target))
                    .collect::<Result<Vec<_>>>()?;
                copies.extend(inherited);
            }
            written.push(branch);
        }

        for copy in copies {
            state.elements.insert(copy.id.clone(), copy);
        }
        for branch in &written {
            state.branches.insert(branch.id.clone(), branch.clone());
        }
        Ok(written)
    }
}

#[async_trait::async_trait]
impl ElementStore for MemoryStore {
    async fn find_elements(
        &self,
        _user: &UserContext,
        scope: &BranchScope,
        query: ElementQuery,
    ) -> Result<Vec<Element>> {
        let state = self.state.read();
        state.require_branch(scope)?;
        let elements = match query {
            ElementQuery::All => MemoryState::scoped(&state.elements, &scope.key())
                .cloned()
                .collect(),
            ElementQuery::Ids(ids) => ids
                .iter()
                .filter_map(|id| scope.element_key(id).ok())
                .filter_map(|key| state.elements.get(&key).cloned())
                .collect(),
            ElementQuery::Keys(keys) => keys
                .iter()
                .filter_map(|key| state.elements.get(key).cloned())
                .collect(),
            ElementQuery::Filter(filter) => MemoryState::scoped(&state.elements, &scope.key())
                .filter(|element| element_filter::matches(element, &filter))
                .cloned()
                .collect(),
        };
        Ok(elements)
    }

    async fn create_or_replace_elements(
        &self,
        user: &UserContext,
        scope: &BranchScope,
        elements: Vec<ElementInput>,
    ) -> Result<Vec<Element>> {
        let mut state = self.state.write();
        state.require_branch(scope)?;
        let staged = stage_batch(
            &state.elements,
            elements,
            |input| scope.element_key(&input.id),
            |input, existing| records::element_record(user, scope, input, existing),
        )?;
        Ok(commit_batch(&mut state.elements, staged))
    }

    async fn remove_elements(
        &self,
        _user: &UserContext,
        scope: &BranchScope,
        ids: &[Id],
    ) -> Result<Vec<Element>> {
        let mut state = self.state.write();
        state.require_branch(scope)?;
        let mut removed = Vec::new();
        for id in ids {
            let key = scope.element_key(id)?;
            if let Some(element) = state.elements.remove(&key) {
                removed.push(element);
            }
        }
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl ArtifactStore for MemoryStore {
    async fn find_artifacts(
        &self,
        _user: &UserContext,
        scope: &BranchScope,
        ids: Option<&[Id]>,
    ) -> Result<Vec<Artifact>> {
        let state = self.state.read();
        state.require_branch(scope)?;
        Ok(MemoryState::scoped(&state.artifacts, &scope.key())
            .filter(|artifact| selected(ids, artifact.local_id()))
            .cloned()
            .collect())
    }

    async fn create_or_replace_artifacts(
        &self,
        user: &UserContext,
        scope: &BranchScope,
        artifacts: Vec<ArtifactInput>,
    ) -> Result<Vec<Artifact>> {
        let mut state = self.state.write();
        state.require_branch(scope)?;
        let staged = stage_batch(
            &state.artifacts,
            artifacts,
            |input| scope.element_key(&input.id),
            |input, existing| records::artifact_record(user, scope, input, existing),
        )?;
        Ok(commit_batch(&mut state.artifacts, staged))
    }

    async fn put_blob(&self, _user: &UserContext, scope: &ProjectScope, blob: Blob) -> Result<()> {
        let mut state = self.state.write();
        state.require_project(scope)?;
        // Ids are content addresses, so an existing entry is already identical
        state
            .blobs
            .entry((scope.key(), blob.id.clone()))
            .or_insert(blob);
        Ok(())
    }

    async fn get_blob(
        &self,
        _user: &UserContext,
        scope: &ProjectScope,
        blob_id: &str,
    ) -> Result<Option<Blob>> {
        let state = self.state.read();
        state.require_project(scope)?;
        Ok(state.blobs.get(&(scope.key(), blob_id.to_string())).cloned())
    }
}

impl Backend for MemoryStore {}
