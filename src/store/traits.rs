use crate::error::Result;
use crate::model::{
    Artifact, ArtifactInput, Blob, Branch, BranchInput, BranchScope, Element, ElementInput,
    ElementQuery, Id, Org, OrgInput, Project, ProjectInput, ProjectScope, UserContext,
};

/// Organization controller of the backend
#[async_trait::async_trait]
pub trait OrgStore: Send + Sync {
    /// All orgs, or only the listed ids
    async fn find_orgs(&self, user: &UserContext, ids: Option<&[Id]>) -> Result<Vec<Org>>;
    async fn create_or_replace_orgs(&self, user: &UserContext, orgs: Vec<OrgInput>)
        -> Result<Vec<Org>>;
}

#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    /// Projects of one org (`NotFound` if the org is missing), optionally by local id
    async fn find_projects(
        &self,
        user: &UserContext,
        org_id: &Id,
        ids: Option<&[Id]>,
    ) -> Result<Vec<Project>>;
    /// Projects across every org
    async fn find_all_projects(&self, user: &UserContext) -> Result<Vec<Project>>;
    /// Locate a project by local id without knowing its org
    async fn lookup_project(&self, user: &UserContext, project_id: &Id) -> Result<Option<Project>>;
    /// Creating a project also creates its master branch
    async fn create_or_replace_projects(
        &self,
        user: &UserContext,
        org_id: &Id,
        projects: Vec<ProjectInput>,
    ) -> Result<Vec<Project>>;
}

#[async_trait::async_trait]
pub trait BranchStore: Send + Sync {
    async fn find_branches(
        &self,
        user: &UserContext,
        scope: &ProjectScope,
        ids: Option<&[Id]>,
    ) -> Result<Vec<Branch>>;
    async fn create_branches(
        &self,
        user: &UserContext,
        scope: &ProjectScope,
        branches: Vec<BranchInput>,
    ) -> Result<Vec<Branch>>;
}

#[async_trait::async_trait]
pub trait ElementStore: Send + Sync {
    /// Lookups that match nothing return an empty vector
    async fn find_elements(
        &self,
        user: &UserContext,
        scope: &BranchScope,
        query: ElementQuery,
    ) -> Result<Vec<Element>>;
    async fn create_or_replace_elements(
        &self,
        user: &UserContext,
        scope: &BranchScope,
        elements: Vec<ElementInput>,
    ) -> Result<Vec<Element>>;
    /// Returns the removed elements
    async fn remove_elements(
        &self,
        user: &UserContext,
        scope: &BranchScope,
        ids: &[Id],
    ) -> Result<Vec<Element>>;
}

#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn find_artifacts(
        &self,
        user: &UserContext,
        scope: &BranchScope,
        ids: Option<&[Id]>,
    ) -> Result<Vec<Artifact>>;
    async fn create_or_replace_artifacts(
        &self,
        user: &UserContext,
        scope: &BranchScope,
        artifacts: Vec<ArtifactInput>,
    ) -> Result<Vec<Artifact>>;
    /// Blobs are shared by every branch of a project
    async fn put_blob(&self, user: &UserContext, scope: &ProjectScope, blob: Blob) -> Result<()>;
    async fn get_blob(
        &self,
        user: &UserContext,
        scope: &ProjectScope,
        blob_id: &str,
    ) -> Result<Option<Blob>>;
}

pub trait Backend:
    OrgStore + ProjectStore + BranchStore + ElementStore + ArtifactStore + Send + Sync
{
}
