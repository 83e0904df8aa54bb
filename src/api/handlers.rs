use axum::{extract::State, http::StatusCode, response::Json};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::errors::{reject, ApiResult, ErrorResponse};
use crate::api::extract::{JsonBody, PathParams};
use crate::api::session::{encode_ticket, SessionRegistry};
use crate::error::{AdapterError, Result};
use crate::logic::format::{self, LegacyObject};
use crate::model::{BranchScope, Id, ProjectScope, UserContext};
use crate::store::traits::Backend;

/// Shared state of every handler
pub struct AdapterState<S> {
    pub store: S,
    pub sessions: SessionRegistry,
}

impl<S> AdapterState<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            sessions: SessionRegistry::new(),
        }
    }
}

pub type AppState<S> = Arc<AdapterState<S>>;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OrgsPayload {
    #[serde(default)]
    pub orgs: Vec<LegacyObject>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProjectsPayload {
    #[serde(default)]
    pub projects: Vec<LegacyObject>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RefsPayload {
    #[serde(default)]
    pub refs: Vec<LegacyObject>,
}

/// Scope of a project addressed without its org
pub async fn project_scope<S: Backend>(
    store: &S,
    user: &UserContext,
    project_id: &Id,
) -> Result<ProjectScope> {
    let project = store
        .lookup_project(user, project_id)
        .await?
        .ok_or_else(|| AdapterError::not_found(format!("Project '{}' not found", project_id)))?;
    ProjectScope::new(project.org, project_id.clone())
}

pub async fn branch_scope<S: Backend>(
    store: &S,
    user: &UserContext,
    project_id: &Id,
    ref_id: &Id,
) -> Result<BranchScope> {
    project_scope(store, user, project_id)
        .await?
        .branch(ref_id.clone())
}

/// Bodies must carry at least one record
pub fn require_records<T>(records: &[T], kind: &str) -> Result<()> {
    if records.is_empty() {
        return Err(AdapterError::bad_request(format!("No {} provided", kind)));
    }
    Ok(())
}

// Sessions

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketData {
    pub ticket: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub data: TicketData,
}

#[derive(Debug, Deserialize)]
pub struct TicketRequest {
    pub ticket: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketResponse {
    pub username: String,
}

pub async fn login<S: Backend>(
    State(state): State<AppState<S>>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<LoginResponse> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(reject(AdapterError::bad_request(
            "Username and password are required",
        )));
    }
    let ticket = state.sessions.issue(&request.username);
    info!("Issued session ticket for '{}'", request.username);
    Ok(Json(LoginResponse {
        data: TicketData {
            ticket: encode_ticket(&ticket),
        },
    }))
}

pub async fn check_ticket<S: Backend>(
    State(state): State<AppState<S>>,
    JsonBody(request): JsonBody<TicketRequest>,
) -> ApiResult<TicketResponse> {
    match state.sessions.resolve(&request.ticket) {
        Some(username) => Ok(Json(TicketResponse { username })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Ticket not found")),
        )),
    }
}

// Orgs

pub async fn list_orgs<S: Backend>(
    State(state): State<AppState<S>>,
    user: UserContext,
) -> ApiResult<OrgsPayload> {
    let orgs = state.store.find_orgs(&user, None).await.map_err(reject)?;
    Ok(Json(OrgsPayload {
        orgs: orgs.iter().map(format::org::to_legacy).collect(),
    }))
}

pub async fn get_org<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams(org_id): PathParams<Id>,
    user: UserContext,
) -> ApiResult<OrgsPayload> {
    let orgs = state
        .store
        .find_orgs(&user, Some(std::slice::from_ref(&org_id)))
        .await
        .map_err(reject)?;
    if orgs.is_empty() {
        return Err(reject(AdapterError::not_found(format!(
            "Org '{}' not found",
            org_id
        ))));
    }
    Ok(Json(OrgsPayload {
        orgs: orgs.iter().map(format::org::to_legacy).collect(),
    }))
}

pub async fn create_orgs<S: Backend>(
    State(state): State<AppState<S>>,
    user: UserContext,
    JsonBody(payload): JsonBody<OrgsPayload>,
) -> ApiResult<OrgsPayload> {
    let written = async {
        require_records(&payload.orgs, "orgs")?;
        let inputs = payload
            .orgs
            .iter()
            .map(format::org::to_backend)
            .collect::<Result<Vec<_>>>()?;
        state.store.create_or_replace_orgs(&user, inputs).await
    }
    .await
    .map_err(reject)?;
    Ok(Json(OrgsPayload {
        orgs: written.iter().map(format::org::to_legacy).collect(),
    }))
}

// Projects

pub async fn list_org_projects<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams(org_id): PathParams<Id>,
    user: UserContext,
) -> ApiResult<ProjectsPayload> {
    let projects = state
        .store
        .find_projects(&user, &org_id, None)
        .await
        .map_err(reject)?;
    Ok(Json(ProjectsPayload {
        projects: projects.iter().map(format::project::to_legacy).collect(),
    }))
}

pub async fn create_projects<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams(org_id): PathParams<Id>,
    user: UserContext,
    JsonBody(payload): JsonBody<ProjectsPayload>,
) -> ApiResult<ProjectsPayload> {
    let written = async {
        require_records(&payload.projects, "projects")?;
        let inputs = payload
            .projects
            .iter()
            .map(format::project::to_backend)
            .collect::<Result<Vec<_>>>()?;
        state
            .store
            .create_or_replace_projects(&user, &org_id, inputs)
            .await
    }
    .await
    .map_err(reject)?;
    Ok(Json(ProjectsPayload {
        projects: written.iter().map(format::project::to_legacy).collect(),
    }))
}

pub async fn list_projects<S: Backend>(
    State(state): State<AppState<S>>,
    user: UserContext,
) -> ApiResult<ProjectsPayload> {
    let projects = state
        .store
        .find_all_projects(&user)
        .await
        .map_err(reject)?;
    Ok(Json(ProjectsPayload {
        projects: projects.iter().map(format::project::to_legacy).collect(),
    }))
}

/// A project that does not exist reads as an empty list, not a 404
pub async fn get_project<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams(project_id): PathParams<Id>,
    user: UserContext,
) -> ApiResult<ProjectsPayload> {
    match state.store.lookup_project(&user, &project_id).await {
        Ok(project) => Ok(Json(ProjectsPayload {
            projects: project.iter().map(format::project::to_legacy).collect(),
        })),
        Err(AdapterError::NotFound(message)) => {
            info!("Project lookup found nothing: {}", message);
            Ok(Json(ProjectsPayload::default()))
        }
        Err(e) => Err(reject(e)),
    }
}

// Refs

pub async fn list_refs<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams(project_id): PathParams<Id>,
    user: UserContext,
) -> ApiResult<RefsPayload> {
    let branches = async {
        let scope = project_scope(&state.store, &user, &project_id).await?;
        state.store.find_branches(&user, &scope, None).await
    }
    .await
    .map_err(reject)?;
    Ok(Json(RefsPayload {
        refs: branches.iter().map(format::branch::to_legacy).collect(),
    }))
}

pub async fn get_ref<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id)): PathParams<(Id, Id)>,
    user: UserContext,
) -> ApiResult<RefsPayload> {
    let branches = async {
        let scope = project_scope(&state.store, &user, &project_id).await?;
        let branches = state
            .store
            .find_branches(&user, &scope, Some(std::slice::from_ref(&ref_id)))
            .await?;
        if branches.is_empty() {
            return Err(AdapterError::not_found(format!("Ref '{}' not found", ref_id)));
        }
        Ok::<_, AdapterError>(branches)
    }
    .await
    .map_err(reject)?;
    Ok(Json(RefsPayload {
        refs: branches.iter().map(format::branch::to_legacy).collect(),
    }))
}

pub async fn create_refs<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams(project_id): PathParams<Id>,
    user: UserContext,
    JsonBody(payload): JsonBody<RefsPayload>,
) -> ApiResult<RefsPayload> {
    let written = async {
        require_records(&payload.refs, "refs")?;
        let scope = project_scope(&state.store, &user, &project_id).await?;
        let inputs = payload
            .refs
            .iter()
            .map(format::branch::to_backend)
            .collect::<Result<Vec<_>>>()?;
        state.store.create_branches(&user, &scope, inputs).await
    }
    .await
    .map_err(reject)?;
    Ok(Json(RefsPayload {
        refs: written.iter().map(format::branch::to_legacy).collect(),
    }))
}
