use axum::{
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::errors::{reject, ApiError, ApiResult};
use crate::api::extract::{JsonBody, MultipartBody, PathParams};
use crate::api::handlers::{branch_scope, project_scope, require_records, AppState};
use crate::error::{AdapterError, Result};
use crate::logic::format::{self, LegacyObject};
use crate::model::{Blob, Id, UserContext};
use crate::store::traits::Backend;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ArtifactsPayload {
    #[serde(default)]
    pub artifacts: Vec<LegacyObject>,
}

const FILE_FIELD: &str = "file";

/// Blob and metadata fields of an artifact upload
struct Upload {
    blob: Blob,
    fields: LegacyObject,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    let mut file: Option<(Vec<u8>, Option<String>)> = None;
    let mut fields = LegacyObject::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AdapterError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == FILE_FIELD {
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| AdapterError::bad_request(format!("Invalid file part: {}", e)))?;
            file = Some((data.to_vec(), content_type));
        } else if !name.is_empty() {
            let text = field
                .text()
                .await
                .map_err(|e| AdapterError::bad_request(format!("Invalid field '{}': {}", name, e)))?;
            fields.insert(name, Value::String(text));
        }
    }

    let (data, part_type) =
        file.ok_or_else(|| AdapterError::bad_request("Artifact upload requires a 'file' part"))?;
    let declared = format::optional_str(&fields, "contentType")?;
    let content_type =
        format::artifact::content_type_or_default(declared.as_deref().or(part_type.as_deref()));
    Ok(Upload {
        blob: Blob::new(content_type, data),
        fields,
    })
}

pub async fn upload_artifact<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id)): PathParams<(Id, Id)>,
    user: UserContext,
    MultipartBody(multipart): MultipartBody,
) -> ApiResult<ArtifactsPayload> {
    let written = async {
        let Upload { blob, fields } = read_upload(multipart).await?;
        let scope = branch_scope(&state.store, &user, &project_id, &ref_id).await?;
        let input = format::artifact::to_backend(&fields, &blob)?;
        scope.element_key(&input.id)?;
        info!(
            "Storing artifact '{}' ({} bytes, {})",
            input.id,
            blob.data.len(),
            blob.content_type
        );
        state.store.put_blob(&user, &scope.project(), blob).await?;
        state
            .store
            .create_or_replace_artifacts(&user, &scope, vec![input])
            .await
    }
    .await
    .map_err(reject)?;
    Ok(Json(ArtifactsPayload {
        artifacts: written.iter().map(format::artifact::to_legacy).collect(),
    }))
}

/// `PUT .../artifacts`: look artifacts up by id
pub async fn get_artifacts_by_ids<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id)): PathParams<(Id, Id)>,
    user: UserContext,
    JsonBody(payload): JsonBody<ArtifactsPayload>,
) -> ApiResult<ArtifactsPayload> {
    let found = async {
        require_records(&payload.artifacts, "artifacts")?;
        let ids = payload
            .artifacts
            .iter()
            .map(|record| {
                format::optional_str(record, "id")?
                    .ok_or_else(|| AdapterError::bad_request("Every artifact must have an 'id'"))
            })
            .collect::<Result<Vec<_>>>()?;
        let scope = branch_scope(&state.store, &user, &project_id, &ref_id).await?;
        state.store.find_artifacts(&user, &scope, Some(ids.as_slice())).await
    }
    .await
    .map_err(reject)?;
    Ok(Json(ArtifactsPayload {
        artifacts: found.iter().map(format::artifact::to_legacy).collect(),
    }))
}

pub async fn get_artifact<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id, artifact_id)): PathParams<(Id, Id, Id)>,
    user: UserContext,
) -> ApiResult<ArtifactsPayload> {
    let found = async {
        let scope = branch_scope(&state.store, &user, &project_id, &ref_id).await?;
        let found = state
            .store
            .find_artifacts(&user, &scope, Some(std::slice::from_ref(&artifact_id)))
            .await?;
        if found.is_empty() {
            return Err(AdapterError::not_found(format!(
                "Artifact '{}' not found",
                artifact_id
            )));
        }
        Ok::<_, AdapterError>(found)
    }
    .await
    .map_err(reject)?;
    Ok(Json(ArtifactsPayload {
        artifacts: found.iter().map(format::artifact::to_legacy).collect(),
    }))
}

/// Raw blob bytes with their stored content type
pub async fn get_blob<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, _ref_id, blob_id)): PathParams<(Id, Id, String)>,
    user: UserContext,
) -> std::result::Result<Response, ApiError> {
    let blob = async {
        let scope = project_scope(&state.store, &user, &project_id).await?;
        state
            .store
            .get_blob(&user, &scope, &blob_id)
            .await?
            .ok_or_else(|| AdapterError::not_found(format!("Blob '{}' not found", blob_id)))
    }
    .await
    .map_err(reject)?;
    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.data).into_response())
}

