use serde_json::Value;

use super::{id_or_generate, optional_str, provenance, LegacyObject, ARTIFACT_FIELDS};
use crate::error::Result;
use crate::model::{Artifact, ArtifactInput, Blob};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata for an uploaded blob; the record's own `contentType` wins over
/// the upload's
pub fn to_backend(legacy: &LegacyObject, blob: &Blob) -> Result<ArtifactInput> {
    Ok(ArtifactInput {
        id: id_or_generate(legacy)?,
        name: optional_str(legacy, "name")?,
        content_type: optional_str(legacy, "contentType")?
            .unwrap_or_else(|| blob.content_type.clone()),
        location: blob.id.clone(),
        custom: ARTIFACT_FIELDS.split_custom(legacy),
    })
}

pub fn content_type_or_default(content_type: Option<&str>) -> String {
    content_type
        .filter(|ct| !ct.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// Path, relative to the API root, the blob can be fetched from
pub fn artifact_location(artifact: &Artifact) -> String {
    format!(
        "projects/{}/refs/{}/artifacts/blob/{}",
        artifact.project, artifact.branch, artifact.location
    )
}

pub fn to_legacy(artifact: &Artifact) -> LegacyObject {
    let mut legacy = LegacyObject::new();
    legacy.insert("id".into(), Value::String(artifact.local_id().to_string()));
    legacy.insert("name".into(), Value::String(artifact.name.clone()));
    legacy.insert(
        "contentType".into(),
        Value::String(artifact.content_type.clone()),
    );
    legacy.insert(
        "artifactLocation".into(),
        Value::String(artifact_location(artifact)),
    );
    legacy.insert("_projectId".into(), Value::String(artifact.project.clone()));
    legacy.insert("_refId".into(), Value::String(artifact.branch.clone()));
    provenance(&mut legacy, &artifact.audit);
    ARTIFACT_FIELDS.merge_custom(&mut legacy, &artifact.custom);
    legacy
}
