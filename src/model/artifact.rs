use crate::model::{Audit, CustomData, Id};
use serde::{Deserialize, Serialize};

/// Binary artifact metadata; the bytes live in a content-addressed blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Composite `org:project:branch:artifact`
    pub id: Id,
    pub org: Id,
    pub project: Id,
    pub branch: Id,
    #[serde(default)]
    pub name: String,
    pub content_type: String,
    /// Blob id (SHA-256 hex of the content)
    pub location: String,
    #[serde(default)]
    pub custom: CustomData,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Artifact {
    pub fn local_id(&self) -> &str {
        crate::model::composite_id::local_id(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInput {
    pub id: Id,
    pub name: Option<String>,
    pub content_type: String,
    pub location: String,
    #[serde(default)]
    pub custom: CustomData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub id: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Blob {
    /// Content-addressed blob: the id is the SHA-256 of the content type
    /// and the bytes, so one id always serves one content type
    pub fn new(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        use sha2::{Digest, Sha256};

        let content_type = content_type.into();
        let mut hasher = Sha256::new();
        hasher.update(content_type.as_bytes());
        hasher.update([0u8]);
        hasher.update(&data);
        Self {
            id: hex::encode(hasher.finalize()),
            content_type,
            data,
        }
    }
}
