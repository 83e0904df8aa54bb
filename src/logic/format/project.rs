use serde_json::Value;

use super::{id_or_generate, optional_str, provenance, LegacyObject, PROJECT_FIELDS};
use crate::error::Result;
use crate::model::{Project, ProjectInput};

pub fn to_backend(legacy: &LegacyObject) -> Result<ProjectInput> {
    let id = id_or_generate(legacy)?;
    Ok(ProjectInput {
        name: optional_str(legacy, "name")?.unwrap_or_else(|| id.clone()),
        id,
        custom: PROJECT_FIELDS.split_custom(legacy),
    })
}

pub fn to_legacy(project: &Project) -> LegacyObject {
    let mut legacy = LegacyObject::new();
    legacy.insert("id".into(), Value::String(project.local_id().to_string()));
    legacy.insert("name".into(), Value::String(project.name.clone()));
    legacy.insert("orgId".into(), Value::String(project.org.clone()));
    provenance(&mut legacy, &project.audit);
    PROJECT_FIELDS.merge_custom(&mut legacy, &project.custom);
    legacy
        .entry("type")
        .or_insert_with(|| Value::String("Project".to_string()));
    legacy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Audit;
    use serde_json::json;

    #[test]
    fn test_outbound_uses_local_id_and_org() {
        let project = Project {
            id: "org1:proj1".to_string(),
            org: "org1".to_string(),
            name: "P".to_string(),
            custom: json!({"categoryId": "c1"}).as_object().cloned().unwrap(),
            audit: Audit::created_by("alice"),
        };
        let out = to_legacy(&project);
        assert_eq!(out["id"], json!("proj1"));
        assert_eq!(out["orgId"], json!("org1"));
        assert_eq!(out["categoryId"], json!("c1"));
        assert_eq!(out["type"], json!("Project"));
    }

    #[test]
    fn test_inbound_drops_org_id() {
        let input =
            to_backend(json!({"id": "p", "orgId": "o", "schema": "default"}).as_object().unwrap())
                .unwrap();
        assert!(!input.custom.contains_key("orgId"));
        assert_eq!(input.custom["schema"], json!("default"));
    }
}
