use serde_json::Value;

use super::{id_or_generate, optional_str, provenance, LegacyObject, REF_FIELDS};
use crate::error::Result;
use crate::model::{Branch, BranchInput, MASTER_BRANCH};

/// Legacy refs without a declared parent branch off master
pub fn to_backend(legacy: &LegacyObject) -> Result<BranchInput> {
    let id = id_or_generate(legacy)?;
    Ok(BranchInput {
        name: optional_str(legacy, "name")?.unwrap_or_else(|| id.clone()),
        parent: Some(optional_str(legacy, "parentRefId")?.unwrap_or_else(|| MASTER_BRANCH.to_string())),
        tag: optional_str(legacy, "type")?.as_deref() == Some("Tag"),
        id,
        custom: REF_FIELDS.split_custom(legacy),
    })
}

pub fn to_legacy(branch: &Branch) -> LegacyObject {
    let mut legacy = LegacyObject::new();
    legacy.insert("id".into(), Value::String(branch.local_id().to_string()));
    legacy.insert("name".into(), Value::String(branch.name.clone()));
    legacy.insert(
        "parentRefId".into(),
        branch.parent.clone().map(Value::String).unwrap_or(Value::Null),
    );
    legacy.insert(
        "type".into(),
        Value::String(if branch.tag { "Tag" } else { "Branch" }.to_string()),
    );
    legacy.insert("_projectId".into(), Value::String(branch.project.clone()));
    provenance(&mut legacy, &branch.audit);
    REF_FIELDS.merge_custom(&mut legacy, &branch.custom);
    legacy
}
