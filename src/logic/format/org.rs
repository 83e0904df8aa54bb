use serde_json::Value;

use super::{id_or_generate, optional_str, provenance, LegacyObject, ORG_FIELDS};
use crate::error::Result;
use crate::model::{Org, OrgInput};

pub fn to_backend(legacy: &LegacyObject) -> Result<OrgInput> {
    let id = id_or_generate(legacy)?;
    Ok(OrgInput {
        name: optional_str(legacy, "name")?.unwrap_or_else(|| id.clone()),
        id,
        custom: ORG_FIELDS.split_custom(legacy),
    })
}

pub fn to_legacy(org: &Org) -> LegacyObject {
    let mut legacy = LegacyObject::new();
    legacy.insert("id".into(), Value::String(org.id.clone()));
    legacy.insert("name".into(), Value::String(org.name.clone()));
    provenance(&mut legacy, &org.audit);
    ORG_FIELDS.merge_custom(&mut legacy, &org.custom);
    legacy
}
