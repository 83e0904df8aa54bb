//! Transcoding between legacy wire records and backend entities.
//!
//! Legacy records are flat JSON objects. Every key outside an entity's
//! known-field table travels in the backend entity's custom-data bucket, so
//! unknown fields survive a round trip untouched.

pub mod artifact;
pub mod branch;
pub mod element;
pub mod org;
pub mod project;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{AdapterError, Result};
use crate::model::{Audit, CustomData};

/// A legacy API record
pub type LegacyObject = Map<String, Value>;

/// Legacy timestamp layout, e.g. `2017-08-16T14:58:03.379+0000`
pub const LEGACY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Known-field table for one entity kind.
///
/// `mapped` keys are translated to backend fields by the formatter,
/// `derived` keys are produced by the adapter on output and dropped on
/// input. Anything else belongs in the custom-data bucket.
#[derive(Debug, Clone, Copy)]
pub struct KnownFields {
    pub mapped: &'static [&'static str],
    pub derived: &'static [&'static str],
}

const PROVENANCE: [&str; 5] = ["_creator", "_created", "_modifier", "_modified", "_editable"];

pub const ORG_FIELDS: KnownFields = KnownFields {
    mapped: &["id", "name"],
    derived: &PROVENANCE,
};

pub const PROJECT_FIELDS: KnownFields = KnownFields {
    mapped: &["id", "name", "orgId"],
    derived: &PROVENANCE,
};

pub const REF_FIELDS: KnownFields = KnownFields {
    mapped: &["id", "name", "parentRefId", "type"],
    derived: &[
        "_creator",
        "_created",
        "_modifier",
        "_modified",
        "_editable",
        "_projectId",
    ],
};

pub const ELEMENT_FIELDS: KnownFields = KnownFields {
    mapped: &["id", "name", "documentation", "ownerId", "type"],
    derived: &[
        "_creator",
        "_created",
        "_modifier",
        "_modified",
        "_editable",
        "_projectId",
        "_refId",
        "_childViews",
    ],
};

pub const ARTIFACT_FIELDS: KnownFields = KnownFields {
    mapped: &["id", "name", "contentType"],
    derived: &[
        "_creator",
        "_created",
        "_modifier",
        "_modified",
        "_editable",
        "_projectId",
        "_refId",
        "artifactLocation",
    ],
};

impl KnownFields {
    pub fn is_known(&self, key: &str) -> bool {
        self.mapped.contains(&key) || self.derived.contains(&key)
    }

    /// Move every unknown key of a legacy record into a custom bucket
    pub fn split_custom(&self, legacy: &LegacyObject) -> CustomData {
        legacy
            .iter()
            .filter(|(key, _)| !self.is_known(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Merge a custom bucket back as top-level fields; known keys never
    /// overwrite what the formatter produced
    pub fn merge_custom(&self, legacy: &mut LegacyObject, custom: &CustomData) {
        for (key, value) in custom {
            if !self.is_known(key) {
                legacy.insert(key.clone(), value.clone());
            }
        }
    }
}

pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format(LEGACY_TIME_FORMAT).to_string()
}

/// Provenance fields shared by every legacy record
pub fn provenance(legacy: &mut LegacyObject, audit: &Audit) {
    legacy.insert("_creator".into(), Value::String(audit.created_by.clone()));
    legacy.insert(
        "_created".into(),
        Value::String(format_timestamp(&audit.created_on)),
    );
    legacy.insert(
        "_modifier".into(),
        audit
            .last_modified_by
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    legacy.insert(
        "_modified".into(),
        audit
            .updated_on
            .as_ref()
            .map(|t| Value::String(format_timestamp(t)))
            .unwrap_or(Value::Null),
    );
    legacy.insert("_editable".into(), Value::Bool(true));
}

/// Optional string field; `null` reads as absent
pub fn optional_str(legacy: &LegacyObject, key: &str) -> Result<Option<String>> {
    match legacy.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(AdapterError::bad_request(format!(
            "Field '{}' must be a string, got {}",
            key, other
        ))),
    }
}

/// Id of an inbound record, generated when the client leaves it out
pub fn id_or_generate(legacy: &LegacyObject) -> Result<String> {
    Ok(optional_str(legacy, "id")?.unwrap_or_else(crate::model::generate_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_split_and_merge_custom() {
        let legacy = json!({"id": "e1", "_creator": "x", "testing": "x", "nested": {"a": 1}});
        let legacy = legacy.as_object().unwrap();
        let custom = ELEMENT_FIELDS.split_custom(legacy);
        assert_eq!(custom.len(), 2);
        assert_eq!(custom["testing"], json!("x"));

        let mut out = LegacyObject::new();
        out.insert("id".into(), json!("e1"));
        let mut bucket = custom.clone();
        bucket.insert("id".into(), json!("spoofed"));
        ELEMENT_FIELDS.merge_custom(&mut out, &bucket);
        assert_eq!(out["id"], json!("e1"));
        assert_eq!(out["nested"], json!({"a": 1}));
    }

    #[test]
    fn test_timestamp_layout() {
        let time = Utc.with_ymd_and_hms(2017, 8, 16, 14, 58, 3).unwrap();
        assert_eq!(format_timestamp(&time), "2017-08-16T14:58:03.000+0000");
    }

    #[test]
    fn test_never_modified_reports_null_modifier() {
        let mut legacy = LegacyObject::new();
        provenance(&mut legacy, &Audit::created_by("alice"));
        assert_eq!(legacy["_creator"], json!("alice"));
        assert_eq!(legacy["_modifier"], Value::Null);
        assert_eq!(legacy["_editable"], json!(true));
    }

    #[test]
    fn test_optional_str_rejects_non_strings() {
        let legacy = json!({"name": 5});
        assert!(optional_str(legacy.as_object().unwrap(), "name").is_err());
    }
}
