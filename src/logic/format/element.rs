use serde_json::Value;

use super::{id_or_generate, optional_str, provenance, LegacyObject, ELEMENT_FIELDS};
use crate::error::{AdapterError, Result};
use crate::model::{Element, ElementInput, Tristate};

/// Key the synthesizer stores derived child views under
pub const CHILD_VIEWS: &str = "_childViews";

/// Fields that get an explicit `null` marker in the bucket when the client
/// leaves them out or sends `null`, so output can omit them instead of
/// showing defaults
const OMIT_WHEN_ABSENT: [&str; 2] = ["name", "documentation"];

pub fn to_backend(legacy: &LegacyObject) -> Result<ElementInput> {
    let mut custom = ELEMENT_FIELDS.split_custom(legacy);
    for key in OMIT_WHEN_ABSENT {
        if legacy.get(key).map_or(true, Value::is_null) {
            custom.insert(key.to_string(), Value::Null);
        }
    }

    let parent = match legacy.get("ownerId") {
        None => Tristate::Absent,
        Some(Value::Null) => Tristate::Null,
        Some(Value::String(owner)) => Tristate::Value(owner.clone()),
        Some(other) => {
            return Err(AdapterError::bad_request(format!(
                "Field 'ownerId' must be a string or null, got {}",
                other
            )))
        }
    };

    Ok(ElementInput {
        id: id_or_generate(legacy)?,
        name: optional_str(legacy, "name")?,
        documentation: optional_str(legacy, "documentation")?,
        parent,
        element_type: optional_str(legacy, "type")?,
        custom,
    })
}

pub fn to_legacy(element: &Element) -> LegacyObject {
    let mut legacy = LegacyObject::new();
    legacy.insert("id".into(), Value::String(element.local_id().to_string()));

    let omitted = |key: &str| matches!(element.custom.get(key), Some(Value::Null));
    if !omitted("name") {
        legacy.insert("name".into(), Value::String(element.name.clone()));
    }
    if !omitted("documentation") {
        legacy.insert(
            "documentation".into(),
            Value::String(element.documentation.clone()),
        );
    }

    legacy.insert(
        "ownerId".into(),
        element.parent.clone().map(Value::String).unwrap_or(Value::Null),
    );
    legacy.insert("type".into(), Value::String(element.element_type.clone()));
    legacy.insert("_projectId".into(), Value::String(element.project.clone()));
    legacy.insert("_refId".into(), Value::String(element.branch.clone()));
    provenance(&mut legacy, &element.audit);
    ELEMENT_FIELDS.merge_custom(&mut legacy, &element.custom);

    if let Some(child_views) = element.custom.get(CHILD_VIEWS) {
        legacy.insert(CHILD_VIEWS.into(), child_views.clone());
    }
    legacy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Audit;
    use serde_json::json;

    fn stored(input: ElementInput) -> Element {
        Element {
            id: format!("o:p:master:{}", input.id),
            org: "o".to_string(),
            project: "p".to_string(),
            branch: "master".to_string(),
            name: input.name.unwrap_or_default(),
            documentation: input.documentation.unwrap_or_default(),
            parent: input.parent.apply_to(None),
            element_type: input.element_type.unwrap_or_default(),
            custom: input.custom,
            audit: Audit::created_by("alice"),
        }
    }

    #[test]
    fn test_owner_id_three_states() {
        let absent = to_backend(json!({"id": "e"}).as_object().unwrap()).unwrap();
        let null = to_backend(json!({"id": "e", "ownerId": null}).as_object().unwrap()).unwrap();
        let set = to_backend(json!({"id": "e", "ownerId": "o1"}).as_object().unwrap()).unwrap();
        assert_eq!(absent.parent, Tristate::Absent);
        assert_eq!(null.parent, Tristate::Null);
        assert_eq!(set.parent, Tristate::Value("o1".to_string()));
        assert!(!set.custom.contains_key("ownerId"));
    }

    #[test]
    fn test_absent_name_is_marked_and_omitted() {
        let input = to_backend(json!({"id": "e", "documentation": "doc"}).as_object().unwrap())
            .unwrap();
        assert_eq!(input.custom.get("name"), Some(&Value::Null));
        assert!(!input.custom.contains_key("documentation"));

        let out = to_legacy(&stored(input));
        assert!(!out.contains_key("name"));
        assert_eq!(out["documentation"], json!("doc"));
    }

    #[test]
    fn test_explicit_null_name_is_omitted_like_absent() {
        let input = to_backend(
            json!({"id": "e", "name": null, "documentation": null})
                .as_object()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(input.name, None);
        assert_eq!(input.custom.get("name"), Some(&Value::Null));
        assert_eq!(input.custom.get("documentation"), Some(&Value::Null));

        let out = to_legacy(&stored(input));
        assert!(!out.contains_key("name"));
        assert!(!out.contains_key("documentation"));
    }

    #[test]
    fn test_round_trip_unknown_fields() {
        let legacy = json!({
            "id": "e1",
            "name": "Block",
            "documentation": "",
            "ownerId": "root",
            "type": "Class",
            "testing": "x",
            "_appliedStereotypeIds": ["s1"],
            "ownedAttributeIds": ["a", "b"],
            "value": [{"type": "LiteralInteger", "value": 3}]
        });
        let out = to_legacy(&stored(to_backend(legacy.as_object().unwrap()).unwrap()));
        for key in ["testing", "_appliedStereotypeIds", "ownedAttributeIds", "value"] {
            assert_eq!(out[key], legacy[key], "field {}", key);
        }
        assert_eq!(out["ownerId"], json!("root"));
        assert_eq!(out["_refId"], json!("master"));
        assert_eq!(out["_editable"], json!(true));
    }

    #[test]
    fn test_root_element_reports_null_owner() {
        let out = to_legacy(&stored(
            to_backend(json!({"id": "e", "name": "n", "documentation": "d"}).as_object().unwrap())
                .unwrap(),
        ));
        assert_eq!(out["ownerId"], Value::Null);
    }

    #[test]
    fn test_client_supplied_provenance_is_ignored() {
        let input = to_backend(
            json!({"id": "e", "_creator": "mallory", "_childViews": []}).as_object().unwrap(),
        )
        .unwrap();
        assert!(!input.custom.contains_key("_creator"));
        assert!(!input.custom.contains_key(CHILD_VIEWS));
    }
}
