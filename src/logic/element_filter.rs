use serde_json::Value;

use crate::model::{Element, Field, FilterExpr};

/// Values a field resolves to on an element.
///
/// Custom paths walk nested objects; arrays fan out, so a path through an
/// array yields one value per entry.
pub fn field_values(element: &Element, field: &Field) -> Vec<Value> {
    match field {
        Field::Id => vec![Value::String(element.local_id().to_string())],
        Field::Project => vec![Value::String(element.project.clone())],
        Field::Name => vec![Value::String(element.name.clone())],
        Field::Documentation => vec![Value::String(element.documentation.clone())],
        Field::Type => vec![Value::String(element.element_type.clone())],
        Field::Parent => element
            .parent
            .iter()
            .map(|p| Value::String(p.clone()))
            .collect(),
        Field::Custom(path) => {
            let mut segments = path.split('.');
            let Some(first) = segments.next() else {
                return Vec::new();
            };
            let mut current: Vec<&Value> = element.custom.get(first).into_iter().collect();
            for segment in segments {
                current = current
                    .into_iter()
                    .flat_map(|value| match value {
                        Value::Array(items) => items.iter().collect::<Vec<_>>(),
                        other => vec![other],
                    })
                    .filter_map(|value| value.get(segment))
                    .collect();
            }
            current
                .into_iter()
                .flat_map(|value| match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                })
                .collect()
        }
    }
}

/// Evaluate a backend predicate against one element
pub fn matches(element: &Element, filter: &FilterExpr) -> bool {
    match filter {
        FilterExpr::All { all } => all.iter().all(|expr| matches(element, expr)),
        FilterExpr::Any { any } => any.iter().any(|expr| matches(element, expr)),
        FilterExpr::Not { not } => !matches(element, not),
        FilterExpr::Eq { eq: (field, value) } => {
            field_values(element, field).iter().any(|v| v == value)
        }
        FilterExpr::In { r#in: (field, values) } => field_values(element, field)
            .iter()
            .any(|v| values.contains(v)),
        FilterExpr::Contains {
            contains: (field, needle),
        } => {
            let needle = needle.to_lowercase();
            field_values(element, field).iter().any(|v| match v {
                Value::String(s) => s.to_lowercase().contains(&needle),
                _ => false,
            })
        }
    }
}

pub fn filter_elements(elements: Vec<Element>, filter: &FilterExpr) -> Vec<Element> {
    elements
        .into_iter()
        .filter(|element| matches(element, filter))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Audit;
    use serde_json::json;

    fn element(id: &str, custom: Value) -> Element {
        Element {
            id: format!("o:p:master:{}", id),
            org: "o".to_string(),
            project: "p".to_string(),
            branch: "master".to_string(),
            name: format!("Element {}", id),
            documentation: String::new(),
            parent: Some("root".to_string()),
            element_type: "Class".to_string(),
            custom: custom.as_object().cloned().unwrap_or_default(),
            audit: Audit::created_by("test"),
        }
    }

    #[test]
    fn test_id_and_project() {
        let e = element("e1", json!({}));
        let filter = FilterExpr::eq(Field::Id, "e1").and(FilterExpr::eq(Field::Project, "p"));
        assert!(matches(&e, &filter));
        assert!(!matches(&e, &FilterExpr::eq(Field::Id, "e2")));
    }

    #[test]
    fn test_empty_matches_everything() {
        assert!(matches(&element("e1", json!({})), &FilterExpr::empty()));
    }

    #[test]
    fn test_in_over_array_field() {
        let e = element("e1", json!({"ownedAttributeIds": ["a", "b"]}));
        let hit = FilterExpr::one_of(Field::custom("ownedAttributeIds"), vec![json!("b"), json!("z")]);
        let miss = FilterExpr::one_of(Field::custom("ownedAttributeIds"), vec![json!("ab")]);
        assert!(matches(&e, &hit));
        assert!(!matches(&e, &miss));
    }

    #[test]
    fn test_nested_custom_path_through_array() {
        let e = element(
            "e1",
            json!({"value": [{"type": "LiteralString", "value": "Hello World"}]}),
        );
        assert!(matches(&e, &FilterExpr::contains(Field::custom("value.value"), "hello")));
        assert!(!matches(&e, &FilterExpr::contains(Field::custom("value.value"), "bye")));
    }

    #[test]
    fn test_not_excludes() {
        let elements = vec![element("e1", json!({})), element("e2", json!({}))];
        let filtered = filter_elements(elements, &FilterExpr::not(FilterExpr::eq(Field::Id, "e1")));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].local_id(), "e2");
    }
}
