use crate::model::{Audit, CustomData, Id, Tristate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Element as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Composite `org:project:branch:element`
    pub id: Id,
    pub org: Id,
    pub project: Id,
    pub branch: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub documentation: String,
    /// Local id of the owning element; `None` for roots
    pub parent: Option<Id>,
    #[serde(rename = "type", default)]
    pub element_type: String,
    #[serde(default)]
    pub custom: CustomData,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Element {
    pub fn local_id(&self) -> &str {
        crate::model::composite_id::local_id(&self.id)
    }

    pub fn custom_str(&self, key: &str) -> Option<&str> {
        self.custom.get(key).and_then(Value::as_str)
    }

    /// String entries of a custom array field, in declared order
    pub fn custom_id_list(&self, key: &str) -> Option<Vec<Id>> {
        id_list(&self.custom, key)
    }

    /// Payload that would write this element back unchanged
    pub fn to_input(&self) -> ElementInput {
        ElementInput {
            id: self.local_id().to_string(),
            name: Some(self.name.clone()),
            documentation: Some(self.documentation.clone()),
            parent: self.parent.clone().into(),
            element_type: Some(self.element_type.clone()),
            custom: self.custom.clone(),
        }
    }
}

/// Create-or-replace payload for an element, keyed by local id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInput {
    pub id: Id,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
    /// `Absent` keeps the stored parent, `Null` detaches the element
    #[serde(default, skip_serializing_if = "Tristate::is_absent")]
    pub parent: Tristate<Id>,
    #[serde(rename = "type", default)]
    pub element_type: Option<String>,
    #[serde(default)]
    pub custom: CustomData,
}

impl ElementInput {
    pub fn custom_id_list(&self, key: &str) -> Option<Vec<Id>> {
        id_list(&self.custom, key)
    }

    pub fn set_custom_id_list(&mut self, key: &str, ids: Vec<Id>) {
        self.custom.insert(
            key.to_string(),
            Value::Array(ids.into_iter().map(Value::String).collect()),
        );
    }
}

fn id_list(custom: &CustomData, key: &str) -> Option<Vec<Id>> {
    custom.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

/// Derived `_childViews` entry of a document or view element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildView {
    /// The child view the property is typed by
    pub id: Option<Id>,
    pub aggregation: Option<String>,
    #[serde(rename = "propertyId")]
    pub property_id: Id,
}
