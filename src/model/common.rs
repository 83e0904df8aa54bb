use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

pub type Id = String;

/// Free-form fields a backend entity carries for the legacy API
pub type CustomData = serde_json::Map<String, serde_json::Value>;

/// Default branch every project starts with
pub const MASTER_BRANCH: &str = "master";

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// A field that can be left out, explicitly cleared, or set.
///
/// Replace operations treat `Absent` as "leave the stored value alone" and
/// `Null` as "clear it". Use with
/// `#[serde(default, skip_serializing_if = "Tristate::is_absent")]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tristate<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Tristate<T> {
    fn default() -> Self {
        Tristate::Absent
    }
}

impl<T> Tristate<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Tristate::Absent)
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Tristate::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Resolve against the currently stored value
    pub fn apply_to(self, current: Option<T>) -> Option<T> {
        match self {
            Tristate::Absent => current,
            Tristate::Null => None,
            Tristate::Value(value) => Some(value),
        }
    }
}

impl<T> From<Option<T>> for Tristate<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Tristate::Value(value),
            None => Tristate::Null,
        }
    }
}

impl<T: Serialize> Serialize for Tristate<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Tristate::Value(value) => serializer.serialize_some(value),
            Tristate::Absent | Tristate::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Tristate<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Tristate::from)
    }
}

/// Provenance kept by the backend for every entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub created_by: String,
    pub created_on: DateTime<Utc>,
    /// Empty until the entity is modified for the first time
    #[serde(default)]
    pub last_modified_by: Option<String>,
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
}

impl Audit {
    pub fn created_by(user_id: &str) -> Self {
        Self {
            created_by: user_id.to_string(),
            created_on: Utc::now(),
            last_modified_by: None,
            updated_on: None,
        }
    }

    pub fn touch(&mut self, user_id: &str) {
        self.last_modified_by = Some(user_id.to_string());
        self.updated_on = Some(Utc::now());
    }
}
