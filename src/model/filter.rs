use crate::model::Id;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Element attribute a predicate can address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Field {
    /// Local element id
    Id,
    Project,
    Name,
    Documentation,
    Type,
    Parent,
    /// Dotted path into the custom-data bucket, e.g. `defaultValue.value`
    Custom(String),
}

impl Field {
    pub fn custom(path: impl Into<String>) -> Self {
        Field::Custom(path.into())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Id => write!(f, "id"),
            Field::Project => write!(f, "project"),
            Field::Name => write!(f, "name"),
            Field::Documentation => write!(f, "documentation"),
            Field::Type => write!(f, "type"),
            Field::Parent => write!(f, "parent"),
            Field::Custom(path) => write!(f, "custom.{}", path),
        }
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        field.to_string()
    }
}

impl TryFrom<String> for Field {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "id" => Ok(Field::Id),
            "project" => Ok(Field::Project),
            "name" => Ok(Field::Name),
            "documentation" => Ok(Field::Documentation),
            "type" => Ok(Field::Type),
            "parent" => Ok(Field::Parent),
            other => match other.strip_prefix("custom.") {
                Some(path) if !path.is_empty() => Ok(Field::Custom(path.to_string())),
                _ => Err(format!("Unknown element field: {}", other)),
            },
        }
    }
}

/// Backend-native element predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterExpr {
    /// Every condition must hold; empty matches everything
    All { all: Vec<FilterExpr> },
    Any { any: Vec<FilterExpr> },
    /// Excludes whatever the inner predicate selects
    Not { not: Box<FilterExpr> },
    Eq { eq: (Field, Value) },
    /// Field (or any entry of an array field) equals one of the values
    In { r#in: (Field, Vec<Value>) },
    /// Case-insensitive substring match
    Contains { contains: (Field, String) },
}

impl FilterExpr {
    pub fn empty() -> Self {
        FilterExpr::All { all: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FilterExpr::All { all } if all.is_empty())
    }

    pub fn eq(field: Field, value: impl Into<Value>) -> Self {
        FilterExpr::Eq {
            eq: (field, value.into()),
        }
    }

    pub fn one_of(field: Field, values: Vec<Value>) -> Self {
        FilterExpr::In {
            r#in: (field, values),
        }
    }

    pub fn contains(field: Field, needle: impl Into<String>) -> Self {
        FilterExpr::Contains {
            contains: (field, needle.into()),
        }
    }

    pub fn any(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::Any { any: exprs }
    }

    pub fn not(expr: FilterExpr) -> Self {
        FilterExpr::Not {
            not: Box::new(expr),
        }
    }

    /// Conjunction that keeps nested `All` nodes flat
    pub fn and(self, other: FilterExpr) -> Self {
        let mut all = match self {
            FilterExpr::All { all } => all,
            expr => vec![expr],
        };
        match other {
            FilterExpr::All { all: rest } => all.extend(rest),
            expr => all.push(expr),
        }
        FilterExpr::All { all }
    }
}

/// How an element lookup selects its results
#[derive(Debug, Clone, PartialEq)]
pub enum ElementQuery {
    All,
    /// Local ids within the scope
    Ids(Vec<Id>),
    /// Composite ids
    Keys(Vec<Id>),
    Filter(FilterExpr),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_round_trips_through_strings() {
        for field in [
            Field::Id,
            Field::Project,
            Field::Type,
            Field::custom("defaultValue.value"),
        ] {
            let text = String::from(field.clone());
            assert_eq!(Field::try_from(text).unwrap(), field);
        }
        assert!(Field::try_from("custom.".to_string()).is_err());
    }

    #[test]
    fn test_and_flattens() {
        let a = FilterExpr::eq(Field::Id, "e1");
        let b = FilterExpr::eq(Field::Project, "p1");
        let c = FilterExpr::eq(Field::Name, "n");
        let merged = a.clone().and(b.clone()).and(c.clone());
        assert_eq!(merged, FilterExpr::All { all: vec![a, b, c] });
    }

    #[test]
    fn test_and_with_empty_is_identity_shape() {
        let a = FilterExpr::eq(Field::Id, "e1");
        assert_eq!(
            FilterExpr::empty().and(a.clone()),
            FilterExpr::All { all: vec![a] }
        );
    }

    #[test]
    fn test_json_shape() {
        let expr = FilterExpr::any(vec![
            FilterExpr::eq(Field::Id, "e1"),
            FilterExpr::not(FilterExpr::contains(Field::Name, "x")),
        ]);
        assert_eq!(
            serde_json::to_value(&expr).unwrap(),
            json!({"any": [{"eq": ["id", "e1"]}, {"not": {"contains": ["name", "x"]}}]})
        );
        let parsed: FilterExpr = serde_json::from_value(serde_json::to_value(&expr).unwrap()).unwrap();
        assert_eq!(parsed, expr);
    }
}
