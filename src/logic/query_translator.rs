//! Translation of legacy search bodies into backend element filters.
//!
//! Legacy queries are nested boolean trees without a type tag. Each node is
//! first classified by its structure, in a fixed order because some shapes
//! are subsets of others, and then translated. Nodes that fit no shape
//! translate to the empty predicate.

use serde_json::Value;

use crate::model::{Field, FilterExpr};

/// Custom fields holding an element's literal value or specification text
const FREE_TEXT_FIELDS: [&str; 3] = ["value.value", "defaultValue.value", "specification.value"];
const STEREOTYPES: &str = "_appliedStereotypeIds";

/// Recognized query productions
#[derive(Debug, Clone, PartialEq)]
pub enum QueryShape<'a> {
    /// `bool.filter: [{term:{id}}, {term:{_projectId}}]`
    SingleElement { id: &'a Value, project: &'a Value },
    /// `bool.must: [A, {bool:{must_not: B}}, C...]`
    MustNot {
        include: &'a Value,
        exclude: &'a Value,
        rest: &'a [Value],
    },
    /// `bool.must: [A, B, ...]`
    Conjunction(&'a [Value]),
    /// `bool.should: [{term:{id}}, {multi_match}]`
    SearchAll { id: &'a Value, text: &'a Value },
    /// `bool.should: [{terms:{_appliedStereotypeIds}}, {terms:{type}}]`
    Metatype { stereotypes: &'a Value, types: &'a Value },
    /// `bool.should: [A, B, ...]`
    Disjunction(&'a [Value]),
    /// `match.name` or `match.documentation`
    FieldMatch { field: Field, term: &'a Value },
    /// `term.id`
    IdMatch(&'a Value),
    /// `multi_match.query`
    FreeText(&'a Value),
    Unrecognized,
}

fn array_at<'a>(node: &'a Value, pointer: &str) -> Option<&'a [Value]> {
    node.pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

/// Classify a node by the first production whose structure it matches
pub fn classify(node: &Value) -> QueryShape<'_> {
    if let (Some(id), Some(project)) = (
        node.pointer("/bool/filter/0/term/id"),
        node.pointer("/bool/filter/1/term/_projectId"),
    ) {
        return QueryShape::SingleElement { id, project };
    }

    if let Some(must) = array_at(node, "/bool/must") {
        if let (Some(include), Some(exclude)) =
            (must.first(), node.pointer("/bool/must/1/bool/must_not"))
        {
            return QueryShape::MustNot {
                include,
                exclude,
                rest: must.get(2..).unwrap_or_default(),
            };
        }
        return QueryShape::Conjunction(must);
    }

    if let (Some(id), Some(text)) = (
        node.pointer("/bool/should/0/term/id"),
        node.pointer("/bool/should/1/multi_match"),
    ) {
        return QueryShape::SearchAll { id, text };
    }

    let stereotypes_path = format!("/bool/should/0/terms/{}", STEREOTYPES);
    if let (Some(stereotypes), Some(types)) = (
        node.pointer(&stereotypes_path),
        node.pointer("/bool/should/1/terms/type"),
    ) {
        return QueryShape::Metatype { stereotypes, types };
    }

    if let Some(should) = array_at(node, "/bool/should") {
        return QueryShape::Disjunction(should);
    }

    if let Some(term) = node.pointer("/match/name") {
        return QueryShape::FieldMatch {
            field: Field::Name,
            term: match_term(term),
        };
    }
    if let Some(term) = node.pointer("/match/documentation") {
        return QueryShape::FieldMatch {
            field: Field::Documentation,
            term: match_term(term),
        };
    }

    if let Some(id) = node.pointer("/term/id") {
        return QueryShape::IdMatch(id);
    }

    if let Some(query) = node.pointer("/multi_match/query") {
        return QueryShape::FreeText(query);
    }

    QueryShape::Unrecognized
}

/// `match` accepts both `{name: "x"}` and `{name: {query: "x"}}`
fn match_term(term: &Value) -> &Value {
    term.get("query").unwrap_or(term)
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn values_of(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(values) => values.clone(),
        other => vec![other.clone()],
    }
}

fn free_text(query: &Value) -> Vec<FilterExpr> {
    let needle = text_of(query);
    FREE_TEXT_FIELDS
        .iter()
        .map(|path| FilterExpr::contains(Field::custom(*path), needle.clone()))
        .collect()
}

/// Translate a legacy query tree into a backend predicate
pub fn translate(node: &Value) -> FilterExpr {
    match classify(node) {
        QueryShape::SingleElement { id, project } => FilterExpr::empty()
            .and(FilterExpr::eq(Field::Id, id.clone()))
            .and(FilterExpr::eq(Field::Project, project.clone())),

        QueryShape::MustNot {
            include,
            exclude,
            rest,
        } => {
            let excluded = match exclude {
                Value::Array(nodes) => FilterExpr::any(nodes.iter().map(translate).collect()),
                node => translate(node),
            };
            rest.iter()
                .map(translate)
                .fold(translate(include).and(FilterExpr::not(excluded)), FilterExpr::and)
        }

        QueryShape::Conjunction(nodes) => nodes
            .iter()
            .map(translate)
            .fold(FilterExpr::empty(), FilterExpr::and),

        QueryShape::SearchAll { id, text } => {
            let needle = text
                .get("query")
                .map(text_of)
                .unwrap_or_else(|| text_of(id));
            let mut any = vec![
                FilterExpr::eq(Field::Id, id.clone()),
                FilterExpr::contains(Field::Name, needle.clone()),
                FilterExpr::contains(Field::Documentation, needle.clone()),
            ];
            any.extend(free_text(&Value::String(needle)));
            FilterExpr::any(any)
        }

        QueryShape::Metatype { stereotypes, types } => FilterExpr::any(vec![
            FilterExpr::one_of(Field::custom(STEREOTYPES), values_of(stereotypes)),
            FilterExpr::one_of(Field::Type, values_of(types)),
        ]),

        QueryShape::Disjunction(nodes) => FilterExpr::any(nodes.iter().map(translate).collect()),

        QueryShape::FieldMatch { field, term } => FilterExpr::eq(field, term.clone()),

        QueryShape::IdMatch(id) => FilterExpr::eq(Field::Id, id.clone()),

        QueryShape::FreeText(query) => FilterExpr::any(free_text(query)),

        QueryShape::Unrecognized => FilterExpr::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_element_fast_path() {
        let query = json!({"bool": {"filter": [{"term": {"id": "E1"}}, {"term": {"_projectId": "P1"}}]}});
        assert_eq!(
            translate(&query),
            FilterExpr::All {
                all: vec![
                    FilterExpr::eq(Field::Id, "E1"),
                    FilterExpr::eq(Field::Project, "P1"),
                ]
            }
        );
    }

    #[test]
    fn test_must_with_must_not() {
        let query = json!({"bool": {"must": [
            {"term": {"id": "keep"}},
            {"bool": {"must_not": {"match": {"name": "drop"}}}}
        ]}});
        assert!(matches!(classify(&query), QueryShape::MustNot { .. }));
        assert_eq!(
            translate(&query),
            FilterExpr::All {
                all: vec![
                    FilterExpr::eq(Field::Id, "keep"),
                    FilterExpr::not(FilterExpr::eq(Field::Name, "drop")),
                ]
            }
        );
    }

    #[test]
    fn test_must_not_list_excludes_any() {
        let query = json!({"bool": {"must": [
            {"term": {"id": "a"}},
            {"bool": {"must_not": [{"term": {"id": "b"}}, {"term": {"id": "c"}}]}}
        ]}});
        assert_eq!(
            translate(&query),
            FilterExpr::All {
                all: vec![
                    FilterExpr::eq(Field::Id, "a"),
                    FilterExpr::not(FilterExpr::any(vec![
                        FilterExpr::eq(Field::Id, "b"),
                        FilterExpr::eq(Field::Id, "c"),
                    ])),
                ]
            }
        );
    }

    #[test]
    fn test_must_not_keeps_trailing_conjuncts() {
        let query = json!({"bool": {"must": [
            {"term": {"id": "a"}},
            {"bool": {"must_not": {"term": {"id": "b"}}}},
            {"match": {"name": "c"}}
        ]}});
        assert!(matches!(
            classify(&query),
            QueryShape::MustNot { rest, .. } if rest.len() == 1
        ));
        assert_eq!(
            translate(&query),
            FilterExpr::All {
                all: vec![
                    FilterExpr::eq(Field::Id, "a"),
                    FilterExpr::not(FilterExpr::eq(Field::Id, "b")),
                    FilterExpr::eq(Field::Name, "c"),
                ]
            }
        );
    }

    #[test]
    fn test_conjunction_merges() {
        let query = json!({"bool": {"must": [
            {"match": {"name": "Block"}},
            {"match": {"documentation": {"query": "doc"}}},
            {"term": {"id": "e"}}
        ]}});
        assert_eq!(
            translate(&query),
            FilterExpr::All {
                all: vec![
                    FilterExpr::eq(Field::Name, "Block"),
                    FilterExpr::eq(Field::Documentation, "doc"),
                    FilterExpr::eq(Field::Id, "e"),
                ]
            }
        );
    }

    #[test]
    fn test_search_all_composite() {
        let query = json!({"bool": {"should": [
            {"term": {"id": "needle"}},
            {"multi_match": {"query": "needle", "fields": ["name"]}}
        ]}});
        match translate(&query) {
            FilterExpr::Any { any } => {
                assert_eq!(any[0], FilterExpr::eq(Field::Id, "needle"));
                assert!(any.contains(&FilterExpr::contains(Field::Name, "needle")));
                assert!(any.contains(&FilterExpr::contains(
                    Field::custom("specification.value"),
                    "needle"
                )));
                assert_eq!(any.len(), 6);
            }
            other => panic!("expected disjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_metatype_composite() {
        let query = json!({"bool": {"should": [
            {"terms": {"_appliedStereotypeIds": ["s1", "s2"]}},
            {"terms": {"type": ["Class"]}}
        ]}});
        assert_eq!(
            translate(&query),
            FilterExpr::any(vec![
                FilterExpr::one_of(
                    Field::custom("_appliedStereotypeIds"),
                    vec![json!("s1"), json!("s2")]
                ),
                FilterExpr::one_of(Field::Type, vec![json!("Class")]),
            ])
        );
    }

    #[test]
    fn test_plain_disjunction_recurses() {
        let query = json!({"bool": {"should": [
            {"term": {"id": "a"}},
            {"bool": {"should": [{"term": {"id": "b"}}, {"match": {"name": "c"}}]}}
        ]}});
        assert_eq!(
            translate(&query),
            FilterExpr::any(vec![
                FilterExpr::eq(Field::Id, "a"),
                FilterExpr::any(vec![
                    FilterExpr::eq(Field::Id, "b"),
                    FilterExpr::eq(Field::Name, "c"),
                ]),
            ])
        );
    }

    #[test]
    fn test_free_text() {
        let query = json!({"multi_match": {"query": "42"}});
        assert_eq!(
            translate(&query),
            FilterExpr::any(vec![
                FilterExpr::contains(Field::custom("value.value"), "42"),
                FilterExpr::contains(Field::custom("defaultValue.value"), "42"),
                FilterExpr::contains(Field::custom("specification.value"), "42"),
            ])
        );
    }

    #[test]
    fn test_reordered_composite_is_a_plain_disjunction() {
        // Composite shapes are recognized by position only
        let query = json!({"bool": {"should": [
            {"multi_match": {"query": "x"}},
            {"term": {"id": "x"}}
        ]}});
        assert!(matches!(classify(&query), QueryShape::Disjunction(_)));
    }

    #[test]
    fn test_unrecognized_falls_through_to_empty() {
        assert_eq!(translate(&json!({"range": {"age": {"gt": 3}}})), FilterExpr::empty());
        assert_eq!(translate(&json!("text")), FilterExpr::empty());
        assert_eq!(
            translate(&json!({"bool": {"filter": [{"term": {"id": "E1"}}]}})),
            FilterExpr::empty()
        );
    }
}
