//! Derived `_childViews` relationship of document and view elements.
//!
//! The backend only stores `ownedAttributeIds` on the owning element. The
//! legacy API exposes the same information as ordered `{id, aggregation,
//! propertyId}` triples, resolved from the owned property elements. Edits go
//! the other way: a new `_childViews` order rewrites `ownedAttributeIds`, and
//! a child view that moves to another owner drags the property and its
//! association end along.

use itertools::Itertools;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{AdapterError, Result};
use crate::logic::format::element::CHILD_VIEWS;
use crate::logic::format::LegacyObject;
use crate::model::{
    composite_id, BranchScope, ChildView, Element, ElementInput, ElementQuery, Field, FilterExpr,
    Id, Tristate, UserContext,
};
use crate::store::traits::ElementStore;

pub const DOCUMENT_STEREOTYPE: &str = "_17_0_2_3_87b0275_1371477871400_792964_43374";
pub const VIEW_STEREOTYPE: &str = "_17_0_1_232f03dc_1325612611695_581988_21583";

pub const APPLIED_STEREOTYPES: &str = "_appliedStereotypeIds";
pub const OWNED_ATTRIBUTES: &str = "ownedAttributeIds";
const ASSOCIATION: &str = "associationId";
const OWNED_ENDS: &str = "ownedEndIds";
const TYPE_ID: &str = "typeId";
const AGGREGATION: &str = "aggregation";

/// Document/view elements that declare owned attributes
fn owned_attributes_of_view(element: &Element) -> Option<Vec<Id>> {
    let stereotypes = element.custom_id_list(APPLIED_STEREOTYPES)?;
    let is_view = stereotypes
        .iter()
        .any(|s| s == DOCUMENT_STEREOTYPE || s == VIEW_STEREOTYPE);
    if !is_view {
        return None;
    }
    element.custom_id_list(OWNED_ATTRIBUTES)
}

/// Composite ids of every owned attribute referenced by a view, each scoped
/// to its owner's branch, in first-seen order
pub fn owned_attribute_keys(elements: &[Element]) -> Result<Vec<Id>> {
    let mut keys = Vec::new();
    for element in elements {
        if let Some(owned) = owned_attributes_of_view(element) {
            for id in owned {
                keys.push(composite_id::build(
                    &element.org,
                    &element.project,
                    Some(&element.branch),
                    Some(&id),
                )?);
            }
        }
    }
    Ok(keys.into_iter().unique().collect())
}

/// Attach `_childViews` to every view element using the resolved properties.
///
/// Entries follow `ownedAttributeIds` order; ids that did not resolve are
/// skipped. With duplicate resolved ids the first one wins.
pub fn attach_child_views(elements: Vec<Element>, resolved: &[Element]) -> Vec<Element> {
    let mut by_id: HashMap<&str, ChildView> = HashMap::new();
    for property in resolved {
        by_id
            .entry(property.local_id())
            .or_insert_with(|| ChildView {
                id: property.custom_str(TYPE_ID).map(str::to_string),
                aggregation: property.custom_str(AGGREGATION).map(str::to_string),
                property_id: property.local_id().to_string(),
            });
    }

    elements
        .into_iter()
        .map(|mut element| {
            if let Some(owned) = owned_attributes_of_view(&element) {
                let child_views: Vec<Value> = owned
                    .iter()
                    .filter_map(|id| by_id.get(id.as_str()))
                    .filter_map(|cv| serde_json::to_value(cv).ok())
                    .collect();
                element
                    .custom
                    .insert(CHILD_VIEWS.to_string(), Value::Array(child_views));
            }
            element
        })
        .collect()
}

/// Derive `_childViews` for a batch of elements with a single lookup.
pub async fn synthesize<S: ElementStore + ?Sized>(
    store: &S,
    user: &UserContext,
    elements: Vec<Element>,
) -> Result<Vec<Element>> {
    let keys = owned_attribute_keys(&elements)?;
    if keys.is_empty() {
        return Ok(attach_child_views(elements, &[]));
    }

    // Every element of one request shares a branch; scope the lookup by the first view
    let Some(owner) = elements
        .iter()
        .find(|element| owned_attributes_of_view(element).is_some())
    else {
        return Ok(elements);
    };
    let scope = BranchScope::new(
        owner.org.clone(),
        owner.project.clone(),
        owner.branch.clone(),
    )?;

    debug!("Resolving {} owned attributes for child views", keys.len());
    let resolved = store
        .find_elements(user, &scope, ElementQuery::Keys(keys))
        .await?;
    Ok(attach_child_views(elements, &resolved))
}

/// Remove and parse a client-supplied `_childViews` list
pub fn take_requested_child_views(legacy: &mut LegacyObject) -> Result<Option<Vec<ChildView>>> {
    match legacy.remove(CHILD_VIEWS) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| AdapterError::bad_request(format!("Invalid _childViews: {}", e))),
    }
}

/// Requested child-view order for one element of a write
#[derive(Debug, Clone, PartialEq)]
pub struct ChildViewEdit {
    pub owner: Id,
    pub child_views: Vec<ChildView>,
}

/// Element writes keyed by local id, in first-touched order
struct PendingWrites {
    inputs: Vec<ElementInput>,
    index: HashMap<Id, usize>,
}

impl PendingWrites {
    fn new(inputs: Vec<ElementInput>) -> Self {
        let index = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| (input.id.clone(), i))
            .collect();
        Self { inputs, index }
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut ElementInput> {
        let i = *self.index.get(id)?;
        self.inputs.get_mut(i)
    }

    fn get_or_insert_with(
        &mut self,
        id: &str,
        make: impl FnOnce() -> ElementInput,
    ) -> &mut ElementInput {
        let i = match self.index.get(id) {
            Some(i) => *i,
            None => {
                self.inputs.push(make());
                self.index.insert(id.to_string(), self.inputs.len() - 1);
                self.inputs.len() - 1
            }
        };
        &mut self.inputs[i]
    }
}

/// Apply requested `_childViews` edits to a batch of element writes.
///
/// Returns the writes to perform: the incoming inputs with rewritten
/// `ownedAttributeIds`, followed by cascaded updates to previous owners,
/// moved properties and their association ends.
pub async fn apply_child_view_edits<S: ElementStore + ?Sized>(
    store: &S,
    user: &UserContext,
    scope: &BranchScope,
    inputs: Vec<ElementInput>,
    edits: Vec<ChildViewEdit>,
) -> Result<Vec<ElementInput>> {
    if edits.is_empty() {
        return Ok(inputs);
    }
    let mut pending = PendingWrites::new(inputs);

    // The declared order is the new ownedAttributeIds, exactly
    let mut new_owner: HashMap<Id, Id> = HashMap::new();
    for edit in &edits {
        let ids: Vec<Id> = edit
            .child_views
            .iter()
            .map(|cv| cv.property_id.clone())
            .collect();
        for id in &ids {
            new_owner
                .entry(id.clone())
                .or_insert_with(|| edit.owner.clone());
        }
        if let Some(input) = pending.get_mut(&edit.owner) {
            input.set_custom_id_list(OWNED_ATTRIBUTES, ids);
        }
    }
    let edited: Vec<&Id> = edits.iter().map(|edit| &edit.owner).collect();

    // Current owners of every requested property
    let requested: Vec<Value> = new_owner.keys().cloned().map(Value::String).collect();
    let owners = store
        .find_elements(
            user,
            scope,
            ElementQuery::Filter(FilterExpr::one_of(Field::custom(OWNED_ATTRIBUTES), requested)),
        )
        .await?;

    let mut moves: Vec<(Id, Id)> = Vec::new();
    for previous in &owners {
        let from = previous.local_id();
        let Some(owned) = previous.custom_id_list(OWNED_ATTRIBUTES) else {
            continue;
        };
        for property in owned {
            let Some(to) = new_owner.get(&property) else {
                continue;
            };
            if to == from {
                continue;
            }
            moves.push((property.clone(), to.clone()));
            if edited.iter().any(|owner| owner.as_str() == from) {
                // That owner's own declared order already decides
                continue;
            }
            let input = pending.get_or_insert_with(from, || previous.to_input());
            if let Some(remaining) = input.custom_id_list(OWNED_ATTRIBUTES) {
                let remaining = remaining.into_iter().filter(|id| *id != property).collect();
                input.set_custom_id_list(OWNED_ATTRIBUTES, remaining);
            }
        }
    }
    if moves.is_empty() {
        return Ok(pending.inputs);
    }
    debug!(
        "Relocating child views: {}",
        moves.iter().map(|(p, to)| format!("{} -> {}", p, to)).join(", ")
    );
    let moved_to: HashMap<Id, Id> = moves.into_iter().collect();

    // property -> association -> owned end, one lookup per hop
    let properties = store
        .find_elements(
            user,
            scope,
            ElementQuery::Ids(moved_to.keys().cloned().collect()),
        )
        .await?;
    let mut association_owner: HashMap<Id, Id> = HashMap::new();
    for property in &properties {
        let Some(to) = moved_to.get(property.local_id()) else {
            continue;
        };
        let input = pending.get_or_insert_with(property.local_id(), || property.to_input());
        input.parent = Tristate::Value(to.clone());
        if let Some(association) = property.custom_str(ASSOCIATION) {
            association_owner.insert(association.to_string(), to.clone());
        }
    }
    if association_owner.is_empty() {
        return Ok(pending.inputs);
    }

    let associations = store
        .find_elements(
            user,
            scope,
            ElementQuery::Ids(association_owner.keys().cloned().collect()),
        )
        .await?;
    let mut end_owner: HashMap<Id, Id> = HashMap::new();
    for association in &associations {
        let Some(to) = association_owner.get(association.local_id()) else {
            continue;
        };
        for end in association.custom_id_list(OWNED_ENDS).unwrap_or_default() {
            end_owner.insert(end, to.clone());
        }
    }
    if end_owner.is_empty() {
        return Ok(pending.inputs);
    }

    let ends = store
        .find_elements(
            user,
            scope,
            ElementQuery::Ids(end_owner.keys().cloned().collect()),
        )
        .await?;
    for end in &ends {
        let Some(to) = end_owner.get(end.local_id()) else {
            continue;
        };
        let input = pending.get_or_insert_with(end.local_id(), || end.to_input());
        input
            .custom
            .insert(TYPE_ID.to_string(), Value::String(to.clone()));
    }

    Ok(pending.inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Audit, OrgInput, ProjectInput, MASTER_BRANCH};
    use crate::store::mem::MemoryStore;
    use crate::store::traits::{OrgStore, ProjectStore};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn element(id: &str, custom: Value) -> Element {
        Element {
            id: format!("o:p:master:{}", id),
            org: "o".to_string(),
            project: "p".to_string(),
            branch: "master".to_string(),
            name: id.to_string(),
            documentation: String::new(),
            parent: None,
            element_type: "Class".to_string(),
            custom: custom.as_object().cloned().unwrap_or_default(),
            audit: Audit::created_by("test"),
        }
    }

    fn property(id: &str, type_id: &str) -> Element {
        element(id, json!({"typeId": type_id, "aggregation": "composite"}))
    }

    fn view(id: &str, owned: &[&str]) -> Element {
        element(
            id,
            json!({"_appliedStereotypeIds": [VIEW_STEREOTYPE], "ownedAttributeIds": owned}),
        )
    }

    fn property_ids(element: &Element) -> Vec<String> {
        element.custom[CHILD_VIEWS]
            .as_array()
            .unwrap()
            .iter()
            .map(|cv| cv["propertyId"].as_str().unwrap().to_string())
            .collect()
    }

    /// Answers key lookups from a fixed set, in reverse, and counts calls
    struct FakeStore {
        elements: Vec<Element>,
        lookups: AtomicUsize,
    }

    impl FakeStore {
        fn new(elements: Vec<Element>) -> Self {
            Self {
                elements,
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ElementStore for FakeStore {
        async fn find_elements(
            &self,
            _user: &UserContext,
            _scope: &BranchScope,
            query: ElementQuery,
        ) -> Result<Vec<Element>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let ElementQuery::Keys(keys) = query else {
                panic!("synthesizer should look up by composite keys");
            };
            Ok(self
                .elements
                .iter()
                .rev()
                .filter(|e| keys.contains(&e.id))
                .cloned()
                .collect())
        }

        async fn create_or_replace_elements(
            &self,
            _user: &UserContext,
            _scope: &BranchScope,
            _elements: Vec<ElementInput>,
        ) -> Result<Vec<Element>> {
            unimplemented!()
        }

        async fn remove_elements(
            &self,
            _user: &UserContext,
            _scope: &BranchScope,
            _ids: &[Id],
        ) -> Result<Vec<Element>> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_child_views_follow_declared_order() {
        let store = FakeStore::new(vec![property("a", "va"), property("b", "vb"), property("c", "vc")]);
        let out = synthesize(&store, &UserContext::new("u"), vec![view("doc", &["a", "b", "c"])])
            .await
            .unwrap();
        assert_eq!(property_ids(&out[0]), vec!["a", "b", "c"]);
        assert_eq!(
            out[0].custom[CHILD_VIEWS][1],
            json!({"id": "vb", "aggregation": "composite", "propertyId": "b"})
        );
    }

    #[tokio::test]
    async fn test_one_lookup_for_many_references() {
        let store = FakeStore::new(vec![
            property("a", "va"),
            property("b", "vb"),
            property("c", "vc"),
            property("d", "vd"),
        ]);
        let elements = vec![view("v1", &["a", "b"]), view("v2", &["c", "d", "a"])];
        let out = synthesize(&store, &UserContext::new("u"), elements).await.unwrap();
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(property_ids(&out[1]), vec!["c", "d", "a"]);
    }

    #[tokio::test]
    async fn test_unstereotyped_owner_is_untouched() {
        let store = FakeStore::new(vec![property("a", "va")]);
        let plain = element("block", json!({"ownedAttributeIds": ["a"]}));
        let out = synthesize(&store, &UserContext::new("u"), vec![plain]).await.unwrap();
        assert!(!out[0].custom.contains_key(CHILD_VIEWS));
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_view_without_owned_attributes_gets_empty_list() {
        let store = FakeStore::new(vec![]);
        let out = synthesize(&store, &UserContext::new("u"), vec![view("v", &[])])
            .await
            .unwrap();
        assert_eq!(out[0].custom[CHILD_VIEWS], json!([]));
    }

    #[test]
    fn test_unresolved_skipped_and_first_match_wins() {
        let resolved = vec![property("a", "first"), property("a", "second")];
        let out = attach_child_views(vec![view("v", &["missing", "a"])], &resolved);
        assert_eq!(
            out[0].custom[CHILD_VIEWS],
            json!([{"id": "first", "aggregation": "composite", "propertyId": "a"}])
        );
    }

    #[test]
    fn test_take_requested_child_views() {
        let mut legacy = json!({"id": "v", "_childViews": [{"id": "x", "aggregation": null, "propertyId": "p"}]})
            .as_object()
            .cloned()
            .unwrap();
        let requested = take_requested_child_views(&mut legacy).unwrap().unwrap();
        assert_eq!(requested[0].property_id, "p");
        assert!(!legacy.contains_key(CHILD_VIEWS));

        let mut bad = json!({"_childViews": "nope"}).as_object().cloned().unwrap();
        assert!(take_requested_child_views(&mut bad).is_err());
    }

    async fn seeded(elements: Vec<Element>) -> (MemoryStore, BranchScope, UserContext) {
        let user = UserContext::new("alice");
        let store = MemoryStore::new();
        store
            .create_or_replace_orgs(
                &user,
                vec![OrgInput {
                    id: "o".into(),
                    name: "o".into(),
                    custom: Default::default(),
                }],
            )
            .await
            .unwrap();
        store
            .create_or_replace_projects(
                &user,
                &"o".to_string(),
                vec![ProjectInput {
                    id: "p".into(),
                    name: "p".into(),
                    custom: Default::default(),
                }],
            )
            .await
            .unwrap();
        let scope = BranchScope::new("o", "p", MASTER_BRANCH).unwrap();
        store
            .create_or_replace_elements(
                &user,
                &scope,
                elements.iter().map(Element::to_input).collect(),
            )
            .await
            .unwrap();
        (store, scope, user)
    }

    fn child_view(property_id: &str) -> ChildView {
        ChildView {
            id: None,
            aggregation: None,
            property_id: property_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_reorder_round_trips_through_owned_attributes() {
        let (store, scope, user) = seeded(vec![
            view("doc", &["a", "b", "c"]),
            property("a", "va"),
            property("b", "vb"),
            property("c", "vc"),
        ])
        .await;

        let stored = store
            .find_elements(&user, &scope, ElementQuery::Ids(vec!["doc".into()]))
            .await
            .unwrap();
        let edit = ChildViewEdit {
            owner: "doc".into(),
            child_views: vec![child_view("c"), child_view("a"), child_view("b")],
        };
        let writes = apply_child_view_edits(&store, &user, &scope, vec![stored[0].to_input()], vec![edit])
            .await
            .unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(
            writes[0].custom_id_list(OWNED_ATTRIBUTES).unwrap(),
            vec!["c", "a", "b"]
        );

        let written = store.create_or_replace_elements(&user, &scope, writes).await.unwrap();
        let out = synthesize(&store, &user, written).await.unwrap();
        assert_eq!(property_ids(&out[0]), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_relocation_cascades_to_owned_end() {
        let mut prop = property("p1", "child");
        prop.parent = Some("A".into());
        prop.custom.insert(ASSOCIATION.into(), json!("assoc"));
        let (store, scope, user) = seeded(vec![
            view("A", &["p1", "p2"]),
            view("B", &["p3"]),
            prop,
            property("p2", "other"),
            property("p3", "third"),
            element("assoc", json!({"ownedEndIds": ["end"]})),
            element("end", json!({"typeId": "A"})),
        ])
        .await;

        let b = store
            .find_elements(&user, &scope, ElementQuery::Ids(vec!["B".into()]))
            .await
            .unwrap()
            .remove(0);
        let edit = ChildViewEdit {
            owner: "B".into(),
            child_views: vec![child_view("p3"), child_view("p1")],
        };
        let writes = apply_child_view_edits(&store, &user, &scope, vec![b.to_input()], vec![edit])
            .await
            .unwrap();
        store.create_or_replace_elements(&user, &scope, writes).await.unwrap();

        let fetch = |id: &str| {
            let id = id.to_string();
            let store = &store;
            let scope = &scope;
            let user = &user;
            async move {
                store
                    .find_elements(user, scope, ElementQuery::Ids(vec![id]))
                    .await
                    .unwrap()
                    .remove(0)
            }
        };
        let a = fetch("A").await;
        let b = fetch("B").await;
        let end = fetch("end").await;
        let moved = fetch("p1").await;
        assert_eq!(a.custom_id_list(OWNED_ATTRIBUTES).unwrap(), vec!["p2"]);
        assert_eq!(b.custom_id_list(OWNED_ATTRIBUTES).unwrap(), vec!["p3", "p1"]);
        assert_eq!(end.custom_str(TYPE_ID), Some("B"));
        assert_eq!(moved.parent.as_deref(), Some("B"));
    }
}
