use axum::{extract::State, response::Json};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::api::errors::{reject, ApiResult};
use crate::api::extract::{JsonBody, PathParams, QueryParams};
use crate::api::handlers::{branch_scope, require_records, AppState, ProjectsPayload};
use crate::error::{AdapterError, Result};
use crate::logic::child_views::{self, ChildViewEdit, APPLIED_STEREOTYPES, DOCUMENT_STEREOTYPE};
use crate::logic::format::{self, LegacyObject};
use crate::logic::query_translator;
use crate::model::{
    BranchScope, Element, ElementInput, ElementQuery, Field, FilterExpr, Id, UserContext,
};
use crate::store::traits::{Backend, ElementStore};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ElementsPayload {
    #[serde(default)]
    pub elements: Vec<LegacyObject>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DocumentsPayload {
    pub documents: Vec<LegacyObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(rename = "_name")]
    pub name: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GroupsPayload {
    pub groups: Vec<Group>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CommitsPayload {
    pub commits: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct DepthQuery {
    /// Levels of owned descendants to include; negative means all
    pub depth: Option<i64>,
}

const MOUNT_TYPE: &str = "Mount";
const GROUP_FLAG: &str = "_isGroup";

/// Ids named by a lookup or delete body
fn requested_ids(records: &[LegacyObject]) -> Result<Vec<Id>> {
    records
        .iter()
        .map(|record| {
            format::optional_str(record, "id")?
                .ok_or_else(|| AdapterError::bad_request("Every element must have an 'id'"))
        })
        .collect()
}

/// Backend writes for a legacy element batch, with any `_childViews` edits
fn element_writes(records: Vec<LegacyObject>) -> Result<(Vec<ElementInput>, Vec<ChildViewEdit>)> {
    let mut inputs = Vec::with_capacity(records.len());
    let mut edits = Vec::new();
    for mut record in records {
        let requested = child_views::take_requested_child_views(&mut record)?;
        let input = format::element::to_backend(&record)?;
        if let Some(child_views) = requested {
            edits.push(ChildViewEdit {
                owner: input.id.clone(),
                child_views,
            });
        }
        inputs.push(input);
    }
    Ok((inputs, edits))
}

fn to_payload(elements: &[Element]) -> ElementsPayload {
    ElementsPayload {
        elements: elements.iter().map(format::element::to_legacy).collect(),
    }
}

/// Owned descendants of `root`, one lookup per level
pub async fn with_descendants<S: ElementStore + ?Sized>(
    store: &S,
    user: &UserContext,
    scope: &BranchScope,
    root: Element,
    depth: i64,
) -> Result<Vec<Element>> {
    let mut seen: HashSet<Id> = HashSet::from([root.local_id().to_string()]);
    let mut frontier = vec![Value::String(root.local_id().to_string())];
    let mut collected = vec![root];
    let mut level = 0;

    while !frontier.is_empty() && (depth < 0 || level < depth) {
        let children = store
            .find_elements(
                user,
                scope,
                ElementQuery::Filter(FilterExpr::one_of(Field::Parent, frontier)),
            )
            .await?;
        frontier = Vec::new();
        for child in children {
            if seen.insert(child.local_id().to_string()) {
                frontier.push(Value::String(child.local_id().to_string()));
                collected.push(child);
            }
        }
        level += 1;
    }
    debug!("Collected {} elements over {} levels", collected.len(), level);
    Ok(collected)
}

pub async fn create_or_replace_elements<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id)): PathParams<(Id, Id)>,
    user: UserContext,
    JsonBody(payload): JsonBody<ElementsPayload>,
) -> ApiResult<ElementsPayload> {
    let elements = async {
        require_records(&payload.elements, "elements")?;
        let scope = branch_scope(&state.store, &user, &project_id, &ref_id).await?;
        let (inputs, edits) = element_writes(payload.elements)?;
        let requested: HashSet<Id> = inputs.iter().map(|input| input.id.clone()).collect();

        let writes =
            child_views::apply_child_view_edits(&state.store, &user, &scope, inputs, edits).await?;
        let written = state
            .store
            .create_or_replace_elements(&user, &scope, writes)
            .await?
            .into_iter()
            .filter(|element| requested.contains(element.local_id()))
            .collect();
        child_views::synthesize(&state.store, &user, written).await
    }
    .await
    .map_err(reject)?;
    Ok(Json(to_payload(&elements)))
}

/// `PUT .../elements`: look elements up by id
pub async fn get_elements_by_ids<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id)): PathParams<(Id, Id)>,
    user: UserContext,
    JsonBody(payload): JsonBody<ElementsPayload>,
) -> ApiResult<ElementsPayload> {
    let elements = async {
        require_records(&payload.elements, "elements")?;
        let ids = requested_ids(&payload.elements)?;
        let scope = branch_scope(&state.store, &user, &project_id, &ref_id).await?;
        let found = state
            .store
            .find_elements(&user, &scope, ElementQuery::Ids(ids))
            .await?;
        child_views::synthesize(&state.store, &user, found).await
    }
    .await
    .map_err(reject)?;
    Ok(Json(to_payload(&elements)))
}

pub async fn delete_elements<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id)): PathParams<(Id, Id)>,
    user: UserContext,
    JsonBody(payload): JsonBody<ElementsPayload>,
) -> ApiResult<ElementsPayload> {
    let removed = async {
        require_records(&payload.elements, "elements")?;
        let ids = requested_ids(&payload.elements)?;
        let scope = branch_scope(&state.store, &user, &project_id, &ref_id).await?;
        state.store.remove_elements(&user, &scope, &ids).await
    }
    .await
    .map_err(reject)?;
    Ok(Json(to_payload(&removed)))
}

pub async fn get_element<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id, element_id)): PathParams<(Id, Id, Id)>,
    QueryParams(query): QueryParams<DepthQuery>,
    user: UserContext,
) -> ApiResult<ElementsPayload> {
    let elements = async {
        let scope = branch_scope(&state.store, &user, &project_id, &ref_id).await?;
        let root = state
            .store
            .find_elements(&user, &scope, ElementQuery::Ids(vec![element_id.clone()]))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AdapterError::not_found(format!("Element '{}' not found", element_id))
            })?;
        let elements = match query.depth {
            Some(depth) if depth != 0 => {
                with_descendants(&state.store, &user, &scope, root, depth).await?
            }
            _ => vec![root],
        };
        child_views::synthesize(&state.store, &user, elements).await
    }
    .await
    .map_err(reject)?;
    Ok(Json(to_payload(&elements)))
}

/// `PUT .../search`: a legacy query body, optionally paged with `from`/`size`
pub async fn search_elements<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id)): PathParams<(Id, Id)>,
    user: UserContext,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<ElementsPayload> {
    let elements = async {
        let query = body.get("query").unwrap_or(&body);
        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body.get("size").and_then(Value::as_u64).map(|size| size as usize);

        let filter = query_translator::translate(query);
        debug!("Search translated to {}", serde_json::to_string(&filter)?);
        let scope = branch_scope(&state.store, &user, &project_id, &ref_id).await?;
        let found = state
            .store
            .find_elements(&user, &scope, ElementQuery::Filter(filter))
            .await?;
        let page = found
            .into_iter()
            .skip(from)
            .take(size.unwrap_or(usize::MAX))
            .collect();
        child_views::synthesize(&state.store, &user, page).await
    }
    .await
    .map_err(reject)?;
    Ok(Json(to_payload(&elements)))
}

/// Projects mounted into a ref, from its `Mount` elements
pub async fn get_mounts<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id)): PathParams<(Id, Id)>,
    user: UserContext,
) -> ApiResult<ProjectsPayload> {
    let project = async {
        let scope = branch_scope(&state.store, &user, &project_id, &ref_id).await?;
        let project = state
            .store
            .lookup_project(&user, &project_id)
            .await?
            .ok_or_else(|| AdapterError::not_found(format!("Project '{}' not found", project_id)))?;
        let mounts = state
            .store
            .find_elements(
                &user,
                &scope,
                ElementQuery::Filter(FilterExpr::eq(Field::Type, MOUNT_TYPE)),
            )
            .await?;

        let mut legacy = format::project::to_legacy(&project);
        legacy.insert("_refId".into(), Value::String(ref_id.clone()));
        let mounted: Vec<Value> = mounts
            .iter()
            .filter_map(|mount| {
                let project = mount.custom_str("mountedElementProjectId")?;
                let mut entry = LegacyObject::new();
                entry.insert("_projectId".into(), Value::String(project.to_string()));
                entry.insert(
                    "_refId".into(),
                    mount
                        .custom
                        .get("mountedRefId")
                        .cloned()
                        .unwrap_or(Value::Null),
                );
                Some(Value::Object(entry))
            })
            .collect();
        legacy.insert("_mounts".into(), Value::Array(mounted));
        Ok::<_, AdapterError>(legacy)
    }
    .await
    .map_err(reject)?;
    Ok(Json(ProjectsPayload {
        projects: vec![project],
    }))
}

pub async fn get_groups<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id)): PathParams<(Id, Id)>,
    user: UserContext,
) -> ApiResult<GroupsPayload> {
    let groups = async {
        let scope = branch_scope(&state.store, &user, &project_id, &ref_id).await?;
        state
            .store
            .find_elements(
                &user,
                &scope,
                ElementQuery::Filter(FilterExpr::eq(Field::custom(GROUP_FLAG), true)),
            )
            .await
    }
    .await
    .map_err(reject)?;
    Ok(Json(GroupsPayload {
        groups: groups
            .iter()
            .map(|element| Group {
                id: element.local_id().to_string(),
                name: element.name.clone(),
            })
            .collect(),
    }))
}

pub async fn get_documents<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id)): PathParams<(Id, Id)>,
    user: UserContext,
) -> ApiResult<DocumentsPayload> {
    let documents = async {
        let scope = branch_scope(&state.store, &user, &project_id, &ref_id).await?;
        let filter = FilterExpr::one_of(
            Field::custom(APPLIED_STEREOTYPES),
            vec![Value::String(DOCUMENT_STEREOTYPE.to_string())],
        );
        let found = state
            .store
            .find_elements(&user, &scope, ElementQuery::Filter(filter))
            .await?;
        child_views::synthesize(&state.store, &user, found).await
    }
    .await
    .map_err(reject)?;
    Ok(Json(DocumentsPayload {
        documents: documents.iter().map(format::element::to_legacy).collect(),
    }))
}

/// Commit history is not tracked; the ref must still exist
pub async fn get_commits<S: Backend>(
    State(state): State<AppState<S>>,
    PathParams((project_id, ref_id)): PathParams<(Id, Id)>,
    user: UserContext,
) -> ApiResult<CommitsPayload> {
    async {
        let scope = branch_scope(&state.store, &user, &project_id, &ref_id).await?;
        let refs = state
            .store
            .find_branches(&user, &scope.project(), Some(std::slice::from_ref(&ref_id)))
            .await?;
        if refs.is_empty() {
            return Err(AdapterError::not_found(format!("Ref '{}' not found", ref_id)));
        }
        Ok::<_, AdapterError>(())
    }
    .await
    .map_err(reject)?;
    Ok(Json(CommitsPayload::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrgInput, ProjectInput, Tristate, MASTER_BRANCH};
    use crate::store::mem::MemoryStore;
    use crate::store::traits::{OrgStore, ProjectStore};
    use serde_json::json;

    async fn seeded() -> (MemoryStore, BranchScope, UserContext) {
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
        (store, BranchScope::new("o", "p", MASTER_BRANCH).unwrap(), user)
    }

    fn child(id: &str, parent: Option<&str>) -> ElementInput {
        ElementInput {
            id: id.into(),
            name: Some(id.into()),
            documentation: None,
            parent: parent.map(str::to_string).into(),
            element_type: Some("Class".into()),
            custom: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_descendants_by_depth() {
        let (store, scope, user) = seeded().await;
        store
            .create_or_replace_elements(
                &user,
                &scope,
                vec![
                    child("root", None),
                    child("a", Some("root")),
                    child("b", Some("a")),
                    child("c", Some("b")),
                ],
            )
            .await
            .unwrap();
        let root = store
            .find_elements(&user, &scope, ElementQuery::Ids(vec!["root".into()]))
            .await
            .unwrap()
            .remove(0);

        let one = with_descendants(&store, &user, &scope, root.clone(), 1).await.unwrap();
        assert_eq!(
            one.iter().map(Element::local_id).collect::<Vec<_>>(),
            vec!["root", "a"]
        );
        let all = with_descendants(&store, &user, &scope, root, -1).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_element_writes_split_child_view_edits() {
        let records = vec![
            json!({"id": "doc", "_childViews": [{"id": null, "aggregation": null, "propertyId": "p1"}]}),
            json!({"id": "plain", "ownerId": null}),
        ]
        .into_iter()
        .map(|value| value.as_object().cloned().unwrap())
        .collect();
        let (inputs, edits) = element_writes(records).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].owner, "doc");
        assert_eq!(inputs[1].parent, Tristate::Null);
    }

    #[test]
    fn test_requested_ids_need_ids() {
        let records = vec![json!({"name": "no id"}).as_object().cloned().unwrap()];
        assert!(matches!(
            requested_ids(&records),
            Err(AdapterError::BadRequest(_))
        ));
    }
}
