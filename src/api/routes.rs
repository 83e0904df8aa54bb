use axum::{
    extract::DefaultBodyLimit,
    http::{StatusCode, Uri},
    response::Json,
    routing::{get, post, put},
    Router,
};
use log::warn;
use tower_http::cors::CorsLayer;

use crate::api::errors::ErrorResponse;
use crate::api::handlers::AppState;
use crate::api::{artifact_handlers, element_handlers, handlers};
use crate::config::ServerConfig;
use crate::store::traits::Backend;

pub fn create_router<S: Backend + 'static>(server: &ServerConfig) -> Router<AppState<S>> {
    let router = Router::new()
        // Sessions
        .route(
            "/api/login",
            post(handlers::login::<S>).fallback(not_implemented),
        )
        .route(
            "/api/login/ticket",
            post(handlers::check_ticket::<S>).fallback(not_implemented),
        )
        // Orgs
        .route(
            "/orgs",
            get(handlers::list_orgs::<S>)
                .post(handlers::create_orgs::<S>)
                .fallback(not_implemented),
        )
        .route(
            "/orgs/:orgid",
            get(handlers::get_org::<S>).fallback(not_implemented),
        )
        .route(
            "/orgs/:orgid/projects",
            get(handlers::list_org_projects::<S>)
                .post(handlers::create_projects::<S>)
                .fallback(not_implemented),
        )
        // Projects
        .route(
            "/projects",
            get(handlers::list_projects::<S>).fallback(not_implemented),
        )
        .route(
            "/projects/:projectid",
            get(handlers::get_project::<S>).fallback(not_implemented),
        )
        // Refs
        .route(
            "/projects/:projectid/refs",
            get(handlers::list_refs::<S>)
                .post(handlers::create_refs::<S>)
                .fallback(not_implemented),
        )
        .route(
            "/projects/:projectid/refs/:refid",
            get(handlers::get_ref::<S>).fallback(not_implemented),
        )
        // Elements
        .route(
            "/projects/:projectid/refs/:refid/elements",
            post(element_handlers::create_or_replace_elements::<S>)
                .put(element_handlers::get_elements_by_ids::<S>)
                .delete(element_handlers::delete_elements::<S>)
                .fallback(not_implemented),
        )
        .route(
            "/projects/:projectid/refs/:refid/elements/:elementid",
            get(element_handlers::get_element::<S>).fallback(not_implemented),
        )
        .route(
            "/projects/:projectid/refs/:refid/search",
            put(element_handlers::search_elements::<S>).fallback(not_implemented),
        )
        .route(
            "/projects/:projectid/refs/:refid/mounts",
            get(element_handlers::get_mounts::<S>).fallback(not_implemented),
        )
        .route(
            "/projects/:projectid/refs/:refid/groups",
            get(element_handlers::get_groups::<S>).fallback(not_implemented),
        )
        .route(
            "/projects/:projectid/refs/:refid/documents",
            get(element_handlers::get_documents::<S>).fallback(not_implemented),
        )
        .route(
            "/projects/:projectid/refs/:refid/commits",
            get(element_handlers::get_commits::<S>).fallback(not_implemented),
        )
        // Artifacts
        .route(
            "/projects/:projectid/refs/:refid/artifacts",
            post(artifact_handlers::upload_artifact::<S>)
                .put(artifact_handlers::get_artifacts_by_ids::<S>)
                .fallback(not_implemented),
        )
        .route(
            "/projects/:projectid/refs/:refid/artifacts/:artifactid",
            get(artifact_handlers::get_artifact::<S>).fallback(not_implemented),
        )
        .route(
            "/projects/:projectid/refs/:refid/artifacts/blob/:blobid",
            get(artifact_handlers::get_blob::<S>).fallback(not_implemented),
        )
        .fallback(not_implemented)
        .layer(DefaultBodyLimit::max(server.max_body_bytes));

    if server.allow_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Every route the legacy API had that this adapter does not serve
async fn not_implemented(uri: Uri) -> (StatusCode, Json<ErrorResponse>) {
    warn!("Unsupported route: {}", uri);
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(ErrorResponse::new(&format!("{} is not implemented", uri.path()))),
    )
}
