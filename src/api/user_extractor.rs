use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Method, Uri},
};
use serde::Deserialize;

use crate::api::errors::{reject, ApiError};
use crate::api::handlers::AppState;
use crate::error::AdapterError;
use crate::model::UserContext;
use crate::store::traits::Backend;

/// Query parameters carrying the ticket on GET routes
#[derive(Debug, Deserialize)]
struct TicketParams {
    alf_ticket: Option<String>,
}

/// Axum extractor for UserContext from the session ticket
///
/// The ticket is read from `Authorization: Bearer <ticket>`. GET requests
/// may pass it as the `alf_ticket` query parameter instead. Requests without
/// a ticket known to the session registry are rejected with 401.
#[async_trait]
impl<S> FromRequestParts<AppState<S>> for UserContext
where
    S: Backend + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let ticket = bearer_ticket(&parts.headers)
            .or_else(|| {
                if parts.method == Method::GET {
                    query_ticket(&parts.uri)
                } else {
                    None
                }
            })
            .ok_or_else(|| reject(AdapterError::Unauthorized("Missing session ticket".into())))?;

        let username = state.sessions.resolve(&ticket).ok_or_else(|| {
            reject(AdapterError::Unauthorized(
                "Invalid or expired session ticket".into(),
            ))
        })?;
        Ok(UserContext::with_ticket(username, ticket))
    }
}

fn bearer_ticket(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|ticket| ticket.trim().to_string())
        .filter(|ticket| !ticket.is_empty())
}

fn query_ticket(uri: &Uri) -> Option<String> {
    Query::<TicketParams>::try_from_uri(uri)
        .ok()
        .and_then(|Query(params)| params.alf_ticket)
        .filter(|ticket| !ticket.is_empty())
}
