use crate::app::{App, CreateLinkPayload, ProxyError};
use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

// Tell axum how to convert `ProxyError` into the JSON error bodies the
// dashboard expects.
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::Validation(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ProxyError::InvalidBody(details) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid request body", "details": details })),
            )
                .into_response(),
            ProxyError::Upstream {
                context,
                status,
                details,
            } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                Json(json!({ "error": context, "details": details })),
            )
                .into_response(),
            ProxyError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error", "details": details })),
            )
                .into_response(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct ListLinksQuery {
    #[serde(rename = "dubToken")]
    dub_token: Option<String>,
}

pub async fn handle_health() -> &'static str {
    "ok"
}

pub async fn handle_preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn handle_method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

pub async fn handle_create_link(
    State(app): State<Arc<App>>,
    payload: Result<Json<CreateLinkPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ProxyError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!("handle_create_link: bad body: {rejection}");
        ProxyError::InvalidBody(rejection.body_text())
    })?;

    info!("handle_create_link: '{}'", payload.url.as_deref().unwrap_or_default());

    Ok(Json(app.create_link(payload).await?))
}

pub async fn handle_list_links(
    State(app): State<Arc<App>>,
    Query(query): Query<ListLinksQuery>,
) -> Result<impl IntoResponse, ProxyError> {
    info!("handle_list_links");

    Ok(Json(app.list_links(query.dub_token.as_deref()).await?))
}
