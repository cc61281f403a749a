use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use nodes::WebhookRequest;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::AppState;

type WebhookResponse = (StatusCode, Json<Value>);

fn reply(status: StatusCode, message: impl Into<String>) -> WebhookResponse {
    (status, Json(json!({ "message": message.into() })))
}

/// `POST /webhook/{path}`: run the bound trigger's `webhook` callback and
/// hand its items to the route's sink. Answers as soon as the items are
/// queued.
pub async fn handle_webhook(
    Path(path): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<WebhookResponse, WebhookResponse> {
    // 1. Find the trigger bound to this path
    let Some(route) = state.routes.get(&path) else {
        warn!("no webhook registered for path '{}'", path);
        return Err(reply(StatusCode::NOT_FOUND, format!("The webhook '{path}' is not registered.")));
    };

    let request = WebhookRequest {
        headers: headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_owned(), value.to_str().ok()?.to_owned())))
            .collect(),
        query,
        body,
    };

    // 2. Let the trigger turn the request into items
    let items = state
        .activator
        .dispatch(&route.workflow, &route.node_id, request)
        .await
        .map_err(|e| {
            error!("webhook '{}' failed: {}", path, e);
            reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    // 3. Start the workflow
    let count = items.len();
    route.sink.send(items).await.map_err(|_| {
        error!("webhook '{}' has no consumer", path);
        reply(StatusCode::SERVICE_UNAVAILABLE, "The workflow is not running.")
    })?;

    info!("webhook '{}' accepted {} items", path, count);
    Ok(reply(StatusCode::OK, "Workflow was started"))
}
