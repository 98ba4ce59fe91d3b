use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::web::AppState;

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new().route("/callback/{id}", get(verify_handler).post(deliver_handler))
}

/// WebSub verification: echo the challenge so the hub confirms the lease.
async fn verify_handler(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    match params.get("hub.challenge") {
        Some(challenge) => {
            info!("Confirmed subscription {}", id);
            (StatusCode::OK, challenge.clone())
        }
        None => (StatusCode::BAD_REQUEST, String::new()),
    }
}

#[derive(Deserialize, Debug)]
struct DeliveryParams {
    #[serde(default)]
    kind: String,
}

/// Event delivery. Recoverable dispatch failures are logged, never surfaced
/// back to the hub.
async fn deliver_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DeliveryParams>,
    body: String,
) -> StatusCode {
    if let Err(e) = app_state.dispatcher.on_event(&params.kind, &id, &body).await {
        error!(
            "Failed to record {} event for subscription {}: {}",
            params.kind, id, e
        );
    }
    StatusCode::OK
}
