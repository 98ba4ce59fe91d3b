use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::info;

use crate::web::{AppError, AppState};

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/watch", get(watch_handler))
        .route("/unsubscribe-all", post(unsubscribe_all_handler))
}

#[derive(Deserialize, Debug)]
pub struct WatchParams {
    pub login: String,
    #[serde(default)]
    pub elevated: bool,
}

async fn watch_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<WatchParams>,
) -> Result<impl IntoResponse, AppError> {
    if params.login.is_empty() {
        return Err(AppError::InvalidInput("login must not be empty".to_string()));
    }
    info!("Tracking requested for {}", params.login);
    app_state
        .webhook_service
        .ensure_subscriptions(&params.login, params.elevated)
        .await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

async fn unsubscribe_all_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    app_state.webhook_service.unsubscribe_all().await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
