use std::sync::Arc;

use axum::Router;

use crate::webhooks::dispatcher::MessageDispatcher;
use crate::webhooks::service::WebhookService;

pub mod error;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub webhook_service: Arc<WebhookService>,
    pub dispatcher: Arc<MessageDispatcher>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", routes::watch_routes::create_router())
        .nest("/webhooks", routes::callback_routes::create_router())
        .with_state(state)
}
