use std::error::Error;
use std::sync::Arc;

use sea_orm::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use twitch_tracker::server::config::AppConfig;
use twitch_tracker::twitch::{HttpTransport, TokenAuthority, TwitchClient};
use twitch_tracker::web::{self, AppState};
use twitch_tracker::webhooks::dispatcher::MessageDispatcher;
use twitch_tracker::webhooks::hub::HelixHub;
use twitch_tracker::webhooks::persistence::DbSubscriptionStore;
use twitch_tracker::webhooks::service::WebhookService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    let db = Database::connect(&config.database_url).await?;

    let tokens = Arc::new(TokenAuthority::new(db.clone(), &config));
    let transport = Arc::new(HttpTransport::new(config.client_id.clone()));
    let client = Arc::new(TwitchClient::new(transport, tokens));
    let hub = Arc::new(HelixHub::new(client.clone(), config.public_url.clone()));
    let store = Arc::new(DbSubscriptionStore::new(db.clone()));
    let webhook_service = Arc::new(WebhookService::new(
        db.clone(),
        client,
        hub,
        store.clone(),
        &config,
    ));
    let dispatcher = Arc::new(MessageDispatcher::new(db, store));

    let state = Arc::new(AppState {
        webhook_service,
        dispatcher,
    });
    let app = web::create_router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
