use std::sync::Arc;

use sea_orm::DatabaseConnection;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::hub::SubscriptionHub;
use super::models::{Envelope, HelixUser, ORCHESTRATED_EVENTS};
use super::persistence::{StoreError, SubscriptionStore};
use crate::db::services::account_service;
use crate::server::config::AppConfig;
use crate::twitch::{ApiRequest, Principal, TwitchClient, TwitchError};

const HELIX_USERS_URL: &str = "https://api.twitch.tv/helix/users";

#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("twitch account not found: {0}")]
    AccountNotFound(String),
    #[error("account lookup returned an unexpected body: {0}")]
    InvalidResponse(String),
    #[error("request failed: {0}")]
    Twitch(#[from] TwitchError),
    #[error("storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Creates and tears down the per-account event subscriptions.
pub struct WebhookService {
    db: DatabaseConnection,
    client: Arc<TwitchClient>,
    hub: Arc<dyn SubscriptionHub>,
    store: Arc<dyn SubscriptionStore>,
    lease_seconds: i64,
    secret: String,
}

impl WebhookService {
    pub fn new(
        db: DatabaseConnection,
        client: Arc<TwitchClient>,
        hub: Arc<dyn SubscriptionHub>,
        store: Arc<dyn SubscriptionStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            client,
            hub,
            store,
            lease_seconds: config.lease_seconds,
            secret: config.webhook_secret.clone(),
        }
    }

    /// Resolves `login` upstream and subscribes the account to every event
    /// kind the caller is entitled to. Individual subscription failures are
    /// logged and never abort the remaining attempts; only the account
    /// resolution itself can fail the call.
    pub async fn ensure_subscriptions(
        &self,
        login: &str,
        allow_elevated: bool,
    ) -> Result<(), OrchestrationError> {
        let url = format!("{HELIX_USERS_URL}?login={}", urlencoding::encode(login));
        let body = self.client.send(&ApiRequest::get(url), &Principal::App).await?;
        let users: Envelope<HelixUser> = serde_json::from_str(&body)
            .map_err(|e| OrchestrationError::InvalidResponse(e.to_string()))?;
        let user = users
            .data
            .into_iter()
            .next()
            .ok_or_else(|| OrchestrationError::AccountNotFound(login.to_string()))?;

        let account = account_service::find_or_create(&self.db, &user.id, login).await?;
        info!(
            "Ensuring subscriptions for {} (twitch id {})",
            account.login, account.twitch_id
        );

        for event in ORCHESTRATED_EVENTS {
            if event.requires_elevated() && !allow_elevated {
                debug!("Skipping {} for {}: no elevated scope", event, login);
                continue;
            }
            match self
                .hub
                .subscribe(event, &user.id, self.lease_seconds, &self.secret)
                .await
            {
                Ok(subscription) => {
                    if let Err(e) = self.store.create(&subscription).await {
                        error!(
                            "Subscribed to {} for {} but failed to persist the record: {}",
                            event, login, e
                        );
                    }
                }
                Err(e) => {
                    error!("Failed to subscribe to {} for {}: {}", event, login, e);
                }
            }
        }

        Ok(())
    }

    /// Tears down every active subscription. Upstream failures are reported
    /// per item; the local active set is cleared regardless.
    pub async fn unsubscribe_all(&self) -> Result<(), OrchestrationError> {
        let subscriptions = self.store.get_all().await?;
        for subscription in subscriptions.iter().filter(|s| s.is_active) {
            if let Err(e) = self.hub.unsubscribe(subscription).await {
                warn!(
                    "Failed to unsubscribe {} ({}) upstream: {}",
                    subscription.id, subscription.event_type, e
                );
            }
            if let Err(e) = self.store.delete(&subscription.id).await {
                error!("Failed to delete subscription {}: {}", subscription.id, e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;
    use crate::db::entities::account;
    use crate::twitch::client::{Transport, TransportError};
    use crate::twitch::{TokenSource, TwitchClient};
    use crate::webhooks::hub::HubError;
    use crate::webhooks::models::{EventType, WebhookSubscription};
    use crate::webhooks::testing::MemoryStore;

    struct FakeHub {
        failing: Vec<EventType>,
        calls: Mutex<Vec<EventType>>,
    }

    impl FakeHub {
        fn reliable() -> Self {
            Self::failing(Vec::new())
        }

        fn failing(failing: Vec<EventType>) -> Self {
            Self {
                failing,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn subscribe_calls(&self) -> Vec<EventType> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SubscriptionHub for FakeHub {
        async fn subscribe(
            &self,
            event: EventType,
            twitch_id: &str,
            lease_seconds: i64,
            secret: &str,
        ) -> Result<WebhookSubscription, HubError> {
            self.calls.lock().unwrap().push(event);
            if self.failing.contains(&event) {
                return Err(HubError::Rejected(format!("missing scope for {event}")));
            }
            let now = Utc::now();
            Ok(WebhookSubscription {
                id: format!("sub-{event}"),
                event_type: event,
                target_url: format!("https://api.twitch.tv/helix/streams?user_id={twitch_id}"),
                is_active: true,
                valid_from: now,
                valid_until: now + Duration::seconds(lease_seconds),
                secret: secret.to_string(),
                lease_seconds,
            })
        }

        async fn unsubscribe(&self, subscription: &WebhookSubscription) -> Result<(), HubError> {
            if self.failing.contains(&subscription.event_type) {
                return Err(HubError::Rejected("lease already gone".to_string()));
            }
            Ok(())
        }
    }

    struct StaticTransport {
        body: String,
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn execute(
            &self,
            _request: &ApiRequest,
            _bearer: &str,
        ) -> Result<String, TransportError> {
            Ok(self.body.clone())
        }
    }

    struct StaticTokens;

    #[async_trait]
    impl TokenSource for StaticTokens {
        async fn resolve(&self, _principal: &Principal) -> Result<String, TwitchError> {
            Ok("app-token".to_string())
        }

        async fn refresh(
            &self,
            _principal: &Principal,
            _failed_token: &str,
        ) -> Result<String, TwitchError> {
            Ok("app-token-2".to_string())
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: String::new(),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            public_url: "https://tracker.example".to_string(),
            webhook_secret: "hook-secret".to_string(),
            lease_seconds: 600,
            http_port: 8080,
        }
    }

    fn users_body(id: &str, login: &str) -> String {
        serde_json::json!({ "data": [{ "id": id, "login": login }] }).to_string()
    }

    fn account_row(twitch_id: &str, login: &str) -> account::Model {
        let now = Utc::now();
        account::Model {
            id: 1,
            twitch_id: twitch_id.to_string(),
            login: login.to_string(),
            access_token: None,
            refresh_token: None,
            token_expires_at: None,
            scopes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mock serving the find-or-create pair: an empty lookup, then the
    /// inserted row.
    fn db_with_new_account(twitch_id: &str, login: &str) -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<account::Model>::new()])
            .append_query_results([vec![account_row(twitch_id, login)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 1,
                rows_affected: 1,
            }])
            .into_connection()
    }

    fn service_with(
        db: DatabaseConnection,
        hub: Arc<FakeHub>,
        store: Arc<MemoryStore>,
        lookup_body: String,
    ) -> WebhookService {
        let client = Arc::new(TwitchClient::new(
            Arc::new(StaticTransport { body: lookup_body }),
            Arc::new(StaticTokens),
        ));
        WebhookService::new(db, client, hub, store, &test_config())
    }

    #[tokio::test]
    async fn baseline_scope_creates_only_the_two_unelevated_subscriptions() {
        let hub = Arc::new(FakeHub::reliable());
        let store = Arc::new(MemoryStore::new());
        let service = service_with(
            db_with_new_account("42", "alice"),
            hub.clone(),
            store.clone(),
            users_body("42", "alice"),
        );

        service.ensure_subscriptions("alice", false).await.unwrap();

        assert_eq!(
            hub.subscribe_calls(),
            vec![EventType::UserFollows, EventType::StreamChanged]
        );
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn failing_subscriptions_do_not_abort_the_rest() {
        let hub = Arc::new(FakeHub::failing(vec![
            EventType::StreamChanged,
            EventType::ChannelBanChange,
        ]));
        let store = Arc::new(MemoryStore::new());
        let service = service_with(
            db_with_new_account("42", "alice"),
            hub.clone(),
            store.clone(),
            users_body("42", "alice"),
        );

        service.ensure_subscriptions("alice", true).await.unwrap();

        // All five kinds were attempted, the three survivors persisted.
        assert_eq!(hub.subscribe_calls().len(), 5);
        assert_eq!(store.len(), 3);
        assert!(store.get("sub-UserFollows").await.unwrap().is_some());
        assert!(store.get("sub-StreamChanged").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_login_is_account_not_found() {
        let hub = Arc::new(FakeHub::reliable());
        let store = Arc::new(MemoryStore::new());
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = service_with(
            db,
            hub.clone(),
            store.clone(),
            serde_json::json!({ "data": [] }).to_string(),
        );

        let err = service
            .ensure_subscriptions("nobody", true)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::AccountNotFound(login) if login == "nobody"));
        assert!(hub.subscribe_calls().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_all_clears_the_set_despite_an_upstream_failure() {
        let now = Utc::now();
        let record = |id: &str, event: EventType| WebhookSubscription {
            id: id.to_string(),
            event_type: event,
            target_url: "https://api.twitch.tv/helix/streams?user_id=42".to_string(),
            is_active: true,
            valid_from: now,
            valid_until: now + Duration::seconds(600),
            secret: "hook-secret".to_string(),
            lease_seconds: 600,
        };
        // Subscription events fail to unsubscribe upstream.
        let hub = Arc::new(FakeHub::failing(vec![EventType::Subscription]));
        let store = Arc::new(MemoryStore::with([
            record("sub-1", EventType::UserFollows),
            record("sub-2", EventType::StreamChanged),
            record("sub-3", EventType::Subscription),
        ]));
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = service_with(db, hub, store.clone(), String::new());

        service.unsubscribe_all().await.unwrap();

        assert_eq!(store.len(), 0);
    }
}
