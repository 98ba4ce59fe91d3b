use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use thiserror::Error;
use tracing::warn;

use super::models::{Envelope, EventType, FollowEvent, ModerationEvent, TransactionEvent, UserEvent};
use super::persistence::SubscriptionStore;
use crate::db::entities::message;
use crate::db::services::account_service;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to record message: {0}")]
    Database(#[from] DbErr),
}

/// Classifies delivered events and records them as messages.
pub struct MessageDispatcher {
    db: DatabaseConnection,
    store: Arc<dyn SubscriptionStore>,
}

impl MessageDispatcher {
    pub fn new(db: DatabaseConnection, store: Arc<dyn SubscriptionStore>) -> Self {
        Self { db, store }
    }

    /// Records one delivered event. The event kind is stored verbatim, and
    /// extraction failures degrade to an "Unknown" actor rather than
    /// dropping the message.
    pub async fn on_event(
        &self,
        kind: &str,
        subscription_id: &str,
        payload: &str,
    ) -> Result<message::Model, DispatchError> {
        let actor = self.resolve_actor(kind, subscription_id, payload).await;

        let record = message::ActiveModel {
            event_type: Set(kind.to_string()),
            username: Set(actor),
            payload: Set(payload.to_string()),
            received_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(record.insert(&self.db).await?)
    }

    /// Per-kind actor extraction; every failed path collapses to "Unknown".
    pub(crate) async fn resolve_actor(
        &self,
        kind: &str,
        subscription_id: &str,
        payload: &str,
    ) -> String {
        let actor = match EventType::parse(kind) {
            Some(EventType::UserFollows) => {
                first_event::<FollowEvent>(payload).map(|e| e.to_name)
            }
            Some(
                EventType::ChannelBanChange | EventType::ModeratorChange | EventType::Subscription,
            ) => first_event::<ModerationEvent>(payload).map(|e| e.event_data.broadcaster_name),
            Some(EventType::ExtensionTransactionCreated) => {
                first_event::<TransactionEvent>(payload).map(|e| e.broadcaster_name)
            }
            Some(EventType::UserChanged) => first_event::<UserEvent>(payload).map(|e| e.login),
            Some(EventType::StreamChanged) => self.stream_actor(subscription_id).await,
            None => None,
        };
        match actor {
            Some(name) => name,
            None => {
                warn!(
                    "Could not derive an actor for {} event on subscription {}",
                    kind, subscription_id
                );
                "Unknown".to_string()
            }
        }
    }

    /// Stream payloads carry no usable name; the account id is recovered
    /// from the subscription's topic URL instead.
    async fn stream_actor(&self, subscription_id: &str) -> Option<String> {
        let subscription = match self.store.get(subscription_id).await {
            Ok(found) => found?,
            Err(e) => {
                warn!("Lookup of subscription {} failed: {}", subscription_id, e);
                return None;
            }
        };
        let twitch_id = account_id_from_topic(&subscription.target_url)?;
        match account_service::find_by_twitch_id(&self.db, &twitch_id).await {
            Ok(account) => account.map(|a| a.login),
            Err(e) => {
                warn!("Account lookup for {} failed: {}", twitch_id, e);
                None
            }
        }
    }
}

fn first_event<T: serde::de::DeserializeOwned>(payload: &str) -> Option<T> {
    serde_json::from_str::<Envelope<T>>(payload)
        .ok()?
        .data
        .into_iter()
        .next()
}

/// Topic URLs carry the subject account id as a query parameter whose name
/// varies by topic.
fn account_id_from_topic(topic: &str) -> Option<String> {
    let url = reqwest::Url::parse(topic).ok()?;
    url.query_pairs()
        .find(|(key, _)| matches!(key.as_ref(), "user_id" | "broadcaster_id" | "to_id"))
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;
    use crate::db::entities::account;
    use crate::webhooks::models::WebhookSubscription;
    use crate::webhooks::testing::MemoryStore;

    fn stream_subscription(id: &str, twitch_id: &str) -> WebhookSubscription {
        let now = Utc::now();
        WebhookSubscription {
            id: id.to_string(),
            event_type: EventType::StreamChanged,
            target_url: format!("https://api.twitch.tv/helix/streams?user_id={twitch_id}"),
            is_active: true,
            valid_from: now,
            valid_until: now + Duration::seconds(600),
            secret: "hook-secret".to_string(),
            lease_seconds: 600,
        }
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

    fn empty_db() -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres).into_connection()
    }

    #[tokio::test]
    async fn follow_actor_is_the_followed_name() {
        let dispatcher = MessageDispatcher::new(empty_db(), Arc::new(MemoryStore::new()));
        let payload = serde_json::json!({
            "data": [{ "from_name": "dave", "to_name": "carol" }]
        })
        .to_string();

        let actor = dispatcher.resolve_actor("UserFollows", "sub-1", &payload).await;
        assert_eq!(actor, "carol");
    }

    #[tokio::test]
    async fn ban_actor_is_the_broadcaster_inside_event_data() {
        let dispatcher = MessageDispatcher::new(empty_db(), Arc::new(MemoryStore::new()));
        let payload = serde_json::json!({
            "data": [{ "event_data": { "broadcaster_name": "carol" } }]
        })
        .to_string();

        let actor = dispatcher
            .resolve_actor("ChannelBanChange", "sub-1", &payload)
            .await;
        assert_eq!(actor, "carol");
    }

    #[tokio::test]
    async fn stream_actor_resolves_through_topic_and_account() {
        let store = Arc::new(MemoryStore::with([stream_subscription("sub-42", "42")]));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![account_row("42", "bob")]])
            .into_connection();
        let dispatcher = MessageDispatcher::new(db, store);

        let actor = dispatcher.resolve_actor("StreamChanged", "sub-42", "{}").await;
        assert_eq!(actor, "bob");
    }

    #[tokio::test]
    async fn stream_actor_degrades_to_unknown_when_the_record_is_missing() {
        let dispatcher = MessageDispatcher::new(empty_db(), Arc::new(MemoryStore::new()));

        let actor = dispatcher.resolve_actor("StreamChanged", "gone", "{}").await;
        assert_eq!(actor, "Unknown");
    }

    #[tokio::test]
    async fn unrecognized_kind_is_unknown_actor() {
        let dispatcher = MessageDispatcher::new(empty_db(), Arc::new(MemoryStore::new()));

        let actor = dispatcher
            .resolve_actor("SomethingNew", "sub-1", "{\"data\":[]}")
            .await;
        assert_eq!(actor, "Unknown");
    }

    #[tokio::test]
    async fn malformed_payload_still_yields_a_message_actor() {
        let dispatcher = MessageDispatcher::new(empty_db(), Arc::new(MemoryStore::new()));

        let actor = dispatcher
            .resolve_actor("UserFollows", "sub-1", "not json at all")
            .await;
        assert_eq!(actor, "Unknown");
    }

    #[tokio::test]
    async fn on_event_records_the_kind_verbatim() {
        let now = Utc::now();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![message::Model {
                id: 1,
                event_type: "SomethingNew".to_string(),
                username: "Unknown".to_string(),
                payload: "{}".to_string(),
                received_at: now,
            }]])
            .append_exec_results([MockExecResult {
                last_insert_id: 1,
                rows_affected: 1,
            }])
            .into_connection();
        // `DatabaseConnection` is not `Clone` under the `mock` feature, so clone the
        // shared mock handle directly to keep a reference for the transaction log.
        let db_handle = match &db {
            DatabaseConnection::MockDatabaseConnection(conn) => {
                DatabaseConnection::MockDatabaseConnection(conn.clone())
            }
            _ => unreachable!("mock database connection"),
        };
        let dispatcher = MessageDispatcher::new(db, Arc::new(MemoryStore::new()));

        dispatcher.on_event("SomethingNew", "sub-1", "{}").await.unwrap();

        // The insert carried the delivered tag and the degraded actor.
        let log = format!("{:?}", db_handle.into_transaction_log());
        assert!(log.contains("SomethingNew"));
        assert!(log.contains("Unknown"));
    }

    #[test]
    fn topic_parsing_accepts_the_known_parameter_names() {
        assert_eq!(
            account_id_from_topic("https://api.twitch.tv/helix/streams?user_id=42"),
            Some("42".to_string())
        );
        assert_eq!(
            account_id_from_topic(
                "https://api.twitch.tv/helix/users/follows?first=1&to_id=42"
            ),
            Some("42".to_string())
        );
        assert_eq!(
            account_id_from_topic("https://api.twitch.tv/helix/streams"),
            None
        );
        assert_eq!(account_id_from_topic("not a url"), None);
    }
}
