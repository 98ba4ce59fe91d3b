use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::models::{EventType, WebhookSubscription};
use crate::twitch::{ApiRequest, Principal, TwitchClient};

const HELIX_BASE: &str = "https://api.twitch.tv/helix";
const HUB_URL: &str = "https://api.twitch.tv/helix/webhooks/hub";

#[derive(Error, Debug)]
pub enum HubError {
    #[error("subscription request rejected: {0}")]
    Rejected(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// The external subscription service. Creating a subscription yields the
/// record the hub assigned; the verification handshake happens out of band
/// against the callback endpoint.
#[async_trait]
pub trait SubscriptionHub: Send + Sync {
    async fn subscribe(
        &self,
        event: EventType,
        twitch_id: &str,
        lease_seconds: i64,
        secret: &str,
    ) -> Result<WebhookSubscription, HubError>;

    async fn unsubscribe(&self, subscription: &WebhookSubscription) -> Result<(), HubError>;
}

pub struct HelixHub {
    client: Arc<TwitchClient>,
    public_url: String,
}

impl HelixHub {
    pub fn new(client: Arc<TwitchClient>, public_url: String) -> Self {
        Self { client, public_url }
    }

    /// Topic the hub filters on; the subject account id rides along as a
    /// query parameter.
    fn topic_url(event: EventType, twitch_id: &str) -> String {
        let id = urlencoding::encode(twitch_id);
        match event {
            EventType::UserFollows => {
                format!("{HELIX_BASE}/users/follows?first=1&to_id={id}")
            }
            EventType::StreamChanged => format!("{HELIX_BASE}/streams?user_id={id}"),
            EventType::UserChanged => format!("{HELIX_BASE}/users?id={id}"),
            EventType::ModeratorChange => {
                format!("{HELIX_BASE}/moderation/moderators/events?broadcaster_id={id}")
            }
            EventType::ChannelBanChange => {
                format!("{HELIX_BASE}/moderation/banned/events?broadcaster_id={id}")
            }
            EventType::Subscription => {
                format!("{HELIX_BASE}/subscriptions/events?broadcaster_id={id}")
            }
            EventType::ExtensionTransactionCreated => {
                format!("{HELIX_BASE}/extensions/transactions?extension_id={id}")
            }
        }
    }

    fn callback_url(&self, id: &str, event: EventType) -> String {
        format!("{}/webhooks/callback/{}?kind={}", self.public_url, id, event)
    }

    async fn send_hub_request(
        &self,
        mode: &str,
        topic: &str,
        callback: &str,
        lease_seconds: i64,
        secret: &str,
        principal: &Principal,
    ) -> Result<(), HubError> {
        let body = serde_json::json!({
            "hub.callback": callback,
            "hub.mode": mode,
            "hub.topic": topic,
            "hub.lease_seconds": lease_seconds,
            "hub.secret": secret,
        });
        self.client
            .send(&ApiRequest::post(HUB_URL, body), principal)
            .await
            .map_err(|e| HubError::Rejected(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionHub for HelixHub {
    async fn subscribe(
        &self,
        event: EventType,
        twitch_id: &str,
        lease_seconds: i64,
        secret: &str,
    ) -> Result<WebhookSubscription, HubError> {
        let id = Uuid::new_v4().to_string();
        let topic = Self::topic_url(event, twitch_id);
        let callback = self.callback_url(&id, event);
        // Elevated topics are only readable with the account's own token.
        let principal = if event.requires_elevated() {
            Principal::Account(twitch_id.to_string())
        } else {
            Principal::App
        };

        self.send_hub_request("subscribe", &topic, &callback, lease_seconds, secret, &principal)
            .await?;

        let now = Utc::now();
        Ok(WebhookSubscription {
            id,
            event_type: event,
            target_url: topic,
            is_active: true,
            valid_from: now,
            valid_until: now + Duration::seconds(lease_seconds),
            secret: secret.to_string(),
            lease_seconds,
        })
    }

    async fn unsubscribe(&self, subscription: &WebhookSubscription) -> Result<(), HubError> {
        let callback = self.callback_url(&subscription.id, subscription.event_type);
        self.send_hub_request(
            "unsubscribe",
            &subscription.target_url,
            &callback,
            0,
            &subscription.secret,
            &Principal::App,
        )
        .await
    }
}
