use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every event kind the upstream can deliver here. Closed set: adding a
/// kind forces every dispatch site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    UserFollows,
    StreamChanged,
    UserChanged,
    ModeratorChange,
    ChannelBanChange,
    Subscription,
    ExtensionTransactionCreated,
}

/// The kinds the orchestrator subscribes a tracked account to.
pub const ORCHESTRATED_EVENTS: [EventType; 5] = [
    EventType::UserFollows,
    EventType::StreamChanged,
    EventType::ModeratorChange,
    EventType::ChannelBanChange,
    EventType::Subscription,
];

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UserFollows => "UserFollows",
            EventType::StreamChanged => "StreamChanged",
            EventType::UserChanged => "UserChanged",
            EventType::ModeratorChange => "ModeratorChange",
            EventType::ChannelBanChange => "ChannelBanChange",
            EventType::Subscription => "Subscription",
            EventType::ExtensionTransactionCreated => "ExtensionTransactionCreated",
        }
    }

    pub fn parse(name: &str) -> Option<EventType> {
        match name {
            "UserFollows" => Some(EventType::UserFollows),
            "StreamChanged" => Some(EventType::StreamChanged),
            "UserChanged" => Some(EventType::UserChanged),
            "ModeratorChange" => Some(EventType::ModeratorChange),
            "ChannelBanChange" => Some(EventType::ChannelBanChange),
            "Subscription" => Some(EventType::Subscription),
            "ExtensionTransactionCreated" => Some(EventType::ExtensionTransactionCreated),
            _ => None,
        }
    }

    /// Moderator, ban and subscription events depend on a scope beyond the
    /// baseline authorization.
    pub fn requires_elevated(&self) -> bool {
        matches!(
            self,
            EventType::ModeratorChange | EventType::ChannelBanChange | EventType::Subscription
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscription as the hub reports it, before storage translation.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookSubscription {
    pub id: String,
    pub event_type: EventType,
    pub target_url: String,
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub secret: String,
    pub lease_seconds: i64,
}

/// Delivered payloads wrap their events in a `data` array.
#[derive(Deserialize, Debug)]
pub struct Envelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Deserialize, Debug)]
pub struct FollowEvent {
    pub to_name: String,
}

#[derive(Deserialize, Debug)]
pub struct ModerationEvent {
    pub event_data: BroadcasterEventData,
}

#[derive(Deserialize, Debug)]
pub struct BroadcasterEventData {
    pub broadcaster_name: String,
}

#[derive(Deserialize, Debug)]
pub struct TransactionEvent {
    pub broadcaster_name: String,
}

#[derive(Deserialize, Debug)]
pub struct UserEvent {
    pub login: String,
}

/// One entry of the Helix users lookup, used for account resolution.
#[derive(Deserialize, Debug)]
pub struct HelixUser {
    pub id: String,
    pub login: String,
}
