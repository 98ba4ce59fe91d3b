use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use thiserror::Error;

use super::models::{EventType, WebhookSubscription};
use crate::db::entities::webhook;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("subscription id {0} already exists")]
    DuplicateId(String),
    #[error("stored subscription {0} is corrupt: {1}")]
    InvalidRecord(String, String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// CRUD translation between hub subscription records and durable storage.
/// `get` reports a missing id as `Ok(None)`; callers treat that as a
/// recoverable condition, not a failure.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<WebhookSubscription>, StoreError>;
    async fn get_all(&self) -> Result<Vec<WebhookSubscription>, StoreError>;
    async fn create(&self, subscription: &WebhookSubscription) -> Result<(), StoreError>;
    async fn update(&self, subscription: &WebhookSubscription) -> Result<(), StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

pub struct DbSubscriptionStore {
    db: DatabaseConnection,
}

impl DbSubscriptionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_record(model: webhook::Model) -> Result<WebhookSubscription, StoreError> {
    let event_type = EventType::parse(&model.event_type).ok_or_else(|| {
        StoreError::InvalidRecord(
            model.id.clone(),
            format!("unknown event type {}", model.event_type),
        )
    })?;
    Ok(WebhookSubscription {
        id: model.id,
        event_type,
        target_url: model.target_url,
        is_active: model.is_active,
        valid_from: model.valid_from,
        valid_until: model.valid_until,
        secret: model.secret,
        lease_seconds: model.lease_seconds,
    })
}

fn to_active_model(record: &WebhookSubscription) -> webhook::ActiveModel {
    webhook::ActiveModel {
        id: Set(record.id.clone()),
        event_type: Set(record.event_type.as_str().to_string()),
        target_url: Set(record.target_url.clone()),
        is_active: Set(record.is_active),
        valid_from: Set(record.valid_from),
        valid_until: Set(record.valid_until),
        secret: Set(record.secret.clone()),
        lease_seconds: Set(record.lease_seconds),
    }
}

#[async_trait]
impl SubscriptionStore for DbSubscriptionStore {
    async fn get(&self, id: &str) -> Result<Option<WebhookSubscription>, StoreError> {
        match webhook::Entity::find_by_id(id.to_string()).one(&self.db).await? {
            Some(model) => Ok(Some(to_record(model)?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> Result<Vec<WebhookSubscription>, StoreError> {
        webhook::Entity::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_record)
            .collect()
    }

    async fn create(&self, subscription: &WebhookSubscription) -> Result<(), StoreError> {
        // Ids are assigned upstream; a collision means the hub reused one.
        if webhook::Entity::find_by_id(subscription.id.clone())
            .one(&self.db)
            .await?
            .is_some()
        {
            return Err(StoreError::DuplicateId(subscription.id.clone()));
        }
        to_active_model(subscription).insert(&self.db).await?;
        Ok(())
    }

    async fn update(&self, subscription: &WebhookSubscription) -> Result<(), StoreError> {
        to_active_model(subscription).update(&self.db).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        webhook::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
