use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One event subscription for one account. The id is assigned by the
/// subscription hub and never reused; `target_url` is the topic the hub
/// filters on, carrying the account id as a query parameter.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "webhooks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub event_type: String,
    pub target_url: String,
    pub is_active: bool,
    pub valid_from: ChronoDateTimeUtc,
    pub valid_until: ChronoDateTimeUtc,
    pub secret: String,
    pub lease_seconds: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
