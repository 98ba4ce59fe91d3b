use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Application-scoped bearer credential from the client-credential grant.
/// Keyed by the token value itself so a replacement can never collide with
/// the row it supersedes.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "app_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub access_token: String,
    pub expires_at: ChronoDateTimeUtc,
    pub scopes: String,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
