use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};

use crate::db::entities::{account, prelude::Account};

/// Looks up an account by its upstream id, creating it when unseen. The
/// upstream id is the canonical key; resolving the same login twice never
/// produces a second row.
pub async fn find_or_create(
    db: &DatabaseConnection,
    twitch_id: &str,
    login: &str,
) -> Result<account::Model, DbErr> {
    if let Some(existing) = Account::find()
        .filter(account::Column::TwitchId.eq(twitch_id))
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    let now = Utc::now();
    let new_account = account::ActiveModel {
        twitch_id: Set(twitch_id.to_string()),
        login: Set(login.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    new_account.insert(db).await
}

pub async fn find_by_twitch_id(
    db: &DatabaseConnection,
    twitch_id: &str,
) -> Result<Option<account::Model>, DbErr> {
    Account::find()
        .filter(account::Column::TwitchId.eq(twitch_id))
        .one(db)
        .await
}

/// Persists a freshly exchanged user token pair on the account.
pub async fn update_tokens(
    db: &DatabaseConnection,
    account: account::Model,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<account::Model, DbErr> {
    let mut active: account::ActiveModel = account.into();
    active.access_token = Set(Some(access_token));
    if let Some(refresh) = refresh_token {
        active.refresh_token = Set(Some(refresh));
    }
    active.token_expires_at = Set(expires_at);
    active.updated_at = Set(Utc::now());
    active.update(db).await
}
