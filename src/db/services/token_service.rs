use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use crate::db::entities::{app_token, prelude::AppToken};

/// Returns the newest app token that has not expired yet, if any.
pub async fn current(db: &DatabaseConnection) -> Result<Option<app_token::Model>, DbErr> {
    AppToken::find()
        .filter(app_token::Column::ExpiresAt.gt(Utc::now()))
        .order_by_desc(app_token::Column::CreatedAt)
        .one(db)
        .await
}

pub async fn find_by_value(
    db: &DatabaseConnection,
    access_token: &str,
) -> Result<Option<app_token::Model>, DbErr> {
    AppToken::find_by_id(access_token.to_string()).one(db).await
}

pub async fn store(
    db: &DatabaseConnection,
    access_token: String,
    expires_at: DateTime<Utc>,
    scopes: String,
) -> Result<app_token::Model, DbErr> {
    let token = app_token::ActiveModel {
        access_token: Set(access_token),
        expires_at: Set(expires_at),
        scopes: Set(scopes),
        created_at: Set(Utc::now()),
    };
    token.insert(db).await
}

pub async fn delete_by_value(db: &DatabaseConnection, access_token: &str) -> Result<(), DbErr> {
    AppToken::delete_by_id(access_token.to_string())
        .exec(db)
        .await?;
    Ok(())
}
