use thiserror::Error;

pub mod auth;
pub mod client;

pub use auth::{Principal, TokenAuthority, TokenSource};
pub use client::{ApiRequest, HttpTransport, Transport, TwitchClient};

#[derive(Error, Debug)]
pub enum TwitchError {
    #[error("no credential available for account {0}")]
    NoCredential(String),
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("request failed after retry: {0}")]
    RequestFailed(String),
    #[error("unexpected response from upstream: {0}")]
    InvalidResponse(String),
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}
