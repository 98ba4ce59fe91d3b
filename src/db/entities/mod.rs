//! SeaORM entities mapping to the database tables, one module per table.

pub mod account;
pub mod app_token;
pub mod message;
pub mod webhook;

// Prelude module for easy importing of all entities and their related types
pub mod prelude {
    pub use super::account::ActiveModel as AccountActiveModel;
    pub use super::account::Column as AccountColumn;
    pub use super::account::Entity as Account;
    pub use super::account::Model as AccountModel;

    pub use super::app_token::ActiveModel as AppTokenActiveModel;
    pub use super::app_token::Column as AppTokenColumn;
    pub use super::app_token::Entity as AppToken;
    pub use super::app_token::Model as AppTokenModel;

    pub use super::message::ActiveModel as MessageActiveModel;
    pub use super::message::Column as MessageColumn;
    pub use super::message::Entity as Message;
    pub use super::message::Model as MessageModel;

    pub use super::webhook::ActiveModel as WebhookActiveModel;
    pub use super::webhook::Column as WebhookColumn;
    pub use super::webhook::Entity as Webhook;
    pub use super::webhook::Model as WebhookModel;
}
