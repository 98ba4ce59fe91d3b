pub mod db;
pub mod server;
pub mod twitch;
pub mod web;
pub mod webhooks;
