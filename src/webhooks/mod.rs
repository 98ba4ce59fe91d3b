pub mod dispatcher;
pub mod hub;
pub mod models;
pub mod persistence;
pub mod service;
