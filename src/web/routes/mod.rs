pub mod callback_routes;
pub mod watch_routes;
