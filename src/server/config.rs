use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Externally reachable base URL webhook callbacks are built from.
    pub public_url: String,
    pub webhook_secret: String,
    pub lease_seconds: i64,
    pub http_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let client_id = env::var("CLIENT_ID").map_err(|_| "CLIENT_ID must be set".to_string())?;

        let client_secret =
            env::var("CLIENT_SECRET").map_err(|_| "CLIENT_SECRET must be set".to_string())?;

        let public_url = env::var("PUBLIC_URL").map_err(|_| "PUBLIC_URL must be set".to_string())?;

        let webhook_secret =
            env::var("WEBHOOK_SECRET").map_err(|_| "WEBHOOK_SECRET must be set".to_string())?;

        let lease_seconds = match env::var("WEBHOOK_LEASE_SECONDS") {
            Ok(raw) => raw
                .parse::<i64>()
                .map_err(|_| "WEBHOOK_LEASE_SECONDS must be an integer".to_string())?,
            Err(_) => 864_000,
        };

        let http_port = match env::var("HTTP_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| "HTTP_PORT must be a port number".to_string())?,
            Err(_) => 8080,
        };

        Ok(AppConfig {
            database_url,
            client_id,
            client_secret,
            public_url,
            webhook_secret,
            lease_seconds,
            http_port,
        })
    }
}
