use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method};
use thiserror::Error;
use tracing::warn;

use super::TwitchError;
use super::auth::{Principal, TokenSource};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("transport failed: {0}")]
    Failed(String),
}

/// One upstream request, ready to be attempted and re-attempted.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: Some(body),
        }
    }
}

/// A single authenticated attempt. Failure means the transport itself
/// broke; a delivered response with an error status is still a success at
/// this layer and comes back as the body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ApiRequest, bearer: &str) -> Result<String, TransportError>;
}

pub struct HttpTransport {
    client: Client,
    client_id: String,
}

impl HttpTransport {
    pub fn new(client_id: String) -> Self {
        Self {
            client: Client::new(),
            client_id,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest, bearer: &str) -> Result<String, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .bearer_auth(bearer)
            .header("Client-ID", &self.client_id);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        Ok(response.text().await?)
    }
}

/// Sends authenticated requests. On a transport failure the bearer token is
/// refreshed exactly once and the request re-sent exactly once; a second
/// failure surfaces as `RequestFailed`.
pub struct TwitchClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenSource>,
}

impl TwitchClient {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenSource>) -> Self {
        Self { transport, tokens }
    }

    pub async fn send(
        &self,
        request: &ApiRequest,
        principal: &Principal,
    ) -> Result<String, TwitchError> {
        let token = self.tokens.resolve(principal).await?;
        let first_failure = match self.transport.execute(request, &token).await {
            Ok(body) => return Ok(body),
            Err(e) => e,
        };

        warn!(
            "Request to {} failed ({}), refreshing {} token and retrying once",
            request.url, first_failure, principal
        );
        let fresh = self.tokens.refresh(principal, &token).await?;
        self.transport
            .execute(request, &fresh)
            .await
            .map_err(|retry_failure| {
                TwitchError::RequestFailed(format!(
                    "{first_failure}; retry failed: {retry_failure}"
                ))
            })
    }
}
