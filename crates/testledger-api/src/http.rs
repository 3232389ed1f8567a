//! HTTP/JSON implementation of [`Coordinator`].

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ApiConfig;
use crate::coordinator::Coordinator;
use crate::error::ApiError;
use crate::models::{
    Ack, ClaimBatch, ClaimRequest, CompletionReport, HealthQuery, HealthReport, NewSession,
    SessionCreated, SessionStatus,
};

/// Talks to the coordination service over HTTP.
///
/// Requests carry basic auth (`username:api_token`); bodies are JSON.
/// A non-2xx response becomes [`ApiError::Status`] with the raw body.
#[derive(Debug, Clone)]
pub struct HttpCoordinator {
    client: Client,
    config: ApiConfig,
}

impl HttpCoordinator {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("testledger/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let username = self.config.username.as_deref().unwrap_or_default();
        request
            .basic_auth(username, Some(&self.config.api_token))
            .header(ACCEPT, "application/json")
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(endpoint, status = status.as_u16(), "coordinator response");

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // Acknowledgement endpoints may answer with an empty body.
        let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| ApiError::InvalidResponse {
            endpoint: endpoint.to_owned(),
            message: format!("{e}, body: {body}"),
        })
    }
}

#[async_trait]
impl Coordinator for HttpCoordinator {
    async fn health_config(&self, query: &HealthQuery) -> Result<HealthReport, ApiError> {
        let endpoint = "/orchestration/config";
        let request = self.client.get(self.config.endpoint(endpoint)).query(query);
        self.send(endpoint, request).await
    }

    async fn create_session(&self, session: &NewSession) -> Result<SessionCreated, ApiError> {
        let endpoint = "/orchestration/session";
        let request = self.client.post(self.config.endpoint(endpoint)).json(session);
        self.send(endpoint, request).await
    }

    async fn claim(&self, request: &ClaimRequest) -> Result<ClaimBatch, ApiError> {
        let endpoint = "/orchestration/claim";
        let builder = self.client.post(self.config.endpoint(endpoint)).json(request);
        self.send(endpoint, builder).await
    }

    async fn complete(&self, report: &CompletionReport) -> Result<Ack, ApiError> {
        let endpoint = "/orchestration/complete";
        let request = self.client.post(self.config.endpoint(endpoint)).json(report);
        self.send(endpoint, request).await
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, ApiError> {
        let endpoint = format!("/orchestration/status/{session_id}");
        let request = self.client.get(self.config.endpoint(&endpoint));
        self.send(&endpoint, request).await
    }

    async fn close_session(&self, session_id: &str) -> Result<Ack, ApiError> {
        let endpoint = format!("/orchestration/session/{session_id}/close");
        let request = self.client.post(self.config.endpoint(&endpoint));
        self.send(&endpoint, request).await
    }

    async fn verify_credentials(&self) -> Result<bool, ApiError> {
        let endpoint = "/projects";
        let request = self.client.get(self.config.endpoint(endpoint));
        match self.send::<serde_json::Value>(endpoint, request).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_unauthorized() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
