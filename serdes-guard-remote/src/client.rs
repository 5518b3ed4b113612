//! Remote validation service client.

use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::payload::{GuardDescriptor, ValidatePayload, ValidationResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Debug;
use tracing::debug;

/// Header carrying the caller's provider key.
pub const PROVIDER_KEY_HEADER: &str = "x-openai-api-key";

/// Providers the hosted service can call on its own.
pub const DEFAULT_SUPPORTED_PROVIDERS: &[&str] = &["openai", "anthropic", "cohere"];

/// A service that runs the whole generate, validate, reask cycle remotely.
#[async_trait]
pub trait RemoteService: Send + Sync + Debug {
    /// Whether the service can call this provider itself.
    fn supports(&self, provider: &str) -> bool;

    /// Validate with a registered guard.
    ///
    /// `Ok(None)` means the service answered without a result payload.
    async fn validate(
        &self,
        guard_name: &str,
        payload: &ValidatePayload,
        provider_key: Option<&str>,
    ) -> Result<Option<ValidationResponse>, RemoteError>;

    /// Create or replace a guard definition.
    async fn upsert_guard(&self, guard: &GuardDescriptor) -> Result<(), RemoteError>;
}

/// HTTP client for the remote validation service.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    client: Client,
    config: RemoteConfig,
    supported_providers: Vec<String>,
}

impl HttpRemoteClient {
    /// Create a client.
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            supported_providers: DEFAULT_SUPPORTED_PROVIDERS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }

    /// Create from the process environment.
    pub fn from_env() -> Result<Self, RemoteError> {
        Ok(Self::new(RemoteConfig::from_env()?))
    }

    /// Replace the supported provider list.
    #[must_use]
    pub fn with_supported_providers<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_providers = providers.into_iter().map(Into::into).collect();
        self
    }

    /// Use a preconfigured HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Connection settings.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn guard_url(&self, guard_name: &str) -> String {
        format!("{}/guards/{}", self.config.base_url, guard_name)
    }
}

#[async_trait]
impl RemoteService for HttpRemoteClient {
    fn supports(&self, provider: &str) -> bool {
        self.supported_providers.iter().any(|p| p == provider)
    }

    async fn validate(
        &self,
        guard_name: &str,
        payload: &ValidatePayload,
        provider_key: Option<&str>,
    ) -> Result<Option<ValidationResponse>, RemoteError> {
        let url = format!("{}/validate", self.guard_url(guard_name));
        debug!(url = %url, "Delegating validation");

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout())
            .json(payload);
        if let Some(key) = provider_key {
            request = request.header(PROVIDER_KEY_HEADER, key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(RemoteError::http(status, text));
        }

        let body = response.text().await?;
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(None);
        }
        serde_json::from_str(trimmed)
            .map(Some)
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn upsert_guard(&self, guard: &GuardDescriptor) -> Result<(), RemoteError> {
        let url = self.guard_url(&guard.name);
        debug!(url = %url, guard_id = %guard.id, "Upserting guard");

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout())
            .json(guard)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(RemoteError::http(status, text));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use serdes_guard_core::OutputSchema;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpRemoteClient {
        HttpRemoteClient::new(RemoteConfig::new("test-key").with_base_url(server.uri()))
    }

    #[tokio::test]
    async fn test_validate_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/guards/my-guard/validate"))
            .and(header("authorization", "Bearer test-key"))
            .and(header(PROVIDER_KEY_HEADER, "sk-provider"))
            .and(body_json(json!({"args": [], "llmOutput": "hi", "numReasks": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": true,
                "validatedOutput": "hi",
                "rawLlmResponse": "hi"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = ValidatePayload {
            llm_output: Some("hi".into()),
            num_reasks: Some(1),
            ..Default::default()
        };
        let response = client(&server)
            .validate("my-guard", &payload, Some("sk-provider"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.result, Some(true));
        assert_eq!(response.validated_output, Some(json!("hi")));
    }

    #[tokio::test]
    async fn test_validate_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let response = client(&server)
            .validate("g", &ValidatePayload::default(), None)
            .await
            .unwrap();
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_validate_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let err = client(&server)
            .validate("g", &ValidatePayload::default(), None)
            .await
            .unwrap_err();
        match err {
            RemoteError::Http { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_validate_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server)
            .validate("g", &ValidatePayload::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[tokio::test]
    async fn test_upsert_guard() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/guards/my-guard"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let descriptor = GuardDescriptor {
            id: "id-1".into(),
            name: "my-guard".into(),
            description: None,
            validators: Vec::new(),
            output_schema: OutputSchema::string(),
        };
        client(&server).upsert_guard(&descriptor).await.unwrap();
    }

    #[test]
    fn test_supports() {
        let client = HttpRemoteClient::new(RemoteConfig::new("k"));
        assert!(client.supports("openai"));
        assert!(!client.supports("local"));
        let client = client.with_supported_providers(["local"]);
        assert!(client.supports("local"));
    }
}
