//! OpenAI-compatible HTTP provider adapter.
//!
//! Speaks the `POST /chat/completions` JSON shape with bearer auth,
//! which covers OpenAI itself and the many services exposing the same
//! surface. The canonical [`ChatRequest`] serializes directly to the
//! wire shape; only the response needs mapping.

use reqwest::StatusCode;
use serde::Deserialize;

use super::traits::ChatProvider;
use crate::types::{ChatRequest, ChatResponse, FinishReason, Usage};
use crate::{GrimnirError, Result};

/// Provider handle for an OpenAI-compatible endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_http_client(name, base_url, api_key, reqwest::Client::new())
    }

    /// Create a provider sharing an existing HTTP client.
    pub fn with_http_client(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    fn upstream_error(&self, status: Option<u16>, message: String, transient: bool) -> GrimnirError {
        GrimnirError::Upstream {
            provider: self.name.clone(),
            status,
            message,
            transient,
        }
    }
}

#[async_trait::async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                let transient = e.is_timeout() || e.is_connect();
                self.upstream_error(None, e.to_string(), transient)
            })?;

        let status = response.status();
        if !status.is_success() {
            let transient = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(self.upstream_error(Some(status.as_u16()), message, transient));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| self.upstream_error(Some(status.as_u16()), e.to_string(), false))?;

        let choice = wire.choices.into_iter().next().ok_or_else(|| {
            self.upstream_error(Some(status.as_u16()), "response carried no choices".into(), false)
        })?;

        Ok(ChatResponse {
            // Echo the requested model string, whatever the upstream
            // reports (some gateways rewrite it).
            model: request.model.clone(),
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason(),
            usage: wire.usage,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl WireChoice {
    fn finish_reason(&self) -> FinishReason {
        match self.finish_reason.as_deref() {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        }
    }
}
