//! HTTP client for the outbound voice provider.
//!
//! A thin network call: builds the placement payload and returns the
//! provider's call id. All retry/backoff policy lives in the dispatcher.

use async_trait::async_trait;
use payerline_core::config::VoiceConfig;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::context::CallContext;
use crate::phone::normalize_phone;
use crate::webhook::extract_provider_id;

#[derive(Error, Debug)]
pub enum VoiceError {
    /// Missing credentials or outbound line; not retryable.
    #[error("voice provider not configured: {0} missing")]
    Configuration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("unrecognized provider response shape: {0}")]
    MalformedResponse(String),
}

impl VoiceError {
    /// Whether the dispatcher may retry after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Configuration(_) => false,
            Self::Http(_) | Self::Provider { .. } | Self::MalformedResponse(_) => true,
        }
    }
}

/// Free-form metadata attached to a placed call, echoed back by the provider.
#[derive(Debug, Clone, Serialize)]
pub struct CallMetadata {
    pub claim_id: String,
    pub claim_number: String,
    pub practice_id: String,
}

/// Placement seam: turn a phone number and conversation context into a
/// provider call id.
#[async_trait]
pub trait CallPlacer: Send + Sync {
    async fn place(
        &self,
        phone: &str,
        context: &CallContext,
        metadata: &CallMetadata,
    ) -> Result<String, VoiceError>;
}

/// Reqwest-backed placement client for the provider's `/call/phone` endpoint.
pub struct VoiceClient {
    client: reqwest::Client,
    config: VoiceConfig,
}

impl VoiceClient {
    /// Build a client with the configured per-request timeout.
    pub fn new(config: VoiceConfig) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let config = VoiceConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..config
        };
        Ok(Self { client, config })
    }
}

#[async_trait]
impl CallPlacer for VoiceClient {
    async fn place(
        &self,
        phone: &str,
        context: &CallContext,
        metadata: &CallMetadata,
    ) -> Result<String, VoiceError> {
        if self.config.api_key.is_empty() {
            return Err(VoiceError::Configuration("api key"));
        }
        if self.config.phone_line_id.is_empty() {
            return Err(VoiceError::Configuration("phone line id"));
        }

        let payload = json!({
            "phoneNumberId": self.config.phone_line_id,
            "customer": {"number": normalize_phone(phone)},
            "assistant": {
                "model": {
                    "provider": "openai",
                    "model": "gpt-4o",
                    "messages": [{"role": "system", "content": context.briefing}],
                },
                "firstMessage": context.opening_line,
            },
            "metadata": metadata,
        });

        let url = format!("{}/call/phone", self.config.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VoiceError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = resp.json().await?;
        let external_id = extract_provider_id(&body)
            .ok_or_else(|| VoiceError::MalformedResponse(body.to_string()))?;
        info!(external_id = %external_id, "outbound call placed");
        Ok(external_id)
    }
}
