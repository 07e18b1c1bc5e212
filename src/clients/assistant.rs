//! AI assistant collaborator
//!
//! Chat turns go to `POST {base}/api/chat`. Images are requested from
//! `POST {base}/api/generate-image` and their bytes fetched through
//! `GET {base}/api/image-proxy?url=...`, so the caller never talks to the
//! image host directly.

use super::{error_from_response, traced, trim_base, RequestContext};
use crate::assistant::protocol::{ChatRequest, ChatResponse};
use crate::config::AssistantConfig;
use crate::model::Attachment;
use crate::{CrosspostError, Result};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Assistant collaborator seam
#[async_trait]
pub trait AssistantService: Send + Sync {
    async fn chat(&self, request: &ChatRequest, ctx: &RequestContext) -> Result<ChatResponse>;

    /// Generate an image for `prompt` and return its bytes
    async fn generate_image(&self, prompt: &str, ctx: &RequestContext) -> Result<Attachment>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateImageResponse {
    #[serde(alias = "url")]
    image_url: String,
}

/// HTTP implementation of [`AssistantService`]
#[derive(Debug, Clone)]
pub struct HttpAssistantClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAssistantClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base(&base_url.into()),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: trim_base(&config.base_url),
            client,
        })
    }

    async fn fetch_via_proxy(&self, image_url: &str, ctx: &RequestContext) -> Result<Attachment> {
        let url = format!(
            "{}/api/image-proxy?url={}",
            self.base_url,
            urlencoding::encode(image_url)
        );

        let response = traced(self.client.get(&url), ctx).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, "Image proxy failed").await);
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| "image/png".to_string());

        if !mime_type.starts_with("image/") {
            return Err(CrosspostError::Assistant(format!(
                "Image proxy returned {} instead of an image",
                mime_type
            )));
        }

        let bytes = response.bytes().await?;
        Ok(Attachment::from_bytes(&bytes, mime_type))
    }
}

#[async_trait]
impl AssistantService for HttpAssistantClient {
    async fn chat(&self, request: &ChatRequest, ctx: &RequestContext) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.base_url);

        let response = traced(self.client.post(&url), ctx)
            .json(request)
            .send()
            .await
            .context("Failed to reach AI service")?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "AI service error").await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse AI service response")?;
        Ok(body)
    }

    async fn generate_image(&self, prompt: &str, ctx: &RequestContext) -> Result<Attachment> {
        let url = format!("{}/api/generate-image", self.base_url);

        let response = traced(self.client.post(&url), ctx)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await
            .context("Failed to reach image generation service")?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "Image generation failed").await);
        }

        let generated: GenerateImageResponse = response
            .json()
            .await
            .context("Failed to parse image generation response")?;

        self.fetch_via_proxy(&generated.image_url, ctx).await
    }
}
