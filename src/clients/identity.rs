//! Identity/auth collaborator
//!
//! Hands out the authorization URL opened in the detached auth window, and
//! revokes a platform's grant on disconnect.

use super::retry::{with_retry, RetryPolicy};
use super::{error_from_response, traced, trim_base, RequestContext};
use crate::config::IdentityConfig;
use crate::platform::PlatformId;
use crate::Result;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Identity collaborator seam
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL to open in the detached auth context for `platform`
    async fn authorization_url(&self, platform: &PlatformId, ctx: &RequestContext)
        -> Result<String>;

    /// Revoke the user's grant for `platform`
    async fn revoke(&self, platform: &PlatformId, ctx: &RequestContext) -> Result<()>;
}

/// Authorization URL response
#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
    #[serde(alias = "authUrl", alias = "auth_url")]
    url: String,
}

/// HTTP implementation against `{base_url}/api/auth/{platform}/...`
#[derive(Debug, Clone)]
pub struct HttpIdentityClient {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpIdentityClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base(&base_url.into()),
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &IdentityConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: trim_base(&config.base_url),
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_authorization_url(
        &self,
        platform: &PlatformId,
        ctx: &RequestContext,
    ) -> Result<String> {
        let url = format!("{}/api/auth/{}/authorize", self.base_url, platform);

        let response = traced(self.client.get(&url), ctx).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "Failed to get authorization URL").await);
        }

        let body: AuthorizeResponse = response
            .json()
            .await
            .context("Failed to parse authorization response")?;
        Ok(body.url)
    }

    async fn send_revoke(&self, platform: &PlatformId, ctx: &RequestContext) -> Result<()> {
        let url = format!("{}/api/auth/{}/revoke", self.base_url, platform);

        let response = traced(self.client.post(&url), ctx).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "Failed to revoke access").await);
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityClient {
    async fn authorization_url(
        &self,
        platform: &PlatformId,
        ctx: &RequestContext,
    ) -> Result<String> {
        tracing::debug!(platform = %platform, correlation_id = %ctx.correlation_id, "Requesting authorization URL");
        with_retry(&self.retry, "authorization_url", || {
            self.fetch_authorization_url(platform, ctx)
        })
        .await
    }

    async fn revoke(&self, platform: &PlatformId, ctx: &RequestContext) -> Result<()> {
        tracing::debug!(platform = %platform, correlation_id = %ctx.correlation_id, "Revoking platform access");
        with_retry(&self.retry, "revoke", || self.send_revoke(platform, ctx)).await
    }
}
