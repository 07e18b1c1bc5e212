//! Publish collaborators
//!
//! One [`PublishAdapter`] per platform. Each adapter owns its response contract
//! and returns a typed [`PublishReceipt`]; the HTTP adapter reads the remote
//! post id from the JSON pointer paths configured for its platform.

use super::{error_from_response, traced, trim_base, RequestContext};
use crate::config::CrosspostConfig;
use crate::model::Attachment;
use crate::platform::{PlatformId, PlatformInfo, UserId};
use crate::{CrosspostError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// What is sent to a platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub content: String,
    pub image: Option<Attachment>,
    pub user_id: UserId,
}

/// What a platform acknowledged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Remote post id, when the platform's response exposes one
    pub remote_id: Option<String>,
}

/// Publish collaborator for one platform
#[async_trait]
pub trait PublishAdapter: Send + Sync {
    fn platform(&self) -> &PlatformId;

    /// Whether [`delete`](PublishAdapter::delete) is supported
    fn supports_delete(&self) -> bool {
        false
    }

    async fn publish(&self, request: &PublishRequest, ctx: &RequestContext)
        -> Result<PublishReceipt>;

    async fn delete(&self, remote_id: &str, _ctx: &RequestContext) -> Result<()> {
        Err(CrosspostError::Publish {
            platform: self.platform().clone(),
            message: format!("Deleting posts is not supported (remote id {})", remote_id),
        })
    }
}

/// Find the first non-empty string or number at any of `paths`
pub fn extract_remote_id(body: &serde_json::Value, paths: &[String]) -> Option<String> {
    paths.iter().find_map(|path| match body.pointer(path)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Request body sent to publish endpoints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishBody<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    user_id: &'a str,
}

/// HTTP adapter posting to `{base_url}{endpoint}`
#[derive(Debug, Clone)]
pub struct HttpPublishAdapter {
    info: PlatformInfo,
    endpoint_url: String,
    client: reqwest::Client,
}

impl HttpPublishAdapter {
    pub fn new(info: PlatformInfo, endpoint_url: impl Into<String>) -> Self {
        Self {
            info,
            endpoint_url: trim_base(&endpoint_url.into()),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl PublishAdapter for HttpPublishAdapter {
    fn platform(&self) -> &PlatformId {
        &self.info.id
    }

    fn supports_delete(&self) -> bool {
        self.info.supports_delete
    }

    async fn publish(
        &self,
        request: &PublishRequest,
        ctx: &RequestContext,
    ) -> Result<PublishReceipt> {
        let body = PublishBody {
            content: &request.content,
            image: request.image.as_ref().map(Attachment::data_url),
            user_id: request.user_id.as_str(),
        };

        let response = traced(self.client.post(&self.endpoint_url), ctx)
            .json(&body)
            .send()
            .await
            .map_err(|e| CrosspostError::Publish {
                platform: self.info.id.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let err = error_from_response(response, "Publish rejected").await;
            return Err(CrosspostError::Publish {
                platform: self.info.id.clone(),
                message: err.to_string(),
            });
        }

        // Some platforms answer 201/204 with no body; that is still a success
        let text = response.text().await.unwrap_or_default();
        let remote_id = if text.trim().is_empty() {
            None
        } else {
            let value = serde_json::from_str::<serde_json::Value>(&text).unwrap_or_else(|e| {
                tracing::debug!(platform = %self.info.id, error = %e, "Publish response is not JSON");
                serde_json::Value::Null
            });
            extract_remote_id(&value, &self.info.remote_id_paths)
        };

        if remote_id.is_none() {
            tracing::debug!(platform = %self.info.id, "Publish response carried no remote id");
        }

        Ok(PublishReceipt { remote_id })
    }

    async fn delete(&self, remote_id: &str, ctx: &RequestContext) -> Result<()> {
        if !self.info.supports_delete {
            return Err(CrosspostError::Publish {
                platform: self.info.id.clone(),
                message: "Deleting posts is not supported".to_string(),
            });
        }

        let url = format!("{}/{}", self.endpoint_url, urlencoding::encode(remote_id));
        let response = traced(self.client.delete(&url), ctx).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "Remote delete failed").await);
        }
        Ok(())
    }
}

/// Adapters keyed by platform
#[derive(Clone, Default)]
pub struct PublisherRegistry {
    adapters: HashMap<PlatformId, Arc<dyn PublishAdapter>>,
}

impl std::fmt::Debug for PublisherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut platforms: Vec<_> = self.adapters.keys().map(|p| p.as_str()).collect();
        platforms.sort();
        f.debug_struct("PublisherRegistry")
            .field("platforms", &platforms)
            .finish()
    }
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP adapters for every catalog platform, using the config's endpoints and overrides
    pub fn from_config(config: &CrosspostConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.publish.timeout_secs))
            .build()?;
        let catalog = config.catalog();
        let base = trim_base(&config.publish.base_url);

        let mut registry = Self::new();
        for platform in catalog.ids() {
            let endpoint = format!("{}{}", base, config.publish.endpoint_for(&platform));
            let adapter =
                HttpPublishAdapter::new(catalog.info(&platform), endpoint).with_client(client.clone());
            registry.register(Arc::new(adapter));
        }
        Ok(registry)
    }

    pub fn register(&mut self, adapter: Arc<dyn PublishAdapter>) {
        self.adapters.insert(adapter.platform().clone(), adapter);
    }

    pub fn get(&self, platform: &PlatformId) -> Option<Arc<dyn PublishAdapter>> {
        self.adapters.get(platform).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformCatalog;
    use crate::testing::serve;
    use axum::http::StatusCode;
    use axum::routing::{delete, post};
    use axum::{Json, Router};
    use serde_json::json;

    fn paths(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_remote_id_tries_paths_in_order() {
        let body = json!({ "data": { "id": "tw:2" }, "id": "other" });
        assert_eq!(
            extract_remote_id(&body, &paths(&["/data/id", "/id"])),
            Some("tw:2".to_string())
        );
        assert_eq!(
            extract_remote_id(&body, &paths(&["/missing", "/id"])),
            Some("other".to_string())
        );
    }

    #[test]
    fn test_extract_remote_id_numbers_and_absence() {
        assert_eq!(
            extract_remote_id(&json!({ "id": 12345 }), &paths(&["/id"])),
            Some("12345".to_string())
        );
        assert_eq!(extract_remote_id(&json!({ "id": "" }), &paths(&["/id"])), None);
        assert_eq!(extract_remote_id(&json!({ "ok": true }), &paths(&["/id"])), None);
    }

    fn request() -> PublishRequest {
        PublishRequest {
            content: "Launch day!".to_string(),
            image: None,
            user_id: UserId::new("u1"),
        }
    }

    #[tokio::test]
    async fn test_http_publish_extracts_platform_id() {
        let app = Router::new().route(
            "/api/twitter/post",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["content"], "Launch day!");
                assert_eq!(body["userId"], "u1");
                Json(json!({ "data": { "id": "tw:2" } }))
            }),
        );
        let base = serve(app).await;

        let info = PlatformCatalog::builtin().info(&PlatformId::new("twitter"));
        let adapter = HttpPublishAdapter::new(info, format!("{}/api/twitter/post", base));
        let ctx = RequestContext::new(UserId::new("u1"));

        let receipt = adapter.publish(&request(), &ctx).await.unwrap();
        assert_eq!(receipt.remote_id.as_deref(), Some("tw:2"));
    }

    #[tokio::test]
    async fn test_http_publish_empty_body_is_success_without_id() {
        let app = Router::new().route("/api/threads/post", post(|| async { StatusCode::NO_CONTENT }));
        let base = serve(app).await;

        let info = PlatformCatalog::builtin().info(&PlatformId::new("threads"));
        let adapter = HttpPublishAdapter::new(info, format!("{}/api/threads/post", base));
        let ctx = RequestContext::new(UserId::new("u1"));

        let receipt = adapter.publish(&request(), &ctx).await.unwrap();
        assert_eq!(receipt.remote_id, None);
    }

    #[tokio::test]
    async fn test_http_publish_error_names_platform() {
        let app = Router::new().route(
            "/api/linkedin/post",
            post(|| async {
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": "upstream down" })),
                )
            }),
        );
        let base = serve(app).await;

        let info = PlatformCatalog::builtin().info(&PlatformId::new("linkedin"));
        let adapter = HttpPublishAdapter::new(info, format!("{}/api/linkedin/post", base));
        let ctx = RequestContext::new(UserId::new("u1"));

        match adapter.publish(&request(), &ctx).await {
            Err(CrosspostError::Publish { platform, message }) => {
                assert_eq!(platform, PlatformId::new("linkedin"));
                assert!(message.contains("upstream down"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_delete_encodes_remote_id() {
        let app = Router::new().route(
            "/api/linkedin/post/{id}",
            delete(|axum::extract::Path(id): axum::extract::Path<String>| async move {
                assert_eq!(id, "urn:li:share:1");
                StatusCode::OK
            }),
        );
        let base = serve(app).await;

        let info = PlatformCatalog::builtin().info(&PlatformId::new("linkedin"));
        let adapter = HttpPublishAdapter::new(info, format!("{}/api/linkedin/post", base));
        let ctx = RequestContext::new(UserId::new("u1"));

        adapter.delete("urn:li:share:1", &ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_unsupported_platform() {
        let info = PlatformCatalog::builtin().info(&PlatformId::new("instagram"));
        let adapter = HttpPublishAdapter::new(info, "http://127.0.0.1:9/api/instagram/post");
        let ctx = RequestContext::new(UserId::new("u1"));

        assert!(!adapter.supports_delete());
        assert!(adapter.delete("123", &ctx).await.is_err());
    }

    #[test]
    fn test_registry_from_config_covers_catalog() {
        let config = CrosspostConfig::new();
        let registry = PublisherRegistry::from_config(&config).unwrap();
        assert!(registry.get(&PlatformId::new("linkedin")).is_some());
        assert!(registry.get(&PlatformId::new("pinterest")).is_none());
    }
}
