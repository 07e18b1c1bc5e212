//! Integration tests for Crosspost
//!
//! These tests drive a whole composer session through the public API, with
//! recording fakes standing in for the identity provider, the auth window,
//! the platforms and the assistant.

use async_trait::async_trait;
use crosspost::assistant::{ChatRequest, ChatResponse};
use crosspost::clients::{
    AssistantService, IdentityProvider, PublishAdapter, PublishReceipt, PublishRequest,
    PublisherRegistry, RequestContext,
};
use crosspost::config::{CrosspostConfig, TierLimits};
use crosspost::connection::{
    AuthWindow, AuthWindowLauncher, CallbackServer, FailureReason, HandshakeState, OAuthCallback,
};
use crosspost::events::{drain, notifications, ComposerEvent, NotificationLevel};
use crosspost::guard::NavigationDecision;
use crosspost::model::{Attachment, Connection, PlanTier, PostStatus};
use crosspost::platform::{PlatformId, UserId};
use crosspost::store::{DocumentStore, InMemoryDocumentStore, WriteMode};
use crosspost::{Collaborators, ComposerSession, CrosspostError, Result};
use indexmap::IndexMap;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ORIGIN: &str = "https://app.example.com";

struct FakeIdentity;

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn authorization_url(&self, platform: &PlatformId, _ctx: &RequestContext) -> Result<String> {
        Ok(format!("https://id.example.com/authorize/{}", platform))
    }

    async fn revoke(&self, _platform: &PlatformId, _ctx: &RequestContext) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct WindowHandle(Arc<AtomicBool>);

impl WindowHandle {
    fn close_by_user(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl AuthWindow for WindowHandle {
    fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

struct FakeLauncher(WindowHandle);

impl AuthWindowLauncher for FakeLauncher {
    fn open(&self, _url: &str) -> Result<Box<dyn AuthWindow>> {
        Ok(Box::new(self.0.clone()))
    }
}

/// Platform that records every dispatch
struct RecordingPlatform {
    platform: PlatformId,
    remote_id: Option<String>,
    fail: bool,
    log: Arc<Mutex<Vec<PlatformId>>>,
}

#[async_trait]
impl PublishAdapter for RecordingPlatform {
    fn platform(&self) -> &PlatformId {
        &self.platform
    }

    async fn publish(&self, _request: &PublishRequest, _ctx: &RequestContext) -> Result<PublishReceipt> {
        self.log.lock().unwrap().push(self.platform.clone());
        if self.fail {
            return Err(CrosspostError::Publish {
                platform: self.platform.clone(),
                message: "503 Service Unavailable".to_string(),
            });
        }
        Ok(PublishReceipt {
            remote_id: self.remote_id.clone(),
        })
    }
}

/// Assistant answering from a queue; an empty queue means it is unreachable
#[derive(Default)]
struct ScriptedAssistant {
    replies: Mutex<VecDeque<ChatResponse>>,
}

#[async_trait]
impl AssistantService for ScriptedAssistant {
    async fn chat(&self, _request: &ChatRequest, _ctx: &RequestContext) -> Result<ChatResponse> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CrosspostError::Network("connection refused".to_string()))
    }

    async fn generate_image(&self, _prompt: &str, _ctx: &RequestContext) -> Result<Attachment> {
        Err(CrosspostError::Assistant("no images".to_string()))
    }
}

struct Harness {
    session: ComposerSession,
    store: Arc<InMemoryDocumentStore>,
    window: WindowHandle,
    assistant: Arc<ScriptedAssistant>,
    dispatched: Arc<Mutex<Vec<PlatformId>>>,
}

/// `platforms`: (id, remote id, fails); every listed platform starts connected
async fn harness(platforms: &[(&str, Option<&str>, bool)], monthly_limit: Option<u32>) -> Harness {
    let user = UserId::new("u1");
    let store = Arc::new(InMemoryDocumentStore::new());
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let window = WindowHandle::default();
    let assistant = Arc::new(ScriptedAssistant::default());

    let mut publishers = PublisherRegistry::new();
    for (id, remote_id, fail) in platforms {
        publishers.register(Arc::new(RecordingPlatform {
            platform: PlatformId::new(*id),
            remote_id: remote_id.map(str::to_string),
            fail: *fail,
            log: dispatched.clone(),
        }));
        store
            .put_connection(&user, &Connection::connected(PlatformId::new(*id)), WriteMode::Critical)
            .await
            .unwrap();
    }

    let mut config = CrosspostConfig::default();
    config.handshake.origin = ORIGIN.to_string();
    config.quota.tiers.insert(
        "test".to_string(),
        TierLimits {
            monthly_posts: monthly_limit,
            scheduled_posts: None,
        },
    );

    let session = ComposerSession::start(
        &config,
        user,
        PlanTier::new("test"),
        Collaborators {
            identity: Arc::new(FakeIdentity),
            assistant: assistant.clone(),
            publishers,
            store: store.clone(),
            launcher: Arc::new(FakeLauncher(window.clone())),
        },
    )
    .await
    .unwrap();

    Harness {
        session,
        store,
        window,
        assistant,
        dispatched,
    }
}

fn pid(id: &str) -> PlatformId {
    PlatformId::new(id)
}

fn compose(session: &ComposerSession, platforms: &[&str], text: &str) {
    for id in platforms {
        session.draft().toggle_platform(&pid(id));
        session.draft().set_content(&pid(id), text);
    }
}

mod draft_tests {
    use super::*;

    #[tokio::test]
    async fn test_active_platform_tracks_selection_under_random_toggles() {
        let h = harness(&[], None).await;
        let draft = h.session.draft();
        let ids = ["linkedin", "twitter", "facebook", "threads", "bluesky"];
        let mut rng = rand::thread_rng();

        for _ in 0..500 {
            draft.toggle_platform(&pid(ids[rng.gen_range(0..ids.len())]));

            let selected = draft.selected_platforms();
            match draft.active_platform() {
                None => assert!(selected.is_empty()),
                Some(active) => assert!(selected.contains(&active)),
            }
        }
    }

    #[tokio::test]
    async fn test_reselect_restores_content_and_tone() {
        let h = harness(&[], None).await;
        let draft = h.session.draft();
        compose(&h.session, &["linkedin"], "Quarterly update");
        let tone = draft.tone_for(&pid("linkedin"));

        draft.toggle_platform(&pid("linkedin"));
        draft.toggle_platform(&pid("linkedin"));

        assert_eq!(
            draft.content_for(&pid("linkedin")).as_deref(),
            Some("Quarterly update")
        );
        assert_eq!(draft.tone_for(&pid("linkedin")), tone);
    }
}

mod handshake_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_message_then_poll_resolves_once() {
        let h = harness(&[], None).await;
        let mut rx = h.session.events().subscribe();
        let manager = h.session.connection_manager();

        manager.request_connect(&pid("facebook")).await;
        assert!(manager
            .handle_message(ORIGIN, &OAuthCallback::success("facebook"))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(manager.state(&pid("facebook")), HandshakeState::Connected);
        assert!(h.session.connections().is_connected(&pid("facebook")));
        let events = drain(&mut rx);
        assert_eq!(notifications(&events).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_then_message_resolves_once() {
        let h = harness(&[], None).await;
        let mut rx = h.session.events().subscribe();
        let manager = h.session.connection_manager();

        manager.request_connect(&pid("facebook")).await;
        h.window.close_by_user();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert!(!manager
            .handle_message(ORIGIN, &OAuthCallback::success("facebook"))
            .await
            .unwrap());
        assert_eq!(
            manager.state(&pid("facebook")),
            HandshakeState::Failed(FailureReason::ManualCancel)
        );
        let events = drain(&mut rx);
        assert_eq!(notifications(&events).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_popup_fails_without_connected_write() {
        let h = harness(&[], None).await;
        let manager = h.session.connection_manager();

        manager.request_connect(&pid("facebook")).await;
        h.window.close_by_user();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(
            manager.state(&pid("facebook")),
            HandshakeState::Failed(FailureReason::ManualCancel)
        );
        let stored = h.store.connections(&UserId::new("u1")).await.unwrap();
        assert!(stored
            .iter()
            .filter(|c| c.platform_id == pid("facebook"))
            .all(|c| !c.connected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_route_completes_handshake() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        let h = harness(&[], None).await;
        let manager = h.session.connection_manager().clone();
        manager.request_connect(&pid("linkedin")).await;

        let body = serde_json::to_string(&OAuthCallback::success("linkedin")).unwrap();
        let response = CallbackServer::router(manager.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/oauth/callback")
                    .header("content-type", "application/json")
                    .header("origin", ORIGIN)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(manager.state(&pid("linkedin")), HandshakeState::Connected);
    }
}

mod publish_tests {
    use super::*;

    #[tokio::test]
    async fn test_posted_record_keeps_remote_ids() {
        let h = harness(
            &[("linkedin", Some("urn:1"), false), ("twitter", Some("tw:2"), false)],
            None,
        )
        .await;
        compose(&h.session, &["linkedin", "twitter"], "Launch day!");

        let report = h.session.pipeline().post_now().await.unwrap();
        assert_eq!(report.succeeded, vec![pid("linkedin"), pid("twitter")]);

        let posts = h.session.pipeline().list_posts().await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].status, PostStatus::Posted);
        assert_eq!(posts[0].platform_post_ids.get(&pid("linkedin")).map(String::as_str), Some("urn:1"));
        assert_eq!(posts[0].platform_post_ids.get(&pid("twitter")).map(String::as_str), Some("tw:2"));
        assert!(!h.session.draft().is_dirty());
    }

    #[tokio::test]
    async fn test_monthly_limit_blocks_next_post_before_dispatch() {
        let h = harness(&[("linkedin", None, false)], Some(3)).await;

        for n in 1..=3 {
            compose(&h.session, &["linkedin"], &format!("post {}", n));
            assert!(h.session.pipeline().post_now().await.unwrap().is_success());
        }

        compose(&h.session, &["linkedin"], "post 4");
        let err = h.session.pipeline().post_now().await.unwrap_err();
        assert!(matches!(err, CrosspostError::QuotaExceeded { limit: 3, .. }));
        assert_eq!(h.dispatched.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_middle_platform_failure_does_not_stop_the_rest() {
        let h = harness(
            &[
                ("linkedin", None, false),
                ("twitter", None, true),
                ("facebook", None, false),
            ],
            None,
        )
        .await;
        compose(&h.session, &["linkedin", "twitter", "facebook"], "Fan out");

        let report = h.session.pipeline().post_now().await.unwrap();

        assert_eq!(
            *h.dispatched.lock().unwrap(),
            vec![pid("linkedin"), pid("twitter"), pid("facebook")]
        );
        assert_eq!(report.failed_platforms(), vec![pid("twitter")]);
        assert_eq!(report.succeeded, vec![pid("linkedin"), pid("facebook")]);
    }

    #[tokio::test]
    async fn test_schedule_with_nothing_selected_writes_nothing() {
        let h = harness(&[("linkedin", None, false)], None).await;

        let err = h
            .session
            .pipeline()
            .schedule("2099-01-01", "09:00")
            .await
            .unwrap_err();
        assert!(matches!(err, CrosspostError::Validation(_)));

        // Only the seeded connections were written
        assert!(h
            .store
            .writes()
            .iter()
            .all(|w| w.operation == "put_connection"));
        assert!(h.session.pipeline().list_posts().await.unwrap().is_empty());
    }
}

mod assistant_tests {
    use super::*;

    #[tokio::test]
    async fn test_platform_suggestions_fill_drafts_without_selecting() {
        let h = harness(&[], None).await;
        let mut suggestions = IndexMap::new();
        suggestions.insert(pid("linkedin"), "A".to_string());
        suggestions.insert(pid("twitter"), "B".to_string());
        h.assistant.replies.lock().unwrap().push_back(ChatResponse {
            reply: "Here are drafts".to_string(),
            suggested_platform_content: Some(suggestions),
            ..Default::default()
        });

        h.session.assistant().send("Write a launch post").await;

        let draft = h.session.draft();
        assert_eq!(draft.active_platform(), Some(pid("linkedin")));
        assert_eq!(draft.content_for(&pid("linkedin")).as_deref(), Some("A"));
        assert_eq!(draft.content_for(&pid("twitter")).as_deref(), Some("B"));
        assert!(draft.selected_platforms().is_empty());
    }

    #[tokio::test]
    async fn test_assistant_post_counts_toward_monthly_limit() {
        use crosspost::model::{ActionResult, UsageCounter};

        let h = harness(&[("linkedin", None, false)], Some(1)).await;
        h.assistant.replies.lock().unwrap().push_back(ChatResponse {
            reply: "Posted to LinkedIn".to_string(),
            action: Some("post".to_string()),
            action_result: Some(ActionResult {
                platforms: vec![pid("linkedin")],
                ..Default::default()
            }),
            ..Default::default()
        });
        compose(&h.session, &["linkedin"], "Ship it");

        // The assistant's backend commits the post and its usage
        h.store
            .increment_usage(
                &UserId::new("u1"),
                &PlanTier::new("test"),
                UsageCounter::MonthlyPosts,
                WriteMode::BestEffort,
            )
            .await
            .unwrap();
        h.session.assistant().send("Post this now").await;
        assert!(!h.session.draft().is_dirty());
        assert_eq!(h.session.pipeline().usage().monthly_post_count, 1);

        compose(&h.session, &["linkedin"], "One more");
        let err = h.session.pipeline().post_now().await.unwrap_err();
        assert!(matches!(err, CrosspostError::QuotaExceeded { limit: 1, .. }));
        assert!(h.dispatched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_assistant_keeps_draft() {
        let h = harness(&[], None).await;
        compose(&h.session, &["linkedin"], "Mine");

        let exchange = h.session.assistant().send("Improve this").await;
        assert!(exchange.outcome().is_none());
        assert_eq!(h.session.assistant().history().len(), 2);
        assert_eq!(
            h.session.draft().content_for(&pid("linkedin")).as_deref(),
            Some("Mine")
        );
    }
}

mod guard_tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_reload_from_another_page() {
        let h = harness(&[], None).await;
        compose(&h.session, &["twitter"], "Unfinished thought");

        let decision = h.session.guard().request_navigation("/analytics");
        assert_eq!(
            decision,
            NavigationDecision::Prompt {
                destination: "/analytics".to_string()
            }
        );
        assert_eq!(h.session.guard().save_and_proceed().await.unwrap(), "/analytics");

        h.session.end_session();
        assert!(!h.session.draft().is_dirty());

        let drafts = h.session.list_drafts().await.unwrap();
        h.session.load_draft(&drafts[0].id).await.unwrap();
        assert_eq!(
            h.session.draft().content_for(&pid("twitter")).as_deref(),
            Some("Unfinished thought")
        );
    }

    #[tokio::test]
    async fn test_discard_emits_draft_cleared() {
        let h = harness(&[], None).await;
        let mut rx = h.session.events().subscribe();
        compose(&h.session, &["twitter"], "Never mind");

        h.session.guard().request_navigation("/settings");
        assert_eq!(h.session.guard().discard_and_proceed().unwrap(), "/settings");

        let events = drain(&mut rx);
        assert!(events.contains(&ComposerEvent::DraftCleared));
        assert!(notifications(&events)
            .iter()
            .all(|n| n.level != NotificationLevel::Error));
    }
}
