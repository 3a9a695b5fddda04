use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Message;
use tokio::sync::mpsc;

use rainbow_comments::{
    config::Config,
    error::{AppError, Result},
    models::{
        comment::SortBy,
        event::EventEnvelope,
        user::AuthUser,
    },
    services::{
        AuthService, CommentService, ConnectionHandle, ConnectionRegistry, EventBroadcaster,
        IdentityProvider, MemoryCommentStore,
    },
};

/// Fixed user directory standing in for Rainbow-Auth.
struct StaticIdentityProvider;

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn fetch_user(&self, user_id: &str) -> Result<AuthUser> {
        match user_id {
            "user_a" => Ok(AuthUser {
                id: "user_a".to_string(),
                username: "alice".to_string(),
                is_active: true,
            }),
            "user_b" => Ok(AuthUser {
                id: "user_b".to_string(),
                username: "bob".to_string(),
                is_active: true,
            }),
            other => Err(AppError::Authentication(format!("Unknown user: {}", other))),
        }
    }
}

fn test_config() -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        environment: "test".to_string(),
        log_level: "debug".to_string(),
        auth_service_url: "http://localhost:8080".to_string(),
        auth_service_token: "test-token".to_string(),
        jwt_secret: "test-secret".to_string(),
        user_cache_ttl_minutes: 15,
        max_comment_length: 2000,
        default_comments_per_page: 20,
        max_comments_per_page: 100,
        ws_send_buffer: 64,
        cors_allowed_origins: "http://localhost:3001".to_string(),
    }
}

struct TestApp {
    service: CommentService,
    registry: Arc<ConnectionRegistry>,
}

impl TestApp {
    fn new() -> Self {
        let config = test_config();
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(EventBroadcaster::new(registry.clone()));
        let auth_service = AuthService::new(&config, Arc::new(StaticIdentityProvider));
        let service = CommentService::new(
            Arc::new(MemoryCommentStore::new()),
            broadcaster,
            auth_service,
            &config,
        );
        Self { service, registry }
    }

    fn connect(&self, connection_id: &str, user_id: &str) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(64);
        self.registry.add(ConnectionHandle::new(
            connection_id.to_string(),
            user_id.to_string(),
            user_id.to_string(),
            tx,
        ));
        rx
    }
}

fn next_envelope(rx: &mut mpsc::Receiver<Message>) -> EventEnvelope {
    let Message::Text(text) = rx.try_recv().expect("expected a broadcast event") else {
        panic!("expected text frame");
    };
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn full_comment_lifecycle_scenario() {
    let app = TestApp::new();
    let mut observer = app.connect("conn_observer", "user_b");

    // User A creates root comment C.
    let c = app
        .service
        .create_comment("user_a", "hello", None)
        .await
        .unwrap();
    let envelope = next_envelope(&mut observer);
    assert_eq!(envelope.event, "comment:created");
    assert_eq!(envelope.data["author"]["username"], "alice");

    // User B replies with D.
    let d = app
        .service
        .create_comment("user_b", "hi there", Some(&c.id))
        .await
        .unwrap();
    let envelope = next_envelope(&mut observer);
    assert_eq!(envelope.event, "comment:reply_created");
    assert_eq!(envelope.data["parentId"], c.id);

    // User A likes D.
    let (liked, action) = app.service.toggle_like(&d.id, "user_a").await.unwrap();
    assert_eq!(action, "liked");
    assert_eq!(liked.like_count, 1);
    assert!(liked.has_liked);
    let envelope = next_envelope(&mut observer);
    assert_eq!(envelope.event, "comment:like_updated");
    assert_eq!(envelope.data["likeCount"], 1);
    assert_eq!(envelope.data["user"]["username"], "alice");

    // User B deletes C (their own? no — C is A's comment, so B cannot).
    let err = app.service.delete_comment(&c.id, "user_b").await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    // A deletes their root comment C.
    let result = app.service.delete_comment(&c.id, "user_a").await.unwrap();
    assert!(result.parent_id.is_none());
    let envelope = next_envelope(&mut observer);
    assert_eq!(envelope.event, "comment:deleted");
    assert_eq!(envelope.data["id"], c.id);
    // Root deletion carries no parent reference.
    assert!(envelope.data.get("parentId").is_none());
    assert!(envelope.data.get("parentComment").is_none());

    // C is filtered from listings but the record persists.
    let roots = app
        .service
        .list_roots(1, 20, SortBy::Newest, None)
        .await
        .unwrap();
    assert_eq!(roots.pagination.total, 0);

    // D remains independently accessible and keeps its like from A.
    let (d_view, action) = app.service.toggle_like(&d.id, "user_b").await.unwrap();
    assert_eq!(action, "liked");
    assert_eq!(d_view.like_count, 2);

    let (d_view, action) = app.service.toggle_like(&d.id, "user_b").await.unwrap();
    assert_eq!(action, "unliked");
    assert_eq!(d_view.like_count, 1);
    assert!(!d_view.has_liked);
}

#[tokio::test]
async fn reaction_exclusivity_across_users() {
    let app = TestApp::new();
    let c = app
        .service
        .create_comment("user_a", "root", None)
        .await
        .unwrap();

    app.service.toggle_like(&c.id, "user_a").await.unwrap();
    app.service.toggle_like(&c.id, "user_b").await.unwrap();
    let (view, _) = app.service.toggle_dislike(&c.id, "user_b").await.unwrap();

    // B moved from like to dislike; A's like is untouched.
    assert_eq!(view.like_count, 1);
    assert_eq!(view.dislike_count, 1);
    assert!(view.has_disliked);
    assert!(!view.has_liked);
}

#[tokio::test]
async fn observer_disconnect_mid_stream_is_safe() {
    let app = TestApp::new();
    let mut kept = app.connect("conn_kept", "user_a");
    let gone = app.connect("conn_gone", "user_b");

    app.service
        .create_comment("user_a", "first", None)
        .await
        .unwrap();

    // Peer vanishes: receiver dropped while the registry still lists it.
    drop(gone);
    app.service
        .create_comment("user_a", "second", None)
        .await
        .unwrap();

    // The live connection saw both events; the dead one was pruned without
    // failing the mutations.
    assert_eq!(next_envelope(&mut kept).event, "comment:created");
    assert_eq!(next_envelope(&mut kept).event, "comment:created");
    assert_eq!(app.registry.connection_count(), 1);
}

#[tokio::test]
async fn replies_listing_orders_and_paginates() {
    let app = TestApp::new();
    let root = app
        .service
        .create_comment("user_a", "root", None)
        .await
        .unwrap();
    let r1 = app
        .service
        .create_comment("user_b", "r1", Some(&root.id))
        .await
        .unwrap();
    let r2 = app
        .service
        .create_comment("user_b", "r2", Some(&root.id))
        .await
        .unwrap();

    let page = app
        .service
        .list_replies(&root.id, 1, 20, SortBy::Oldest, Some("user_a"))
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 2);
    assert_eq!(page.comments[0].id, r1.id);
    assert_eq!(page.comments[1].id, r2.id);

    let page = app
        .service
        .list_replies(&root.id, 2, 1, SortBy::Oldest, None)
        .await
        .unwrap();
    assert_eq!(page.comments.len(), 1);
    assert_eq!(page.comments[0].id, r2.id);
    assert_eq!(page.pagination.pages, 2);

    // The parent snapshot exposes the derived reply count.
    let roots = app
        .service
        .list_roots(1, 20, SortBy::Newest, None)
        .await
        .unwrap();
    assert_eq!(roots.comments[0].reply_count, 2);
}
