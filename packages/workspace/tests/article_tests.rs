//! Article feed tests against a local mock of the article-generation
//! service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::Deserialize;
use tokio::sync::watch;

use coscribe_workspace::{
    ArticleError, ArticleFeed, ArticleServiceConfig, FeedState, IdentitySanitizer, Sanitize,
};

#[derive(Deserialize)]
struct TopicRequest {
    topic: String,
}

struct MockService {
    hits: AtomicUsize,
}

async fn generate_article(
    State(service): State<Arc<MockService>>,
    Json(request): Json<TopicRequest>,
) -> axum::response::Response {
    service.hits.fetch_add(1, Ordering::SeqCst);
    if request.topic.starts_with("slow") {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    match request.topic.as_str() {
        "missing" => Json(serde_json::json!({})).into_response(),
        "boom" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "generation failed" })),
        )
            .into_response(),
        topic => Json(serde_json::json!({
            "article": format!("<p>All about {}</p>", topic)
        }))
        .into_response(),
    }
}

/// Spawn the mock service on an ephemeral port; returns its base URL and
/// hit counter.
async fn spawn_mock_service() -> (String, Arc<MockService>) {
    let service = Arc::new(MockService {
        hits: AtomicUsize::new(0),
    });
    let app = Router::new()
        .route("/generate-article", post(generate_article))
        .with_state(service.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), service)
}

fn feed_for(base_url: &str) -> (ArticleFeed, watch::Receiver<FeedState>) {
    let feed = ArticleFeed::new(
        ArticleServiceConfig::new(base_url),
        Arc::new(IdentitySanitizer),
    );
    let state = feed.subscribe();
    (feed, state)
}

/// Wait until the feed settles in a state accepted by `pred`.
async fn wait_for_state(
    state: &mut watch::Receiver<FeedState>,
    pred: impl Fn(&FeedState) -> bool,
) -> FeedState {
    let deadline = Duration::from_secs(3);
    let result = tokio::time::timeout(deadline, async {
        loop {
            let matched = {
                let current = state.borrow_and_update();
                pred(&current).then(|| (*current).clone())
            };
            if let Some(state) = matched {
                return state;
            }
            if state.changed().await.is_err() {
                panic!("feed dropped");
            }
        }
    })
    .await;
    result.expect("timed out waiting for feed state")
}

#[tokio::test]
async fn test_topic_fetches_article() {
    let (base_url, _) = spawn_mock_service().await;
    let (feed, mut state) = feed_for(&base_url);

    feed.set_topic("Rust");
    let ready = wait_for_state(&mut state, |s| matches!(s, FeedState::Ready { .. })).await;
    let FeedState::Ready { topic, article } = ready else {
        unreachable!()
    };
    assert_eq!(topic, "Rust");
    assert_eq!(article, "<p>All about Rust</p>");
}

#[tokio::test]
async fn test_article_passes_through_sanitizer() {
    struct Marker;
    impl Sanitize for Marker {
        fn sanitize(&self, html: &str) -> String {
            format!("SANITIZED:{}", html)
        }
    }

    let (base_url, _) = spawn_mock_service().await;
    let feed = ArticleFeed::new(ArticleServiceConfig::new(&base_url), Arc::new(Marker));
    let mut state = feed.subscribe();

    feed.set_topic("Rust");
    let ready = wait_for_state(&mut state, |s| matches!(s, FeedState::Ready { .. })).await;
    let FeedState::Ready { article, .. } = ready else {
        unreachable!()
    };
    assert!(article.starts_with("SANITIZED:"));
}

#[tokio::test]
async fn test_blank_topic_goes_idle_without_request() {
    let (base_url, service) = spawn_mock_service().await;
    let (feed, mut state) = feed_for(&base_url);

    feed.set_topic("   ");
    assert_eq!(*state.borrow_and_update(), FeedState::Idle);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_article_field_is_a_failure() {
    let (base_url, _) = spawn_mock_service().await;
    let (feed, mut state) = feed_for(&base_url);

    feed.set_topic("missing");
    let failed = wait_for_state(&mut state, |s| matches!(s, FeedState::Failed { .. })).await;
    assert_eq!(
        failed,
        FeedState::Failed {
            topic: "missing".to_string(),
            error: ArticleError::MissingArticle,
        }
    );
}

#[tokio::test]
async fn test_http_error_is_a_failure_state() {
    let (base_url, _) = spawn_mock_service().await;
    let (feed, mut state) = feed_for(&base_url);

    feed.set_topic("boom");
    let failed = wait_for_state(&mut state, |s| matches!(s, FeedState::Failed { .. })).await;
    let FeedState::Failed { error, .. } = failed else {
        unreachable!()
    };
    assert_eq!(error, ArticleError::Status(500));
}

#[tokio::test]
async fn test_stale_response_does_not_overwrite_newer_topic() {
    let (base_url, _) = spawn_mock_service().await;
    let (feed, mut state) = feed_for(&base_url);

    // First topic answers slowly; the second supersedes it while the first
    // is still in flight.
    feed.set_topic("slow start");
    tokio::time::sleep(Duration::from_millis(50)).await;
    feed.set_topic("Beta");

    let ready = wait_for_state(&mut state, |s| matches!(s, FeedState::Ready { .. })).await;
    assert!(matches!(&ready, FeedState::Ready { topic, .. } if topic == "Beta"));

    // Let the slow response arrive; it must be discarded.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(
        matches!(&*state.borrow(), FeedState::Ready { topic, .. } if topic == "Beta"),
        "stale response overwrote the newer topic"
    );
}

#[tokio::test]
async fn test_session_topic_drives_the_feed() {
    use coscribe_editor::{EditorChange, InlinePath, Operation};
    use coscribe_workspace::{spawn_topic_watcher, DocumentHub, DocumentId, Session, SessionId};

    let (base_url, service) = spawn_mock_service().await;
    let (feed, mut state) = feed_for(&base_url);

    let hub = DocumentHub::new();
    let document = DocumentId::random();
    let session_id = SessionId::random();
    let (handle, _join) =
        Session::spawn(document, session_id, Box::new(hub.connect(document, session_id)))
            .await
            .unwrap();
    let _watcher = spawn_topic_watcher(handle.topic(), feed.clone());

    // Empty first line: the feed stays idle and nothing is requested.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*state.borrow_and_update(), FeedState::Idle);
    assert_eq!(service.hits.load(Ordering::SeqCst), 0);

    handle
        .edit(vec![EditorChange::Edit(Operation::InsertText {
            at: InlinePath::new(0, 0),
            offset: 0,
            text: "Phoenix".to_string(),
        })])
        .unwrap();

    let ready = wait_for_state(&mut state, |s| matches!(s, FeedState::Ready { .. })).await;
    assert!(matches!(&ready, FeedState::Ready { topic, .. } if topic == "Phoenix"));
    handle.shutdown();
}

#[tokio::test]
async fn test_unchanged_topic_is_not_refetched() {
    let (base_url, service) = spawn_mock_service().await;
    let (feed, mut state) = feed_for(&base_url);

    feed.set_topic("Rust");
    wait_for_state(&mut state, |s| matches!(s, FeedState::Ready { .. })).await;
    feed.set_topic("Rust");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.hits.load(Ordering::SeqCst), 1);
}
