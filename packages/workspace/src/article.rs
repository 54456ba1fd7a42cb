//! # Article Feed
//!
//! Reacts to topic changes by requesting a generated reference article from
//! the article-generation collaborator. Entirely isolated from the editing
//! path: a feed failure is a display state, never a session error.
//!
//! ```text
//! Idle → Loading → Ready | Failed
//! ```
//!
//! Each request carries an epoch; a response whose epoch is no longer
//! current is discarded, so a slow response for a superseded topic can
//! never overwrite the latest topic's outcome. There is no hard cancel of
//! the in-flight request — the epoch check is its logical cancellation.

use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ArticleServiceConfig;
use crate::sanitize::Sanitize;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArticleError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("article service returned status {0}")]
    Status(u16),

    #[error("article service returned no article")]
    MissingArticle,
}

/// Display state of the feed. `Failed` is distinct from `Idle`: "no topic
/// yet" and "the fetch broke" render differently.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedState {
    Idle,
    Loading { topic: String },
    Ready { topic: String, article: String },
    Failed { topic: String, error: ArticleError },
}

#[derive(Deserialize)]
struct ArticleResponse {
    article: Option<String>,
}

struct FeedInner {
    client: reqwest::Client,
    config: ArticleServiceConfig,
    sanitizer: Arc<dyn Sanitize>,
    state: watch::Sender<FeedState>,
    epoch: AtomicU64,
    last_topic: Mutex<Option<String>>,
}

/// Topic-driven article fetcher. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct ArticleFeed {
    inner: Arc<FeedInner>,
}

impl ArticleFeed {
    pub fn new(config: ArticleServiceConfig, sanitizer: Arc<dyn Sanitize>) -> Self {
        let (state, _) = watch::channel(FeedState::Idle);
        Self {
            inner: Arc::new(FeedInner {
                client: reqwest::Client::new(),
                config,
                sanitizer,
                state,
                epoch: AtomicU64::new(0),
                last_topic: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.inner.state.subscribe()
    }

    /// React to a topic value. Whitespace-only topics reset to `Idle`
    /// without a request; an unchanged topic is not re-requested; anything
    /// else supersedes whatever is in flight.
    pub fn set_topic(&self, topic: &str) {
        let topic = topic.trim().to_string();
        let epoch = {
            let mut last = self.inner.last_topic.lock().unwrap();
            if topic.is_empty() {
                self.inner.epoch.fetch_add(1, Ordering::SeqCst);
                *last = None;
                self.inner.state.send_replace(FeedState::Idle);
                return;
            }
            if last.as_deref() == Some(topic.as_str()) {
                return;
            }
            *last = Some(topic.clone());
            self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.inner.state.send_replace(FeedState::Loading {
            topic: topic.clone(),
        });

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let result = fetch_article(&inner.client, &inner.config, &topic).await;
            if inner.epoch.load(Ordering::SeqCst) != epoch {
                tracing::debug!(%topic, "discarding stale article response");
                return;
            }
            let state = match result {
                Ok(article) => FeedState::Ready {
                    topic,
                    article: inner.sanitizer.sanitize(&article),
                },
                Err(error) => {
                    tracing::warn!(%error, "article fetch failed");
                    FeedState::Failed { topic, error }
                }
            };
            inner.state.send_replace(state);
        });
    }
}

async fn fetch_article(
    client: &reqwest::Client,
    config: &ArticleServiceConfig,
    topic: &str,
) -> Result<String, ArticleError> {
    let response = client
        .post(config.generate_article_url())
        .json(&serde_json::json!({ "topic": topic }))
        .send()
        .await
        .map_err(|e| ArticleError::Request(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ArticleError::Status(response.status().as_u16()));
    }

    let body: ArticleResponse = response
        .json()
        .await
        .map_err(|e| ArticleError::Request(e.to_string()))?;

    body.article.ok_or(ArticleError::MissingArticle)
}

/// Bridge a session's topic stream into the feed: one task, one
/// `set_topic` per distinct published value.
pub fn spawn_topic_watcher(
    mut topic: watch::Receiver<String>,
    feed: ArticleFeed,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let initial = topic.borrow_and_update().clone();
        feed.set_topic(&initial);
        while topic.changed().await.is_ok() {
            let current = topic.borrow_and_update().clone();
            feed.set_topic(&current);
        }
    })
}
