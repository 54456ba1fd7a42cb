//! Environment-backed configuration.

/// Fallback endpoint for local development.
pub const DEFAULT_ARTICLE_SERVICE_URL: &str = "http://localhost:3001";

const ARTICLE_SERVICE_URL_VAR: &str = "ARTICLE_SERVICE_URL";

/// Where the article-generation collaborator lives.
#[derive(Debug, Clone)]
pub struct ArticleServiceConfig {
    base_url: String,
}

impl ArticleServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    /// Read `ARTICLE_SERVICE_URL`, falling back to the local development
    /// endpoint.
    pub fn from_env() -> Self {
        match std::env::var(ARTICLE_SERVICE_URL_VAR) {
            Ok(url) if !url.trim().is_empty() => Self::new(url),
            _ => Self::new(DEFAULT_ARTICLE_SERVICE_URL),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn generate_article_url(&self) -> String {
        format!("{}/generate-article", self.base_url)
    }
}

impl Default for ArticleServiceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ARTICLE_SERVICE_URL)
    }
}
