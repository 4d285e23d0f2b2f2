//! News retrieval collaborator.
//!
//! A [`NewsSource`] turns a [`NewsQuery`] into an ordered list of
//! [`ArticleRecord`]s. [`NewsApiClient`] pages through the NewsAPI
//! `/v2/everything` endpoint; [`StaticNewsSource`] serves a fixed list (from
//! memory or a JSON file) for offline runs and tests.
//!
//! Retrieval errors are typed, but the analyzer only ever calls
//! [`NewsSource::fetch_or_empty`], which logs and degrades to no articles.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::rollup::ArticleRecord;
use crate::weighting::extract_domain;

/// Environment variable holding the NewsAPI key.
pub const NEWSAPI_KEY_VAR: &str = "NEWSAPI_KEY";

const NEWSAPI_BASE_URL: &str = "https://newsapi.org";
const MAX_PAGE_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum NewsError {
    #[error("news API key not set")]
    #[diagnostic(
        code(coinmood::news::missing_key),
        help("Export {var} with your NewsAPI key, or pass --articles FILE to analyse a local file.")
    )]
    MissingKey { var: String },

    #[error("news request failed: {message}")]
    #[diagnostic(
        code(coinmood::news::request),
        help("Check your network connection and API key.")
    )]
    Request { message: String },

    #[error("news API returned an error ({code}): {message}")]
    #[diagnostic(
        code(coinmood::news::api),
        help("See the NewsAPI error code; rate limits reset daily on the free plan.")
    )]
    Api { code: String, message: String },

    #[error("failed to parse news response: {message}")]
    #[diagnostic(code(coinmood::news::parse), help("The response did not match the expected shape."))]
    Parse { message: String },

    #[error("failed to read article file: {path}")]
    #[diagnostic(
        code(coinmood::news::read),
        help("The file must be a JSON array of {{title, description, content, url, source, publishedAt}}.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type NewsResult<T> = std::result::Result<T, NewsError>;

// ---------------------------------------------------------------------------
// Query and trait
// ---------------------------------------------------------------------------

/// What to retrieve.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsQuery {
    pub keywords: Vec<String>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub language: String,
    /// Stop once this many articles have been collected.
    pub max_articles: usize,
}

impl NewsQuery {
    /// Articles from the last `days` days up to `now`.
    pub fn last_days(
        keywords: Vec<String>,
        days: u32,
        language: impl Into<String>,
        max_articles: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            keywords,
            from: now - chrono::Duration::days(i64::from(days)),
            to: now,
            language: language.into(),
            max_articles,
        }
    }

    /// Keywords joined for a search query (`a OR b`).
    pub fn search_terms(&self) -> String {
        self.keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

/// A source of news articles.
pub trait NewsSource: Send + Sync {
    fn fetch(&self, query: &NewsQuery) -> NewsResult<Vec<ArticleRecord>>;

    /// [`fetch`](Self::fetch), with any failure logged and turned into an empty list.
    fn fetch_or_empty(&self, query: &NewsQuery) -> Vec<ArticleRecord> {
        match self.fetch(query) {
            Ok(articles) => {
                tracing::info!(articles = articles.len(), "retrieved news articles");
                articles
            }
            Err(e) => {
                tracing::error!(error = %e, "news retrieval failed, continuing with no articles");
                Vec::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// NewsAPI
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    status: String,
    #[serde(default)]
    total_results: usize,
    #[serde(default)]
    articles: Vec<ApiArticle>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiArticle {
    #[serde(default)]
    source: Option<ApiSource>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "published_at")]
    published_at: Option<String>,
}

/// NewsAPI sends `{id, name}`; saved article files may carry a plain name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiSource {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
    },
}

impl ApiSource {
    fn into_name(self) -> Option<String> {
        match self {
            Self::Name(name) => Some(name),
            Self::Object { name } => name,
        }
    }
}

/// Accepted article files: a bare article array or a saved NewsAPI response.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArticleFile {
    List(Vec<ApiArticle>),
    Response { articles: Vec<ApiArticle> },
}

impl From<ApiArticle> for ArticleRecord {
    fn from(a: ApiArticle) -> Self {
        let url = a.url.unwrap_or_default();
        let source = a
            .source
            .and_then(ApiSource::into_name)
            .filter(|n| !n.trim().is_empty())
            .or_else(|| extract_domain(&url))
            .unwrap_or_default();
        Self {
            title: a.title.unwrap_or_default(),
            description: a.description.unwrap_or_default(),
            content: a.content.unwrap_or_default(),
            url,
            source,
            published_at: a.published_at,
        }
    }
}

/// Sync client for NewsAPI's `/v2/everything` search.
pub struct NewsApiClient {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl NewsApiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: NEWSAPI_BASE_URL.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Read the key from [`NEWSAPI_KEY_VAR`].
    pub fn from_env() -> NewsResult<Self> {
        std::env::var(NEWSAPI_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(Self::new)
            .ok_or_else(|| NewsError::MissingKey {
                var: NEWSAPI_KEY_VAR.into(),
            })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn fetch_page(
        &self,
        agent: &ureq::Agent,
        query: &NewsQuery,
        page: usize,
        page_size: usize,
    ) -> NewsResult<ApiResponse> {
        let url = format!("{}/v2/everything", self.base_url.trim_end_matches('/'));
        let resp = agent
            .get(&url)
            .set("X-Api-Key", &self.api_key)
            .query("q", &query.search_terms())
            .query("from", &query.from.format("%Y-%m-%d").to_string())
            .query("to", &query.to.format("%Y-%m-%d").to_string())
            .query("language", &query.language)
            .query("sortBy", "publishedAt")
            .query("pageSize", &page_size.to_string())
            .query("page", &page.to_string())
            .call();

        let resp = match resp {
            Ok(resp) => resp,
            // NewsAPI reports errors as JSON bodies with a non-2xx status.
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(e) => {
                return Err(NewsError::Request {
                    message: e.to_string(),
                });
            }
        };

        let body: ApiResponse = resp.into_json().map_err(|e| NewsError::Parse {
            message: e.to_string(),
        })?;
        if body.status != "ok" {
            return Err(NewsError::Api {
                code: body.code.unwrap_or_else(|| "unknown".into()),
                message: body.message.unwrap_or_default(),
            });
        }
        Ok(body)
    }
}

impl NewsSource for NewsApiClient {
    fn fetch(&self, query: &NewsQuery) -> NewsResult<Vec<ArticleRecord>> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let mut articles: Vec<ArticleRecord> = Vec::new();
        let mut page = 1;

        while articles.len() < query.max_articles {
            let page_size = (query.max_articles - articles.len()).min(MAX_PAGE_SIZE);
            let body = self.fetch_page(&agent, query, page, page_size)?;
            let received = body.articles.len();
            articles.extend(body.articles.into_iter().map(ArticleRecord::from));

            tracing::debug!(page, received, total = body.total_results, "news page fetched");
            if received < page_size || articles.len() >= body.total_results {
                break;
            }
            page += 1;
        }

        articles.truncate(query.max_articles);
        Ok(articles)
    }
}

impl std::fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Static source
// ---------------------------------------------------------------------------

/// A fixed article list. Keywords and dates are not applied; the cap is.
#[derive(Debug, Clone, Default)]
pub struct StaticNewsSource {
    articles: Vec<ArticleRecord>,
}

impl StaticNewsSource {
    pub fn new(articles: Vec<ArticleRecord>) -> Self {
        Self { articles }
    }

    /// Load articles from JSON: an array of articles, or a NewsAPI response
    /// body. Null fields and `{id, name}` sources are accepted.
    pub fn from_file(path: &Path) -> NewsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| NewsError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let file: ArticleFile = serde_json::from_str(&content).map_err(|e| NewsError::Parse {
            message: format!("{}: {e}", path.display()),
        })?;
        let raw = match file {
            ArticleFile::List(articles) | ArticleFile::Response { articles } => articles,
        };
        Ok(Self {
            articles: raw.into_iter().map(ArticleRecord::from).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

impl NewsSource for StaticNewsSource {
    fn fetch(&self, query: &NewsQuery) -> NewsResult<Vec<ArticleRecord>> {
        Ok(self
            .articles
            .iter()
            .take(query.max_articles)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn query(max: usize) -> NewsQuery {
        NewsQuery::last_days(
            vec!["bitcoin".into(), " crypto ".into(), "".into()],
            3,
            "en",
            max,
            Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
        )
    }

    struct Failing;
    impl NewsSource for Failing {
        fn fetch(&self, _query: &NewsQuery) -> NewsResult<Vec<ArticleRecord>> {
            Err(NewsError::Request {
                message: "dns failure".into(),
            })
        }
    }

    #[test]
    fn query_window_and_terms() {
        let q = query(10);
        assert_eq!(q.to - q.from, chrono::Duration::days(3));
        assert_eq!(q.search_terms(), "bitcoin OR crypto");
    }

    #[test]
    fn failure_degrades_to_empty() {
        assert!(Failing.fetch_or_empty(&query(10)).is_empty());
    }

    #[test]
    fn static_source_respects_cap() {
        let articles = (0..5)
            .map(|i| ArticleRecord {
                title: format!("a{i}"),
                ..Default::default()
            })
            .collect();
        let source = StaticNewsSource::new(articles);
        let got = source.fetch(&query(3)).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].title, "a0");
    }

    #[test]
    fn api_article_conversion() {
        let raw: ApiArticle = serde_json::from_value(serde_json::json!({
            "source": {"id": null, "name": "CoinDesk"},
            "title": "Bitcoin rallies",
            "description": null,
            "content": "Body",
            "url": "https://www.coindesk.com/x",
            "publishedAt": "2024-03-09T08:00:00Z"
        }))
        .unwrap();
        let record = ArticleRecord::from(raw);
        assert_eq!(record.source, "CoinDesk");
        assert_eq!(record.description, "");
        assert_eq!(record.published_at.as_deref(), Some("2024-03-09T08:00:00Z"));

        let nameless: ApiArticle = serde_json::from_value(serde_json::json!({
            "title": "t",
            "url": "https://reuters.com/y"
        }))
        .unwrap();
        assert_eq!(ArticleRecord::from(nameless).source, "reuters.com");
    }

    #[test]
    fn error_body_parses() {
        let body: ApiResponse = serde_json::from_value(serde_json::json!({
            "status": "error",
            "code": "apiKeyInvalid",
            "message": "Your API key is invalid."
        }))
        .unwrap();
        assert_eq!(body.status, "error");
        assert_eq!(body.code.as_deref(), Some("apiKeyInvalid"));
    }

    #[test]
    fn unreachable_api_is_a_request_error() {
        let client = NewsApiClient::new("key")
            .with_base_url("http://127.0.0.1:1")
            .with_timeout(Duration::from_secs(2));
        assert!(matches!(
            client.fetch(&query(5)),
            Err(NewsError::Request { .. })
        ));
    }

    #[test]
    fn article_file_loads() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("articles.json");
        std::fs::write(
            &path,
            r#"[{"title": "ETH up", "url": "https://ft.com/a", "publishedAt": "2024-03-09"}]"#,
        )
        .unwrap();
        let source = StaticNewsSource::from_file(&path).unwrap();
        assert_eq!(source.len(), 1);
        let got = source.fetch(&query(5)).unwrap();
        assert_eq!(got[0].source, "ft.com");
        assert_eq!(got[0].published_at.as_deref(), Some("2024-03-09"));
        assert!(matches!(
            StaticNewsSource::from_file(&dir.path().join("missing.json")),
            Err(NewsError::Read { .. })
        ));
    }

    #[test]
    fn newsapi_shaped_file_loads() {
        let dir = tempfile::TempDir::new().unwrap();
        let body = serde_json::json!({
            "status": "ok",
            "totalResults": 2,
            "articles": [
                {
                    "source": {"id": "reuters", "name": "Reuters"},
                    "author": null,
                    "title": "Bitcoin climbs",
                    "description": null,
                    "url": "https://www.reuters.com/btc",
                    "publishedAt": "2024-03-09T08:00:00Z",
                    "content": null
                },
                {
                    "source": "CoinDesk",
                    "title": "Ether steady",
                    "description": "Quiet session",
                    "url": "https://coindesk.com/eth",
                    "published_at": "2024-03-09"
                }
            ]
        });
        let response = dir.path().join("response.json");
        std::fs::write(&response, body.to_string()).unwrap();
        let got = StaticNewsSource::from_file(&response)
            .unwrap()
            .fetch(&query(10))
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].source, "Reuters");
        assert_eq!(got[0].description, "");
        assert_eq!(got[0].content, "");
        assert_eq!(got[1].source, "CoinDesk");
        assert_eq!(got[1].published_at.as_deref(), Some("2024-03-09"));

        // The bare article array from the same response loads too.
        let list = dir.path().join("list.json");
        std::fs::write(&list, body["articles"].to_string()).unwrap();
        assert_eq!(StaticNewsSource::from_file(&list).unwrap().len(), 2);
    }
}
