//! HTTP fetcher with bounded timeout and retry-with-backoff.
//!
//! Transient failures (timeout, connection reset, 5xx, 429) are retried per
//! the configured [`RetryPolicy`]; permanent ones (other 4xx, unsupported
//! content type) fail the run immediately with a fetch error.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, info, warn};
use url::Url;

use quizforge_shared::{
    CancelToken, FetchPoliciesConfig, QuizForgeError, Result, RetryPolicy, SourceDocument,
};

use crate::parse;

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("QuizForge/", env!("CARGO_PKG_VERSION"));

/// Configuration for [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&FetchPoliciesConfig> for FetchConfig {
    fn from(config: &FetchPoliciesConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            retry: config.retry,
        }
    }
}

/// Source of documents for the pipeline.
///
/// A trait seam over [`Fetcher`] so the orchestrator can be driven by a
/// failing or pre-baked source in tests.
pub trait DocumentSource: Send + Sync + 'static {
    /// Retrieve and parse the document at `url`.
    fn fetch(
        &self,
        url: &Url,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<SourceDocument>> + Send;
}

/// Production HTTP fetcher.
pub struct Fetcher {
    config: FetchConfig,
    client: reqwest::Client,
}

/// What a single request attempt produced.
enum Attempt {
    Success { body: String, kind: BodyKind },
    Transient(String),
}

/// Supported response body kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Html,
    Plain,
}

impl Fetcher {
    /// Create a fetcher with its own HTTP client.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                QuizForgeError::fetch("<client>", format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { config, client })
    }

    async fn fetch_inner(&self, url: &Url, cancel: &CancelToken) -> Result<SourceDocument> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(QuizForgeError::fetch(
                url.as_str(),
                format!("unsupported URL scheme '{}'", url.scheme()),
            ));
        }

        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(QuizForgeError::Cancelled);
            }

            let outcome = tokio::select! {
                res = self.attempt(url) => res,
                _ = cancel.cancelled() => return Err(QuizForgeError::Cancelled),
            };

            match outcome? {
                Attempt::Success { body, kind } => {
                    let doc = match kind {
                        BodyKind::Html => parse::parse_html(url.as_str(), &body),
                        BodyKind::Plain => parse::parse_plain_text(url.as_str(), &body),
                    };
                    info!(
                        url = %url,
                        blocks = doc.blocks.len(),
                        title = doc.title.as_deref().unwrap_or(""),
                        "fetched document"
                    );
                    return Ok(doc);
                }
                Attempt::Transient(reason) => match self.config.retry.delay_for(attempt) {
                    Some(delay) => {
                        warn!(url = %url, attempt, %reason, "transient fetch failure, backing off");
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancel.cancelled() => return Err(QuizForgeError::Cancelled),
                        }
                        attempt += 1;
                    }
                    None => {
                        return Err(QuizForgeError::fetch(
                            url.as_str(),
                            format!("{reason} (after {} attempts)", attempt + 1),
                        ));
                    }
                },
            }
        }
    }

    /// One request attempt. `Err` means permanent failure.
    async fn attempt(&self, url: &Url) -> Result<Attempt> {
        let response = match self.client.get(url.as_str()).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Ok(Attempt::Transient("request timed out".into())),
            Err(e) if e.is_connect() => {
                return Ok(Attempt::Transient(format!("connection failed: {e}")));
            }
            Err(e) => {
                return Err(QuizForgeError::fetch(url.as_str(), e.to_string()));
            }
        };

        let status = response.status();
        if is_transient_status(status) {
            return Ok(Attempt::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(QuizForgeError::fetch(
                url.as_str(),
                format!("HTTP {status}"),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return Err(QuizForgeError::fetch(
                    url.as_str(),
                    format!("failed to read body: {e}"),
                ));
            }
        };

        let kind = classify_body(content_type.as_deref(), &body).ok_or_else(|| {
            QuizForgeError::fetch(
                url.as_str(),
                format!(
                    "unsupported content type '{}'",
                    content_type.as_deref().unwrap_or("<missing>")
                ),
            )
        })?;

        debug!(url = %url, ?kind, bytes = body.len(), "response body received");
        Ok(Attempt::Success { body, kind })
    }
}

impl DocumentSource for Fetcher {
    fn fetch(
        &self,
        url: &Url,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<SourceDocument>> + Send {
        self.fetch_inner(url, cancel)
    }
}

/// 5xx and 429 are worth retrying; everything else non-success is permanent.
fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Decide how to parse the body from the Content-Type header, tolerating a
/// missing header when the body looks like HTML.
fn classify_body(content_type: Option<&str>, body: &str) -> Option<BodyKind> {
    match content_type.map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_lowercase()) {
        Some(ct) if ct == "text/html" || ct == "application/xhtml+xml" => Some(BodyKind::Html),
        Some(ct) if ct == "text/plain" => Some(BodyKind::Plain),
        Some(_) => None,
        None => {
            let head = body.trim_start().get(..64).unwrap_or(body.trim_start());
            let looks_html =
                head.to_lowercase().starts_with("<!doctype html") || head.starts_with('<');
            looks_html.then_some(BodyKind::Html)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
                backoff_multiplier: 1.0,
            },
        }
    }

    #[test]
    fn status_classification() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::OK));
    }

    #[test]
    fn body_classification() {
        assert_eq!(
            classify_body(Some("text/html; charset=utf-8"), ""),
            Some(BodyKind::Html)
        );
        assert_eq!(classify_body(Some("text/plain"), ""), Some(BodyKind::Plain));
        assert_eq!(classify_body(Some("image/png"), ""), None);
        assert_eq!(
            classify_body(None, "<!DOCTYPE html><html></html>"),
            Some(BodyKind::Html)
        );
        assert_eq!(classify_body(None, "just words"), None);
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let fetcher = Fetcher::new(FetchConfig::default()).expect("build");
        let url = Url::parse("ftp://example.com/file").expect("url");
        let err = fetcher
            .fetch(&url, &CancelToken::new())
            .await
            .expect_err("scheme rejected");
        assert!(matches!(err, QuizForgeError::Fetch { .. }));
        assert!(err.to_string().contains("scheme"));
    }

    #[tokio::test]
    async fn retries_5xx_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "<html><body><p>recovered content here</p></body></html>",
                    "text/html",
                ),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_retry()).expect("build");
        let url = Url::parse(&format!("{}/page", server.uri())).expect("url");
        let doc = fetcher
            .fetch(&url, &CancelToken::new())
            .await
            .expect("third attempt succeeds");
        assert_eq!(doc.blocks.len(), 1);
        assert!(doc.raw_text.contains("recovered content"));
    }

    #[tokio::test]
    async fn gives_up_after_retry_bound() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_retry()).expect("build");
        let url = Url::parse(&server.uri()).expect("url");
        let err = fetcher
            .fetch(&url, &CancelToken::new())
            .await
            .expect_err("bounded retries");
        assert!(matches!(err, QuizForgeError::Fetch { .. }));
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn fails_404_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_retry()).expect("build");
        let url = Url::parse(&server.uri()).expect("url");
        let err = fetcher
            .fetch(&url, &CancelToken::new())
            .await
            .expect_err("permanent");
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[tokio::test]
    async fn rejects_unsupported_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.7", "application/pdf"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_retry()).expect("build");
        let url = Url::parse(&server.uri()).expect("url");
        let err = fetcher
            .fetch(&url, &CancelToken::new())
            .await
            .expect_err("unsupported type");
        assert!(err.to_string().contains("unsupported content type"));
    }

    #[tokio::test]
    async fn plain_text_body_is_supported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "first paragraph\n\nsecond paragraph",
                    "text/plain; charset=utf-8",
                ),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_retry()).expect("build");
        let url = Url::parse(&server.uri()).expect("url");
        let doc = fetcher
            .fetch(&url, &CancelToken::new())
            .await
            .expect("plain text ok");
        assert_eq!(doc.blocks.len(), 2);
    }

    #[tokio::test]
    async fn cancelled_token_aborts_fetch() {
        let fetcher = Fetcher::new(FetchConfig::default()).expect("build");
        let cancel = CancelToken::new();
        cancel.cancel();
        let url = Url::parse("https://example.com/").expect("url");
        let err = fetcher.fetch(&url, &cancel).await.expect_err("cancelled");
        assert!(matches!(err, QuizForgeError::Cancelled));
    }
}
