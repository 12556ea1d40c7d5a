use async_trait::async_trait;
use bytes::Bytes;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

use super::{EndpointClass, FetchError, Upstream, UpstreamRequest};
use crate::core::config::PollerConfig;

const MAX_ERROR_BODY: usize = 256;

/// HTTP transport for the provider. Owns timeouts, bounded retries with
/// exponential backoff, and token-bucket pacing for rate-sensitive classes.
pub struct HttpUpstream {
    client: Client,
    base_url: String,
    schedule_path: String,
    legacy_path: String,
    current_path: String,
    max_attempts: u32,
    base_backoff: Duration,
    limiter: DefaultDirectRateLimiter,
    limited: HashSet<EndpointClass>,
}

impl HttpUpstream {
    pub fn new(config: &PollerConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.request_timeout())
            .user_agent(config.provider.user_agent.clone())
            .pool_max_idle_per_host(config.polling.max_in_flight)
            .build()?;

        let per_minute = NonZeroU32::new(config.rate_limit.requests_per_minute)
            .unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.rate_limit.burst).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_minute(per_minute).allow_burst(burst));

        Ok(Self {
            client,
            base_url: config.provider.base_url.trim_end_matches('/').to_string(),
            schedule_path: config.provider.schedule_path.clone(),
            legacy_path: config.provider.legacy_path.clone(),
            current_path: config.provider.current_path.clone(),
            max_attempts: config.retry.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.retry.base_backoff_ms),
            limiter,
            limited: config.rate_limit.classes.iter().copied().collect(),
        })
    }

    pub(crate) fn url_for(&self, request: &UpstreamRequest) -> String {
        let template = match request.class {
            EndpointClass::Schedule => &self.schedule_path,
            EndpointClass::Legacy => &self.legacy_path,
            EndpointClass::Current => &self.current_path,
        };
        let path = template
            .replace("{date}", &request.date.format("%Y%m%d").to_string())
            .replace("{event_id}", request.event_id.as_deref().unwrap_or_default());
        format!("{}{}", self.base_url, path)
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    async fn get_once(&self, url: &str) -> Result<Bytes, FetchError> {
        let res = self.client.get(url).send().await.map_err(map_reqwest)?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: clip_error_body(body),
            });
        }
        res.bytes().await.map_err(map_reqwest)
    }
}

/// Cut an error body to at most `MAX_ERROR_BODY` bytes on a char boundary.
fn clip_error_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    body
}

fn map_reqwest(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, request: &UpstreamRequest) -> Result<Bytes, FetchError> {
        let url = self.url_for(request);
        let mut attempt = 0;
        loop {
            attempt += 1;
            if self.limited.contains(&request.class) {
                self.limiter.until_ready().await;
            }
            debug!(class = request.class.as_str(), attempt, "GET {}", url);
            match self.get_once(&url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        class = request.class.as_str(),
                        event_id = request.event_id.as_deref().unwrap_or("-"),
                        attempt,
                        "Request failed: {}. Retrying in {:?}",
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::SourceVariant;
    use axum::{Router, extract::State, http::StatusCode, routing::get};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct Script {
        hits: Arc<AtomicUsize>,
        replies: Arc<Mutex<Vec<(StatusCode, String)>>>,
    }

    impl Script {
        fn new(replies: &[(StatusCode, &str)]) -> Self {
            Self {
                hits: Arc::default(),
                replies: Arc::new(Mutex::new(
                    replies.iter().map(|(s, b)| (*s, b.to_string())).collect(),
                )),
            }
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    /// Replays the scripted replies in order, then answers 200.
    async fn scripted(State(script): State<Script>) -> (StatusCode, String) {
        script.hits.fetch_add(1, Ordering::SeqCst);
        let mut replies = script.replies.lock().await;
        if replies.is_empty() {
            (StatusCode::OK, "{}".to_string())
        } else {
            replies.remove(0)
        }
    }

    async fn stalled(State(script): State<Script>) -> (StatusCode, String) {
        script.hits.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3)).await;
        (StatusCode::OK, "{}".to_string())
    }

    async fn serve(script: &Script, stall: bool) -> String {
        let router = if stall {
            Router::new().route("/schedule", get(stalled))
        } else {
            Router::new()
                .route("/schedule", get(scripted))
                .route("/legacy", get(scripted))
        };
        let app = router.with_state(script.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    fn mock_config(base_url: String) -> PollerConfig {
        let mut config = PollerConfig::default();
        config.provider.base_url = base_url;
        config.provider.schedule_path = "/schedule".to_string();
        config.provider.legacy_path = "/legacy".to_string();
        config.provider.current_path = "/current".to_string();
        config.polling.request_timeout_secs = 1;
        config.retry.base_backoff_ms = 10;
        config
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn upstream() -> HttpUpstream {
        let mut config = PollerConfig::default();
        config.provider.base_url = "http://127.0.0.1:9/feed/".to_string();
        HttpUpstream::new(&config).unwrap()
    }

    #[test]
    fn url_templates_expand_date_and_event() {
        let up = upstream();
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(
            up.url_for(&UpstreamRequest::schedule(date)),
            "http://127.0.0.1:9/feed/schedule/20261019.json"
        );
        assert_eq!(
            up.url_for(&UpstreamRequest::snapshot(SourceVariant::Legacy, "E1", date)),
            "http://127.0.0.1:9/feed/legacy/20261019/E1_boxscore.json"
        );
        assert_eq!(
            up.url_for(&UpstreamRequest::snapshot(SourceVariant::Current, "E1", date)),
            "http://127.0.0.1:9/feed/boxscore/boxscore_E1.json"
        );
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let up = upstream();
        assert_eq!(up.backoff_for(1), Duration::from_millis(500));
        assert_eq!(up.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(up.backoff_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn error_body_is_clipped_on_char_boundary() {
        let body = format!("{}é tail", "a".repeat(MAX_ERROR_BODY - 1));
        assert_eq!(clip_error_body(body), "a".repeat(MAX_ERROR_BODY - 1));
        assert_eq!(clip_error_body("bad gateway".to_string()), "bad gateway");
    }

    #[tokio::test]
    async fn multibyte_error_page_is_reported_not_fatal() {
        let page = format!("{}é tail", "a".repeat(255));
        let script = Script::new(&[(StatusCode::SERVICE_UNAVAILABLE, page.as_str())]);
        let mut config = mock_config(serve(&script, false).await);
        config.retry.max_attempts = 1;
        let up = HttpUpstream::new(&config).unwrap();

        match up.fetch(&UpstreamRequest::schedule(date())).await {
            Err(FetchError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "a".repeat(255));
            }
            other => panic!("expected a 503 status error, got {:?}", other),
        }
        assert_eq!(script.hits(), 1);
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_success() {
        let script = Script::new(&[
            (StatusCode::SERVICE_UNAVAILABLE, "busy"),
            (StatusCode::TOO_MANY_REQUESTS, "slow down"),
        ]);
        let up = HttpUpstream::new(&mock_config(serve(&script, false).await)).unwrap();

        let body = up.fetch(&UpstreamRequest::schedule(date())).await.unwrap();
        assert_eq!(&body[..], b"{}");
        assert_eq!(script.hits(), 3);
    }

    #[tokio::test]
    async fn retries_stop_at_max_attempts() {
        let script = Script::new(&[
            (StatusCode::BAD_GATEWAY, "down"),
            (StatusCode::BAD_GATEWAY, "down"),
            (StatusCode::BAD_GATEWAY, "down"),
            (StatusCode::BAD_GATEWAY, "down"),
        ]);
        let up = HttpUpstream::new(&mock_config(serve(&script, false).await)).unwrap();

        let err = up.fetch(&UpstreamRequest::schedule(date())).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 502, .. }));
        assert_eq!(script.hits(), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let script = Script::new(&[(StatusCode::NOT_FOUND, "no such game")]);
        let up = HttpUpstream::new(&mock_config(serve(&script, false).await)).unwrap();

        let err = up.fetch(&UpstreamRequest::schedule(date())).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(script.hits(), 1);
    }

    #[tokio::test]
    async fn slow_responses_time_out_after_every_attempt() {
        let script = Script::default();
        let mut config = mock_config(serve(&script, true).await);
        config.retry.max_attempts = 2;
        let up = HttpUpstream::new(&config).unwrap();

        let err = up.fetch(&UpstreamRequest::schedule(date())).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout), "got {:?}", err);
        assert_eq!(script.hits(), 2);
    }

    #[tokio::test]
    async fn limited_classes_are_paced() {
        let script = Script::default();
        let mut config = mock_config(serve(&script, false).await);
        config.rate_limit.requests_per_minute = 60;
        config.rate_limit.burst = 1;
        config.rate_limit.classes = vec![EndpointClass::Legacy];
        let up = HttpUpstream::new(&config).unwrap();

        let started = Instant::now();
        for _ in 0..2 {
            up.fetch(&UpstreamRequest::schedule(date())).await.unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(500));

        let legacy = UpstreamRequest::snapshot(SourceVariant::Legacy, "E1", date());
        let started = Instant::now();
        for _ in 0..2 {
            up.fetch(&legacy).await.unwrap();
        }
        assert!(started.elapsed() >= Duration::from_millis(900));
        assert_eq!(script.hits(), 4);
    }
}
