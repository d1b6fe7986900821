//! Rate-limited HTTP client.
//!
//! Every request made through a [`RateLimitedClient`] waits until a randomized
//! delay has passed since the previous request completed. The limiter lock is
//! held for the whole round trip, so requests through one client never overlap.

use crate::error::{Result, SessionError};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use iapd_core::SessionConfig;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Politeness delay state shared by all requests of one client
#[derive(Debug)]
struct RateLimiter {
    last_completed: Option<Instant>,
    min_delay: Duration,
    max_delay: Duration,
}

impl RateLimiter {
    fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            last_completed: None,
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    fn draw_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        rand::thread_rng().gen_range(self.min_delay..=self.max_delay)
    }

    /// Remaining wait before the next request may be sent.
    fn remaining_wait(&self, delay: Duration) -> Option<Duration> {
        let last = self.last_completed?;
        let elapsed = last.elapsed();
        (elapsed < delay).then(|| delay - elapsed)
    }
}

/// HTTP client that spaces consecutive requests and rejects non-2xx responses.
pub struct RateLimitedClient {
    transport: Arc<dyn HttpTransport>,
    limiter: Mutex<RateLimiter>,
}

impl RateLimitedClient {
    /// Wrap a transport using the delays from the session settings.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, config: &SessionConfig) -> Self {
        Self::with_delays(transport, config.min_delay(), config.max_delay())
    }

    /// Wrap a transport with explicit delay bounds.
    #[must_use]
    pub fn with_delays(
        transport: Arc<dyn HttpTransport>,
        min_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            transport,
            limiter: Mutex::new(RateLimiter::new(min_delay, max_delay)),
        }
    }

    /// Build a client over a fresh `reqwest` transport.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    /// Send a request once the politeness delay has elapsed.
    ///
    /// # Errors
    /// Returns [`SessionError::Status`] for non-2xx responses, or the
    /// transport's error when no response was received.
    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut limiter = self.limiter.lock().await;

        let delay = limiter.draw_delay();
        if let Some(wait) = limiter.remaining_wait(delay) {
            tracing::debug!("Request delayed for {:?}", wait);
            tokio::time::sleep(wait).await;
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            form_fields = request.form.as_ref().map_or(0, Vec::len),
            "Sending request"
        );
        let response = self.transport.send(request).await?;
        limiter.last_completed = Some(Instant::now());

        if !response.is_success() {
            return Err(SessionError::Status {
                status: response.status,
                url: response.url,
            });
        }

        Ok(response)
    }

    /// GET a URL.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.request(HttpRequest::get(url)).await
    }

    /// POST a URL-encoded form.
    pub async fn post_form(&self, url: &str, form: Vec<(String, String)>) -> Result<HttpResponse> {
        self.request(HttpRequest::post_form(url, form)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedTransport;

    fn client(transport: &Arc<ScriptedTransport>, min_ms: u64, max_ms: u64) -> RateLimitedClient {
        RateLimitedClient::with_delays(
            transport.clone(),
            Duration::from_millis(min_ms),
            Duration::from_millis(max_ms),
        )
    }

    #[test]
    fn test_draw_delay_within_bounds() {
        let limiter = RateLimiter::new(Duration::from_millis(1500), Duration::from_millis(2500));
        for _ in 0..100 {
            let delay = limiter.draw_delay();
            assert!(delay >= Duration::from_millis(1500));
            assert!(delay <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn test_inverted_bounds_use_minimum() {
        let limiter = RateLimiter::new(Duration::from_millis(800), Duration::from_millis(100));
        assert_eq!(limiter.draw_delay(), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_not_delayed() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_page("ok");
        let client = client(&transport, 1000, 1000);

        let start = Instant::now();
        client.get("https://example.com").await.unwrap();
        assert_eq!(transport.sent_at()[0], start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_requests_are_spaced() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_page("a").push_page("b").push_page("c");
        let client = client(&transport, 1000, 2000);

        for _ in 0..3 {
            client.get("https://example.com").await.unwrap();
        }

        let sent = transport.sent_at();
        for pair in sent.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(1000), "gap too short: {gap:?}");
            assert!(gap <= Duration::from_millis(2000), "gap too long: {gap:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_time_counts_toward_delay() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_page("a").push_page("b");
        let client = client(&transport, 1000, 1000);

        client.get("https://example.com").await.unwrap();
        tokio::time::advance(Duration::from_millis(1500)).await;
        client.get("https://example.com").await.unwrap();

        let sent = transport.sent_at();
        assert_eq!(sent[1] - sent[0], Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_still_counts_as_completed() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(503).push_page("b");
        let client = client(&transport, 1000, 1000);

        let err = client.get("https://example.com").await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));

        client.get("https://example.com").await.unwrap();
        let sent = transport.sent_at();
        assert!(sent[1] - sent[0] >= Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_non_success_is_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(404);
        let client = client(&transport, 0, 0);

        let err = client.get("https://example.com/missing").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Status { status: 404, ref url } if url == "https://example.com/missing"
        ));
    }

    #[tokio::test]
    async fn test_post_form_forwards_fields() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_page("ok");
        let client = client(&transport, 0, 0);

        let form = vec![("__EVENTTARGET".to_string(), "btn".to_string())];
        client
            .post_form("https://example.com/form", form.clone())
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].method, reqwest::Method::POST);
        assert_eq!(sent[0].form.as_ref(), Some(&form));
    }
}
