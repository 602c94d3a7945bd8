// src/llm/http_client.rs
// HTTP client with retry for the completion API

use anyhow::{Result, anyhow};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::warn;

/// Total requests sent for one call, the first one included
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Delay before the first retry (doubles each retry)
const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);
/// Upper bound on a server-provided `Retry-After`
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

pub struct LlmHttpClient {
    client: Client,
    max_attempts: u32,
    base_backoff: Duration,
}

impl LlmHttpClient {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }

    /// Override the retry budget. `max_attempts` counts every request sent
    /// and is clamped to at least one.
    pub fn with_retry(mut self, max_attempts: u32, base_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_backoff = base_backoff;
        self
    }

    /// POST a JSON body with Bearer auth. 429, 5xx and connect/timeout
    /// failures are retried with exponential backoff until `max_attempts`
    /// requests have been sent. Returns the response body as text.
    pub async fn post_json_with_retry(
        &self,
        request_id: &str,
        url: &str,
        api_key: &str,
        body: String,
    ) -> Result<String> {
        let mut attempt = 1;
        let mut backoff = self.base_backoff;

        loop {
            let response_result = self
                .client
                .post(url)
                .bearer_auth(api_key)
                .header("Content-Type", "application/json")
                .body(body.clone())
                .send()
                .await;

            let can_retry = attempt < self.max_attempts;
            match response_result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.text().await?);
                    }

                    let delay = retry_delay(response.headers(), backoff);
                    let error_body = response.text().await.unwrap_or_default();
                    if !(can_retry && is_retryable_status(status)) {
                        return Err(anyhow!(
                            "API error {} after {} attempt(s): {}",
                            status,
                            attempt,
                            error_body
                        ));
                    }
                    warn!(
                        request_id = %request_id,
                        status = %status,
                        attempt,
                        "Transient error, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    // Only connect/timeout failures are safe to resend
                    if !(can_retry && (e.is_connect() || e.is_timeout())) {
                        return Err(anyhow!("Request failed after {} attempt(s): {}", attempt, e));
                    }
                    warn!(
                        request_id = %request_id,
                        error = %e,
                        attempt,
                        "Request failed (connect/timeout), retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }

            attempt += 1;
            backoff *= 2;
        }
    }
}

/// Rate limits and server errors are transient; other failures are not
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay before the next attempt: a `Retry-After` in seconds wins over the
/// backoff, capped at `MAX_RETRY_AFTER`.
fn retry_delay(headers: &HeaderMap, backoff: Duration) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
        .unwrap_or(backoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Serve `statuses` in order, one per connection, and count requests
    async fn serve(statuses: Vec<u16>) -> (String, Arc<AtomicU32>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v1/responses", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for status in statuses {
                let (mut socket, _) = listener.accept().await.unwrap();
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let body = if status == 200 { "ok" } else { "busy" };
                let response = format!(
                    "HTTP/1.1 {} X\r\nRetry-After: 0\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
            }
        });

        (url, hits)
    }

    /// Read headers plus a `Content-Length` body
    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn fast_client(max_attempts: u32) -> LlmHttpClient {
        LlmHttpClient::new(Duration::from_secs(5), Duration::from_secs(1))
            .with_retry(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_client_defaults() {
        let client = LlmHttpClient::new(Duration::from_secs(10), Duration::from_secs(5));
        assert_eq!(client.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(client.base_backoff, DEFAULT_BASE_BACKOFF);
        assert_eq!(client.with_retry(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_retry_delay_honors_retry_after() {
        let backoff = Duration::from_secs(4);
        let mut headers = HeaderMap::new();
        assert_eq!(retry_delay(&headers, backoff), backoff);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_delay(&headers, backoff), Duration::from_secs(2));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("3600"));
        assert_eq!(retry_delay(&headers, backoff), MAX_RETRY_AFTER);

        // HTTP-date form falls back to the backoff
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(retry_delay(&headers, backoff), backoff);
    }

    #[tokio::test]
    async fn test_max_attempts_counts_total_requests() {
        let (url, hits) = serve(vec![503, 503, 503, 503]).await;
        let result = fast_client(3)
            .post_json_with_retry("test", &url, "key", "{}".into())
            .await;

        let err = result.unwrap_err().to_string();
        assert!(err.contains("503"), "{err}");
        assert!(err.contains("after 3 attempt(s)"), "{err}");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let (url, hits) = serve(vec![429, 200]).await;
        let body = fast_client(3)
            .post_json_with_retry("test", &url, "key", "{}".into())
            .await
            .unwrap();

        assert_eq!(body, "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (url, hits) = serve(vec![400, 200]).await;
        let result = fast_client(3)
            .post_json_with_retry("test", &url, "key", "{}".into())
            .await;

        assert!(result.unwrap_err().to_string().contains("400"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_post_connection_refused() {
        let result = fast_client(1)
            .post_json_with_retry("test", "http://127.0.0.1:1", "key", "{}".into())
            .await;
        assert!(result.is_err());
    }
}
