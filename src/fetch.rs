//!
//! src/fetch.rs  Oct 16th, 2026
//!
//! Shared http plumbing for the catalog clients: client construction
//! from HttpConfig and GET requests with retry and backoff. Writes go
//! through `send_once` and are never retried.
//!

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::SmallRng};
use reqwest::{Client, RequestBuilder, Response, StatusCode, header, redirect};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::warn;

use crate::config::{HttpConfig, RetryConfig};
use crate::errors::MigrateError;

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn client_with_headers(http: &HttpConfig, mut headers: header::HeaderMap) ->
    Result<Client, MigrateError> {
    headers
        .entry(header::ACCEPT)
        .or_insert(header::HeaderValue::from_static("application/json"));
    client_helper(http)
        .default_headers(headers)
        .user_agent(concat!("playlist-migrator/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| MigrateError::Http(format!("build client: {e}")))
}

pub fn header_value(value: &str) -> Result<header::HeaderValue, MigrateError> {
    header::HeaderValue::from_str(value)
        .map_err(|e| MigrateError::Config(format!("invalid header value: {e}")))
}

/// Simple function to generate random wait for get_with_retry
fn generate_backoff(base: Duration, attempt: u8, rng: &mut SmallRng) -> Duration {
    let exp = base * (1_u32 << attempt.min(6));
    let jitter = rng.gen_range(0..=base.as_millis() as u64 / 2);
    exp + Duration::from_millis(jitter)
}

/// Turns a non-success response into an error, 401/403 as Auth
async fn status_error(resp: Response) -> MigrateError {
    let status = resp.status();
    let url = resp.url().path().to_string();
    let body = resp.text().await.unwrap_or_default();
    let body: String = body.chars().take(200).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            MigrateError::Auth(format!("{status} for {url}"))
        }
        _ => MigrateError::Http(format!("{status} for {url}: {body}")),
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, MigrateError> {
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// GET with retry on transport errors and retryable statuses
pub async fn get_with_retry<T: DeserializeOwned>(
    request: RequestBuilder,
    retry: &RetryConfig,
) -> Result<T, MigrateError> {
    let mut rng = SmallRng::from_entropy();
    let mut attempt = 0_u8;
    loop {
        let response = request
            .try_clone()
            .ok_or_else(|| MigrateError::Http("non-cloneable request".to_string()))?
            .send()
            .await;
        match response {
            Ok(resp) if resp.status().is_success() => return decode(resp).await,
            Ok(resp) => {
                let status = resp.status();
                let retryable = retry.retryable_statuses.contains(&status.as_u16());
                if !retryable || attempt + 1 >= retry.max_attempts {
                    return Err(status_error(resp).await);
                }
                let backoff = generate_backoff(retry.base_backoff, attempt, &mut rng);
                warn!(status = %status, backoff = ?backoff.as_millis(), "http.retry");
                sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt + 1 >= retry.max_attempts {
                    return Err(e.into());
                }
                let backoff = generate_backoff(retry.base_backoff, attempt, &mut rng);
                warn!(error = %e, backoff = ?backoff.as_millis(), "http.retry.error");
                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

/// Single attempt, for requests that change server state
pub async fn send_once(request: RequestBuilder) -> Result<Response, MigrateError> {
    let resp = request.send().await?;
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(status_error(resp).await)
    }
}

pub async fn send_once_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, MigrateError> {
    decode(send_once(request).await?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            retryable_statuses: vec![429, 503],
        }
    }

    #[test]
    fn backoff_grows_with_attempts() {
        let mut rng = SmallRng::seed_from_u64(7);
        let base = Duration::from_millis(100);
        let first = generate_backoff(base, 0, &mut rng);
        let third = generate_backoff(base, 2, &mut rng);
        assert!(first >= base && first <= base + Duration::from_millis(50));
        assert!(third >= base * 4);
    }

    #[tokio::test]
    async fn retryable_status_is_retried_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = client_with_headers(&HttpConfig::default(), header::HeaderMap::new()).unwrap();
        let v: serde_json::Value =
            get_with_retry(client.get(format!("{}/flaky", server.uri())), &fast_retry())
                .await
                .unwrap();
        assert_eq!(v["ok"], true);
    }

    #[tokio::test]
    async fn auth_failures_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/locked"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_headers(&HttpConfig::default(), header::HeaderMap::new()).unwrap();
        let err = get_with_retry::<serde_json::Value>(
            client.get(format!("{}/locked", server.uri())),
            &fast_retry(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MigrateError::Auth(_)));
    }

    #[tokio::test]
    async fn writes_are_sent_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_headers(&HttpConfig::default(), header::HeaderMap::new()).unwrap();
        let err = send_once(client.post(format!("{}/write", server.uri()))).await.unwrap_err();
        assert!(matches!(err, MigrateError::Http(ref m) if m.contains("503")));
    }
}
