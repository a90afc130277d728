//! Session and transport layer for the QSEoW services.
//!
//! Holds the REST transport used by the Repository client: authenticated
//! request building (mutual TLS or bearer token), the paired `Xrfkey`
//! query parameter and header, and a retrying send loop with exponential
//! backoff that honors `Retry-After` on 429 responses.
//!
//! The engine websocket session lives in [`engine`]; it consumes a pluggable
//! transport rather than bundling a websocket client.

pub mod engine;

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Certificate, Identity, Method, StatusCode};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{ConnectionConfig, Credentials};
use crate::errors::TransportError;

/// Statuses that are worth retrying for idempotent requests
const RETRIABLE_STATUSES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

/// First backoff step
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Backoff ceiling
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Retries after the first attempt
const MAX_RETRIES: u32 = 4;

/// User header sent with certificate authentication
const REPOSITORY_USER: &str = "UserDirectory=INTERNAL; UserId=sa_repository";

/// Cooperative cancellation signal shared between the CLI driver and
/// long-running operations. Cancellation aborts remaining work items but
/// never rolls back completed ones.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Whether a request may be replayed after an application-level failure.
///
/// Task and event creation is non-idempotent: it is retried only on
/// connection-level failures, never on a status the server actually
/// produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    Idempotent,
    NonIdempotent,
}

/// Request payload shapes the transport knows how to send
#[derive(Debug, Clone)]
pub enum RequestBody {
    None,
    Json(serde_json::Value),
    /// Raw bytes with an explicit content type (QVF upload)
    Binary {
        content_type: &'static str,
        data: Vec<u8>,
    },
}

/// Raw response surfaced to the caller; JSON decoding is the caller's
/// responsibility.
#[derive(Debug)]
pub struct RestResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RestResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Generate a 16-character alphanumeric xrfkey
pub fn generate_xrfkey() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

/// Classify a status for the retry loop
pub fn is_retriable_status(status: u16) -> bool {
    RETRIABLE_STATUSES.contains(&status)
}

/// Backoff before retry number `attempt` (0-based): exponential from 500 ms,
/// capped at 30 s, never below `floor` (the `Retry-After` value when a 429
/// carried one).
pub fn backoff_delay(attempt: u32, floor: Option<Duration>) -> Duration {
    let exp = BACKOFF_BASE.saturating_mul(2u32.saturating_pow(attempt));
    let delay = exp.min(BACKOFF_CAP);
    match floor {
        Some(floor) => delay.max(floor).min(BACKOFF_CAP.max(floor)),
        None => delay,
    }
}

/// Authenticated, rate-limit-aware REST transport against the Repository
pub struct RestClient {
    http: reqwest::Client,
    config: ConnectionConfig,
    cancel: CancelFlag,
}

impl RestClient {
    /// Build the underlying HTTP client from the connection configuration.
    /// Certificate credentials become a TLS identity plus a root CA;
    /// `secure=false` disables server certificate verification.
    pub fn new(config: ConnectionConfig, cancel: CancelFlag) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.request_timeout);

        if config.danger_accept_invalid_certs() {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Credentials::Certificate { cert, key, root } = &config.credentials {
            let mut pem = fs::read(cert)
                .map_err(|e| TransportError::Tls(format!("{}: {}", cert.display(), e)))?;
            pem.extend(
                fs::read(key)
                    .map_err(|e| TransportError::Tls(format!("{}: {}", key.display(), e)))?,
            );
            let identity = Identity::from_pem(&pem)
                .map_err(|e| TransportError::Tls(format!("client identity: {}", e)))?;
            let root_pem = fs::read(root)
                .map_err(|e| TransportError::Tls(format!("{}: {}", root.display(), e)))?;
            let ca = Certificate::from_pem(&root_pem)
                .map_err(|e| TransportError::Tls(format!("root certificate: {}", e)))?;
            builder = builder.identity(identity).add_root_certificate(ca);
        }

        let http = builder.build().map_err(TransportError::ClientBuild)?;
        Ok(Self {
            http,
            config,
            cancel,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Issue a request against a `/qrs/...` path. The xrfkey pair is always
    /// appended; retries follow the idempotency category.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: RequestBody,
        idempotency: Idempotency,
    ) -> Result<RestResponse, TransportError> {
        let url = format!("{}{}", self.config.qrs_base_url(), path);
        let xrfkey = generate_xrfkey();

        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_canceled() {
                return Err(TransportError::Canceled);
            }

            let mut req = self
                .http
                .request(method.clone(), &url)
                .query(query)
                .query(&[("xrfkey", xrfkey.as_str())])
                .header("X-Qlik-Xrfkey", &xrfkey);

            req = match &self.config.credentials {
                Credentials::Certificate { .. } => req.header("X-Qlik-User", REPOSITORY_USER),
                Credentials::Bearer(token) => req.bearer_auth(token),
            };

            req = match &body {
                RequestBody::None => req,
                RequestBody::Json(value) => req.json(value),
                RequestBody::Binary { content_type, data } => req
                    .header(reqwest::header::CONTENT_TYPE, *content_type)
                    .body(data.clone()),
            };

            match req.send().await {
                Err(e) => {
                    // Connection-level failures are retried regardless of
                    // idempotency; the request never reached the server.
                    if attempt < MAX_RETRIES && (e.is_connect() || e.is_timeout()) {
                        let delay = backoff_delay(attempt, None);
                        warn!(
                            "Request to {} failed ({}), retrying in {:?}",
                            url, e, delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(TransportError::Connect {
                        url,
                        attempts: attempt + 1,
                        source: e,
                    });
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if is_retriable_status(status)
                        && idempotency == Idempotency::Idempotent
                        && attempt < MAX_RETRIES
                    {
                        let floor = retry_after(resp.headers(), resp.status());
                        let delay = backoff_delay(attempt, floor);
                        warn!("{} returned {}, retrying in {:?}", url, status, delay);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    if is_retriable_status(status)
                        && idempotency == Idempotency::Idempotent
                        && attempt >= MAX_RETRIES
                    {
                        return Err(TransportError::RetriesExhausted {
                            url,
                            status,
                            attempts: attempt + 1,
                        });
                    }
                    let headers = resp.headers().clone();
                    let bytes = resp.bytes().await.map_err(|e| TransportError::Connect {
                        url: url.clone(),
                        attempts: attempt + 1,
                        source: e,
                    })?;
                    debug!("{} {} -> {} ({} bytes)", method, url, status, bytes.len());
                    return Ok(RestResponse {
                        status,
                        headers,
                        body: bytes.to_vec(),
                    });
                }
            }
        }
    }
}

/// Raised backoff floor from a 429's `Retry-After` header, in whole seconds
fn retry_after(headers: &HeaderMap, status: StatusCode) -> Option<Duration> {
    if status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xrfkey_is_16_alphanumeric() {
        let key = generate_xrfkey();
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_xrfkeys_differ_between_calls() {
        assert_ne!(generate_xrfkey(), generate_xrfkey());
    }

    #[test]
    fn test_retriable_statuses() {
        for status in [408, 425, 429, 500, 502, 503, 504] {
            assert!(is_retriable_status(status), "{} should retry", status);
        }
        for status in [200, 201, 204, 400, 401, 403, 404, 409] {
            assert!(!is_retriable_status(status), "{} should not retry", status);
        }
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        assert_eq!(backoff_delay(0, None), Duration::from_millis(500));
        assert_eq!(backoff_delay(1, None), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2, None), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3, None), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_delay(10, None), Duration::from_secs(30));
        assert_eq!(backoff_delay(31, None), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_is_monotonic() {
        let mut last = Duration::ZERO;
        for attempt in 0..12 {
            let delay = backoff_delay(attempt, None);
            assert!(delay >= last);
            last = delay;
        }
    }

    #[test]
    fn test_retry_after_raises_floor() {
        let floor = Some(Duration::from_secs(10));
        assert_eq!(backoff_delay(0, floor), Duration::from_secs(10));
        assert_eq!(backoff_delay(1, floor), Duration::from_secs(10));
        // Exponential growth overtakes the floor eventually
        assert_eq!(backoff_delay(6, floor), Duration::from_secs(30));
    }

    #[test]
    fn test_cancel_flag_roundtrip() {
        let flag = CancelFlag::new();
        assert!(!flag.is_canceled());
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_canceled());
    }
}
