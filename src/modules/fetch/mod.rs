//! Profile fetch state machine with credential and transport rotation.
//!
//! One logical "fetch profile" call covers backoff, human pacing, bounded
//! retries, session-credential rotation on rate/auth errors, and a different
//! impersonation profile per attempt. The retry machinery is an explicit loop
//! with a local attempt counter; every path terminates within
//! `max_retries + 1` attempts.

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use url::Url;

use crate::config::MonitorConfig;
use crate::external_deps::session::SessionProvider;

use super::headers::{HeaderSetError, RequestHeaderSet};
use super::identity::IdentityRegistry;
use super::profile::{ProfileEnvelope, UserRecord};
use super::transport::{ImpersonationProfile, TransportError, TransportPool};

/// Profile-lookup endpoint consumed by the poller.
pub const PROFILE_ENDPOINT: &str = "https://i.instagram.com/api/v1/users/web_profile_info/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const IMAGE_TIMEOUT: Duration = Duration::from_secs(20);
const BACKOFF_CAP_SECS: u64 = 300;
const BACKOFF_BASE_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("header assembly failed: {0}")]
    Header(#[from] HeaderSetError),
    #[error("url construction failed: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),
}

/// Result of one logical fetch. Both fields absent signals total failure
/// (network trouble or exhausted retries); a status without payload means the
/// account is not recovered yet.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub status: Option<u16>,
    pub payload: Option<ProfileEnvelope>,
}

impl FetchOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn status_only(status: u16) -> Self {
        Self {
            status: Some(status),
            payload: None,
        }
    }

    /// The recovered user record, when the poll found one.
    pub fn user(&self) -> Option<&UserRecord> {
        self.payload.as_ref().and_then(|envelope| envelope.user())
    }
}

/// Async seam between the scheduler and the network layer.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn fetch_profile(&self, username: &str) -> FetchOutcome;
    async fn download_image(&self, url: &str, account_label: &str) -> Option<Bytes>;
}

/// Reqwest-backed fetch controller.
pub struct ProfileFetcher {
    identities: IdentityRegistry,
    transports: TransportPool,
    sessions: Arc<dyn SessionProvider>,
    proxy_url: Option<String>,
    max_retries: u32,
}

impl ProfileFetcher {
    pub fn new(config: &MonitorConfig, sessions: Arc<dyn SessionProvider>) -> Self {
        Self {
            identities: IdentityRegistry::new(),
            transports: TransportPool::new(config.proxy_url.clone()),
            sessions,
            proxy_url: config.proxy_url.clone(),
            max_retries: config.max_retries,
        }
    }

    /// Runs the full fetch state machine for one account.
    pub async fn fetch_profile_with_retries(
        &self,
        username: &str,
        max_retries: u32,
    ) -> FetchOutcome {
        let mut retry_count = 0u32;
        loop {
            log::debug!("[@{username}] fetch attempt (retry {retry_count}/{max_retries})");

            if retry_count > 0 {
                let delay = backoff_delay(retry_count);
                log::info!(
                    "[@{username}] retry {retry_count}/{max_retries} after {:.1}s",
                    delay.as_secs_f64()
                );
                sleep(delay).await;
            }

            // Pre-request pause on every attempt, retry or not.
            sleep(pacing_delay()).await;

            if self.proxy_url.is_none() {
                log::error!("[@{username}] no forward proxy configured, refusing to poll");
                return FetchOutcome::empty();
            }

            let response = match self.attempt(username, retry_count).await {
                Ok(response) => response,
                Err(err) => {
                    log::error!("[@{username}] request failed: {err}");
                    if retry_count < max_retries {
                        retry_count += 1;
                        continue;
                    }
                    return FetchOutcome::empty();
                }
            };

            let status = response.status().as_u16();
            log::info!("[@{username}] profile endpoint answered HTTP {status}");

            match status {
                200 => {
                    return match response.text().await {
                        Ok(body) => outcome_from_body(username, status, &body),
                        Err(err) => {
                            log::error!("[@{username}] body read failed: {err}");
                            FetchOutcome::status_only(status)
                        }
                    };
                }
                404 => {
                    log::info!("[@{username}] account not found or suspended (404)");
                    return FetchOutcome::status_only(status);
                }
                429 => {
                    log::warn!("[@{username}] rate limited, rotating session credential");
                    self.sessions.rotate_credential();
                    if retry_count < max_retries {
                        retry_count += 1;
                        continue;
                    }
                    return FetchOutcome::status_only(status);
                }
                400 | 401 => {
                    log::warn!(
                        "[@{username}] authentication rejected ({status}), rotating session credential"
                    );
                    self.sessions.rotate_credential();
                    if retry_count < max_retries {
                        sleep(auth_pause()).await;
                        retry_count += 1;
                        continue;
                    }
                    return FetchOutcome::status_only(status);
                }
                _ => {
                    log::warn!("[@{username}] unexpected status {status}");
                    if retry_count < max_retries {
                        retry_count += 1;
                        continue;
                    }
                    return FetchOutcome::status_only(status);
                }
            }
        }
    }

    async fn attempt(
        &self,
        username: &str,
        retry_count: u32,
    ) -> Result<reqwest::Response, FetchError> {
        let credential = self.sessions.current_credential();
        let identity = self.identities.identity_for(username);
        let headers = RequestHeaderSet::build(&identity, &credential);

        // A different transport fingerprint on every retry.
        let profile = ImpersonationProfile::for_attempt(retry_count);
        log::debug!("[@{username}] transport impersonation: {}", profile.label());

        let client = self.transports.handle_for(profile, true).await?;
        let url = Url::parse_with_params(PROFILE_ENDPOINT, &[("username", username)])?;

        let response = client
            .get(url)
            .headers(headers.to_header_map()?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        Ok(response)
    }

    /// Fetches raw image bytes: one direct attempt, then one proxied attempt
    /// after a fixed pause. The impersonation profile is chosen at random so
    /// image fetches never correlate with the polling rotation.
    pub async fn fetch_image(&self, url: &str, account_label: &str) -> Option<Bytes> {
        let profile = ImpersonationProfile::random();
        log::debug!(
            "[@{account_label}] image fetch via {} (direct)",
            profile.label()
        );

        match self.image_request(profile, false, url).await {
            Ok(bytes) => {
                log::info!("[@{account_label}] image downloaded ({} bytes)", bytes.len());
                return Some(bytes);
            }
            Err(err) => log::warn!("[@{account_label}] direct image fetch failed: {err}"),
        }

        if self.proxy_url.is_none() {
            log::error!("[@{account_label}] image fetch failed and no proxy to fall back to");
            return None;
        }

        sleep(Duration::from_secs(1)).await;
        log::debug!("[@{account_label}] retrying image fetch through proxy");
        match self.image_request(profile, true, url).await {
            Ok(bytes) => {
                log::info!(
                    "[@{account_label}] image downloaded via proxy ({} bytes)",
                    bytes.len()
                );
                Some(bytes)
            }
            Err(err) => {
                log::error!("[@{account_label}] image fetch failed after both attempts: {err}");
                None
            }
        }
    }

    async fn image_request(
        &self,
        profile: ImpersonationProfile,
        via_proxy: bool,
        url: &str,
    ) -> Result<Bytes, FetchError> {
        let client = self.transports.handle_for(profile, via_proxy).await?;
        let response = client.get(url).timeout(IMAGE_TIMEOUT).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::UnexpectedStatus(status));
        }
        Ok(response.bytes().await?)
    }

    /// Releases every pooled transport handle.
    pub async fn close(&self) {
        self.transports.close_all().await;
    }
}

#[async_trait]
impl ProfileApi for ProfileFetcher {
    async fn fetch_profile(&self, username: &str) -> FetchOutcome {
        self.fetch_profile_with_retries(username, self.max_retries)
            .await
    }

    async fn download_image(&self, url: &str, account_label: &str) -> Option<Bytes> {
        self.fetch_image(url, account_label).await
    }
}

/// Classifies a 200 response body against the requested username.
fn outcome_from_body(username: &str, status: u16, body: &str) -> FetchOutcome {
    let envelope: ProfileEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(err) => {
            log::error!("[@{username}] payload decode failed: {err}");
            return FetchOutcome::status_only(status);
        }
    };

    let username_matches = envelope
        .user()
        .map(|user| user.username.eq_ignore_ascii_case(username));

    match username_matches {
        Some(true) => {
            log::info!("[@{username}] account is active");
            FetchOutcome {
                status: Some(status),
                payload: Some(envelope),
            }
        }
        Some(false) => {
            let reported = envelope
                .user()
                .map(|user| user.username.clone())
                .unwrap_or_default();
            log::warn!(
                "[@{username}] payload reports '{reported}', possible ban redirect"
            );
            FetchOutcome::status_only(status)
        }
        None => {
            log::info!("[@{username}] no user record yet");
            FetchOutcome::status_only(status)
        }
    }
}

/// Exponential backoff with full jitter. The base is capped; the jitter is
/// added on top of the cap, matching the behaviour this poller was tuned on.
fn backoff_delay(retry_count: u32) -> Duration {
    let base = (BACKOFF_BASE_SECS * 2u64.saturating_pow(retry_count)).min(BACKOFF_CAP_SECS);
    let jitter: f64 = rand::thread_rng().gen_range(10.0..30.0);
    Duration::from_secs_f64(base as f64 + jitter)
}

fn pacing_delay() -> Duration {
    Duration::from_secs_f64(rand::thread_rng().gen_range(2.0..5.0))
}

fn auth_pause() -> Duration {
    Duration::from_secs_f64(rand::thread_rng().gen_range(1.0..5.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_body(username: &str) -> String {
        format!(
            r#"{{"data": {{"user": {{"username": "{username}", "edge_followed_by": {{"count": 9000}}}}}}}}"#
        )
    }

    #[test]
    fn matching_username_yields_payload() {
        let outcome = outcome_from_body("someone", 200, &active_body("someone"));
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.user().map(|u| u.followers()), Some(9000));
    }

    #[test]
    fn username_match_is_case_insensitive() {
        let outcome = outcome_from_body("SomeOne", 200, &active_body("someone"));
        assert!(outcome.user().is_some());
    }

    #[test]
    fn mismatched_username_yields_status_only() {
        let outcome = outcome_from_body("someone", 200, &active_body("someone_else"));
        assert_eq!(outcome.status, Some(200));
        assert!(outcome.payload.is_none());
    }

    #[test]
    fn missing_user_record_yields_status_only() {
        let outcome = outcome_from_body("someone", 200, r#"{"data": {}}"#);
        assert_eq!(outcome.status, Some(200));
        assert!(outcome.payload.is_none());
    }

    #[test]
    fn undecodable_body_yields_status_only() {
        let outcome = outcome_from_body("someone", 200, "<html>rate limit page</html>");
        assert_eq!(outcome.status, Some(200));
        assert!(outcome.payload.is_none());
    }

    #[test]
    fn backoff_grows_exponentially_then_caps() {
        for _ in 0..16 {
            let first = backoff_delay(1).as_secs_f64();
            assert!((70.0..90.0).contains(&first), "retry 1 gave {first}");

            let second = backoff_delay(2).as_secs_f64();
            assert!((130.0..150.0).contains(&second), "retry 2 gave {second}");

            let third = backoff_delay(3).as_secs_f64();
            assert!((250.0..270.0).contains(&third), "retry 3 gave {third}");

            // The base caps while the jitter still applies on top.
            let deep = backoff_delay(6).as_secs_f64();
            assert!((310.0..330.0).contains(&deep), "retry 6 gave {deep}");
        }
    }

    #[test]
    fn pacing_and_auth_pauses_stay_in_bounds() {
        for _ in 0..16 {
            let pace = pacing_delay().as_secs_f64();
            assert!((2.0..5.0).contains(&pace));
            let pause = auth_pause().as_secs_f64();
            assert!((1.0..5.0).contains(&pause));
        }
    }

    struct StaticSessions;

    impl SessionProvider for StaticSessions {
        fn current_credential(&self) -> String {
            "session".into()
        }

        fn rotate_credential(&self) {}
    }

    #[tokio::test]
    async fn missing_proxy_fails_fast_without_retrying() {
        let config = MonitorConfig::default();
        let fetcher = ProfileFetcher::new(&config, Arc::new(StaticSessions));

        let started = std::time::Instant::now();
        let outcome = fetcher.fetch_profile_with_retries("someone", 3).await;
        assert!(outcome.status.is_none());
        assert!(outcome.payload.is_none());
        // A single pacing pause, no backoff rounds: well under one retry's
        // worth of delay.
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(fetcher.transports.cached_handles().await, 0);
    }
}
