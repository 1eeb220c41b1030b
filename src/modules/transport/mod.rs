//! Pooled HTTP transports keyed by impersonation profile.
//!
//! One reusable client per spoofed-browser target keeps TLS session caches
//! and connection pools disjoint, so consecutive retry attempts never resume
//! a prior attempt's TLS session.

use rand::seq::SliceRandom;
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

/// Named browser handshake targets, in fixed rotation order.
///
/// Retry attempt N always maps to `ALL[N % ALL.len()]`, so no two consecutive
/// attempts share a transport fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImpersonationProfile {
    Chrome110,
    Chrome107,
    Chrome104,
    Chrome101,
    Chrome100,
    Chrome99,
}

impl ImpersonationProfile {
    pub const ALL: [ImpersonationProfile; 6] = [
        ImpersonationProfile::Chrome110,
        ImpersonationProfile::Chrome107,
        ImpersonationProfile::Chrome104,
        ImpersonationProfile::Chrome101,
        ImpersonationProfile::Chrome100,
        ImpersonationProfile::Chrome99,
    ];

    /// Deterministic profile for a given retry attempt.
    pub fn for_attempt(attempt: u32) -> Self {
        Self::ALL[attempt as usize % Self::ALL.len()]
    }

    /// Uniform random choice, used for requests that must not correlate with
    /// the polling rotation.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self::ALL.choose(&mut rng).copied().unwrap_or(Self::ALL[0])
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImpersonationProfile::Chrome110 => "chrome110",
            ImpersonationProfile::Chrome107 => "chrome107",
            ImpersonationProfile::Chrome104 => "chrome104",
            ImpersonationProfile::Chrome101 => "chrome101",
            ImpersonationProfile::Chrome100 => "chrome100",
            ImpersonationProfile::Chrome99 => "chrome99",
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Lazily-built client pool, one handle per (profile, route) pair.
pub struct TransportPool {
    proxy_url: Option<String>,
    clients: Mutex<HashMap<(ImpersonationProfile, bool), Client>>,
}

impl TransportPool {
    pub fn new(proxy_url: Option<String>) -> Self {
        Self {
            proxy_url,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the pooled client for `profile`, building it on first use.
    ///
    /// `via_proxy` routes through the configured forward proxy. Certificate
    /// verification is relaxed only on the proxied route, where a local MITM
    /// proxy presents a substitute certificate.
    pub async fn handle_for(
        &self,
        profile: ImpersonationProfile,
        via_proxy: bool,
    ) -> Result<Client, TransportError> {
        let routed = via_proxy && self.proxy_url.is_some();
        let key = (profile, routed);

        let mut guard = self.clients.lock().await;
        if let Some(client) = guard.get(&key) {
            return Ok(client.clone());
        }

        // Automatic cookie storage stays off: the Cookie header is injected
        // per call and the header set must remain exactly as built.
        let mut builder = Client::builder()
            .cookie_store(false)
            .danger_accept_invalid_certs(routed);

        if routed
            && let Some(endpoint) = self.proxy_url.as_deref()
        {
            builder = builder.proxy(Proxy::all(endpoint)?);
        }

        let client = builder.build()?;
        guard.insert(key, client.clone());
        log::debug!(
            "transport handle created: {} ({})",
            profile.label(),
            if routed { "proxied" } else { "direct" }
        );
        Ok(client)
    }

    /// Drops every cached handle, releasing its pooled connections. Safe to
    /// call when nothing was ever created, and idempotent.
    pub async fn close_all(&self) {
        let mut guard = self.clients.lock().await;
        let released = guard.len();
        guard.clear();
        if released > 0 {
            log::info!("transport pool closed ({released} handles released)");
        }
    }

    pub async fn cached_handles(&self) -> usize {
        self.clients.lock().await.len()
    }
}
