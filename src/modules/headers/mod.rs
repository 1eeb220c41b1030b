//! Outbound request header assembly.
//!
//! Combines the stable per-account device identity with call-scoped
//! measurement noise and the current session credential. Header insertion
//! order is a fixed constant of the implementation and is reproduced
//! identically on every call; order itself is part of the fingerprint.

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::identity::DeviceIdentity;

/// Application identifier reported by the Android build.
pub const APP_ID: &str = "936619743392459";

const BLOKS_VERSION_HEX_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum HeaderSetError {
    #[error("invalid header value for {0}")]
    InvalidValue(&'static str),
}

/// Ordered header list for one outbound request.
///
/// Stable fields come from the [`DeviceIdentity`]; bandwidth figures and the
/// cache-busting value are drawn fresh per call within realistic bounds.
#[derive(Debug, Clone)]
pub struct RequestHeaderSet {
    entries: Vec<(&'static str, String)>,
}

impl RequestHeaderSet {
    /// Builds the full header set for one call against the profile endpoint.
    pub fn build(identity: &DeviceIdentity, session_credential: &str) -> Self {
        // The build token tracks an app build, not a timestamp; it must stay
        // identical across calls for a given device.
        let bloks_digest = Sha256::digest(identity.device_id.to_string().as_bytes());
        let bloks_version: String = bloks_digest
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>()[..BLOKS_VERSION_HEX_LEN]
            .to_string();

        let mut rng = rand::thread_rng();
        let conn_speed: u32 = rng.gen_range(1000..=3000);
        let bw_speed_kbps: f64 = rng.gen_range(2000.0..5000.0);
        let bw_total_bytes: u64 = rng.gen_range(5_000_000..=10_000_000);
        let bw_total_ms: u32 = rng.gen_range(200..=500);
        let cache_bust: u32 = rng.gen_range(1000..=9999);

        let mut set = Self {
            entries: Vec::with_capacity(25),
        };
        set.push("User-Agent", identity.user_agent);
        set.push("X-IG-App-ID", APP_ID);
        set.push("X-IG-Device-ID", identity.device_id.to_string());
        set.push("X-IG-Android-ID", identity.android_id.clone());
        set.push("X-IG-App-Locale", "en_US");
        set.push("X-IG-Device-Locale", "en_US");
        set.push("X-IG-Mapped-Locale", "en_US");
        set.push("X-IG-Connection-Type", "WIFI");
        set.push("X-IG-Capabilities", "3brTv10=");
        set.push("X-IG-App-Startup-Country", "US");
        set.push("X-Bloks-Version-Id", bloks_version);
        set.push("X-IG-WWW-Claim", "0");
        set.push("X-Bloks-Is-Layout-RTL", "false");
        set.push("X-IG-Connection-Speed", format!("{conn_speed}kbps"));
        set.push("X-IG-Bandwidth-Speed-KBPS", format!("{bw_speed_kbps:.3}"));
        set.push("X-IG-Bandwidth-TotalBytes-B", bw_total_bytes.to_string());
        set.push("X-IG-Bandwidth-TotalTime-MS", bw_total_ms.to_string());
        set.push("X-IG-EU-DC-ENABLED", "true");
        set.push(
            "X-IG-Extended-CDN-Thumbnail-Cache-Busting-Value",
            cache_bust.to_string(),
        );
        set.push("X-Mid", identity.fingerprint_id.clone());
        set.push("Accept-Language", "en-US");
        set.push("Accept-Encoding", "gzip, deflate");
        set.push("Accept", "*/*");
        set.push("Connection", "keep-alive");
        set.push("Cookie", format!("sessionid={session_credential}"));
        set
    }

    fn push(&mut self, name: &'static str, value: impl Into<String>) {
        self.entries.push((name, value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(entry, _)| entry.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Converts the ordered set into a reqwest header map, preserving the
    /// insertion sequence.
    pub fn to_header_map(&self) -> Result<HeaderMap, HeaderSetError> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HeaderSetError::InvalidValue(name))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| HeaderSetError::InvalidValue(name))?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }
}
