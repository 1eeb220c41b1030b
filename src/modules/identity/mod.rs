//! Per-account device identity derivation.
//!
//! Seeds every identifier from the account name so a given account presents
//! the same synthetic device on every request, across the whole process
//! lifetime and across restarts.

use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Instagram Android build strings the derived identities draw from.
const USER_AGENTS: &[&str] = &[
    "Instagram 315.0.0.42.97 Android (33/13; 480dpi; 1080x2400; Xiaomi; 2201123G; lisa; qcom; en_US; 560107895)",
    "Instagram 314.0.0.37.120 Android (32/12; 420dpi; 1080x2340; samsung; SM-G998B; p3s; exynos2100; en_US; 558642214)",
    "Instagram 313.1.0.37.104 Android (31/12; 440dpi; 1080x2400; OnePlus; LE2121; OnePlus9Pro; qcom; en_US; 557512458)",
    "Instagram 312.0.0.42.109 Android (33/13; 560dpi; 1440x3200; Xiaomi; M2012K11AG; venus; qcom; en_US; 555841423)",
    "Instagram 311.0.0.41.109 Android (30/11; 480dpi; 1080x2400; OPPO; CPH2207; OP4F2F; qcom; en_US; 554147875)",
];

const ANDROID_ID_HEX_LEN: usize = 16;
const FINGERPRINT_HEX_LEN: usize = 20;

/// Stable synthetic device profile for one account.
///
/// Every field is a pure function of the account key; two calls with the same
/// key produce bit-identical identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub account_key: String,
    pub device_id: Uuid,
    pub android_id: String,
    pub fingerprint_id: String,
    pub user_agent: &'static str,
}

impl DeviceIdentity {
    fn derive(account_key: &str) -> Self {
        let seed = Sha256::digest(account_key.as_bytes());

        // The UUID keeps the seed prefix verbatim; no version bits are forced.
        let mut raw = [0u8; 16];
        raw.copy_from_slice(&seed[..16]);
        let device_id = Uuid::from_bytes(raw);
        let device_hex = device_id.to_string();

        let android_digest = Sha256::digest(device_hex.as_bytes());
        let android_id = format!(
            "android-{}",
            &hex_string(&android_digest)[..ANDROID_ID_HEX_LEN]
        );

        let fingerprint_digest = Sha512::digest(device_hex.as_bytes());
        let fingerprint_id = hex_string(&fingerprint_digest)[..FINGERPRINT_HEX_LEN].to_string();

        let mut index_bytes = [0u8; 8];
        index_bytes.copy_from_slice(&seed[..8]);
        let ua_index = (u64::from_be_bytes(index_bytes) % USER_AGENTS.len() as u64) as usize;

        Self {
            account_key: account_key.to_string(),
            device_id,
            android_id,
            fingerprint_id,
            user_agent: USER_AGENTS[ua_index],
        }
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Process-wide identity cache keyed by account name.
///
/// Entries are only ever added, never evicted; concurrent lookups need no
/// coordination beyond the insert-if-absent write path.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    cache: RwLock<HashMap<String, DeviceIdentity>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the identity for `account_key`, deriving and caching it on
    /// first use.
    pub fn identity_for(&self, account_key: &str) -> DeviceIdentity {
        if let Some(found) = self
            .cache
            .read()
            .ok()
            .and_then(|map| map.get(account_key).cloned())
        {
            return found;
        }

        let mut guard = self.cache.write().expect("identity lock poisoned");
        guard
            .entry(account_key.to_string())
            .or_insert_with(|| DeviceIdentity::derive(account_key))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.cache.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
