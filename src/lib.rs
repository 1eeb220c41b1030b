//! # ig-monitor-rs
//!
//! Evasive polling core for watching suspended Instagram accounts and
//! reporting the moment they come back.
//!
//! Every monitored account runs as its own cooperative task that polls the
//! profile-lookup endpoint at randomised intervals through a forward proxy,
//! presenting a stable synthetic device identity and a rotating transport
//! fingerprint. Chat delivery, screenshot rendering, credential sourcing, and
//! durable storage stay outside the crate behind collaborator traits.
//!
//! ## Features
//!
//! - Deterministic per-account device identities (same account, same "phone")
//! - Fixed-order mobile-app header sets with call-scoped measurement noise
//! - One pooled client per impersonation profile; rotation on every retry
//! - Bounded retry state machine with credential rotation and full jitter
//! - Per-account monitor tasks with exactly-once recovery handling
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ig_monitor_rs::{MemoryStore, MonitorConfig, MonitorService};
//! # use ig_monitor_rs::{ChannelError, LinkButton, NotificationChannel};
//! # struct NullChannel;
//! # #[async_trait::async_trait]
//! # impl NotificationChannel for NullChannel {
//! #     async fn send_message(
//! #         &self,
//! #         _chat_id: i64,
//! #         _text: &str,
//! #         _button: Option<&LinkButton>,
//! #     ) -> Result<(), ChannelError> {
//! #         Ok(())
//! #     }
//! #     async fn send_file(
//! #         &self,
//! #         _chat_id: i64,
//! #         _file: bytes::Bytes,
//! #         _caption: &str,
//! #         _button: Option<&LinkButton>,
//! #     ) -> Result<(), ChannelError> {
//! #         Ok(())
//! #     }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::builder()
//!         .with_proxy_url("http://127.0.0.1:8080")
//!         .with_session_ids(["sessionid-from-pool"])
//!         .build()?;
//!
//!     let store = Arc::new(MemoryStore::new());
//!     store.insert("watched_account", 42);
//!
//!     let service = MonitorService::builder()
//!         .with_config(config)
//!         .with_store(store)
//!         .with_channel(Arc::new(NullChannel))
//!         .build()?;
//!
//!     service.resume_all_monitoring();
//!     Ok(())
//! }
//! ```

mod monitor;

pub mod config;
pub mod external_deps;
pub mod modules;

pub use crate::monitor::{
    compact_number,
    format_elapsed,
    MonitorError,
    MonitorResult,
    MonitorService,
    MonitorServiceBuilder,
};

pub use crate::config::{
    ConfigError,
    MonitorConfig,
    MonitorConfigBuilder,
};

pub use crate::external_deps::{
    ChannelError,
    LinkButton,
    MemoryStore,
    MonitorStore,
    MonitoredAccount,
    NotificationChannel,
    RotatingSessionPool,
    ScreenshotRenderer,
    ScreenshotRequest,
    SessionProvider,
};

pub use crate::modules::{
    DeviceIdentity,
    FetchError,
    FetchOutcome,
    HeaderSetError,
    IdentityRegistry,
    ImpersonationProfile,
    ProfileApi,
    ProfileEnvelope,
    ProfileFetcher,
    RequestHeaderSet,
    TransportError,
    TransportPool,
    UserRecord,
    PROFILE_ENDPOINT,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
