//! High level monitor orchestration.
//!
//! Owns one long-running task per monitored account, decides when a loop
//! stops, and hands each recovered account to the notification path exactly
//! once. Collaborators (store, channel, renderer, session pool) are injected
//! behind traits so the scheduler itself stays transport-agnostic.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::{ConfigError, MonitorConfig};
use crate::external_deps::notify::{ChannelError, LinkButton, NotificationChannel};
use crate::external_deps::screenshot::{ScreenshotRenderer, ScreenshotRequest};
use crate::external_deps::session::{RotatingSessionPool, SessionProvider};
use crate::external_deps::storage::MonitorStore;
use crate::modules::fetch::{ProfileApi, ProfileFetcher};
use crate::modules::profile::{ProfileEnvelope, UserRecord};

/// Result alias used across the orchestration layer.
pub type MonitorResult<T> = Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}

/// One live monitor task as the registry records it.
struct MonitorEntry {
    chat_id: i64,
    started_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

/// Fluent builder for [`MonitorService`].
#[derive(Default)]
pub struct MonitorServiceBuilder {
    config: MonitorConfig,
    sessions: Option<Arc<dyn SessionProvider>>,
    store: Option<Arc<dyn MonitorStore>>,
    channel: Option<Arc<dyn NotificationChannel>>,
    screenshot: Option<Arc<dyn ScreenshotRenderer>>,
    api: Option<Arc<dyn ProfileApi>>,
}

impl MonitorServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_session_provider(mut self, sessions: Arc<dyn SessionProvider>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn MonitorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_screenshot_renderer(mut self, renderer: Arc<dyn ScreenshotRenderer>) -> Self {
        self.screenshot = Some(renderer);
        self
    }

    /// Overrides the network layer; primarily a test seam.
    pub fn with_profile_api(mut self, api: Arc<dyn ProfileApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn build(self) -> MonitorResult<MonitorService> {
        self.config.validate()?;

        let store = self
            .store
            .ok_or(MonitorError::MissingCollaborator("store"))?;
        let channel = self
            .channel
            .ok_or(MonitorError::MissingCollaborator("channel"))?;

        let sessions = self.sessions.unwrap_or_else(|| {
            Arc::new(RotatingSessionPool::new(self.config.session_ids.clone()))
        });

        let mut fetcher = None;
        let api: Arc<dyn ProfileApi> = match self.api {
            Some(api) => api,
            None => {
                let built = Arc::new(ProfileFetcher::new(&self.config, sessions));
                fetcher = Some(built.clone());
                built
            }
        };

        let badge = load_verification_badge(&self.config);

        Ok(MonitorService {
            inner: Arc::new(Inner {
                config: self.config,
                api,
                fetcher,
                store,
                channel,
                screenshot: self.screenshot,
                badge,
                active: Mutex::new(HashMap::new()),
            }),
        })
    }
}

fn load_verification_badge(config: &MonitorConfig) -> Option<Bytes> {
    let path = config.verification_badge_path.as_ref()?;
    match std::fs::read(path) {
        Ok(data) => {
            log::info!("verification badge loaded ({} bytes)", data.len());
            Some(Bytes::from(data))
        }
        Err(err) => {
            log::warn!("verification badge unavailable at {}: {err}", path.display());
            None
        }
    }
}

struct Inner {
    config: MonitorConfig,
    api: Arc<dyn ProfileApi>,
    fetcher: Option<Arc<ProfileFetcher>>,
    store: Arc<dyn MonitorStore>,
    channel: Arc<dyn NotificationChannel>,
    screenshot: Option<Arc<dyn ScreenshotRenderer>>,
    badge: Option<Bytes>,
    active: Mutex<HashMap<String, MonitorEntry>>,
}

/// Per-account monitoring scheduler. Cheap to clone; clones share the task
/// registry and collaborators.
#[derive(Clone)]
pub struct MonitorService {
    inner: Arc<Inner>,
}

impl MonitorService {
    pub fn builder() -> MonitorServiceBuilder {
        MonitorServiceBuilder::new()
    }

    /// Launches the monitor task for one account and records it. An existing
    /// task for the same account is replaced, never duplicated.
    pub fn start_monitoring(&self, username: &str, chat_id: i64) {
        let mut guard = self.inner.active.lock().expect("registry lock poisoned");

        let service = self.clone();
        let name = username.to_string();
        let handle = tokio::spawn(async move {
            service.monitor_account(name, chat_id).await;
        });

        let entry = MonitorEntry {
            chat_id,
            started_at: Utc::now(),
            handle,
        };
        if let Some(previous) = guard.insert(username.to_string(), entry) {
            previous.handle.abort();
            log::warn!("[@{username}] previous monitor task replaced");
        }
        log::info!("[@{username}] monitor task created");
    }

    /// Removes the account from the store and cancels its task.
    pub fn stop_monitoring(&self, username: &str) {
        self.inner.store.remove_account(username);
        let removed = self
            .inner
            .active
            .lock()
            .expect("registry lock poisoned")
            .remove(username);
        if let Some(entry) = removed {
            entry.handle.abort();
            log::info!("[@{username}] monitor task cancelled");
        }
    }

    /// Cancels every task. The store is cleared only when `clear_store` is
    /// set; a plain shutdown keeps its entries so a later
    /// [`resume_all_monitoring`](Self::resume_all_monitoring) can rehydrate.
    pub fn stop_all_monitoring(&self, clear_store: bool) {
        let drained: Vec<(String, MonitorEntry)> = self
            .inner
            .active
            .lock()
            .expect("registry lock poisoned")
            .drain()
            .collect();
        for (username, entry) in drained {
            entry.handle.abort();
            log::info!("[@{username}] monitor task cancelled");
        }

        if clear_store {
            self.inner.store.clear_all();
            log::info!("stopped all monitoring tasks and cleared the store");
        } else {
            log::info!("stopped all monitoring tasks (store entries preserved)");
        }
    }

    /// Re-launches a task for every account the store still lists; used on
    /// startup to pick up monitors that survived a restart.
    pub fn resume_all_monitoring(&self) {
        let accounts = self.inner.store.all_accounts();
        let count = accounts.len();
        for (username, account) in accounts {
            self.start_monitoring(&username, account.chat_id);
        }
        if count > 0 {
            log::info!("resumed monitoring for {count} accounts");
        }
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// When the account was put under watch, if it currently is.
    pub fn monitoring_since(&self, username: &str) -> Option<DateTime<Utc>> {
        self.inner
            .active
            .lock()
            .ok()
            .and_then(|map| map.get(username).map(|entry| entry.started_at))
    }

    /// Chat destination a recovery for this account would be reported to.
    pub fn chat_destination(&self, username: &str) -> Option<i64> {
        self.inner
            .active
            .lock()
            .ok()
            .and_then(|map| map.get(username).map(|entry| entry.chat_id))
    }

    /// Stops every task and releases pooled transports.
    pub async fn shutdown(&self, clear_store: bool) {
        self.stop_all_monitoring(clear_store);
        if let Some(fetcher) = &self.inner.fetcher {
            fetcher.close().await;
        }
    }

    async fn monitor_account(&self, username: String, chat_id: i64) {
        let started = Instant::now();
        let mut check_count = 0u64;
        log::info!("[@{username}] started monitoring for chat {chat_id}");

        while self.inner.store.is_monitoring(&username) {
            check_count += 1;
            // A fresh interval each round; a fixed period would hand the
            // remote side a clean polling signature.
            let interval = {
                let mut rng = rand::thread_rng();
                rng.gen_range(
                    self.inner.config.min_check_interval..=self.inner.config.max_check_interval,
                )
            };

            log::info!("[@{username}] check #{check_count}");
            let outcome = self.inner.api.fetch_profile(&username).await;

            if let Some(envelope) = outcome.payload.as_ref()
                && envelope.user().is_some()
            {
                log::info!("[@{username}] account recovered");
                self.handle_recovery(&username, envelope, chat_id, started)
                    .await;
                return;
            }

            log::info!("[@{username}] next check in {interval}s");
            sleep(Duration::from_secs(interval)).await;
        }

        log::info!("[@{username}] monitoring stopped");
        if let Ok(mut guard) = self.inner.active.lock() {
            guard.remove(&username);
        }
    }

    async fn handle_recovery(
        &self,
        username: &str,
        envelope: &ProfileEnvelope,
        chat_id: i64,
        started: Instant,
    ) {
        let Some(user) = envelope.user() else {
            return;
        };

        let profile_link = format!("https://instagram.com/{username}");
        let message = format!(
            "✅ **Username unbanned!**\n\n\
             **@{username}** is now active again | [View Profile]({profile_link})\n\
             Followers: **{}**\n\
             Time elapsed: **{}**",
            compact_number(user.followers()),
            format_elapsed(started.elapsed()),
        );
        let button = LinkButton::url("View Profile", profile_link);

        let picture_url = user.picture_url().map(str::to_string);
        let mut delivered = false;

        if self.inner.config.generate_screenshots
            && let Some(picture_url) = picture_url.as_deref()
        {
            match self
                .send_with_screenshot(username, user, picture_url, &message, &button, chat_id)
                .await
            {
                Ok(()) => {
                    log::info!("[@{username}] screenshot notification sent");
                    delivered = true;
                }
                Err(err) => {
                    log::warn!("[@{username}] screenshot delivery failed: {err}");
                }
            }
        }

        if !delivered {
            match self
                .inner
                .channel
                .send_message(chat_id, &message, Some(&button))
                .await
            {
                Ok(()) => log::info!("[@{username}] text notification sent"),
                Err(err) => log::error!("[@{username}] notification failed: {err}"),
            }
        }

        // Removal is ordered strictly after the notification attempt.
        self.inner.store.remove_account(username);
        if let Ok(mut guard) = self.inner.active.lock() {
            guard.remove(username);
        }
        log::info!("[@{username}] removed from monitoring");
    }

    async fn send_with_screenshot(
        &self,
        username: &str,
        user: &UserRecord,
        picture_url: &str,
        caption: &str,
        button: &LinkButton,
        chat_id: i64,
    ) -> Result<(), ChannelError> {
        let renderer = self
            .inner
            .screenshot
            .clone()
            .ok_or_else(|| ChannelError::Delivery("no screenshot renderer configured".into()))?;

        let picture = self
            .inner
            .api
            .download_image(picture_url, username)
            .await
            .ok_or_else(|| ChannelError::Delivery("profile picture download failed".into()))?;

        let request = ScreenshotRequest {
            username: username.to_string(),
            picture,
            followers: user.followers(),
            following: user.following(),
            posts: user.posts(),
            full_name: user.full_name.clone(),
            biography: user.biography.clone(),
            verified: user.is_verified,
            badge: self.inner.badge.clone(),
        };

        // Rendering is CPU-bound collaborator work; it runs off the
        // scheduler's critical path.
        let rendered = tokio::task::spawn_blocking(move || renderer.render(request))
            .await
            .map_err(|err| ChannelError::Delivery(format!("renderer task failed: {err}")))?
            .ok_or_else(|| ChannelError::Delivery("renderer produced no image".into()))?;

        self.inner
            .channel
            .send_file(chat_id, rendered, caption, Some(button))
            .await
    }
}

/// Renders large counts in compact form (1.5M, 10.2k).
pub fn compact_number(value: u64) -> String {
    if value >= 1_000_000 {
        format!("{:.1}M", value as f64 / 1_000_000.0)
    } else if value >= 1_000 {
        format!("{:.1}k", value as f64 / 1_000.0)
    } else {
        value.to_string()
    }
}

/// Renders an elapsed duration as `Nh Nm Ns`, dropping leading zero units.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
