//! End-to-end scheduler behaviour against stub collaborators.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ig_monitor_rs::{
    ChannelError, FetchOutcome, LinkButton, MemoryStore, MonitorConfig, MonitorService,
    MonitorStore, NotificationChannel, ProfileApi, ScreenshotRenderer, ScreenshotRequest,
};

fn recovered_outcome(username: &str) -> FetchOutcome {
    let body = format!(
        r#"{{"data": {{"user": {{
            "username": "{username}",
            "edge_followed_by": {{"count": 1234}},
            "edge_follow": {{"count": 56}},
            "edge_owner_to_timeline_media": {{"count": 7}},
            "profile_pic_url": "https://cdn.example/{username}.jpg",
            "full_name": "Test User",
            "is_verified": false
        }}}}}}"#
    );
    FetchOutcome {
        status: Some(200),
        payload: Some(serde_json::from_str(&body).expect("payload fixture")),
    }
}

/// Profile API stub: accounts listed in `recovered` come back active, every
/// other lookup reports a 404.
struct ScriptedApi {
    recovered: HashSet<String>,
    image: Option<Bytes>,
    fetch_calls: AtomicUsize,
}

impl ScriptedApi {
    fn new<const N: usize>(recovered: [&str; N]) -> Self {
        Self {
            recovered: recovered.iter().map(|name| name.to_string()).collect(),
            image: Some(Bytes::from_static(b"jpeg-bytes")),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    fn nothing_recovers() -> Self {
        Self::new([])
    }
}

#[async_trait]
impl ProfileApi for ScriptedApi {
    async fn fetch_profile(&self, username: &str) -> FetchOutcome {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.recovered.contains(username) {
            recovered_outcome(username)
        } else {
            FetchOutcome::status_only(404)
        }
    }

    async fn download_image(&self, _url: &str, _account_label: &str) -> Option<Bytes> {
        self.image.clone()
    }
}

/// Channel stub recording every delivery attempt.
#[derive(Default)]
struct RecordingChannel {
    events: Mutex<Vec<String>>,
    fail_messages: bool,
    fail_files: bool,
}

impl RecordingChannel {
    fn events(&self) -> Vec<String> {
        self.events.lock().expect("events lock").clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        _button: Option<&LinkButton>,
    ) -> Result<(), ChannelError> {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("message:{chat_id}:{}", text.lines().next().unwrap_or("")));
        if self.fail_messages {
            return Err(ChannelError::Delivery("message rejected".into()));
        }
        Ok(())
    }

    async fn send_file(
        &self,
        chat_id: i64,
        file: Bytes,
        _caption: &str,
        _button: Option<&LinkButton>,
    ) -> Result<(), ChannelError> {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("file:{chat_id}:{}", file.len()));
        if self.fail_files {
            return Err(ChannelError::Delivery("file rejected".into()));
        }
        Ok(())
    }
}

struct FixedRenderer {
    output: Option<Bytes>,
}

impl ScreenshotRenderer for FixedRenderer {
    fn render(&self, _request: ScreenshotRequest) -> Option<Bytes> {
        self.output.clone()
    }
}

fn fast_config(screenshots: bool) -> MonitorConfig {
    MonitorConfig::builder()
        .with_check_interval(1, 1)
        .with_screenshots(screenshots)
        .build()
        .expect("config")
}

async fn wait_until(description: &str, cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for: {description}");
}

#[tokio::test]
async fn recovery_notifies_then_removes_account() {
    let store = Arc::new(MemoryStore::new());
    store.insert("comeback", 7);
    let channel = Arc::new(RecordingChannel::default());

    let service = MonitorService::builder()
        .with_config(fast_config(false))
        .with_store(store.clone())
        .with_channel(channel.clone())
        .with_profile_api(Arc::new(ScriptedApi::new(["comeback"])))
        .build()
        .expect("service");

    service.start_monitoring("comeback", 7);
    wait_until("account removed after recovery", || store.is_empty()).await;
    wait_until("task registry drained", || service.active_count() == 0).await;

    let events = channel.events();
    assert_eq!(events.len(), 1, "exactly one notification: {events:?}");
    assert!(events[0].starts_with("message:7:"));
    assert!(!store.is_monitoring("comeback"));
}

#[tokio::test]
async fn channel_failure_still_removes_account() {
    let store = Arc::new(MemoryStore::new());
    store.insert("fragile", 9);
    let channel = Arc::new(RecordingChannel {
        fail_messages: true,
        ..RecordingChannel::default()
    });

    let service = MonitorService::builder()
        .with_config(fast_config(false))
        .with_store(store.clone())
        .with_channel(channel.clone())
        .with_profile_api(Arc::new(ScriptedApi::new(["fragile"])))
        .build()
        .expect("service");

    service.start_monitoring("fragile", 9);
    wait_until("account removed despite send failure", || store.is_empty()).await;
    wait_until("task registry drained", || service.active_count() == 0).await;

    assert_eq!(channel.events().len(), 1);
}

#[tokio::test]
async fn failed_screenshot_chain_falls_back_to_text() {
    let store = Arc::new(MemoryStore::new());
    store.insert("pictured", 11);
    let channel = Arc::new(RecordingChannel::default());

    let service = MonitorService::builder()
        .with_config(fast_config(true))
        .with_store(store.clone())
        .with_channel(channel.clone())
        .with_screenshot_renderer(Arc::new(FixedRenderer { output: None }))
        .with_profile_api(Arc::new(ScriptedApi::new(["pictured"])))
        .build()
        .expect("service");

    service.start_monitoring("pictured", 11);
    wait_until("account removed after recovery", || store.is_empty()).await;

    let events = channel.events();
    assert_eq!(events.len(), 1, "text fallback only: {events:?}");
    assert!(events[0].starts_with("message:11:"));
}

#[tokio::test]
async fn successful_screenshot_chain_sends_a_file() {
    let store = Arc::new(MemoryStore::new());
    store.insert("glossy", 13);
    let channel = Arc::new(RecordingChannel::default());

    let service = MonitorService::builder()
        .with_config(fast_config(true))
        .with_store(store.clone())
        .with_channel(channel.clone())
        .with_screenshot_renderer(Arc::new(FixedRenderer {
            output: Some(Bytes::from_static(b"png-bytes")),
        }))
        .with_profile_api(Arc::new(ScriptedApi::new(["glossy"])))
        .build()
        .expect("service");

    service.start_monitoring("glossy", 13);
    wait_until("account removed after recovery", || store.is_empty()).await;

    let events = channel.events();
    assert_eq!(events.len(), 1, "single file delivery: {events:?}");
    assert!(events[0].starts_with("file:13:"));
}

#[tokio::test]
async fn stop_all_preserves_store_unless_told_otherwise() {
    let store = Arc::new(MemoryStore::new());
    store.insert("first", 1);
    store.insert("second", 2);

    let service = MonitorService::builder()
        .with_config(fast_config(false))
        .with_store(store.clone())
        .with_channel(Arc::new(RecordingChannel::default()))
        .with_profile_api(Arc::new(ScriptedApi::nothing_recovers()))
        .build()
        .expect("service");

    service.start_monitoring("first", 1);
    service.start_monitoring("second", 2);
    assert_eq!(service.active_count(), 2);

    service.stop_all_monitoring(false);
    assert_eq!(service.active_count(), 0);
    assert_eq!(store.len(), 2, "store entries survive a plain shutdown");

    service.stop_all_monitoring(true);
    assert!(store.is_empty(), "hard reset clears the store");
}

#[tokio::test]
async fn resume_launches_one_task_per_store_entry() {
    let store = Arc::new(MemoryStore::new());
    store.insert("alpha", 1);
    store.insert("beta", 2);
    store.insert("gamma", 3);

    let api = Arc::new(ScriptedApi::nothing_recovers());
    let service = MonitorService::builder()
        .with_config(fast_config(false))
        .with_store(store.clone())
        .with_channel(Arc::new(RecordingChannel::default()))
        .with_profile_api(api.clone())
        .build()
        .expect("service");

    service.resume_all_monitoring();
    assert_eq!(service.active_count(), 3);

    wait_until("every resumed task polled at least once", || {
        api.fetch_calls.load(Ordering::SeqCst) >= 3
    })
    .await;

    service.stop_all_monitoring(false);
    assert_eq!(service.active_count(), 0);
}

#[tokio::test]
async fn stop_monitoring_cancels_a_single_account() {
    let store = Arc::new(MemoryStore::new());
    store.insert("stays", 1);
    store.insert("goes", 2);

    let service = MonitorService::builder()
        .with_config(fast_config(false))
        .with_store(store.clone())
        .with_channel(Arc::new(RecordingChannel::default()))
        .with_profile_api(Arc::new(ScriptedApi::nothing_recovers()))
        .build()
        .expect("service");

    service.start_monitoring("stays", 1);
    service.start_monitoring("goes", 2);

    service.stop_monitoring("goes");
    assert_eq!(service.active_count(), 1);
    assert!(store.is_monitoring("stays"));
    assert!(!store.is_monitoring("goes"));

    service.stop_all_monitoring(false);
}
