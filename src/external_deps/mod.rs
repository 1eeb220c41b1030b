//! Collaborator boundaries consumed by the core.
//!
//! Each submodule holds one external interface: session credentials, the
//! backing store, the notification channel, and the screenshot renderer.

pub mod notify;
pub mod screenshot;
pub mod session;
pub mod storage;

pub use notify::{ChannelError, LinkButton, NotificationChannel};
pub use screenshot::{ScreenshotRenderer, ScreenshotRequest};
pub use session::{RotatingSessionPool, SessionProvider};
pub use storage::{MemoryStore, MonitorStore, MonitoredAccount};
