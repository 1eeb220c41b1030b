//! Screenshot-render collaborator.
//!
//! Rendering is synchronous and potentially slow; the scheduler runs it under
//! a blocking task so it never stalls other monitors. Absence and failure are
//! both expressed as `None`.

use bytes::Bytes;

/// Everything the renderer needs to compose a profile card.
#[derive(Debug, Clone)]
pub struct ScreenshotRequest {
    pub username: String,
    pub picture: Bytes,
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
    pub full_name: String,
    pub biography: String,
    pub verified: bool,
    pub badge: Option<Bytes>,
}

pub trait ScreenshotRenderer: Send + Sync {
    fn render(&self, request: ScreenshotRequest) -> Option<Bytes>;
}
