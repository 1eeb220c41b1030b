//! Session credential collaborators.
//!
//! The core only consumes the two operations below; how credentials are
//! sourced, validated, or retired is the provider's business. Rotation must
//! be safe to invoke concurrently from many account tasks.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Supplies the opaque session credential attached to every request.
pub trait SessionProvider: Send + Sync {
    fn current_credential(&self) -> String;
    fn rotate_credential(&self);
}

/// Round-robin provider over a fixed credential list.
#[derive(Debug, Default)]
pub struct RotatingSessionPool {
    credentials: Vec<String>,
    cursor: AtomicUsize,
}

impl RotatingSessionPool {
    pub fn new<I, S>(credentials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let credentials: Vec<String> = credentials
            .into_iter()
            .map(Into::into)
            .filter(|credential| !credential.is_empty())
            .collect();
        if credentials.is_empty() {
            log::warn!("session pool created without credentials");
        }
        Self {
            credentials,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl SessionProvider for RotatingSessionPool {
    fn current_credential(&self) -> String {
        if self.credentials.is_empty() {
            return String::new();
        }
        let index = self.cursor.load(Ordering::Relaxed) % self.credentials.len();
        self.credentials[index].clone()
    }

    fn rotate_credential(&self) {
        if self.credentials.len() < 2 {
            return;
        }
        let previous = self.cursor.fetch_add(1, Ordering::Relaxed);
        log::warn!(
            "session credential rotated ({} -> {})",
            previous % self.credentials.len(),
            (previous + 1) % self.credentials.len()
        );
    }
}
