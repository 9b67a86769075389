//! Shared API credential
//!
//! The crawl loop reads the key on every request; the lifecycle manager is
//! the only writer. The async RwLock is the one synchronization point the
//! crawl path depends on.

use std::sync::Arc;
use tokio::sync::RwLock;

/// Lifecycle of the active key as tracked by `KeyLifecycleManager`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Active,
    Exhausted,
    AwaitingReplacement,
}

#[derive(Clone)]
pub struct CredentialHandle {
    inner: Arc<RwLock<String>>,
}

impl CredentialHandle {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(key.into())),
        }
    }

    pub async fn current(&self) -> String {
        self.inner.read().await.clone()
    }

    /// Install a replacement key and return the previous one
    pub async fn swap(&self, key: impl Into<String>) -> String {
        let mut guard = self.inner.write().await;
        std::mem::replace(&mut *guard, key.into())
    }
}

impl std::fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialHandle(..)")
    }
}

/// Render a key for logs and operator messages without exposing it
pub fn mask_key(key: &str) -> String {
    let visible: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    match key.find('-') {
        Some(idx) if idx + 1 < key.len() => format!("{}…{}", &key[..=idx], visible),
        _ => format!("…{}", visible),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_swap_visible_to_clones() {
        let handle = CredentialHandle::new("RGAPI-old");
        let reader = handle.clone();

        let previous = handle.swap("RGAPI-new").await;

        assert_eq!(previous, "RGAPI-old");
        assert_eq!(reader.current().await, "RGAPI-new");
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(
            mask_key("RGAPI-12345678-aaaa-bbbb-cccc-1234567890ab"),
            "RGAPI-…90ab"
        );
        assert_eq!(mask_key("abcdef"), "…cdef");
    }
}
