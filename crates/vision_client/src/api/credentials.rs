//! Credential slot shared by a client and its clones

use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Result, VisionError};

/// Mask a key for logging, keeping only the first and last 4 characters
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Holds the API key used by authenticated operations
///
/// Writes take the lock exclusively, so a read that starts after `set`
/// returns always observes the new key.
#[derive(Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl CredentialStore {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(api_key.filter(|k| !k.is_empty()))),
        }
    }

    /// Current key, if any
    pub async fn get(&self) -> Option<String> {
        self.inner.read().await.clone()
    }

    /// Current key, or `MissingCredential`
    pub async fn require(&self) -> Result<String> {
        self.get().await.ok_or(VisionError::MissingCredential)
    }

    /// Replace the stored key; an empty string clears it
    pub async fn set(&self, api_key: impl Into<String>) {
        let key = api_key.into();
        let mut guard = self.inner.write().await;
        *guard = if key.is_empty() { None } else { Some(key) };
    }

    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    pub async fn is_set(&self) -> bool {
        self.inner.read().await.is_some()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.try_read() {
            Ok(guard) => guard.as_deref().map(mask_key),
            Err(_) => Some("<locked>".to_string()),
        };
        f.debug_struct("CredentialStore")
            .field("api_key", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("abcdefghijklmnop"), "abcd...mnop");
        assert_eq!(mask_key("short"), "*****");
    }

    #[tokio::test]
    async fn test_require_without_key() {
        let store = CredentialStore::default();
        assert!(matches!(
            store.require().await,
            Err(VisionError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn test_set_and_clear() {
        let store = CredentialStore::new(None);
        store.set("abc123").await;
        assert_eq!(store.require().await.unwrap(), "abc123");

        store.set("").await;
        assert!(!store.is_set().await);

        store.set("xyz").await;
        store.clear().await;
        assert_eq!(store.get().await, None);
    }

    #[tokio::test]
    async fn test_clones_share_slot() {
        let store = CredentialStore::new(Some(String::new()));
        assert!(!store.is_set().await);

        let other = store.clone();
        other.set("shared-key").await;
        assert_eq!(store.get().await.as_deref(), Some("shared-key"));
    }

    #[test]
    fn test_debug_masks_key() {
        let store = CredentialStore::new(Some("sk_live_1234567890".into()));
        let rendered = format!("{:?}", store);
        assert!(rendered.contains("sk_l...7890"));
        assert!(!rendered.contains("1234567890"));
    }
}
