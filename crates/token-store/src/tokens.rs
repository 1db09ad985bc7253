//! High-level API for the session token pair.

use crate::{StorageKeys, StorageResult, TokenStorage};
use tracing::debug;

/// Reads and writes the access/refresh token pair.
///
/// No expiry is tracked locally; the server reports expiry through 401s.
pub struct TokenStore {
    storage: Box<dyn TokenStorage>,
}

impl TokenStore {
    /// Create a token store over the given storage backend
    pub fn new(storage: Box<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    /// Retrieve the access token
    pub fn get_access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::ACCESS_TOKEN)
    }

    /// Retrieve the refresh token
    pub fn get_refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::REFRESH_TOKEN)
    }

    /// Persist a new token pair, replacing any previous one
    pub fn set_tokens(&self, access_token: &str, refresh_token: &str) -> StorageResult<()> {
        self.storage.set_many(&[
            (StorageKeys::ACCESS_TOKEN, access_token),
            (StorageKeys::REFRESH_TOKEN, refresh_token),
        ])?;
        debug!("Stored session tokens");
        Ok(())
    }

    /// Remove both tokens
    pub fn clear(&self) -> StorageResult<()> {
        self.storage
            .delete_many(&[StorageKeys::ACCESS_TOKEN, StorageKeys::REFRESH_TOKEN])?;
        debug!("Cleared session tokens");
        Ok(())
    }

    /// Check whether an access token is present
    pub fn has_session(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::ACCESS_TOKEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    fn create_test_store() -> TokenStore {
        TokenStore::new(Box::new(MemoryStorage::new()))
    }

    #[test]
    fn test_empty_store() {
        let store = create_test_store();
        assert!(store.get_access_token().unwrap().is_none());
        assert!(store.get_refresh_token().unwrap().is_none());
        assert!(!store.has_session().unwrap());
    }

    #[test]
    fn test_set_tokens_roundtrip() {
        let store = create_test_store();

        store.set_tokens("access-1", "refresh-1").unwrap();
        assert_eq!(store.get_access_token().unwrap().as_deref(), Some("access-1"));
        assert_eq!(store.get_refresh_token().unwrap().as_deref(), Some("refresh-1"));
        assert!(store.has_session().unwrap());

        store.set_tokens("access-2", "refresh-2").unwrap();
        assert_eq!(store.get_access_token().unwrap().as_deref(), Some("access-2"));
        assert_eq!(store.get_refresh_token().unwrap().as_deref(), Some("refresh-2"));
    }

    #[test]
    fn test_clear_removes_both_tokens() {
        let store = create_test_store();
        store.set_tokens("access", "refresh").unwrap();

        store.clear().unwrap();
        assert!(store.get_access_token().unwrap().is_none());
        assert!(store.get_refresh_token().unwrap().is_none());

        // Clearing an empty store is fine.
        store.clear().unwrap();
    }
}
