//! Durable storage for the gram session tokens.
//!
//! - [`TokenStorage`]: key/value backend trait
//! - [`FileStorage`]: JSON file under `~/.gram` (the default)
//! - [`MemoryStorage`]: process-lifetime backend
//! - [`TokenStore`]: the access/refresh pair on top of any backend

mod file;
mod keys;
mod memory;
mod tokens;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use tokens::TokenStore;
pub use traits::TokenStorage;

use std::path::Path;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create a TokenStore persisting to the given file.
pub fn create_token_store(path: &Path) -> TokenStore {
    TokenStore::new(Box::new(FileStorage::new(path)))
}
