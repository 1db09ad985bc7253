//! Storage key constants.

/// Keys under which session tokens are persisted.
pub struct StorageKeys;

impl StorageKeys {
    /// Short-lived bearer token presented on protected calls
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Longer-lived token exchanged for a new pair
    pub const REFRESH_TOKEN: &'static str = "refresh_token";
}
