//! # Core Type Definitions
//!
//! Identity types shared by every crate that plugs into the host.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one client connection.
///
/// This is a wrapper around UUID that keeps connection keys from being
/// confused with any other identifier. A key is stable for the whole lifetime
/// of the connection; a reconnecting client may receive a new one.
///
/// # Examples
///
/// ```rust
/// use horizon_host::ClientKey;
///
/// let key = ClientKey::new();
/// let parsed: ClientKey = key.to_string().parse().unwrap();
/// assert_eq!(key, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientKey(pub Uuid);

impl ClientKey {
    /// Creates a new random client key using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::str::FromStr for ClientKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for ClientKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_keys_are_unique() {
        let a = ClientKey::new();
        let b = ClientKey::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<ClientKey>().is_err());
    }

    #[test]
    fn test_serde_is_transparent_uuid() {
        let key: ClientKey = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"550e8400-e29b-41d4-a716-446655440000\"");
    }
}
