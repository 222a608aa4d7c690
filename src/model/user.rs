//! Minimal admin-side principal model (SPEC_FULL §3 supplement).
//!
//! The query surface is read-mostly and single-tenant in scope; this is
//! just enough to gate the orchestrator's write operations behind an API
//! key, not a full account system.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub key_id: String,
    /// Salted hash, never the raw key.
    pub key_hash: String,
    pub owner: String,
    pub revoked: bool,
}

impl ApiKey {
    pub fn is_usable(&self) -> bool {
        !self.revoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoked_key_is_unusable() {
        let key = ApiKey {
            key_id: "k1".to_string(),
            key_hash: "hash".to_string(),
            owner: "alice".to_string(),
            revoked: true,
        };
        assert!(!key.is_usable());
    }
}
