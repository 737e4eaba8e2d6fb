//! Session access for stored identities.
//!
//! The session itself belongs to the host; this module defines the narrow
//! key/value interface the adapters use and how identities are kept in it.

pub mod store;

pub use store::{MemorySession, SessionStore};

use crate::error::{IdentityError, Result};
use crate::identity::CanonicalIdentity;

/// Session key under which the remote identity is stored.
pub const REMOTE_IDENTITY_KEY: &str = "remoteIdentity";

/// Read the stored identity, if any.
pub fn load_identity(session: &dyn SessionStore) -> Result<Option<CanonicalIdentity>> {
    match session.get(REMOTE_IDENTITY_KEY)? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| IdentityError::Session(format!("Failed to deserialize identity: {}", e))),
        None => Ok(None),
    }
}

/// Persist an identity, replacing any previous one.
pub fn save_identity(session: &dyn SessionStore, identity: &CanonicalIdentity) -> Result<()> {
    let value = serde_json::to_value(identity)
        .map_err(|e| IdentityError::Session(format!("Failed to serialize identity: {}", e)))?;
    session.put(REMOTE_IDENTITY_KEY, value)
}

/// Remove the stored identity.
pub fn clear_identity(session: &dyn SessionStore) -> Result<bool> {
    session.forget(REMOTE_IDENTITY_KEY)
}
