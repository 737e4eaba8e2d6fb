//! Host session store interface and an in-memory implementation.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{IdentityError, Result};

/// Key/value store scoped to one user session.
///
/// The host owns the session and serializes access per session; adapters
/// only need read-after-write consistency.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn put(&self, key: &str, value: Value) -> Result<()>;

    /// Remove a key. Returns whether it was present.
    fn forget(&self, key: &str) -> Result<bool>;
}

/// Session store kept in process memory, one instance per session.
#[derive(Debug, Default)]
pub struct MemorySession {
    values: RwLock<HashMap<String, Value>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self
            .values
            .read()
            .map_err(|_| IdentityError::Session("Session lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| IdentityError::Session("Session lock poisoned".to_string()))?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<bool> {
        let mut values = self
            .values
            .write()
            .map_err(|_| IdentityError::Session("Session lock poisoned".to_string()))?;
        Ok(values.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_and_get() {
        let session = MemorySession::new();
        assert!(session.is_empty());
        assert_eq!(session.get("key").unwrap(), None);

        session.put("key", json!({"uid": "netid"})).unwrap();
        assert_eq!(session.get("key").unwrap(), Some(json!({"uid": "netid"})));
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_put_overwrites() {
        let session = MemorySession::new();
        session.put("key", json!(1)).unwrap();
        session.put("key", json!(2)).unwrap();
        assert_eq!(session.get("key").unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_forget() {
        let session = MemorySession::new();
        session.put("key", json!("value")).unwrap();
        assert!(session.forget("key").unwrap());
        assert!(!session.forget("key").unwrap());
        assert_eq!(session.get("key").unwrap(), None);
    }
}
