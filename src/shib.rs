//! Identity from a reverse proxy (Apache mod_shib) user variable.
//!
//! The proxy authenticates the user and injects the variable; this adapter
//! trusts it as-is and does no verification of its own.

use tracing::{debug, info};

use crate::error::{IdentityError, Result};
use crate::identity::CanonicalIdentity;
use crate::provider::IdentityProvider;
use crate::request::AuthRequest;
use crate::session::{self, SessionStore};

/// Default server variable set by the proxy.
pub const DEFAULT_REMOTE_USER_VARIABLE: &str = "REMOTE_USER";

/// Shibboleth SP session initiator path.
const SHIBBOLETH_LOGIN: &str = "/Shibboleth.sso/Login";
/// Shibboleth SP logout handler path.
const SHIBBOLETH_LOGOUT: &str = "/Shibboleth.sso/Logout";

/// Header-based identity adapter.
#[derive(Debug, Clone)]
pub struct ShibIdentityManager {
    user_variable: String,
}

impl ShibIdentityManager {
    pub fn new(user_variable: impl Into<String>) -> Self {
        Self {
            user_variable: user_variable.into(),
        }
    }

    pub fn user_variable(&self) -> &str {
        &self.user_variable
    }

    /// Read the remote user without touching the session.
    pub fn retrieve_identity(&self, request: &AuthRequest) -> Result<CanonicalIdentity> {
        match request.var(&self.user_variable) {
            Some(user) if !user.trim().is_empty() => Ok(CanonicalIdentity::remote_user(user.trim())),
            _ => {
                debug!(variable = %self.user_variable, "No remote user on request");
                Err(IdentityError::Unauthenticated {
                    variable: self.user_variable.clone(),
                })
            }
        }
    }
}

impl Default for ShibIdentityManager {
    fn default() -> Self {
        Self::new(DEFAULT_REMOTE_USER_VARIABLE)
    }
}

impl IdentityProvider for ShibIdentityManager {
    fn store_identity(
        &self,
        request: &AuthRequest,
        session: &dyn SessionStore,
    ) -> Result<CanonicalIdentity> {
        let identity = self.retrieve_identity(request)?;
        session::save_identity(session, &identity)?;

        info!(user_id = %identity.id(), "Remote user identity stored");
        Ok(identity)
    }

    fn sso_url(&self, redirect_url: &str) -> Result<String> {
        Ok(format!(
            "{}?target={}",
            SHIBBOLETH_LOGIN,
            urlencoding::encode(redirect_url)
        ))
    }

    fn slo_url(&self, return_url: &str) -> Result<String> {
        Ok(format!(
            "{}?return={}",
            SHIBBOLETH_LOGOUT,
            urlencoding::encode(return_url)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;

    #[test]
    fn test_store_identity_from_remote_user() {
        let manager = ShibIdentityManager::default();
        let session = MemorySession::new();
        let request = AuthRequest::new().with_var("REMOTE_USER", "netid");

        assert!(!manager.has_identity(&session).unwrap());

        let identity = manager.store_identity(&request, &session).unwrap();
        assert_eq!(identity.id(), "netid");
        assert!(identity.is_primary_org());
        assert!(identity.raw_claims().is_empty());

        assert!(manager.has_identity(&session).unwrap());
        assert_eq!(manager.get_identity(&session).unwrap(), Some(identity));
    }

    #[test]
    fn test_missing_remote_user() {
        let manager = ShibIdentityManager::default();
        let session = MemorySession::new();

        let result = manager.store_identity(&AuthRequest::new(), &session);
        assert!(matches!(
            result,
            Err(IdentityError::Unauthenticated { ref variable }) if variable == "REMOTE_USER"
        ));
        assert!(session.is_empty());
    }

    #[test]
    fn test_empty_remote_user() {
        let manager = ShibIdentityManager::default();
        let request = AuthRequest::new().with_var("REMOTE_USER", "  ");
        assert!(matches!(
            manager.retrieve_identity(&request),
            Err(IdentityError::Unauthenticated { .. })
        ));
    }

    #[test]
    fn test_failed_store_keeps_previous_identity() {
        let manager = ShibIdentityManager::default();
        let session = MemorySession::new();
        manager
            .store_identity(&AuthRequest::new().with_var("REMOTE_USER", "netid"), &session)
            .unwrap();

        assert!(manager.store_identity(&AuthRequest::new(), &session).is_err());
        assert_eq!(manager.get_identity(&session).unwrap().unwrap().id(), "netid");
    }

    #[test]
    fn test_custom_variable() {
        let manager = ShibIdentityManager::new("REDIRECT_REMOTE_USER");
        let request = AuthRequest::new()
            .with_var("REMOTE_USER", "wrong")
            .with_var("REDIRECT_REMOTE_USER", "netid");
        assert_eq!(manager.retrieve_identity(&request).unwrap().id(), "netid");
    }

    #[test]
    fn test_shibboleth_handler_urls() {
        let manager = ShibIdentityManager::default();
        assert_eq!(
            manager.sso_url("/dashboard?tab=1").unwrap(),
            "/Shibboleth.sso/Login?target=%2Fdashboard%3Ftab%3D1"
        );
        assert_eq!(
            manager.slo_url("/").unwrap(),
            "/Shibboleth.sso/Logout?return=%2F"
        );
        assert_eq!(manager.metadata().unwrap(), None);
    }

    #[test]
    fn test_forget_identity() {
        let manager = ShibIdentityManager::default();
        let session = MemorySession::new();
        manager
            .store_identity(&AuthRequest::new().with_var("REMOTE_USER", "netid"), &session)
            .unwrap();
        assert!(manager.forget_identity(&session).unwrap());
        assert!(!manager.has_identity(&session).unwrap());
    }
}
