//! Capability surface shared by the identity adapters.

use crate::error::Result;
use crate::identity::CanonicalIdentity;
use crate::request::AuthRequest;
use crate::session::{self, SessionStore};

/// An identity source the host can query uniformly.
///
/// `has_identity` and `get_identity` only read the session; they never
/// touch the proxy headers or the protocol engine.
pub trait IdentityProvider: Send + Sync {
    fn has_identity(&self, session: &dyn SessionStore) -> Result<bool> {
        Ok(self.get_identity(session)?.is_some())
    }

    fn get_identity(&self, session: &dyn SessionStore) -> Result<Option<CanonicalIdentity>> {
        session::load_identity(session)
    }

    /// Read a fresh identity from the request and persist it to the session.
    /// On failure the session is left as it was.
    fn store_identity(
        &self,
        request: &AuthRequest,
        session: &dyn SessionStore,
    ) -> Result<CanonicalIdentity>;

    /// Drop the stored identity.
    fn forget_identity(&self, session: &dyn SessionStore) -> Result<bool> {
        session::clear_identity(session)
    }

    /// Where to send the user to log in, returning to `redirect_url`.
    fn sso_url(&self, redirect_url: &str) -> Result<String>;

    /// Where to send the user after login completes.
    fn sso_return_url(&self, request: &AuthRequest) -> String {
        request.relay_state().unwrap_or("/").to_string()
    }

    /// Where to send the user to log out, returning to `return_url`.
    fn slo_url(&self, return_url: &str) -> Result<String>;

    /// SP metadata document, for adapters that publish one.
    fn metadata(&self) -> Result<Option<String>> {
        Ok(None)
    }
}
