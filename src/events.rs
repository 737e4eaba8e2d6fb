//! Authentication events delivered to the host application.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::identity::CanonicalIdentity;

/// Emitted after an identity has been stored in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedEvent {
    pub remote_user: String,
    pub identity: CanonicalIdentity,
}

impl AuthenticatedEvent {
    pub fn new(identity: CanonicalIdentity) -> Self {
        Self {
            remote_user: identity.id().to_string(),
            identity,
        }
    }
}

/// Receives authentication events.
///
/// Listeners run after the session is already updated; a listener failure is
/// logged and does not undo the login.
pub trait AuthenticationListener: Send + Sync {
    fn on_authenticated(&self, event: &AuthenticatedEvent);
}

/// A user account in the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: String,
    /// Identity id (NetID/CWID) the account was provisioned for.
    pub remote_user: String,
    pub name: String,
    pub email: String,
}

/// Data for provisioning a new user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub remote_user: String,
    pub name: String,
    pub email: String,
}

/// Host user storage and login.
pub trait UserDirectory: Send + Sync {
    type Error: fmt::Display;

    fn find_by_email(&self, email: &str) -> Result<Option<LocalUser>, Self::Error>;
    fn find_by_remote_user(&self, remote_user: &str) -> Result<Option<LocalUser>, Self::Error>;
    fn create(&self, user: NewUser) -> Result<LocalUser, Self::Error>;
    fn login(&self, user: &LocalUser) -> Result<(), Self::Error>;
}

/// Finds or creates the local user for the authenticated identity and logs
/// them in.
pub struct AuthorizeUser<D> {
    directory: D,
}

impl<D: UserDirectory> AuthorizeUser<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Resolve and log in the user, returning it.
    ///
    /// Users are matched by email, then by remote user; empty values never
    /// match. `None` means the identity carried neither and nobody was
    /// logged in.
    pub fn authorize(&self, identity: &CanonicalIdentity) -> Result<Option<LocalUser>, D::Error> {
        let remote_user = identity.id();
        let email = identity.email();

        if remote_user.is_empty() && email.is_empty() {
            warn!("Identity has neither email nor remote user, not authorizing");
            return Ok(None);
        }

        let mut existing = None;
        if !email.is_empty() {
            existing = self.directory.find_by_email(email)?;
        }
        if existing.is_none() && !remote_user.is_empty() {
            existing = self.directory.find_by_remote_user(remote_user)?;
        }

        let user = match existing {
            Some(user) => user,
            None => {
                let name = match identity.name() {
                    name if name.is_empty() => remote_user.to_string(),
                    name => name,
                };
                let user = self.directory.create(NewUser {
                    remote_user: remote_user.to_string(),
                    name,
                    email: email.to_string(),
                })?;
                info!(user_id = %user.id, remote_user = %user.remote_user, "Provisioned local user");
                user
            }
        };

        self.directory.login(&user)?;
        debug!(user_id = %user.id, "Local user logged in");
        Ok(Some(user))
    }
}

impl<D: UserDirectory> AuthenticationListener for AuthorizeUser<D> {
    fn on_authenticated(&self, event: &AuthenticatedEvent) {
        if let Err(e) = self.authorize(&event.identity) {
            warn!(
                remote_user = %event.remote_user,
                error = %e,
                "Failed to authorize local user"
            );
        }
    }
}
