//! Identity federation boundary for Cornell web applications.
//!
//! Two interchangeable adapters supply a normalized identity to the host:
//! a header-based one that trusts a reverse proxy (Apache mod_shib), and an
//! in-process SAML 2.0 Service Provider. The host injects its session as a
//! [`SessionStore`] and receives an [`AuthenticatedEvent`] on every login.

pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod manager;
pub mod provider;
pub mod request;
pub mod saml;
pub mod session;
pub mod shib;

pub use config::{AuthConfig, AuthConfigJson, IdentityManagerKind};
pub use error::{IdentityError, Result};
pub use events::{
    AuthenticatedEvent, AuthenticationListener, AuthorizeUser, LocalUser, NewUser, UserDirectory,
};
pub use identity::{CanonicalIdentity, Claims, FieldMap, IdpClassifier, Normalizer, OrgTag};
pub use manager::{Adapter, IdentityManager};
pub use provider::IdentityProvider;
pub use request::AuthRequest;
pub use saml::{SamaelEngine, SamlConfig, SamlEngine, SamlIdentityManager};
pub use session::{MemorySession, SessionStore};
pub use shib::ShibIdentityManager;
