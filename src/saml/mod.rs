//! SAML 2.0 Service Provider adapter.
//!
//! SP-initiated SSO over the HTTP-Redirect binding, responses accepted on
//! HTTP-POST, and SP metadata publication.

pub mod config;
pub mod engine;
pub mod manager;

pub use config::{Credentials, SamlConfig, SamlConfigJson};
pub use engine::{EngineError, ProcessedResponse, SamaelEngine, SamlEngine, Settings};
pub use manager::SamlIdentityManager;
