//! Error types for identity retrieval.

use thiserror::Error;

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Errors surfaced by the identity adapters.
///
/// None of these are retried. A failed `store_identity()` leaves whatever the
/// session held before untouched.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// SP/IdP settings are structurally invalid.
    #[error("Invalid SAML settings: {0}")]
    Configuration(String),

    /// The engine could not parse or verify the incoming response.
    #[error("SAML Response Error: {0}")]
    Protocol(String),

    /// The response parsed but failed semantic validation.
    #[error("SAML Response Errors: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// The response was processed without errors but asserted no login.
    #[error("SAML Response not authenticated")]
    NotAuthenticated,

    /// SP metadata generation or validation failed.
    #[error("Invalid SP metadata: {}", .0.join(", "))]
    Metadata(Vec<String>),

    /// The proxy-provided user variable is missing or empty.
    #[error("No remote user provided in {variable}")]
    Unauthenticated { variable: String },

    /// The host session store failed.
    #[error("Session error: {0}")]
    Session(String),
}

impl IdentityError {
    /// Whether the error is a per-request login failure (as opposed to an
    /// operator-facing configuration problem).
    pub fn is_login_failure(&self) -> bool {
        matches!(
            self,
            IdentityError::Protocol(_)
                | IdentityError::Validation(_)
                | IdentityError::NotAuthenticated
                | IdentityError::Unauthenticated { .. }
        )
    }
}
