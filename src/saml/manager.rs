//! SAML identity adapter.
//!
//! Drives the protocol engine for SP-initiated SSO and turns an accepted
//! response into a [`CanonicalIdentity`] stored in the host session.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::SamlConfig;
use super::engine::{SamlEngine, Settings};
use crate::error::{IdentityError, Result};
use crate::identity::{CanonicalIdentity, Claims, IdpClassifier, Normalizer};
use crate::provider::IdentityProvider;
use crate::request::{AuthRequest, RELAY_STATE_PARAM, SAML_RESPONSE_PARAM};
use crate::session::{self, SessionStore};

/// SAML-based identity adapter.
pub struct SamlIdentityManager {
    config: SamlConfig,
    engine: Arc<dyn SamlEngine>,
    classifier: IdpClassifier,
    normalizer: Normalizer,
}

impl SamlIdentityManager {
    pub fn new(config: SamlConfig, engine: Arc<dyn SamlEngine>) -> Self {
        Self {
            config,
            engine,
            classifier: IdpClassifier::standard(),
            normalizer: Normalizer::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: IdpClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn config(&self) -> &SamlConfig {
        &self.config
    }

    /// Settings are rebuilt per call so key rotation on disk takes effect
    /// without a restart.
    fn settings(&self) -> Result<Settings> {
        Settings::load(&self.config)
    }

    /// Build an identity from the current request without touching the
    /// session.
    ///
    /// When `attributes` is supplied the engine is skipped and those claims
    /// are normalized directly.
    pub fn retrieve_identity(
        &self,
        request: &AuthRequest,
        attributes: Option<Claims>,
    ) -> Result<CanonicalIdentity> {
        let claims = match attributes {
            Some(claims) => claims,
            None => self.process_request(request)?,
        };

        let issuer = self.classifier.classify(&self.config.idp_entity_id);
        Ok(self.normalizer.normalize(issuer, claims))
    }

    fn process_request(&self, request: &AuthRequest) -> Result<Claims> {
        let settings = self.settings()?;

        let saml_response = request.saml_response().ok_or_else(|| {
            IdentityError::Protocol(format!(
                "{} not found, only the HTTP-POST binding is supported",
                SAML_RESPONSE_PARAM
            ))
        })?;

        let processed = self.engine.process_response(&settings, saml_response)?;

        if !processed.errors.is_empty() {
            warn!(errors = ?processed.errors, "SAML response rejected");
            return Err(IdentityError::Validation(processed.errors));
        }

        if !processed.authenticated {
            return Err(IdentityError::NotAuthenticated);
        }

        debug!(
            name_id = ?processed.name_id,
            session_index = ?processed.session_index,
            "SAML response accepted"
        );

        if processed.attributes_with_friendly_name.is_empty() {
            Ok(processed.attributes)
        } else {
            Ok(processed.attributes_with_friendly_name)
        }
    }
}

impl IdentityProvider for SamlIdentityManager {
    fn store_identity(
        &self,
        request: &AuthRequest,
        session: &dyn SessionStore,
    ) -> Result<CanonicalIdentity> {
        let identity = self.retrieve_identity(request, None)?;
        session::save_identity(session, &identity)?;

        info!(
            user_id = %identity.id(),
            issuer = %identity.issuer(),
            "SAML identity stored"
        );
        Ok(identity)
    }

    fn sso_url(&self, redirect_url: &str) -> Result<String> {
        let settings = self.settings()?;
        let encoded_request = self.engine.authn_request(&settings)?;

        let separator = if settings.config.idp_sso_url.contains('?') {
            '&'
        } else {
            '?'
        };

        Ok(format!(
            "{}{}SAMLRequest={}&{}={}",
            settings.config.idp_sso_url,
            separator,
            urlencoding::encode(&encoded_request),
            RELAY_STATE_PARAM,
            urlencoding::encode(redirect_url)
        ))
    }

    // Local session teardown only; the IdP session is left alone.
    fn slo_url(&self, return_url: &str) -> Result<String> {
        Ok(return_url.to_string())
    }

    fn metadata(&self) -> Result<Option<String>> {
        let settings = self
            .settings()
            .map_err(|e| IdentityError::Metadata(vec![e.to_string()]))?;

        let metadata = self
            .engine
            .sp_metadata(&settings)
            .map_err(|e| IdentityError::Metadata(vec![e.to_string()]))?;

        let errors = self.engine.validate_metadata(&metadata);
        if !errors.is_empty() {
            return Err(IdentityError::Metadata(errors));
        }

        Ok(Some(metadata))
    }
}
