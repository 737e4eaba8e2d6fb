//! The active identity adapter, selected from configuration.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{AuthConfig, IdentityManagerKind};
use crate::error::{IdentityError, Result};
use crate::events::{AuthenticatedEvent, AuthenticationListener};
use crate::identity::CanonicalIdentity;
use crate::provider::IdentityProvider;
use crate::request::AuthRequest;
use crate::saml::{SamlEngine, SamlIdentityManager};
use crate::session::SessionStore;
use crate::shib::ShibIdentityManager;

/// One of the two adapters.
pub enum Adapter {
    HeaderBased(ShibIdentityManager),
    Saml(SamlIdentityManager),
}

impl Adapter {
    fn provider(&self) -> &dyn IdentityProvider {
        match self {
            Adapter::HeaderBased(manager) => manager,
            Adapter::Saml(manager) => manager,
        }
    }
}

/// Host-facing identity manager.
///
/// Exactly one adapter is active per deployment. Successful logins are
/// announced to every registered listener.
pub struct IdentityManager {
    adapter: Adapter,
    listeners: Vec<Arc<dyn AuthenticationListener>>,
}

impl IdentityManager {
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            listeners: Vec::new(),
        }
    }

    /// Build the adapter named by `config.identity_manager`.
    ///
    /// `engine` is only used by the SAML adapter.
    pub fn from_config(config: &AuthConfig, engine: Arc<dyn SamlEngine>) -> Result<Self> {
        config.validate().map_err(IdentityError::Configuration)?;

        let adapter = match config.identity_manager {
            IdentityManagerKind::HeaderBased => {
                Adapter::HeaderBased(ShibIdentityManager::new(config.remote_user_variable.clone()))
            }
            IdentityManagerKind::Saml => Adapter::Saml(
                SamlIdentityManager::new(config.saml.clone(), engine)
                    .with_classifier(config.classifier())
                    .with_normalizer(config.normalizer()),
            ),
        };

        info!(identity_manager = ?config.identity_manager, "Identity manager configured");
        Ok(Self::new(adapter))
    }

    pub fn with_listener(mut self, listener: Arc<dyn AuthenticationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    fn dispatch(&self, identity: &CanonicalIdentity) {
        if self.listeners.is_empty() {
            return;
        }
        let event = AuthenticatedEvent::new(identity.clone());
        debug!(
            remote_user = %event.remote_user,
            listeners = self.listeners.len(),
            "Dispatching authenticated event"
        );
        for listener in &self.listeners {
            listener.on_authenticated(&event);
        }
    }
}

impl IdentityProvider for IdentityManager {
    fn has_identity(&self, session: &dyn SessionStore) -> Result<bool> {
        self.adapter.provider().has_identity(session)
    }

    fn get_identity(&self, session: &dyn SessionStore) -> Result<Option<CanonicalIdentity>> {
        self.adapter.provider().get_identity(session)
    }

    fn store_identity(
        &self,
        request: &AuthRequest,
        session: &dyn SessionStore,
    ) -> Result<CanonicalIdentity> {
        let identity = self.adapter.provider().store_identity(request, session)?;
        self.dispatch(&identity);
        Ok(identity)
    }

    fn forget_identity(&self, session: &dyn SessionStore) -> Result<bool> {
        self.adapter.provider().forget_identity(session)
    }

    fn sso_url(&self, redirect_url: &str) -> Result<String> {
        self.adapter.provider().sso_url(redirect_url)
    }

    fn sso_return_url(&self, request: &AuthRequest) -> String {
        self.adapter.provider().sso_return_url(request)
    }

    fn slo_url(&self, return_url: &str) -> Result<String> {
        self.adapter.provider().slo_url(return_url)
    }

    fn metadata(&self) -> Result<Option<String>> {
        self.adapter.provider().metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saml::config::tests::test_config;
    use crate::saml::SamaelEngine;
    use crate::session::MemorySession;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<AuthenticatedEvent>>,
    }

    impl AuthenticationListener for RecordingListener {
        fn on_authenticated(&self, event: &AuthenticatedEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn engine() -> Arc<dyn SamlEngine> {
        Arc::new(SamaelEngine::new())
    }

    #[test]
    fn test_default_config_selects_header_adapter() {
        let manager = IdentityManager::from_config(&AuthConfig::default(), engine()).unwrap();
        assert!(matches!(manager.adapter(), Adapter::HeaderBased(_)));
        assert_eq!(manager.metadata().unwrap(), None);
    }

    #[test]
    fn test_saml_config_selects_saml_adapter() {
        let config = AuthConfig {
            identity_manager: IdentityManagerKind::Saml,
            saml: test_config(),
            ..Default::default()
        };
        let manager = IdentityManager::from_config(&config, engine()).unwrap();
        assert!(matches!(manager.adapter(), Adapter::Saml(_)));
        assert_eq!(manager.slo_url("/bye").unwrap(), "/bye");
        assert!(manager.metadata().unwrap().is_some());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AuthConfig {
            identity_manager: IdentityManagerKind::Saml,
            ..Default::default()
        };
        let result = IdentityManager::from_config(&config, engine());
        assert!(matches!(result, Err(IdentityError::Configuration(_))));
    }

    #[test]
    fn test_listeners_receive_event_on_store() {
        let listener = Arc::new(RecordingListener::default());
        let manager = IdentityManager::from_config(&AuthConfig::default(), engine())
            .unwrap()
            .with_listener(listener.clone());
        let session = MemorySession::new();

        let request = AuthRequest::new().with_var("REMOTE_USER", "netid");
        manager.store_identity(&request, &session).unwrap();

        let events = listener.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].remote_user, "netid");
    }

    #[test]
    fn test_no_event_on_failure() {
        let listener = Arc::new(RecordingListener::default());
        let manager = IdentityManager::from_config(&AuthConfig::default(), engine())
            .unwrap()
            .with_listener(listener.clone());
        let session = MemorySession::new();

        assert!(manager.store_identity(&AuthRequest::new(), &session).is_err());
        assert!(listener.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reads_do_not_emit_events() {
        let listener = Arc::new(RecordingListener::default());
        let manager = IdentityManager::from_config(&AuthConfig::default(), engine())
            .unwrap()
            .with_listener(listener.clone());
        let session = MemorySession::new();
        manager
            .store_identity(&AuthRequest::new().with_var("REMOTE_USER", "netid"), &session)
            .unwrap();

        assert!(manager.has_identity(&session).unwrap());
        assert!(manager.get_identity(&session).unwrap().is_some());
        assert_eq!(listener.events.lock().unwrap().len(), 1);
    }
}
