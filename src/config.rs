//! Top-level identity configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{IdentityError, Result};
use crate::identity::{AttributeField, ClassifierRule, FieldMap, IdpClassifier, Normalizer};
use crate::saml::{SamlConfig, SamlConfigJson};
use crate::shib::DEFAULT_REMOTE_USER_VARIABLE;

/// Which adapter is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdentityManagerKind {
    /// Reverse proxy sets a user variable (Apache mod_shib).
    #[default]
    #[serde(rename = "apache-shib")]
    HeaderBased,
    /// In-process SAML Service Provider.
    #[serde(rename = "php-saml")]
    Saml,
}

impl std::str::FromStr for IdentityManagerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "apache-shib" => Ok(IdentityManagerKind::HeaderBased),
            "php-saml" | "saml" => Ok(IdentityManagerKind::Saml),
            other => Err(format!(
                "unknown identity manager '{}', expected apache-shib or php-saml",
                other
            )),
        }
    }
}

/// Identity configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub identity_manager: IdentityManagerKind,

    /// Server variable the proxy writes the authenticated user into.
    #[serde(default = "default_remote_user_variable")]
    pub remote_user_variable: String,

    #[serde(default)]
    pub saml: SamlConfig,

    /// Deployment-specific attributes appended to the standard field map.
    #[serde(default)]
    pub extra_fields: Vec<AttributeField>,

    /// Classification rules checked before the standard ones.
    #[serde(default)]
    pub classifier_rules: Vec<ClassifierRule>,
}

fn default_remote_user_variable() -> String {
    DEFAULT_REMOTE_USER_VARIABLE.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity_manager: IdentityManagerKind::default(),
            remote_user_variable: default_remote_user_variable(),
            saml: SamlConfig::default(),
            extra_fields: Vec::new(),
            classifier_rules: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Load from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IdentityError::Configuration(format!("Failed to read {:?}: {}", path, e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| IdentityError::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Check the settings of the active adapter.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.extra_fields.iter().any(|f| f.name.is_empty()) {
            return Err("extra_fields entries need a name".to_string());
        }
        if self.classifier_rules.iter().any(|r| r.pattern.is_empty()) {
            return Err("classifier_rules entries need a pattern".to_string());
        }

        match self.identity_manager {
            IdentityManagerKind::HeaderBased => {
                if self.remote_user_variable.trim().is_empty() {
                    return Err("remote_user_variable is required".to_string());
                }
                Ok(())
            }
            IdentityManagerKind::Saml => self.saml.validate(),
        }
    }

    pub fn field_map(&self) -> FieldMap {
        let mut fields = FieldMap::standard();
        fields.extend(self.extra_fields.iter().cloned());
        fields
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.field_map())
    }

    pub fn classifier(&self) -> IdpClassifier {
        IdpClassifier::with_rules(self.classifier_rules.clone())
    }
}

/// Partial configuration used to overlay a base configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct AuthConfigJson {
    pub identity_manager: Option<IdentityManagerKind>,
    pub remote_user_variable: Option<String>,
    pub saml: Option<SamlConfigJson>,
    pub extra_fields: Option<Vec<AttributeField>>,
    pub classifier_rules: Option<Vec<ClassifierRule>>,
}

impl AuthConfigJson {
    /// Merge JSON config into existing config.
    pub fn apply_to(&self, config: &mut AuthConfig) {
        if let Some(kind) = self.identity_manager {
            config.identity_manager = kind;
        }
        if let Some(ref variable) = self.remote_user_variable {
            config.remote_user_variable = variable.clone();
        }
        if let Some(ref saml) = self.saml {
            saml.apply_to(&mut config.saml);
        }
        if let Some(ref fields) = self.extra_fields {
            config.extra_fields = fields.clone();
        }
        if let Some(ref rules) = self.classifier_rules {
            config.classifier_rules = rules.clone();
        }
    }
}
