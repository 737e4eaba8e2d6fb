//! SAML Service Provider configuration.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use x509_parser::prelude::*;

use crate::error::{IdentityError, Result};

/// IdP certificate file name inside the key directory.
pub const IDP_CERT_FILE: &str = "idp_cert.pem";
/// SP certificate file name inside the key directory.
pub const SP_CERT_FILE: &str = "sp_cert.pem";
/// SP private key file name inside the key directory.
pub const SP_KEY_FILE: &str = "sp_key.pem";

/// SAML SP and IdP settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamlConfig {
    /// SP Entity ID.
    #[serde(default = "default_sp_entity_id")]
    pub sp_entity_id: String,

    /// Assertion Consumer Service URL (where the IdP posts the response).
    #[serde(default = "default_acs_url")]
    pub acs_url: String,

    /// Single Logout Service URL (optional).
    #[serde(default)]
    pub sls_url: Option<String>,

    /// NameID format to request.
    #[serde(default = "default_name_id_format")]
    pub name_id_format: String,

    /// IdP Entity ID. Also used to classify the issuing organization.
    #[serde(default)]
    pub idp_entity_id: String,

    /// IdP single sign-on endpoint (HTTP-Redirect binding).
    #[serde(default)]
    pub idp_sso_url: String,

    /// IdP single logout endpoint.
    #[serde(default)]
    pub idp_slo_url: Option<String>,

    /// IdP signing certificate (PEM or bare base64). Read from
    /// `keys_dir/idp_cert.pem` when unset.
    #[serde(default)]
    pub idp_certificate_pem: Option<String>,

    /// SP certificate (PEM), published in SP metadata.
    #[serde(default)]
    pub sp_certificate_pem: Option<String>,

    /// SP private key (PEM).
    #[serde(default)]
    pub sp_private_key_pem: Option<String>,

    /// Directory holding key material managed by the host.
    #[serde(default = "default_keys_dir")]
    pub keys_dir: PathBuf,

    /// Allow responses without any signature. Not for production.
    #[serde(default)]
    pub allow_unsigned_assertions: bool,

    /// Clock skew tolerance in seconds.
    #[serde(default = "default_clock_skew")]
    pub clock_skew_secs: i64,
}

fn default_sp_entity_id() -> String {
    "https://localhost/sso".to_string()
}

fn default_acs_url() -> String {
    "https://localhost/sso/acs".to_string()
}

fn default_name_id_format() -> String {
    "urn:oasis:names:tc:SAML:2.0:nameid-format:transient".to_string()
}

fn default_keys_dir() -> PathBuf {
    PathBuf::from("storage/app/keys")
}

fn default_clock_skew() -> i64 {
    300 // 5 minutes
}

impl Default for SamlConfig {
    fn default() -> Self {
        Self {
            sp_entity_id: default_sp_entity_id(),
            acs_url: default_acs_url(),
            sls_url: None,
            name_id_format: default_name_id_format(),
            idp_entity_id: String::new(),
            idp_sso_url: String::new(),
            idp_slo_url: None,
            idp_certificate_pem: None,
            sp_certificate_pem: None,
            sp_private_key_pem: None,
            keys_dir: default_keys_dir(),
            allow_unsigned_assertions: false,
            clock_skew_secs: default_clock_skew(),
        }
    }
}

/// PEM material resolved at call time.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub idp_certificate: String,
    pub sp_certificate: Option<String>,
    pub sp_private_key: Option<String>,
}

impl SamlConfig {
    /// Point the IdP settings at a Shibboleth IdP base URL,
    /// e.g. `https://shibidp-test.cit.cornell.edu/idp`.
    pub fn with_idp_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.idp_entity_id = format!("{}/shibboleth", base);
        self.idp_sso_url = format!("{}/profile/SAML2/Redirect/SSO", base);
        self.idp_slo_url = Some(format!("{}/profile/SAML2/Redirect/SLO", base));
        self
    }

    /// Check structural validity of the settings, not including key material.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.sp_entity_id.is_empty() {
            return Err("sp_entity_id is required".to_string());
        }

        if !is_http_url(&self.acs_url) {
            return Err("acs_url must be an absolute http(s) URL".to_string());
        }

        if let Some(ref sls) = self.sls_url {
            if !is_http_url(sls) {
                return Err("sls_url must be an absolute http(s) URL".to_string());
            }
        }

        if self.idp_entity_id.is_empty() {
            return Err("idp_entity_id is required".to_string());
        }

        if !is_http_url(&self.idp_sso_url) {
            return Err("idp_sso_url must be an absolute http(s) URL".to_string());
        }

        if let Some(ref slo) = self.idp_slo_url {
            if !is_http_url(slo) {
                return Err("idp_slo_url must be an absolute http(s) URL".to_string());
            }
        }

        if self.clock_skew_secs < 0 {
            return Err("clock_skew_secs must not be negative".to_string());
        }

        Ok(())
    }

    /// Validate settings and resolve certificates, failing on anything
    /// missing or malformed.
    pub fn resolve(&self) -> Result<Credentials> {
        self.validate().map_err(IdentityError::Configuration)?;

        let idp_certificate = match self.idp_certificate_pem {
            Some(ref pem) => pem.clone(),
            None => read_key_file(&self.keys_dir, IDP_CERT_FILE)?.ok_or_else(|| {
                IdentityError::Configuration("idp certificate is required".to_string())
            })?,
        };
        check_certificate(&idp_certificate)
            .map_err(|e| IdentityError::Configuration(format!("idp certificate: {}", e)))?;

        let sp_certificate = match self.sp_certificate_pem {
            Some(ref pem) => Some(pem.clone()),
            None => read_key_file(&self.keys_dir, SP_CERT_FILE)?,
        };
        if let Some(ref pem) = sp_certificate {
            check_certificate(pem)
                .map_err(|e| IdentityError::Configuration(format!("sp certificate: {}", e)))?;
        }

        let sp_private_key = match self.sp_private_key_pem {
            Some(ref pem) => Some(pem.clone()),
            None => read_key_file(&self.keys_dir, SP_KEY_FILE)?,
        };
        if let Some(ref pem) = sp_private_key {
            if !pem.contains("PRIVATE KEY-----") {
                return Err(IdentityError::Configuration(
                    "sp private key is not PEM encoded".to_string(),
                ));
            }
        }

        Ok(Credentials {
            idp_certificate,
            sp_certificate,
            sp_private_key,
        })
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/'))
}

fn read_key_file(dir: &Path, name: &str) -> Result<Option<String>> {
    let path = dir.join(name);
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(&path)
        .map(Some)
        .map_err(|e| IdentityError::Configuration(format!("Failed to read {:?}: {}", path, e)))
}

/// Decode a certificate given as PEM or as bare base64 DER.
pub fn decode_certificate(data: &str) -> std::result::Result<Vec<u8>, String> {
    let data = data.trim();
    let start_marker = "-----BEGIN CERTIFICATE-----";
    let end_marker = "-----END CERTIFICATE-----";

    let body = if data.contains(start_marker) {
        let start = data
            .find(start_marker)
            .ok_or_else(|| "missing BEGIN marker".to_string())?;
        let end = data
            .find(end_marker)
            .ok_or_else(|| "missing END marker".to_string())?;
        if end < start {
            return Err("END marker before BEGIN marker".to_string());
        }
        &data[start + start_marker.len()..end]
    } else {
        data
    };

    let base64_content: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if base64_content.is_empty() {
        return Err("empty certificate".to_string());
    }

    BASE64
        .decode(&base64_content)
        .map_err(|e| format!("invalid base64: {}", e))
}

/// Base64 DER body of a certificate, as embedded in `<ds:X509Certificate>`.
pub fn certificate_body(data: &str) -> std::result::Result<String, String> {
    decode_certificate(data).map(|der| BASE64.encode(der))
}

fn check_certificate(data: &str) -> std::result::Result<(), String> {
    let der = decode_certificate(data)?;
    X509Certificate::from_der(&der)
        .map(|_| ())
        .map_err(|e| format!("invalid X.509 certificate: {:?}", e))
}

/// Partial settings used to overlay a base configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct SamlConfigJson {
    pub sp_entity_id: Option<String>,
    pub acs_url: Option<String>,
    pub sls_url: Option<String>,
    pub name_id_format: Option<String>,
    /// Shibboleth IdP base URL; expands into entity id and endpoints.
    pub idp_base_url: Option<String>,
    pub idp_entity_id: Option<String>,
    pub idp_sso_url: Option<String>,
    pub idp_slo_url: Option<String>,
    pub idp_certificate_pem: Option<String>,
    pub sp_certificate_pem: Option<String>,
    pub sp_private_key_pem: Option<String>,
    pub keys_dir: Option<PathBuf>,
    pub allow_unsigned_assertions: Option<bool>,
    pub clock_skew_secs: Option<i64>,
}

impl SamlConfigJson {
    /// Merge JSON config into existing config. Explicit endpoints win over
    /// ones derived from `idp-base-url`.
    pub fn apply_to(&self, config: &mut SamlConfig) {
        if let Some(ref id) = self.sp_entity_id {
            config.sp_entity_id = id.clone();
        }
        if let Some(ref url) = self.acs_url {
            config.acs_url = url.clone();
        }
        if let Some(ref url) = self.sls_url {
            config.sls_url = Some(url.clone());
        }
        if let Some(ref format) = self.name_id_format {
            config.name_id_format = format.clone();
        }
        if let Some(ref base) = self.idp_base_url {
            *config = std::mem::take(config).with_idp_base_url(base);
        }
        if let Some(ref id) = self.idp_entity_id {
            config.idp_entity_id = id.clone();
        }
        if let Some(ref url) = self.idp_sso_url {
            config.idp_sso_url = url.clone();
        }
        if let Some(ref url) = self.idp_slo_url {
            config.idp_slo_url = Some(url.clone());
        }
        if let Some(ref pem) = self.idp_certificate_pem {
            config.idp_certificate_pem = Some(pem.clone());
        }
        if let Some(ref pem) = self.sp_certificate_pem {
            config.sp_certificate_pem = Some(pem.clone());
        }
        if let Some(ref pem) = self.sp_private_key_pem {
            config.sp_private_key_pem = Some(pem.clone());
        }
        if let Some(ref dir) = self.keys_dir {
            config.keys_dir = dir.clone();
        }
        if let Some(allow) = self.allow_unsigned_assertions {
            config.allow_unsigned_assertions = allow;
        }
        if let Some(skew) = self.clock_skew_secs {
            config.clock_skew_secs = skew;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const IDP_CERT: &str = include_str!("../../tests/fixtures/idp_cert.pem");
    pub(crate) const SP_CERT: &str = include_str!("../../tests/fixtures/sp_cert.pem");
    pub(crate) const SP_KEY: &str = include_str!("../../tests/fixtures/sp_key.pem");

    pub(crate) fn test_config() -> SamlConfig {
        SamlConfig {
            idp_certificate_pem: Some(IDP_CERT.to_string()),
            sp_certificate_pem: Some(SP_CERT.to_string()),
            sp_private_key_pem: Some(SP_KEY.to_string()),
            keys_dir: PathBuf::from("does/not/exist"),
            ..SamlConfig::default().with_idp_base_url("https://shibidp-test.cit.cornell.edu/idp")
        }
    }

    #[test]
    fn test_default_config() {
        let config = SamlConfig::default();
        assert_eq!(config.sp_entity_id, "https://localhost/sso");
        assert_eq!(config.keys_dir, PathBuf::from("storage/app/keys"));
        assert_eq!(config.clock_skew_secs, 300);
        assert!(!config.allow_unsigned_assertions);
        // no IdP configured yet
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_idp_base_url_expansion() {
        let config = SamlConfig::default().with_idp_base_url("https://login-test.weill.cornell.edu/idp/");
        assert_eq!(
            config.idp_entity_id,
            "https://login-test.weill.cornell.edu/idp/shibboleth"
        );
        assert_eq!(
            config.idp_sso_url,
            "https://login-test.weill.cornell.edu/idp/profile/SAML2/Redirect/SSO"
        );
        assert_eq!(
            config.idp_slo_url.as_deref(),
            Some("https://login-test.weill.cornell.edu/idp/profile/SAML2/Redirect/SLO")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = test_config();
        assert!(config.validate().is_ok());

        config.sp_entity_id = String::new();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.acs_url = "/sso/acs".to_string();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.idp_entity_id = String::new();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.idp_sso_url = "https://".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_inline_credentials() {
        let credentials = test_config().resolve().unwrap();
        assert!(credentials.idp_certificate.contains("BEGIN CERTIFICATE"));
        assert!(credentials.sp_certificate.is_some());
        assert!(credentials.sp_private_key.is_some());
    }

    #[test]
    fn test_resolve_rejects_bad_certificate() {
        let mut config = test_config();
        config.idp_certificate_pem = Some("TEST".to_string());
        assert!(matches!(config.resolve(), Err(IdentityError::Configuration(_))));

        let mut config = test_config();
        config.idp_certificate_pem = None;
        assert!(matches!(config.resolve(), Err(IdentityError::Configuration(_))));
    }

    #[test]
    fn test_resolve_from_keys_dir() {
        let mut config = test_config();
        config.idp_certificate_pem = None;
        config.sp_certificate_pem = None;
        config.sp_private_key_pem = None;
        config.keys_dir = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"));

        let credentials = config.resolve().unwrap();
        assert_eq!(credentials.idp_certificate, IDP_CERT);
        assert_eq!(credentials.sp_certificate.as_deref(), Some(SP_CERT));
    }

    #[test]
    fn test_bare_base64_certificate() {
        let body = certificate_body(IDP_CERT).unwrap();
        assert!(!body.contains("BEGIN"));
        assert_eq!(decode_certificate(&body).unwrap(), decode_certificate(IDP_CERT).unwrap());
    }

    #[test]
    fn test_json_overlay() {
        let json: SamlConfigJson = serde_json::from_str(
            r#"{
                "sp-entity-id": "https://test.example.com/sso",
                "idp-base-url": "https://login-test.weill.cornell.edu/idp",
                "idp-sso-url": "https://login-test.weill.cornell.edu/custom/sso",
                "clock-skew-secs": 60
            }"#,
        )
        .unwrap();

        let mut config = SamlConfig::default();
        json.apply_to(&mut config);

        assert_eq!(config.sp_entity_id, "https://test.example.com/sso");
        assert_eq!(
            config.idp_entity_id,
            "https://login-test.weill.cornell.edu/idp/shibboleth"
        );
        assert_eq!(
            config.idp_sso_url,
            "https://login-test.weill.cornell.edu/custom/sso"
        );
        assert_eq!(config.clock_skew_secs, 60);
    }
}
