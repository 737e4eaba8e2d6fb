//! SAML protocol engine boundary and the built-in samael-backed engine.
//!
//! The identity adapter treats the engine as trusted: it builds requests,
//! verifies and parses responses, and produces SP metadata. Everything the
//! adapter needs comes back through [`ProcessedResponse`].

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use samael::metadata::EntityDescriptor;
use tracing::{debug, warn};

use super::config::{certificate_body, decode_certificate, Credentials, SamlConfig};
use crate::error::{IdentityError, Result};
use crate::identity::Claims;

const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";
const BINDING_HTTP_POST: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST";
const BINDING_HTTP_REDIRECT: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect";

/// Failure inside the engine.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Settings cannot be used by the engine.
    #[error("{0}")]
    Settings(String),

    /// The message could not be decoded, parsed or verified.
    #[error("{0}")]
    Protocol(String),
}

impl From<EngineError> for IdentityError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Settings(msg) => IdentityError::Configuration(msg),
            EngineError::Protocol(msg) => IdentityError::Protocol(msg),
        }
    }
}

/// Validated settings handed to the engine.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: SamlConfig,
    pub credentials: Credentials,
}

impl Settings {
    /// Validate the configuration and resolve key material.
    pub fn load(config: &SamlConfig) -> Result<Self> {
        let credentials = config.resolve()?;
        Ok(Self {
            config: config.clone(),
            credentials,
        })
    }
}

/// Outcome of processing an IdP response.
#[derive(Debug, Clone, Default)]
pub struct ProcessedResponse {
    /// The response asserted a successful login.
    pub authenticated: bool,
    /// Semantic validation errors; non-empty means rejected.
    pub errors: Vec<String>,
    /// Attributes keyed by their `Name` (usually the OID).
    pub attributes: Claims,
    /// Attributes keyed by their `FriendlyName`, when the IdP sent one.
    pub attributes_with_friendly_name: Claims,
    pub name_id: Option<String>,
    pub session_index: Option<String>,
    pub assertion_id: Option<String>,
    /// Issuer as asserted in the response (informational).
    pub issuer: Option<String>,
}

/// The protocol engine contract.
pub trait SamlEngine: Send + Sync {
    /// Build an AuthnRequest encoded for the HTTP-Redirect binding
    /// (deflated, base64; not yet URL-encoded).
    fn authn_request(&self, settings: &Settings) -> std::result::Result<String, EngineError>;

    /// Verify and parse a base64-encoded SAML Response.
    fn process_response(
        &self,
        settings: &Settings,
        saml_response: &str,
    ) -> std::result::Result<ProcessedResponse, EngineError>;

    /// Produce SP metadata XML.
    fn sp_metadata(&self, settings: &Settings) -> std::result::Result<String, EngineError>;

    /// Check SP metadata; returns the list of problems found.
    fn validate_metadata(&self, metadata: &str) -> Vec<String>;
}

/// Engine backed by the `samael` schema types.
///
/// Checks the XML signature, status, destination, issuer, time conditions,
/// audience and assertion replay. Signatures are verified with xmlsec when
/// the `xmlsec` feature is enabled; without it every signed response is
/// rejected, so only `allow_unsigned_assertions` deployments can log in.
#[derive(Debug, Default)]
pub struct SamaelEngine {
    /// Assertion IDs already consumed, with their expiry.
    used_assertions: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl SamaelEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_replay(&self, assertion_id: &str, expires_at: DateTime<Utc>) -> std::result::Result<bool, EngineError> {
        let now = Utc::now();
        let mut used = self
            .used_assertions
            .write()
            .map_err(|_| EngineError::Protocol("Assertion cache lock poisoned".to_string()))?;
        used.retain(|_, expiry| *expiry > now);

        if used.contains_key(assertion_id) {
            return Ok(true);
        }
        used.insert(assertion_id.to_string(), expires_at);
        Ok(false)
    }
}

impl SamlEngine for SamaelEngine {
    fn authn_request(&self, settings: &Settings) -> std::result::Result<String, EngineError> {
        let config = &settings.config;
        let request_id = format!("_id{}", uuid::Uuid::new_v4());
        let issue_instant = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let authn_request = format!(
            r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
                xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
                ID="{}"
                Version="2.0"
                IssueInstant="{}"
                Destination="{}"
                ProtocolBinding="{}"
                AssertionConsumerServiceURL="{}">
                <saml:Issuer>{}</saml:Issuer>
                <samlp:NameIDPolicy Format="{}" AllowCreate="true"/>
            </samlp:AuthnRequest>"#,
            request_id,
            issue_instant,
            xml_escape(&config.idp_sso_url),
            BINDING_HTTP_POST,
            xml_escape(&config.acs_url),
            xml_escape(&config.sp_entity_id),
            xml_escape(&config.name_id_format),
        );

        debug!(request_id = %request_id, "Built SAML AuthnRequest");
        deflate_and_encode(&authn_request)
    }

    fn process_response(
        &self,
        settings: &Settings,
        saml_response: &str,
    ) -> std::result::Result<ProcessedResponse, EngineError> {
        let config = &settings.config;

        let compact: String = saml_response.chars().filter(|c| !c.is_whitespace()).collect();
        let response_xml = BASE64
            .decode(compact)
            .map_err(|e| EngineError::Protocol(format!("Failed to decode SAML response: {}", e)))?;
        let response_str = String::from_utf8(response_xml)
            .map_err(|_| EngineError::Protocol("SAML response is not valid UTF-8".to_string()))?;

        let response: samael::schema::Response = response_str
            .parse()
            .map_err(|e| EngineError::Protocol(format!("Failed to parse SAML response: {:?}", e)))?;

        let mut processed = ProcessedResponse::default();

        if let Some(ref status) = response.status {
            let status_value = status.status_code.value.as_deref();
            if status_value != Some(STATUS_SUCCESS) {
                let message = status
                    .status_message
                    .as_ref()
                    .and_then(|m| m.value.clone())
                    .unwrap_or_else(|| "Unknown error".to_string());
                processed.errors.push(format!(
                    "The status code of the Response was not Success, was {}: {}",
                    status_value.unwrap_or("unknown"),
                    message
                ));
                return Ok(processed);
            }
        }

        if let Some(ref destination) = response.destination {
            if destination != &config.acs_url {
                processed.errors.push(format!(
                    "The response was received at {} instead of {}",
                    config.acs_url, destination
                ));
            }
        }

        let Some(assertion) = response.assertion.as_ref() else {
            debug!("SAML response contains no assertion");
            return Ok(processed);
        };

        processed.assertion_id = Some(assertion.id.clone());
        processed.issuer = assertion.issuer.value.clone();

        if let Some(ref issuer) = processed.issuer {
            if issuer != &config.idp_entity_id {
                processed
                    .errors
                    .push(format!("Invalid issuer in the Assertion/Response: {}", issuer));
            }
        }

        if !config.allow_unsigned_assertions {
            if response.signature.is_none() && assertion.signature.is_none() {
                processed
                    .errors
                    .push("No Signature found. SAML Response rejected".to_string());
            } else {
                verify_signature(&response_str, &settings.credentials.idp_certificate)
                    .map_err(|e| EngineError::Protocol(format!("Invalid signature: {}", e)))?;
            }
        }

        let now = Utc::now();
        let skew = Duration::seconds(config.clock_skew_secs);
        let mut expires_at = now + Duration::hours(8);

        if let Some(ref conditions) = assertion.conditions {
            if let Some(not_before) = conditions.not_before {
                if now < not_before - skew {
                    processed
                        .errors
                        .push("Could not validate timestamp: not yet valid".to_string());
                }
            }
            if let Some(not_on_or_after) = conditions.not_on_or_after {
                if now >= not_on_or_after + skew {
                    processed
                        .errors
                        .push("Could not validate timestamp: expired".to_string());
                }
                expires_at = not_on_or_after + skew;
            }
            if let Some(ref restrictions) = conditions.audience_restrictions {
                let audiences: Vec<&String> =
                    restrictions.iter().flat_map(|r| r.audience.iter()).collect();
                if !audiences.is_empty() && !audiences.iter().any(|a| **a == config.sp_entity_id) {
                    processed.errors.push(format!(
                        "{} is not a valid audience for this Response",
                        config.sp_entity_id
                    ));
                }
            }
        }

        processed.name_id = assertion
            .subject
            .as_ref()
            .and_then(|s| s.name_id.as_ref())
            .map(|n| n.value.clone());

        processed.session_index = assertion
            .authn_statements
            .as_ref()
            .and_then(|stmts| stmts.first())
            .and_then(|s| s.session_index.clone());

        if let Some(ref attr_statements) = assertion.attribute_statements {
            for attr_statement in attr_statements {
                for attr in &attr_statement.attributes {
                    let values: Vec<String> = attr
                        .values
                        .iter()
                        .filter_map(|v| v.value.clone())
                        .collect();
                    if values.is_empty() {
                        continue;
                    }
                    if let Some(ref name) = attr.name {
                        processed
                            .attributes
                            .entry(name.clone())
                            .or_default()
                            .extend(values.iter().cloned());
                    }
                    if let Some(ref friendly) = attr.friendly_name {
                        processed
                            .attributes_with_friendly_name
                            .entry(friendly.clone())
                            .or_default()
                            .extend(values);
                    }
                }
            }
        }

        // Only otherwise valid assertions are consumed.
        if processed.errors.is_empty() && self.check_replay(&assertion.id, expires_at)? {
            processed
                .errors
                .push(format!("SAML assertion replay detected: {}", assertion.id));
        }

        if !processed.errors.is_empty() {
            warn!(
                errors = processed.errors.len(),
                idp = ?processed.issuer,
                "SAML response failed validation"
            );
            return Ok(processed);
        }

        processed.authenticated = processed.name_id.is_some();
        Ok(processed)
    }

    fn sp_metadata(&self, settings: &Settings) -> std::result::Result<String, EngineError> {
        let config = &settings.config;

        let key_descriptor = match settings.credentials.sp_certificate {
            Some(ref pem) => {
                let body = certificate_body(pem)
                    .map_err(|e| EngineError::Settings(format!("sp certificate: {}", e)))?;
                let key_info = format!(
                    r#"<ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:X509Data><ds:X509Certificate>{}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>"#,
                    body
                );
                format!(
                    "\n        <md:KeyDescriptor use=\"signing\">{}</md:KeyDescriptor>\n        <md:KeyDescriptor use=\"encryption\">{}</md:KeyDescriptor>",
                    key_info, key_info
                )
            }
            None => String::new(),
        };

        let single_logout = match config.sls_url {
            Some(ref url) => format!(
                "\n        <md:SingleLogoutService Binding=\"{}\" Location=\"{}\"/>",
                BINDING_HTTP_REDIRECT,
                xml_escape(url)
            ),
            None => String::new(),
        };

        Ok(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{}">
    <md:SPSSODescriptor AuthnRequestsSigned="false" WantAssertionsSigned="{}" protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">{}{}
        <md:NameIDFormat>{}</md:NameIDFormat>
        <md:AssertionConsumerService Binding="{}" Location="{}" index="1"/>
    </md:SPSSODescriptor>
</md:EntityDescriptor>
"#,
            xml_escape(&config.sp_entity_id),
            !config.allow_unsigned_assertions,
            key_descriptor,
            single_logout,
            xml_escape(&config.name_id_format),
            BINDING_HTTP_POST,
            xml_escape(&config.acs_url),
        ))
    }

    fn validate_metadata(&self, metadata: &str) -> Vec<String> {
        let entity: EntityDescriptor = match samael::metadata::de::from_str(metadata) {
            Ok(entity) => entity,
            Err(e) => return vec![format!("invalid_xml: {}", e)],
        };

        let mut errors = Vec::new();

        match entity.entity_id {
            Some(ref id) if !id.is_empty() => {}
            _ => errors.push("missing_entityID".to_string()),
        }

        if entity.idp_sso_descriptors.as_ref().is_some_and(|d| !d.is_empty()) {
            errors.push("onlySPSSODescriptor_allowed_xml".to_string());
        }

        match entity.sp_sso_descriptors.as_deref() {
            Some([descriptor, ..]) => {
                let has_acs = descriptor
                    .assertion_consumer_services
                    .iter()
                    .any(|acs| !acs.location.is_empty());
                if !has_acs {
                    errors.push("missing_AssertionConsumerService".to_string());
                }
            }
            _ => errors.push("missing_SPSSODescriptor".to_string()),
        }

        errors
    }
}

/// Verify the enveloped XML signature against the IdP certificate.
#[cfg(feature = "xmlsec")]
fn verify_signature(xml: &str, idp_certificate: &str) -> std::result::Result<(), String> {
    let der = decode_certificate(idp_certificate)?;
    samael::crypto::verify_signed_xml(xml, &der, Some("ID")).map_err(|e| format!("{:?}", e))
}

#[cfg(not(feature = "xmlsec"))]
fn verify_signature(_xml: &str, idp_certificate: &str) -> std::result::Result<(), String> {
    decode_certificate(idp_certificate)?;
    Err("signature verification is unavailable (built without xmlsec)".to_string())
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Deflate and base64 encode for SAML redirect binding.
fn deflate_and_encode(xml: &str) -> std::result::Result<String, EngineError> {
    use std::io::Write;

    let mut encoder =
        flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(xml.as_bytes())
        .map_err(|e| EngineError::Protocol(format!("Failed to deflate request: {}", e)))?;
    let compressed = encoder
        .finish()
        .map_err(|e| EngineError::Protocol(format!("Failed to deflate request: {}", e)))?;
    Ok(BASE64.encode(compressed))
}
