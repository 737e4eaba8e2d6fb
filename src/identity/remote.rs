//! The canonical identity record handed to the host application.

use serde::{Deserialize, Serialize};

use super::classify::OrgTag;
use super::fields::FieldMap;
use super::Claims;

/// Normalized, source-independent identity.
///
/// Built once per authentication event and never mutated afterwards; the
/// fields are private and only exposed through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalIdentity {
    issuer: OrgTag,
    unique_id: String,
    raw_claims: Claims,
    common_name: Option<String>,
    given_name: Option<String>,
    surname: Option<String>,
    display_name: Option<String>,
    principal_name: Option<String>,
    email: Option<String>,
}

/// Resolved field values used to construct a [`CanonicalIdentity`].
#[derive(Debug, Clone, Default)]
pub struct IdentityFields {
    pub common_name: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub display_name: Option<String>,
    pub principal_name: Option<String>,
    pub email: Option<String>,
}

impl CanonicalIdentity {
    pub fn new(issuer: OrgTag, unique_id: String, raw_claims: Claims, fields: IdentityFields) -> Self {
        Self {
            issuer,
            unique_id,
            raw_claims,
            common_name: fields.common_name,
            given_name: fields.given_name,
            surname: fields.surname,
            display_name: fields.display_name,
            principal_name: fields.principal_name,
            email: fields.email,
        }
    }

    /// Identity carrying only a user id, as asserted by a trusted proxy.
    pub fn remote_user(unique_id: impl Into<String>) -> Self {
        Self::new(
            OrgTag::default(),
            unique_id.into(),
            Claims::new(),
            IdentityFields::default(),
        )
    }

    pub fn issuer(&self) -> OrgTag {
        self.issuer
    }

    pub fn is_primary_org(&self) -> bool {
        self.issuer == OrgTag::Primary
    }

    pub fn is_affiliate_org(&self) -> bool {
        self.issuer == OrgTag::Affiliate
    }

    /// Stable user identifier (NetID/CWID). Empty when the source had none.
    pub fn id(&self) -> &str {
        &self.unique_id
    }

    pub fn raw_claims(&self) -> &Claims {
        &self.raw_claims
    }

    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    pub fn given_name(&self) -> Option<&str> {
        self.given_name.as_deref()
    }

    pub fn surname(&self) -> Option<&str> {
        self.surname.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn principal_name(&self) -> Option<&str> {
        self.principal_name.as_deref()
    }

    /// `mail`, falling back to the principal name.
    pub fn email(&self) -> &str {
        self.email
            .as_deref()
            .or(self.principal_name.as_deref())
            .unwrap_or_default()
    }

    /// Display name, else common name, else "given surname", else empty.
    pub fn name(&self) -> String {
        if let Some(display_name) = &self.display_name {
            return display_name.clone();
        }
        if let Some(cn) = &self.common_name {
            return cn.clone();
        }
        match (&self.given_name, &self.surname) {
            (Some(given), Some(sn)) => format!("{} {}", given, sn),
            _ => String::new(),
        }
    }

    /// Any mapped field (including ones not promoted onto the record),
    /// resolved from the raw claims with friendly-name precedence.
    pub fn attribute<'a>(&'a self, map: &FieldMap, name: &str) -> Option<&'a str> {
        map.resolve(&self.raw_claims, name)
    }
}
