//! Maps raw provider claims onto the canonical identity record.

use tracing::debug;

use super::classify::OrgTag;
use super::fields::{
    FieldMap, CN, DISPLAY_NAME, EDU_PERSON_PRINCIPAL_NAME, GIVEN_NAME, MAIL, SN, UID,
};
use super::remote::{CanonicalIdentity, IdentityFields};
use super::Claims;

/// Builds [`CanonicalIdentity`] records from raw claims.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    fields: FieldMap,
}

impl Normalizer {
    pub fn new(fields: FieldMap) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Total: missing fields stay unset, a missing uid becomes "".
    pub fn normalize(&self, issuer: OrgTag, raw_claims: Claims) -> CanonicalIdentity {
        let get = |name: &str| self.fields.resolve(&raw_claims, name).map(String::from);

        let unique_id = get(UID).unwrap_or_default();
        let fields = IdentityFields {
            common_name: get(CN),
            given_name: get(GIVEN_NAME),
            surname: get(SN),
            display_name: get(DISPLAY_NAME),
            principal_name: get(EDU_PERSON_PRINCIPAL_NAME),
            email: get(MAIL),
        };

        debug!(
            uid = %unique_id,
            issuer = %issuer,
            claims = raw_claims.len(),
            "Normalized identity claims"
        );

        CanonicalIdentity::new(issuer, unique_id, raw_claims, fields)
    }
}

/// Normalize with the reference field table.
pub fn normalize(issuer: OrgTag, raw_claims: Claims) -> CanonicalIdentity {
    Normalizer::default().normalize(issuer, raw_claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(pairs: Vec<(&str, Vec<&str>)>) -> Claims {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
            .collect()
    }

    #[test]
    fn test_friendly_names() {
        let identity = normalize(
            OrgTag::Primary,
            claims(vec![("uid", vec!["netid"]), ("mail", vec!["netid@cornell.edu"])]),
        );
        assert_eq!(identity.id(), "netid");
        assert_eq!(identity.email(), "netid@cornell.edu");
        assert!(identity.is_primary_org());
    }

    #[test]
    fn test_name_precedence_from_claims() {
        let identity = normalize(
            OrgTag::Primary,
            claims(vec![("uid", vec!["netid"]), ("displayName", vec!["Test User"])]),
        );
        assert_eq!(identity.name(), "Test User");

        let identity = normalize(
            OrgTag::Primary,
            claims(vec![("uid", vec!["netid"]), ("cn", vec!["Test User"])]),
        );
        assert_eq!(identity.name(), "Test User");

        let identity = normalize(
            OrgTag::Primary,
            claims(vec![
                ("uid", vec!["netid"]),
                ("givenName", vec!["Test"]),
                ("sn", vec!["User"]),
            ]),
        );
        assert_eq!(identity.name(), "Test User");
    }

    #[test]
    fn test_oid_only_claims() {
        let raw = claims(vec![
            ("urn:oid:2.5.4.3", vec!["Test User"]),
            ("urn:oid:1.3.6.1.4.1.5923.1.1.1.6", vec!["netid@cornell.edu"]),
            ("urn:oid:0.9.2342.19200300.100.1.1", vec!["netid"]),
        ]);
        let identity = normalize(OrgTag::Primary, raw.clone());

        assert_eq!(identity.raw_claims(), &raw);
        assert_eq!(identity.common_name(), Some("Test User"));
        assert_eq!(identity.principal_name(), Some("netid@cornell.edu"));
        assert_eq!(identity.id(), "netid");
        assert_eq!(identity.name(), "Test User");
        assert_eq!(identity.email(), "netid@cornell.edu");
    }

    #[test]
    fn test_friendly_name_beats_oid_per_field() {
        let identity = normalize(
            OrgTag::Affiliate,
            claims(vec![
                ("displayName", vec!["Friendly"]),
                ("urn:oid:2.16.840.1.113730.3.1.241", vec!["Oid"]),
                ("urn:oid:0.9.2342.19200300.100.1.1", vec!["cwid"]),
            ]),
        );
        assert_eq!(identity.display_name(), Some("Friendly"));
        assert_eq!(identity.id(), "cwid");
        assert!(identity.is_affiliate_org());
    }

    #[test]
    fn test_missing_fields_are_unset() {
        let identity = normalize(OrgTag::Primary, Claims::new());
        assert_eq!(identity.id(), "");
        assert_eq!(identity.common_name(), None);
        assert_eq!(identity.given_name(), None);
        assert_eq!(identity.surname(), None);
        assert_eq!(identity.display_name(), None);
        assert_eq!(identity.principal_name(), None);
        assert_eq!(identity.email(), "");
    }

    #[test]
    fn test_multi_valued_claims_use_first_value() {
        let identity = normalize(
            OrgTag::Primary,
            claims(vec![("mail", vec!["first@cornell.edu", "second@cornell.edu"])]),
        );
        assert_eq!(identity.email(), "first@cornell.edu");
    }

    #[test]
    fn test_custom_field_map_oids() {
        let normalizer = Normalizer::new(FieldMap::standard().with_field(UID, "urn:oid:9.9.9"));
        let identity = normalizer.normalize(
            OrgTag::Primary,
            claims(vec![("urn:oid:9.9.9", vec!["custom"])]),
        );
        assert_eq!(identity.id(), "custom");
    }
}
