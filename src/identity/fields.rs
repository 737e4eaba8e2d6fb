//! Attribute field map: canonical friendly names and their OID keys.

use serde::{Deserialize, Serialize};

use super::Claims;

pub const EDU_PERSON_PRIMARY_AFFILIATION: &str = "eduPersonPrimaryAffiliation";
pub const CN: &str = "cn";
pub const EDU_PERSON_PRINCIPAL_NAME: &str = "eduPersonPrincipalName";
pub const GIVEN_NAME: &str = "givenName";
pub const SN: &str = "sn";
pub const DISPLAY_NAME: &str = "displayName";
pub const UID: &str = "uid";
pub const EDU_PERSON_ORG_DN: &str = "eduPersonOrgDN";
pub const MAIL: &str = "mail";
pub const EDU_PERSON_AFFILIATION: &str = "eduPersonAffiliation";
pub const EDU_PERSON_SCOPED_AFFILIATION: &str = "eduPersonScopedAffiliation";
pub const EDU_PERSON_ENTITLEMENT: &str = "eduPersonEntitlement";
pub const TITLE: &str = "title";

/// Shibboleth fields generally available from either the CIT or Weill IdPs.
pub const SAML_FIELDS: &[(&str, &str)] = &[
    // staff|student|...
    (EDU_PERSON_PRIMARY_AFFILIATION, "urn:oid:1.3.6.1.4.1.5923.1.1.1.5"),
    // John R. Doe [CIT only]
    (CN, "urn:oid:2.5.4.3"),
    // netid@cornell.edu
    (EDU_PERSON_PRINCIPAL_NAME, "urn:oid:1.3.6.1.4.1.5923.1.1.1.6"),
    (GIVEN_NAME, "urn:oid:2.5.4.42"),
    (SN, "urn:oid:2.5.4.4"),
    (DISPLAY_NAME, "urn:oid:2.16.840.1.113730.3.1.241"),
    // netid
    (UID, "urn:oid:0.9.2342.19200300.100.1.1"),
    // o=Cornell University,c=US [CIT only]
    (EDU_PERSON_ORG_DN, "urn:oid:1.3.6.1.4.1.5923.1.1.1.3"),
    (MAIL, "urn:oid:0.9.2342.19200300.100.1.3"),
    // [employee, staff, ...] [CIT only]
    (EDU_PERSON_AFFILIATION, "urn:oid:1.3.6.1.4.1.5923.1.1.1.1"),
    // [employee@cornell.edu, staff@cornell.edu, ...]
    (EDU_PERSON_SCOPED_AFFILIATION, "urn:oid:1.3.6.1.4.1.5923.1.1.1.9"),
    // [CIT only]
    (EDU_PERSON_ENTITLEMENT, "urn:oid:1.3.6.1.4.1.5923.1.1.1.7"),
    // Web Developer [Weill only]
    (TITLE, "urn:oid:2.5.4.12"),
];

/// One canonical field and the alternate key it may arrive under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeField {
    pub name: String,
    pub oid: String,
}

/// Ordered table of canonical fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    fields: Vec<AttributeField>,
}

impl FieldMap {
    /// The reference deployment table.
    pub fn standard() -> Self {
        Self {
            fields: SAML_FIELDS
                .iter()
                .map(|(name, oid)| AttributeField {
                    name: name.to_string(),
                    oid: oid.to_string(),
                })
                .collect(),
        }
    }

    /// Add or replace a field. Replacing keeps the field's original position.
    pub fn with_field(mut self, name: impl Into<String>, oid: impl Into<String>) -> Self {
        self.insert(AttributeField {
            name: name.into(),
            oid: oid.into(),
        });
        self
    }

    /// Extend the table with deployment-specific fields.
    pub fn extend<I: IntoIterator<Item = AttributeField>>(&mut self, fields: I) {
        for field in fields {
            self.insert(field);
        }
    }

    fn insert(&mut self, field: AttributeField) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => existing.oid = field.oid,
            None => self.fields.push(field),
        }
    }

    pub fn fields(&self) -> &[AttributeField] {
        &self.fields
    }

    /// OID key for a canonical field, if the field is known.
    pub fn oid(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.oid.as_str())
    }

    /// Resolve a canonical field from raw claims.
    ///
    /// The friendly-name key wins; the OID key is consulted only when the
    /// friendly name is absent. Only the first value is returned.
    pub fn resolve<'a>(&self, claims: &'a Claims, name: &str) -> Option<&'a str> {
        let values = match claims.get(name) {
            Some(values) => Some(values),
            None => self.oid(name).and_then(|oid| claims.get(oid)),
        };
        values.and_then(|v| v.first()).map(|s| s.as_str())
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        Self::standard()
    }
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
    fn test_standard_table_is_ordered() {
        let map = FieldMap::standard();
        assert_eq!(map.fields().len(), 13);
        assert_eq!(map.fields()[0].name, EDU_PERSON_PRIMARY_AFFILIATION);
        assert_eq!(map.fields()[12].name, TITLE);
        assert_eq!(map.oid(UID), Some("urn:oid:0.9.2342.19200300.100.1.1"));
        assert_eq!(map.oid("unknown"), None);
    }

    #[test]
    fn test_friendly_name_wins_over_oid() {
        let map = FieldMap::standard();
        let c = claims(vec![
            ("mail", vec!["friendly@cornell.edu"]),
            ("urn:oid:0.9.2342.19200300.100.1.3", vec!["oid@cornell.edu"]),
        ]);
        assert_eq!(map.resolve(&c, MAIL), Some("friendly@cornell.edu"));
    }

    #[test]
    fn test_oid_fallback_and_first_value() {
        let map = FieldMap::standard();
        let c = claims(vec![(
            "urn:oid:1.3.6.1.4.1.5923.1.1.1.1",
            vec!["employee", "staff"],
        )]);
        assert_eq!(map.resolve(&c, EDU_PERSON_AFFILIATION), Some("employee"));
        assert_eq!(map.resolve(&c, TITLE), None);
    }

    #[test]
    fn test_empty_value_list_is_unset() {
        let map = FieldMap::standard();
        let c = claims(vec![("cn", vec![])]);
        assert_eq!(map.resolve(&c, CN), None);
    }

    #[test]
    fn test_extend_adds_and_replaces() {
        let mut map = FieldMap::standard().with_field("isMemberOf", "urn:oid:1.3.6.1.4.1.5923.1.5.1.1");
        map.extend([AttributeField {
            name: TITLE.to_string(),
            oid: "urn:oid:9.9.9".to_string(),
        }]);

        assert_eq!(map.fields().len(), 14);
        assert_eq!(map.oid(TITLE), Some("urn:oid:9.9.9"));
        assert_eq!(map.fields()[12].name, TITLE);
        assert_eq!(map.oid("isMemberOf"), Some("urn:oid:1.3.6.1.4.1.5923.1.5.1.1"));
    }
}
