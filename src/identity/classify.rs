//! IdP classification by entity identifier.

use serde::{Deserialize, Serialize};

/// Organization that issued an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrgTag {
    #[default]
    #[serde(rename = "cit.cornell.edu")]
    Primary,
    #[serde(rename = "weill.cornell.edu")]
    Affiliate,
}

impl OrgTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgTag::Primary => "cit.cornell.edu",
            OrgTag::Affiliate => "weill.cornell.edu",
        }
    }
}

impl std::fmt::Display for OrgTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A substring rule: entity ids containing `pattern` belong to `org`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierRule {
    pub pattern: String,
    pub org: OrgTag,
}

impl ClassifierRule {
    pub fn new(pattern: impl Into<String>, org: OrgTag) -> Self {
        Self {
            pattern: pattern.into(),
            org,
        }
    }
}

/// Ordered rule list; first match wins, otherwise the default tag.
///
/// Matching is case-sensitive substring matching since entity ids differ in
/// path layout between IdP software versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpClassifier {
    rules: Vec<ClassifierRule>,
    default: OrgTag,
}

impl IdpClassifier {
    pub fn new(rules: Vec<ClassifierRule>, default: OrgTag) -> Self {
        Self { rules, default }
    }

    /// Weill entity ids map to the affiliate org, everything else to CIT.
    pub fn standard() -> Self {
        Self::new(
            vec![
                ClassifierRule::new("weill", OrgTag::Affiliate),
                ClassifierRule::new("med.cornell.edu", OrgTag::Affiliate),
            ],
            OrgTag::Primary,
        )
    }

    /// Rules that run before the standard ones.
    pub fn with_rules(mut rules: Vec<ClassifierRule>) -> Self {
        let standard = Self::standard();
        rules.extend(standard.rules);
        Self::new(rules, standard.default)
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    pub fn classify(&self, entity_id: &str) -> OrgTag {
        self.rules
            .iter()
            .find(|rule| entity_id.contains(rule.pattern.as_str()))
            .map(|rule| rule.org)
            .unwrap_or(self.default)
    }
}

impl Default for IdpClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

/// Classify with the reference rule set.
pub fn classify(entity_id: &str) -> OrgTag {
    IdpClassifier::standard().classify(entity_id)
}
