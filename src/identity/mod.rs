//! Identity normalization: field map, IdP classifier and the canonical record.

pub mod classify;
pub mod fields;
pub mod normalize;
pub mod remote;

use std::collections::HashMap;

/// Raw provider claims: attribute key (friendly name or OID) to values.
pub type Claims = HashMap<String, Vec<String>>;

pub use classify::{classify, ClassifierRule, IdpClassifier, OrgTag};
pub use fields::{AttributeField, FieldMap, SAML_FIELDS};
pub use normalize::{normalize, Normalizer};
pub use remote::{CanonicalIdentity, IdentityFields};
