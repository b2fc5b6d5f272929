//! Claims: signed mutation events against a permanode.

use crate::address::BlobRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Claim type that replaces an attribute's values.
pub const SET_ATTRIBUTE: &str = "set-attribute";
/// Claim type that appends one value to an attribute.
pub const ADD_ATTRIBUTE: &str = "add-attribute";
/// Claim type that removes an attribute, or one of its values.
pub const DEL_ATTRIBUTE: &str = "del-attribute";

/// One mutation event against a permanode, as reported by the index.
///
/// Every field is optional because the index omits what does not apply to
/// a claim type. `value` keeps its decoded JSON type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Ref of the claim blob itself.
    #[serde(rename = "blobref", default)]
    pub blob_ref: Option<BlobRef>,
    /// Ref of the signer's public key.
    #[serde(default)]
    pub signer: Option<BlobRef>,
    /// The permanode this claim mutates.
    #[serde(default)]
    pub permanode: Option<BlobRef>,
    /// Claim type, e.g. `set-attribute`.
    #[serde(rename = "type", default)]
    pub claim_type: Option<String>,
    /// Target blob for claims that point somewhere.
    #[serde(default)]
    pub target: Option<BlobRef>,
    /// Attribute name.
    #[serde(default)]
    pub attr: Option<String>,
    /// Attribute value.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    /// When the claim was made.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl Claim {
    /// Value rendered as text: strings verbatim, other JSON compactly.
    #[must_use]
    pub fn value_text(&self) -> Option<String> {
        match self.value.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<claim {}", self.claim_type.as_deref().unwrap_or("?"))?;
        if let Some(attr) = &self.attr {
            write!(f, " {attr}:")?;
        }
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        if let Some(target) = &self.target {
            write!(f, " {target}")?;
        }
        write!(f, ">")
    }
}

/// Sort claims chronologically; undated claims sort first. Stable.
pub fn sort_claims_by_date(claims: &mut [Claim]) {
    claims.sort_by_key(|c| c.date);
}

/// Attribute state of a permanode, folded from its claims.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermanodeState {
    attrs: BTreeMap<String, Vec<String>>,
    modified: Option<DateTime<Utc>>,
}

impl PermanodeState {
    /// Fold `claims` in date order regardless of the order given.
    #[must_use]
    pub fn from_claims(claims: &[Claim]) -> Self {
        let mut ordered: Vec<&Claim> = claims.iter().collect();
        ordered.sort_by_key(|c| c.date);

        let mut state = Self::default();
        for claim in ordered {
            state.apply(claim);
        }
        state
    }

    /// Apply a single claim. Claims that are not attribute mutations are ignored.
    pub fn apply(&mut self, claim: &Claim) {
        let Some(attr) = &claim.attr else {
            return;
        };
        let value = claim.value_text();

        match claim.claim_type.as_deref() {
            Some(SET_ATTRIBUTE) => {
                self.attrs.insert(attr.clone(), value.into_iter().collect());
            }
            Some(ADD_ATTRIBUTE) => {
                if let Some(value) = value {
                    self.attrs.entry(attr.clone()).or_default().push(value);
                }
            }
            Some(DEL_ATTRIBUTE) => match value {
                None => {
                    self.attrs.remove(attr);
                }
                Some(value) => {
                    if let Some(values) = self.attrs.get_mut(attr) {
                        values.retain(|v| *v != value);
                        if values.is_empty() {
                            self.attrs.remove(attr);
                        }
                    }
                }
            },
            _ => return,
        }

        if claim.date > self.modified {
            self.modified = claim.date;
        }
    }

    /// First value of an attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name)?.first().map(String::as_str)
    }

    /// All values of an attribute.
    #[must_use]
    pub fn attr_values(&self, name: &str) -> &[String] {
        self.attrs.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every attribute and its values.
    #[must_use]
    pub fn attrs(&self) -> &BTreeMap<String, Vec<String>> {
        &self.attrs
    }

    /// Date of the latest applied claim.
    #[must_use]
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }
}
