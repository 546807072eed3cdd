// src/models/access.rs
//! Value types describing the scope of an access credential.
//!
//! These are the building blocks shared by requests and grants: which
//! resources, which access modes, for which purposes, plus caller-supplied
//! custom fields.

use crate::constants::{ACL_APPEND, ACL_READ, ACL_WRITE};
use crate::error::{AccessError, AccessResult};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A mode of access to a resource.
///
/// Serialized as the ACL vocabulary IRI; the short names are accepted on input.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessMode {
    #[serde(rename = "http://www.w3.org/ns/auth/acl#Read", alias = "Read")]
    Read,
    #[serde(rename = "http://www.w3.org/ns/auth/acl#Write", alias = "Write")]
    Write,
    #[serde(rename = "http://www.w3.org/ns/auth/acl#Append", alias = "Append")]
    Append,
}

impl AccessMode {
    /// The ACL IRI for this mode.
    pub fn iri(&self) -> &'static str {
        match self {
            AccessMode::Read => ACL_READ,
            AccessMode::Write => ACL_WRITE,
            AccessMode::Append => ACL_APPEND,
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessMode::Read => "Read",
            AccessMode::Write => "Write",
            AccessMode::Append => "Append",
        };
        f.write_str(name)
    }
}

impl FromStr for AccessMode {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Read" | ACL_READ => Ok(AccessMode::Read),
            "Write" | ACL_WRITE => Ok(AccessMode::Write),
            "Append" | ACL_APPEND => Ok(AccessMode::Append),
            other => Err(AccessError::shape("access", format!("unknown access mode {other}"))),
        }
    }
}

/// A set of access modes.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct AccessModes(BTreeSet<AccessMode>);

impl AccessModes {
    pub fn new(modes: impl IntoIterator<Item = AccessMode>) -> Self {
        AccessModes(modes.into_iter().collect())
    }

    pub fn contains(&self, mode: AccessMode) -> bool {
        self.0.contains(&mode)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_subset(&self, other: &AccessModes) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = AccessMode> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<AccessMode> for AccessModes {
    fn from_iter<I: IntoIterator<Item = AccessMode>>(iter: I) -> Self {
        AccessModes::new(iter)
    }
}

/// Ordered, de-duplicated resource URIs.
///
/// Duplicates collapse onto their first occurrence. Emptiness is allowed at the
/// type level so that a malformed credential can still be parsed and then
/// rejected with a precise reason.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ResourceSet(Vec<String>);

impl ResourceSet {
    pub fn new<S: Into<String>>(resources: impl IntoIterator<Item = S>) -> Self {
        let mut set: Vec<String> = Vec::new();
        for resource in resources {
            let resource = resource.into();
            if !set.contains(&resource) {
                set.push(resource);
            }
        }
        ResourceSet(set)
    }

    /// Exact, byte-for-byte membership. No prefix or hierarchy matching.
    pub fn contains(&self, resource: &str) -> bool {
        self.0.iter().any(|r| r == resource)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_subset(&self, other: &ResourceSet) -> bool {
        self.iter().all(|r| other.contains(r))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for ResourceSet {
    fn from(resources: Vec<String>) -> Self {
        ResourceSet::new(resources)
    }
}

impl From<ResourceSet> for Vec<String> {
    fn from(set: ResourceSet) -> Self {
        set.0
    }
}

/// Why access is wanted: an unordered set of purpose URIs.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Purpose(BTreeSet<String>);

impl Purpose {
    pub fn new<S: Into<String>>(purposes: impl IntoIterator<Item = S>) -> Self {
        Purpose(purposes.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, purpose: &str) -> bool {
        self.0.contains(purpose)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Literal value of a custom field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum CustomValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl From<bool> for CustomValue {
    fn from(value: bool) -> Self {
        CustomValue::Bool(value)
    }
}

impl From<i64> for CustomValue {
    fn from(value: i64) -> Self {
        CustomValue::Number(value.into())
    }
}

impl From<&str> for CustomValue {
    fn from(value: &str) -> Self {
        CustomValue::String(value.to_string())
    }
}

impl From<String> for CustomValue {
    fn from(value: String) -> Self {
        CustomValue::String(value)
    }
}

/// A caller-supplied `(URI, literal)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomField {
    pub key: String,
    pub value: CustomValue,
}

impl CustomField {
    pub fn new(key: impl Into<String>, value: impl Into<CustomValue>) -> Self {
        CustomField {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Custom fields keyed by URI.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct CustomFields(BTreeMap<String, CustomValue>);

impl CustomFields {
    /// Collects caller-supplied fields.
    ///
    /// # Errors
    /// `InvalidRequestShape` on a key that is not an absolute URI, or on a key
    /// supplied more than once.
    pub fn try_from_fields(fields: impl IntoIterator<Item = CustomField>) -> AccessResult<Self> {
        let mut map = BTreeMap::new();
        for field in fields {
            if Url::parse(&field.key).is_err() {
                return Err(AccessError::shape(
                    "customFields",
                    format!("key {} is not a well-formed URI", field.key),
                ));
            }
            if map.contains_key(&field.key) {
                return Err(AccessError::shape(
                    "customFields",
                    format!("key {} is supplied more than once", field.key),
                ));
            }
            map.insert(field.key, field.value);
        }
        Ok(CustomFields(map))
    }

    pub fn get(&self, key: &str) -> Option<&CustomValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CustomValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keeps the URI-keyed literal members of a parsed consent block.
    pub(crate) fn from_wire(raw: BTreeMap<String, serde_json::Value>) -> Self {
        CustomFields(
            raw.into_iter()
                .filter(|(key, _)| Url::parse(key).is_ok())
                .filter_map(|(key, value)| {
                    serde_json::from_value::<CustomValue>(value)
                        .ok()
                        .map(|value| (key, value))
                })
                .collect(),
        )
    }

    pub(crate) fn to_wire(&self) -> BTreeMap<String, serde_json::Value> {
        self.0
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    CustomValue::Bool(b) => serde_json::Value::Bool(*b),
                    CustomValue::Number(n) => serde_json::Value::Number(n.clone()),
                    CustomValue::String(s) => serde_json::Value::String(s.clone()),
                };
                (key.clone(), value)
            })
            .collect()
    }
}
