// src/models/credential.rs
//! Access credential data model.
//!
//! Access Requests, Access Grants and Access Denials share one W3C Verifiable
//! Credential envelope and differ by their lifecycle type tag. On the wire they
//! are a single JSON shape; in Rust they are a [`CredentialBody`] tagged variant
//! so that each variant only carries the fields it actually has.
//!
//! Two envelopes exist:
//! - [`AccessPayload`]: unsigned, built locally and submitted to an issuer
//! - [`Credential`]: issued, with `id`, `issuer`, `issuanceDate` and a `proof`

use crate::constants::{
    CREDENTIAL_TYPE_ACCESS_DENIAL, CREDENTIAL_TYPE_ACCESS_GRANT, CREDENTIAL_TYPE_ACCESS_REQUEST,
    GC_CONSENT_STATUS_DENIED, GC_CONSENT_STATUS_EXPLICITLY_GIVEN, GC_CONSENT_STATUS_REQUESTED,
    LIFECYCLE_TYPES,
};
use crate::error::{AccessError, AccessResult};
use crate::models::access::{AccessModes, CustomFields, Purpose, ResourceSet};
use crate::utils::serialization;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle of an access credential.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    #[serde(rename = "SolidAccessRequest")]
    Request,
    #[serde(rename = "SolidAccessGrant")]
    Grant,
    #[serde(rename = "SolidAccessDenial")]
    Denial,
}

impl CredentialKind {
    /// The credential type tag written into `type`.
    pub fn type_tag(&self) -> &'static str {
        match self {
            CredentialKind::Request => CREDENTIAL_TYPE_ACCESS_REQUEST,
            CredentialKind::Grant => CREDENTIAL_TYPE_ACCESS_GRANT,
            CredentialKind::Denial => CREDENTIAL_TYPE_ACCESS_DENIAL,
        }
    }

    /// Determines the lifecycle from a `type` list.
    ///
    /// # Errors
    /// `InvalidCredential` unless exactly one lifecycle tag is present.
    pub fn from_types(types: &[String]) -> AccessResult<Self> {
        let mut found: Vec<&str> = LIFECYCLE_TYPES
            .iter()
            .copied()
            .filter(|tag| types.iter().any(|t| t == tag))
            .collect();
        match (found.pop(), found.is_empty()) {
            (Some(CREDENTIAL_TYPE_ACCESS_REQUEST), true) => Ok(CredentialKind::Request),
            (Some(CREDENTIAL_TYPE_ACCESS_GRANT), true) => Ok(CredentialKind::Grant),
            (Some(CREDENTIAL_TYPE_ACCESS_DENIAL), true) => Ok(CredentialKind::Denial),
            (None, _) => Err(AccessError::InvalidCredential(format!(
                "type {:?} carries none of {:?}",
                types, LIFECYCLE_TYPES
            ))),
            _ => Err(AccessError::InvalidCredential(format!(
                "type {:?} carries more than one lifecycle tag",
                types
            ))),
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// Subject of an Access Request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequestSubject {
    pub requestor: String,
    /// Unknown to the requestor in some flows.
    pub resource_owner: Option<String>,
    pub access: AccessModes,
    pub resources: ResourceSet,
    pub purpose: Purpose,
    pub custom_fields: CustomFields,
    /// Where the requestor wants to be notified.
    pub inbox: Option<String>,
}

/// Subject of an Access Grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrantSubject {
    pub resource_owner: String,
    pub requestor: String,
    pub access: AccessModes,
    pub resources: ResourceSet,
    pub purpose: Purpose,
    pub custom_fields: CustomFields,
    pub inbox: Option<String>,
}

/// Subject of an Access Denial.
///
/// A denial names the parties and nothing else: no scope is implied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDenialSubject {
    pub resource_owner: String,
    pub requestor: String,
}

/// The `credentialSubject` of an access credential, by lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialBody {
    Request(AccessRequestSubject),
    Grant(AccessGrantSubject),
    Denial(AccessDenialSubject),
}

impl CredentialBody {
    pub fn kind(&self) -> CredentialKind {
        match self {
            CredentialBody::Request(_) => CredentialKind::Request,
            CredentialBody::Grant(_) => CredentialKind::Grant,
            CredentialBody::Denial(_) => CredentialKind::Denial,
        }
    }
}

/// Reference into a revocation status list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_purpose: Option<String>,
    #[serde(with = "crate::utils::serialization::status_index")]
    pub status_list_index: usize,
    /// URL of the status list resource.
    pub status_list_credential: String,
}

/// An issued access credential.
///
/// Never mutated after issuance; revocation happens in the external status list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "RawCredential", into = "RawCredential")]
pub struct Credential {
    /// JSON-LD context, kept opaque.
    pub context: Vec<Value>,
    pub id: String,
    /// The service that signed the credential.
    pub issuer: String,
    pub issuance_date: DateTime<Utc>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub types: Vec<String>,
    pub body: CredentialBody,
    pub status: Option<StatusEntry>,
    /// Signature block, produced and checked only by remote services.
    pub proof: Option<Value>,
}

impl Credential {
    /// The lifecycle stage, derived from the body.
    pub fn kind(&self) -> CredentialKind {
        self.body.kind()
    }

    /// Parses an issued credential from its JSON-LD text
    ///
    /// # Arguments
    /// * `json` - A credential as returned by an issuer
    ///
    /// # Returns
    /// The credential, or `InvalidCredential` if the shape, lifecycle tag or
    /// consent status is wrong
    pub fn from_json(json: &str) -> AccessResult<Self> {
        serialization::deserialize(json).map_err(|e| AccessError::InvalidCredential(e.to_string()))
    }

    /// Serializes back to the wire shape accepted by [`Credential::from_json`].
    pub fn to_json(&self) -> AccessResult<String> {
        serialization::serialize(self).map_err(|e| AccessError::InvalidCredential(e.to_string()))
    }

    /// Same as [`Credential::from_json`] for an already parsed document.
    pub fn from_value(value: Value) -> AccessResult<Self> {
        serde_json::from_value(value).map_err(|e| AccessError::InvalidCredential(e.to_string()))
    }

    /// The credential as a JSON document in its wire shape
    ///
    /// # Returns
    /// A `Value` holding `@context`, `credentialSubject` and, when present,
    /// `credentialStatus` and `proof`
    pub fn to_value(&self) -> Value {
        raw_to_value(RawCredential::from(self.clone()))
    }

    /// Equality on everything but the proof, whose bytes are not deterministic.
    pub fn same_claims(&self, other: &Credential) -> bool {
        self.context == other.context
            && self.id == other.id
            && self.issuer == other.issuer
            && self.issuance_date == other.issuance_date
            && self.expiration_date == other.expiration_date
            && self.types == other.types
            && self.body == other.body
            && self.status == other.status
    }
}

/// An unsigned access credential, as submitted to an issuer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "RawCredential", into = "RawCredential")]
pub struct AccessPayload {
    pub context: Vec<Value>,
    pub types: Vec<String>,
    pub issuance_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub body: CredentialBody,
}

impl AccessPayload {
    pub fn kind(&self) -> CredentialKind {
        self.body.kind()
    }
}

// Wire representation shared by both envelopes.

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct ConsentAttributes {
    #[serde(default, skip_serializing_if = "AccessModes::is_empty")]
    mode: AccessModes,
    has_status: String,
    #[serde(default, skip_serializing_if = "ResourceSet::is_empty")]
    for_personal_data: ResourceSet,
    #[serde(default, skip_serializing_if = "Purpose::is_empty")]
    for_purpose: Purpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_provided_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_consent_for_data_subject: Option<String>,
    #[serde(flatten)]
    custom: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct RawSubject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inbox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    has_consent: Option<ConsentAttributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provided_consent: Option<ConsentAttributes>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct RawCredential {
    #[serde(rename = "@context", default, skip_serializing_if = "Vec::is_empty")]
    context: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type", default)]
    types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issuance_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiration_date: Option<DateTime<Utc>>,
    credential_subject: RawSubject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credential_status: Option<StatusEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proof: Option<Value>,
}

fn raw_to_value(raw: RawCredential) -> Value {
    // A derived Serialize over owned strings and values cannot fail.
    serde_json::to_value(raw).unwrap_or(Value::Null)
}

fn invalid(msg: impl Into<String>) -> AccessError {
    AccessError::InvalidCredential(msg.into())
}

fn body_to_wire(body: &CredentialBody) -> RawSubject {
    match body {
        CredentialBody::Request(s) => RawSubject {
            id: Some(s.requestor.clone()),
            inbox: s.inbox.clone(),
            has_consent: Some(ConsentAttributes {
                mode: s.access.clone(),
                has_status: GC_CONSENT_STATUS_REQUESTED.to_string(),
                for_personal_data: s.resources.clone(),
                for_purpose: s.purpose.clone(),
                is_provided_to: None,
                is_consent_for_data_subject: s.resource_owner.clone(),
                custom: s.custom_fields.to_wire(),
            }),
            provided_consent: None,
        },
        CredentialBody::Grant(s) => RawSubject {
            id: Some(s.resource_owner.clone()),
            inbox: s.inbox.clone(),
            has_consent: None,
            provided_consent: Some(ConsentAttributes {
                mode: s.access.clone(),
                has_status: GC_CONSENT_STATUS_EXPLICITLY_GIVEN.to_string(),
                for_personal_data: s.resources.clone(),
                for_purpose: s.purpose.clone(),
                is_provided_to: Some(s.requestor.clone()),
                is_consent_for_data_subject: None,
                custom: s.custom_fields.to_wire(),
            }),
        },
        CredentialBody::Denial(s) => RawSubject {
            id: Some(s.resource_owner.clone()),
            inbox: None,
            has_consent: None,
            provided_consent: Some(ConsentAttributes {
                has_status: GC_CONSENT_STATUS_DENIED.to_string(),
                is_provided_to: Some(s.requestor.clone()),
                ..ConsentAttributes::default()
            }),
        },
    }
}

/// Each lifecycle stage admits exactly one consent status.
fn check_status(consent: &ConsentAttributes, kind: CredentialKind) -> AccessResult<()> {
    let expected = match kind {
        CredentialKind::Request => GC_CONSENT_STATUS_REQUESTED,
        CredentialKind::Grant => GC_CONSENT_STATUS_EXPLICITLY_GIVEN,
        CredentialKind::Denial => GC_CONSENT_STATUS_DENIED,
    };
    if consent.has_status != expected {
        return Err(invalid(format!(
            "{} with consent status {}",
            kind, consent.has_status
        )));
    }
    Ok(())
}

fn body_from_wire(kind: CredentialKind, subject: RawSubject) -> AccessResult<CredentialBody> {
    match kind {
        CredentialKind::Request => {
            let consent = subject
                .has_consent
                .ok_or_else(|| invalid("access request without hasConsent"))?;
            check_status(&consent, kind)?;
            Ok(CredentialBody::Request(AccessRequestSubject {
                requestor: subject
                    .id
                    .ok_or_else(|| invalid("access request without a requestor"))?,
                resource_owner: consent.is_consent_for_data_subject,
                access: consent.mode,
                resources: consent.for_personal_data,
                purpose: consent.for_purpose,
                custom_fields: CustomFields::from_wire(consent.custom),
                inbox: subject.inbox,
            }))
        }
        CredentialKind::Grant => {
            let consent = subject
                .provided_consent
                .ok_or_else(|| invalid("access grant without providedConsent"))?;
            check_status(&consent, kind)?;
            Ok(CredentialBody::Grant(AccessGrantSubject {
                resource_owner: subject
                    .id
                    .ok_or_else(|| invalid("access grant without a resource owner"))?,
                requestor: consent
                    .is_provided_to
                    .ok_or_else(|| invalid("access grant without isProvidedTo"))?,
                access: consent.mode,
                resources: consent.for_personal_data,
                purpose: consent.for_purpose,
                custom_fields: CustomFields::from_wire(consent.custom),
                inbox: subject.inbox,
            }))
        }
        CredentialKind::Denial => {
            let consent = subject
                .provided_consent
                .ok_or_else(|| invalid("access denial without providedConsent"))?;
            check_status(&consent, kind)?;
            Ok(CredentialBody::Denial(AccessDenialSubject {
                resource_owner: subject
                    .id
                    .ok_or_else(|| invalid("access denial without a resource owner"))?,
                requestor: consent
                    .is_provided_to
                    .ok_or_else(|| invalid("access denial without isProvidedTo"))?,
            }))
        }
    }
}

impl TryFrom<RawCredential> for Credential {
    type Error = AccessError;

    fn try_from(raw: RawCredential) -> Result<Self, Self::Error> {
        let kind = CredentialKind::from_types(&raw.types)?;
        Ok(Credential {
            context: raw.context,
            id: raw.id.ok_or_else(|| invalid("credential without an id"))?,
            issuer: raw.issuer.ok_or_else(|| invalid("credential without an issuer"))?,
            issuance_date: raw
                .issuance_date
                .ok_or_else(|| invalid("credential without an issuanceDate"))?,
            expiration_date: raw.expiration_date,
            body: body_from_wire(kind, raw.credential_subject)?,
            types: raw.types,
            status: raw.credential_status,
            proof: raw.proof,
        })
    }
}

impl From<Credential> for RawCredential {
    fn from(c: Credential) -> Self {
        RawCredential {
            context: c.context,
            id: Some(c.id),
            types: c.types,
            issuer: Some(c.issuer),
            issuance_date: Some(c.issuance_date),
            expiration_date: c.expiration_date,
            credential_subject: body_to_wire(&c.body),
            credential_status: c.status,
            proof: c.proof,
        }
    }
}

impl TryFrom<RawCredential> for AccessPayload {
    type Error = AccessError;

    fn try_from(raw: RawCredential) -> Result<Self, Self::Error> {
        let kind = CredentialKind::from_types(&raw.types)?;
        Ok(AccessPayload {
            context: raw.context,
            issuance_date: raw.issuance_date,
            expiration_date: raw.expiration_date,
            body: body_from_wire(kind, raw.credential_subject)?,
            types: raw.types,
        })
    }
}

impl From<AccessPayload> for RawCredential {
    fn from(p: AccessPayload) -> Self {
        RawCredential {
            context: p.context,
            id: None,
            types: p.types,
            issuer: None,
            issuance_date: p.issuance_date,
            expiration_date: p.expiration_date,
            credential_subject: body_to_wire(&p.body),
            credential_status: None,
            proof: None,
        }
    }
}
