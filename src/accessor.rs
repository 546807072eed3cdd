// src/accessor.rs
//! Read-only projections over an access credential.
//!
//! Each accessor pattern-matches on the credential variant. Asking a variant
//! for a field it structurally lacks (the access modes of a denial, the owner
//! of a request that never named one) fails with
//! [`AccessError::MissingField`]; no default is ever guessed.

use crate::error::{AccessError, AccessResult};
use crate::models::access::{AccessMode, AccessModes, CustomFields, Purpose, ResourceSet};
use crate::models::credential::{Credential, CredentialBody};
use chrono::{DateTime, Utc};

impl Credential {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn issuance_date(&self) -> DateTime<Utc> {
        self.issuance_date
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// # Errors
    /// `MissingField("expirationDate")` when the credential has no upper bound.
    pub fn expiration_date(&self) -> AccessResult<DateTime<Utc>> {
        self.expiration_date
            .ok_or(AccessError::MissingField("expirationDate"))
    }

    /// Resources covered by a request or grant.
    pub fn resources(&self) -> AccessResult<&ResourceSet> {
        match &self.body {
            CredentialBody::Request(s) => Ok(&s.resources),
            CredentialBody::Grant(s) => Ok(&s.resources),
            CredentialBody::Denial(_) => Err(AccessError::MissingField("resources")),
        }
    }

    /// Access modes of a request or grant.
    pub fn access_modes(&self) -> AccessResult<&AccessModes> {
        match &self.body {
            CredentialBody::Request(s) => Ok(&s.access),
            CredentialBody::Grant(s) => Ok(&s.access),
            CredentialBody::Denial(_) => Err(AccessError::MissingField("access")),
        }
    }

    pub fn purposes(&self) -> AccessResult<&Purpose> {
        match &self.body {
            CredentialBody::Request(s) => Ok(&s.purpose),
            CredentialBody::Grant(s) => Ok(&s.purpose),
            CredentialBody::Denial(_) => Err(AccessError::MissingField("purpose")),
        }
    }

    pub fn custom_fields(&self) -> AccessResult<&CustomFields> {
        match &self.body {
            CredentialBody::Request(s) => Ok(&s.custom_fields),
            CredentialBody::Grant(s) => Ok(&s.custom_fields),
            CredentialBody::Denial(_) => Err(AccessError::MissingField("customFields")),
        }
    }

    /// The party that asked for access. Present on every variant.
    pub fn requestor(&self) -> AccessResult<&str> {
        match &self.body {
            CredentialBody::Request(s) => Ok(&s.requestor),
            CredentialBody::Grant(s) => Ok(&s.requestor),
            CredentialBody::Denial(s) => Ok(&s.requestor),
        }
    }

    /// The party whose resources are concerned.
    ///
    /// # Errors
    /// `MissingField("resourceOwner")` on a request that does not name its owner.
    pub fn resource_owner(&self) -> AccessResult<&str> {
        match &self.body {
            CredentialBody::Request(s) => s
                .resource_owner
                .as_deref()
                .ok_or(AccessError::MissingField("resourceOwner")),
            CredentialBody::Grant(s) => Ok(&s.resource_owner),
            CredentialBody::Denial(s) => Ok(&s.resource_owner),
        }
    }

    pub fn inbox(&self) -> AccessResult<&str> {
        let inbox = match &self.body {
            CredentialBody::Request(s) => s.inbox.as_deref(),
            CredentialBody::Grant(s) => s.inbox.as_deref(),
            CredentialBody::Denial(_) => None,
        };
        inbox.ok_or(AccessError::MissingField("inbox"))
    }

    /// Exact-match scope check on a grant.
    ///
    /// Any variant other than a grant covers nothing.
    pub fn covers(&self, resource: &str, mode: AccessMode) -> bool {
        match &self.body {
            CredentialBody::Grant(s) => s.resources.contains(resource) && s.access.contains(mode),
            _ => false,
        }
    }
}
