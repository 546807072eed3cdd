// src/services/verifier.rs
//! Credential verification service.
//!
//! Runs four checks in a fixed order, stopping at the first failure:
//! 1. structure (local)
//! 2. validity period (local)
//! 3. revocation status (status list fetch)
//! 4. cryptographic proof (remote verifier)
//!
//! Every failure, including an unreachable collaborator, yields an invalid
//! result. Nothing is cached between calls.

use crate::constants::CREDENTIAL_TYPE_BASE;
use crate::error::{AccessError, AccessResult};
use crate::models::access::AccessMode;
use crate::models::credential::{Credential, CredentialBody, CredentialKind};
use crate::services::proof::ProofVerifier;
use crate::services::status_list::StatusListFetcher;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;

/// Outcome of [`CredentialVerifier::verify`].
///
/// There is no partially valid state: either `valid` holds and `reason` is
/// `None`, or the first failing check is named in `reason`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    pub reason: Option<AccessError>,
}

impl Verification {
    fn passed() -> Self {
        Verification {
            valid: true,
            reason: None,
        }
    }

    fn rejected(reason: AccessError) -> Self {
        Verification {
            valid: false,
            reason: Some(reason),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Converts the outcome into a `Result`, surfacing the rejection reason
    ///
    /// # Returns
    /// `Ok(())` for a valid credential, otherwise the first failed check
    pub fn into_result(self) -> AccessResult<()> {
        match self.reason {
            None if self.valid => Ok(()),
            Some(reason) => Err(reason),
            None => Err(AccessError::InvalidCredential("rejected without a reason".into())),
        }
    }
}

/// Checks that `credential` is well-formed.
///
/// Requires a proof, the base credential type, exactly one lifecycle tag
/// matching the subject, a non-empty scope on requests and grants, and an
/// issuance date no later than the expiration date.
pub fn check_structure(credential: &Credential) -> AccessResult<()> {
    let invalid = |msg: String| Err(AccessError::InvalidCredential(msg));

    if credential.id.is_empty() || credential.issuer.is_empty() {
        return invalid("id and issuer are required".into());
    }
    if credential.proof.is_none() {
        return invalid(format!("{} carries no proof", credential.id));
    }
    if !credential.types.iter().any(|t| t == CREDENTIAL_TYPE_BASE) {
        return invalid(format!("{} is not a {}", credential.id, CREDENTIAL_TYPE_BASE));
    }
    let tagged = CredentialKind::from_types(&credential.types)?;
    if tagged != credential.kind() {
        return invalid(format!(
            "{} is tagged {} but carries a {} subject",
            credential.id,
            tagged,
            credential.kind()
        ));
    }
    let scope = match &credential.body {
        CredentialBody::Request(s) => Some((&s.resources, &s.access)),
        CredentialBody::Grant(s) => Some((&s.resources, &s.access)),
        CredentialBody::Denial(_) => None,
    };
    if let Some((resources, access)) = scope {
        if resources.is_empty() {
            return invalid(format!("{} covers no resources", credential.id));
        }
        if access.is_empty() {
            return invalid(format!("{} grants no access modes", credential.id));
        }
    }
    if let Some(expiration) = credential.expiration_date {
        if credential.issuance_date > expiration {
            return invalid(format!("{} expires before it is issued", credential.id));
        }
    }
    Ok(())
}

/// Checks that `now` lies within `[issuanceDate, expirationDate]`.
pub fn check_validity_period(credential: &Credential, now: DateTime<Utc>) -> AccessResult<()> {
    if now < credential.issuance_date {
        return Err(AccessError::NotYetValid {
            valid_from: credential.issuance_date,
        });
    }
    match credential.expiration_date {
        Some(expired_at) if now > expired_at => Err(AccessError::Expired { expired_at }),
        _ => Ok(()),
    }
}

/// Exact-match scope check on a grant.
///
/// True iff `resource` is byte-for-byte one of the grant's resources and
/// `mode` is one of its access modes. Anything but a grant covers nothing.
pub fn is_grant_scope_sufficient(grant: &Credential, resource: &str, mode: AccessMode) -> bool {
    grant.covers(resource, mode)
}

/// Verifies access credentials against a status list host and a proof verifier.
#[derive(Clone)]
pub struct CredentialVerifier {
    status_lists: Arc<dyn StatusListFetcher>,
    proofs: Arc<dyn ProofVerifier>,
}

impl CredentialVerifier {
    /// # Arguments
    /// * `status_lists` - Fetches status lists on every call
    /// * `proofs` - Remote proof verification capability
    pub fn new(status_lists: Arc<dyn StatusListFetcher>, proofs: Arc<dyn ProofVerifier>) -> Self {
        Self {
            status_lists,
            proofs,
        }
    }

    /// Verifies `credential` as of now.
    pub async fn verify(&self, credential: &Credential) -> Verification {
        self.verify_at(credential, Utc::now()).await
    }

    /// Verifies `credential` as of `now`.
    pub async fn verify_at(&self, credential: &Credential, now: DateTime<Utc>) -> Verification {
        match self.run_checks(credential, now).await {
            Ok(()) => {
                debug!("credential {} is valid", credential.id);
                Verification::passed()
            }
            Err(reason) => {
                warn!("credential {} rejected: {}", credential.id, reason);
                Verification::rejected(reason)
            }
        }
    }

    async fn run_checks(&self, credential: &Credential, now: DateTime<Utc>) -> AccessResult<()> {
        check_structure(credential)?;
        check_validity_period(credential, now)?;
        self.check_revocation(credential).await?;
        self.check_proof(credential).await
    }

    async fn check_revocation(&self, credential: &Credential) -> AccessResult<()> {
        let Some(status) = &credential.status else {
            return Ok(());
        };
        let list = self.status_lists.fetch(&status.status_list_credential).await?;
        match list.is_revoked(status.status_list_index) {
            Some(false) => Ok(()),
            Some(true) => Err(AccessError::Revoked),
            None => Err(AccessError::StatusListUnavailable(format!(
                "index {} is outside {} ({} entries)",
                status.status_list_index,
                status.status_list_credential,
                list.len()
            ))),
        }
    }

    async fn check_proof(&self, credential: &Credential) -> AccessResult<()> {
        let verdict = self.proofs.verify_proof(credential).await?;
        if verdict.valid {
            Ok(())
        } else {
            Err(AccessError::InvalidSignature(
                verdict.reason.unwrap_or_else(|| "proof rejected".to_string()),
            ))
        }
    }
}
