// src/services/revocation.rs
//! Revocation of grants and cancellation of pending requests.
//!
//! Both flip the credential's bit in the issuer's status list. Nothing is
//! cached here, so the next verification observes the new status.

use crate::error::{AccessError, AccessResult};
use crate::models::credential::{Credential, CredentialKind};
use crate::services::credential_issuer::Issuer;
use log::info;
use std::sync::Arc;

/// Service for withdrawing credentials that were already issued
///
/// Holds no state of its own; the issuer's status list is the record.
pub struct RevocationEngine {
    /// Issuer owning the status lists

    issuer: Arc<dyn Issuer>,
}

impl RevocationEngine {
    /// Creates a new RevocationEngine
    ///
    /// # Arguments
    /// * `issuer` - The issuer that signed the credentials and controls their status bits
    pub fn new(issuer: Arc<dyn Issuer>) -> Self {
        Self { issuer }
    }

    /// Revokes an Access Grant. Revoking twice is not an error.
    ///
    /// # Errors
    /// `InvalidCredential` if `grant` is not a grant or has no status entry,
    /// `IssuerUnavailable` if the status list could not be updated.
    pub async fn revoke(&self, grant: &Credential) -> AccessResult<()> {
        self.flip(grant, CredentialKind::Grant).await?;
        info!("access grant {} revoked", grant.id);
        Ok(())
    }

    /// Cancels a pending Access Request the same way.
    ///
    /// # Arguments
    /// * `request` - An issued Access Request carrying a status entry
    ///
    /// # Returns
    /// `Ok(())` once the issuer has marked the request revoked
    pub async fn cancel_request(&self, request: &Credential) -> AccessResult<()> {
        self.flip(request, CredentialKind::Request).await?;
        info!("access request {} canceled", request.id);
        Ok(())
    }

    async fn flip(&self, credential: &Credential, expected: CredentialKind) -> AccessResult<()> {
        if credential.kind() != expected {
            return Err(AccessError::InvalidCredential(format!(
                "{} is a {}, expected {}",
                credential.id,
                credential.kind(),
                expected
            )));
        }
        if credential.status.is_none() {
            return Err(AccessError::InvalidCredential(format!(
                "{} has no credentialStatus and cannot be revoked",
                credential.id
            )));
        }
        self.issuer.revoke(credential).await
    }
}
