// src/services/proof.rs
//! Remote proof verification.
//!
//! Signatures are never checked locally. The credential is handed to a
//! verification service whose verdict is trusted verbatim.

use crate::error::{AccessError, AccessResult};
use crate::models::credential::Credential;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

/// Verdict of the remote verifier.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProofVerdict {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ProofVerdict {
    pub fn valid() -> Self {
        ProofVerdict {
            valid: true,
            reason: None,
        }
    }

    /// A rejection carrying the verifier's explanation.
    pub fn invalid(reason: impl Into<String>) -> Self {
        ProofVerdict {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Capability that checks the cryptographic proof of a credential.
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    /// # Errors
    /// `VerifierUnavailable` when no verdict could be obtained. A rejected
    /// proof is a successful call returning an invalid verdict.
    async fn verify_proof(&self, credential: &Credential) -> AccessResult<ProofVerdict>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    verifiable_credential: &'a Credential,
}

/// Client for a verification service accepting `{"verifiableCredential": ...}`.
#[derive(Clone)]
pub struct HttpProofVerifier {
    client: Client,
    endpoint: Url,
}

impl HttpProofVerifier {
    /// Creates a new HttpProofVerifier instance
    ///
    /// # Arguments
    /// * `client` - Configured HTTP client
    /// * `endpoint` - Full URL of the verification service
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl ProofVerifier for HttpProofVerifier {
    async fn verify_proof(&self, credential: &Credential) -> AccessResult<ProofVerdict> {
        debug!("verifying proof of {} at {}", credential.id, self.endpoint);
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&VerifyRequest {
                verifiable_credential: credential,
            })
            .send()
            .await
            .map_err(|e| AccessError::VerifierUnavailable(format!("{}: {}", self.endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AccessError::VerifierUnavailable(format!(
                "{} returned {}",
                self.endpoint, status
            )));
        }
        response
            .json::<ProofVerdict>()
            .await
            .map_err(|e| AccessError::VerifierUnavailable(format!("unexpected verifier response: {e}")))
    }
}
