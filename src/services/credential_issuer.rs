// src/services/credential_issuer.rs
//! Credential Issuer Service
//!
//! The issuer is the remote service that signs access credentials and owns the
//! status lists they point into. This module defines the collaborator contract
//! and its HTTP client:
//! - `POST <endpoint>/issue`: sign a request, grant or denial payload
//! - `POST <endpoint>/status`: flip the status bit of an issued credential

use crate::constants::REVOCATION_STATUS_TYPE;
use crate::error::{AccessError, AccessResult};
use crate::models::credential::{AccessPayload, Credential};
use crate::utils::http;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response, Url};
use serde::Serialize;

/// Remote service that signs access credentials and maintains their status.
#[async_trait]
pub trait Issuer: Send + Sync {
    /// Signs `payload`, returning it with `id`, `issuanceDate` and `proof` populated.
    ///
    /// # Errors
    /// `IssuerUnavailable` if the service cannot be reached or refuses the payload.
    async fn issue(&self, payload: &AccessPayload) -> AccessResult<Credential>;

    /// Sets the status bit of `credential` in its status list.
    ///
    /// Setting an already-set bit succeeds.
    async fn revoke(&self, credential: &Credential) -> AccessResult<()>;
}

#[derive(Serialize)]
struct IssueRequest<'a> {
    credential: &'a AccessPayload,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdate<'a> {
    credential_id: &'a str,
    credential_status: [StatusValue; 1],
}

#[derive(Serialize)]
struct StatusValue {
    #[serde(rename = "type")]
    kind: &'static str,
    status: &'static str,
}

/// HTTP client for an access issuer service.
///
/// Cloning is cheap: the underlying `reqwest::Client` is reference counted.
#[derive(Clone)]
pub struct HttpIssuer {
    /// Shared HTTP client (carries the configured timeout)
    client: Client,
    /// Base URL of the issuer; `issue` and `status` live below it
    endpoint: Url,
}

impl HttpIssuer {
    /// Creates a new HttpIssuer instance
    ///
    /// # Arguments
    /// * `client` - Configured HTTP client
    /// * `endpoint` - Base URL of the access issuer service
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Base URL requests are sent below.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> AccessResult<Response> {
        let url = http::endpoint(&self.endpoint, path)?;
        debug!("POST {}", url);
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| AccessError::IssuerUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AccessError::IssuerUnavailable(format!(
                "{url} returned {status}: {text}"
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl Issuer for HttpIssuer {
    async fn issue(&self, payload: &AccessPayload) -> AccessResult<Credential> {
        let response = self.post("issue", &IssueRequest { credential: payload }).await?;
        response
            .json::<Credential>()
            .await
            .map_err(|e| AccessError::IssuerUnavailable(format!("unexpected issuer response: {e}")))
    }

    async fn revoke(&self, credential: &Credential) -> AccessResult<()> {
        let update = StatusUpdate {
            credential_id: &credential.id,
            credential_status: [StatusValue {
                kind: REVOCATION_STATUS_TYPE,
                status: "1",
            }],
        };
        self.post("status", &update).await.map(|_| ())
    }
}
