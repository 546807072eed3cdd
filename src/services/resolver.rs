// src/services/resolver.rs
//! Dereferencing credentials by id.
//!
//! The minimal handoff form carries only a credential id; the receiving end
//! resolves it itself through a [`CredentialResolver`].

use crate::error::{AccessError, AccessResult};
use crate::models::credential::Credential;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode, Url};

#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Looks a credential up by id. `Ok(None)` means the id is unknown.
    async fn resolve(&self, id: &str) -> AccessResult<Option<Credential>>;
}

/// Resolves credential ids by issuing a GET on the id URL.
#[derive(Clone)]
pub struct HttpCredentialResolver {
    client: Client,
}

impl HttpCredentialResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialResolver for HttpCredentialResolver {
    async fn resolve(&self, id: &str) -> AccessResult<Option<Credential>> {
        let url = Url::parse(id)
            .map_err(|e| AccessError::InvalidCredential(format!("credential id {id}: {e}")))?;
        debug!("resolving credential {}", url);

        let response = self
            .client
            .get(url)
            .header("accept", "application/ld+json, application/json")
            .send()
            .await
            .map_err(|e| AccessError::IssuerUnavailable(format!("{id}: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            status if status.is_success() => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| AccessError::IssuerUnavailable(format!("{id}: {e}")))?;
                Credential::from_json(&body).map(Some)
            }
            status => Err(AccessError::IssuerUnavailable(format!("{id} returned {status}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_request;
    use mockito::{mock, server_url};

    #[test]
    fn test_resolves_existing_credential() {
        let mut request = sample_request();
        request.id = format!("{}/vc/resolve-a", server_url());
        let _m = mock("GET", "/vc/resolve-a")
            .with_header("content-type", "application/ld+json")
            .with_body(serde_json::to_string(&request).unwrap())
            .create();

        let resolver = HttpCredentialResolver::new(Client::new());
        let resolved = tokio_test::block_on(resolver.resolve(&request.id)).unwrap();
        assert_eq!(resolved, Some(request));
    }

    #[test]
    fn test_unknown_id_resolves_to_none() {
        let _m = mock("GET", "/vc/resolve-b").with_status(404).create();

        let resolver = HttpCredentialResolver::new(Client::new());
        let id = format!("{}/vc/resolve-b", server_url());
        assert_eq!(tokio_test::block_on(resolver.resolve(&id)).unwrap(), None);
    }

    #[test]
    fn test_non_credential_body_is_invalid() {
        let _m = mock("GET", "/vc/resolve-c")
            .with_header("content-type", "application/json")
            .with_body(r#"{"type": ["VerifiableCredential"]}"#)
            .create();

        let resolver = HttpCredentialResolver::new(Client::new());
        let id = format!("{}/vc/resolve-c", server_url());
        let err = tokio_test::block_on(resolver.resolve(&id)).unwrap_err();
        assert!(matches!(err, AccessError::InvalidCredential(_)));
    }
}
