// src/services/mod.rs
//! Access Grant services.
//!
//! Collaborators (issuer, proof verifier, status lists, resolver, discovery)
//! sit behind traits; the engines receive them explicitly.
//! [`AccessServices`] wires the HTTP implementations from an [`AccessConfig`].

pub mod approval;
pub mod credential_issuer;
pub mod discovery;
pub mod handoff;
pub mod proof;
pub mod query;
pub mod request_builder;
pub mod resolver;
pub mod revocation;
pub mod status_list;
pub mod verifier;

use crate::config::AccessConfig;
use crate::error::AccessResult;
use crate::utils::http::build_client;
use approval::ApprovalEngine;
use credential_issuer::{HttpIssuer, Issuer};
use discovery::{AgentDiscovery, WellKnownDiscovery};
use handoff::{RedirectHandoff, RedirectOptions};
use log::info;
use proof::{HttpProofVerifier, ProofVerifier};
use query::CredentialQuery;
use resolver::{CredentialResolver, HttpCredentialResolver};
use reqwest::Url;
use revocation::RevocationEngine;
use status_list::{HttpStatusListFetcher, StatusListFetcher};
use std::sync::Arc;
use verifier::CredentialVerifier;

/// Every collaborator an application needs, built once and shared.
#[derive(Clone)]
pub struct AccessServices {
    issuer: Arc<dyn Issuer>,
    status_lists: Arc<dyn StatusListFetcher>,
    proofs: Arc<dyn ProofVerifier>,
    resolver: Arc<dyn CredentialResolver>,
    discovery: Arc<dyn AgentDiscovery>,
    approvals: Arc<ApprovalEngine>,
    query: Option<CredentialQuery>,
    fallback_management_url: Option<Url>,
}

impl AccessServices {
    /// Wires the given collaborators together.
    ///
    /// # Arguments
    /// * `issuer` - Signs requests, grants and denials, and flips status bits
    /// * `status_lists` - Fetches revocation lists during verification
    /// * `proofs` - Checks credential proofs
    /// * `resolver` - Dereferences credentials handed off by id
    /// * `discovery` - Finds a resource owner's management agent
    ///
    /// # Returns
    /// Services sharing a single [`ApprovalEngine`], so decisions taken through
    /// any clone are remembered by all of them.
    pub fn new(
        issuer: Arc<dyn Issuer>,
        status_lists: Arc<dyn StatusListFetcher>,
        proofs: Arc<dyn ProofVerifier>,
        resolver: Arc<dyn CredentialResolver>,
        discovery: Arc<dyn AgentDiscovery>,
    ) -> Self {
        let approvals = Arc::new(
            ApprovalEngine::new(Arc::clone(&issuer)).with_resolver(Arc::clone(&resolver)),
        );
        Self {
            issuer,
            status_lists,
            proofs,
            resolver,
            discovery,
            approvals,
            query: None,
            fallback_management_url: None,
        }
    }

    /// Builds the HTTP collaborators described by `config`.
    ///
    /// They all share one client carrying the configured timeout.
    pub fn from_config(config: &AccessConfig) -> AccessResult<Self> {
        config.validate()?;
        let client = build_client(config.http_timeout())?;
        let issuer_url = config.issuer_url()?;
        info!("access services using issuer {}", issuer_url);

        let mut services = Self::new(
            Arc::new(HttpIssuer::new(client.clone(), issuer_url)),
            Arc::new(HttpStatusListFetcher::new(client.clone())),
            Arc::new(HttpProofVerifier::new(client.clone(), config.verifier_url()?)),
            Arc::new(HttpCredentialResolver::new(client.clone())),
            Arc::new(WellKnownDiscovery::new(client.clone())),
        );
        services.query = config
            .query_url()?
            .map(|endpoint| CredentialQuery::new(client, endpoint));
        services.fallback_management_url = config.fallback_url()?;
        Ok(services)
    }

    pub fn issuer(&self) -> &dyn Issuer {
        self.issuer.as_ref()
    }

    pub fn resolver(&self) -> &dyn CredentialResolver {
        self.resolver.as_ref()
    }

    /// The engine holding every decision taken through these services.
    pub fn approval_engine(&self) -> Arc<ApprovalEngine> {
        Arc::clone(&self.approvals)
    }

    /// A revocation engine bound to the configured issuer.
    pub fn revocation_engine(&self) -> RevocationEngine {
        RevocationEngine::new(Arc::clone(&self.issuer))
    }

    /// A verifier using the configured status lists and proof service
    ///
    /// # Returns
    /// A fresh [`CredentialVerifier`]; verification keeps no state, so handles are interchangeable
    pub fn verifier(&self) -> CredentialVerifier {
        CredentialVerifier::new(Arc::clone(&self.status_lists), Arc::clone(&self.proofs))
    }

    pub fn handoff(&self) -> RedirectHandoff {
        RedirectHandoff::new(Arc::clone(&self.discovery))
    }

    /// `None` when no query endpoint is configured.
    pub fn query(&self) -> Option<&CredentialQuery> {
        self.query.as_ref()
    }

    /// Redirect options carrying `callback` and the configured fallback agent.
    pub fn redirect_options(&self, callback: impl Fn(&Url) + Send + Sync + 'static) -> RedirectOptions {
        RedirectOptions {
            fallback_management_url: self.fallback_management_url.clone(),
            ..RedirectOptions::with_callback(callback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use crate::models::access::{AccessMode, CustomField};
    use crate::models::credential::CredentialKind;
    use crate::services::handoff::{decode_from_handoff, requestor_redirect_url, resolve_handoff};
    use crate::services::request_builder::{RequestBuilder, RequestParams};
    use crate::services::verifier::is_grant_scope_sufficient;
    use crate::testing::{
        init_logging, t0, FakeDiscovery, FakeIssuer, FakeProofVerifier, FakeResolver, ISSUER,
        OWNER, PROJECT_FIELD, PURPOSE, REQUESTOR, RESOURCE,
    };
    use chrono::Duration;
    use std::sync::Mutex;

    const AGENT: &str = "https://manage.example/ui";

    fn services(issuer: Arc<FakeIssuer>) -> AccessServices {
        AccessServices::new(
            issuer.clone(),
            Arc::new(issuer.status_lists()),
            Arc::new(FakeProofVerifier::valid()),
            Arc::new(FakeResolver::default()),
            Arc::new(FakeDiscovery::advertising(AGENT)),
        )
    }

    fn params() -> RequestParams {
        RequestParams {
            resources: vec![RESOURCE.to_string()],
            access: vec![AccessMode::Read],
            resource_owner: Some(OWNER.to_string()),
            purpose: vec![PURPOSE.to_string()],
            expiration_date: Some(t0() + Duration::days(7)),
            custom_fields: vec![CustomField::new(PROJECT_FIELD, "pod-study")],
            inbox: None,
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<Url>>>, impl Fn(&Url) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |url: &Url| sink.lock().unwrap().push(url.clone()))
    }

    #[tokio::test]
    async fn test_request_approve_verify_expire() {
        init_logging();
        let issuer = Arc::new(FakeIssuer::new());
        let services = services(issuer.clone());

        // Requestor: build and issue the request, then hand it to the owner.
        let payload = RequestBuilder::new(REQUESTOR).build_at(params(), t0()).unwrap();
        let request = services.issuer().issue(&payload).await.unwrap();
        assert_eq!(request.issuance_date(), t0());

        let (seen, callback) = recorder();
        let return_to = Url::parse("https://requestor.example/redirect").unwrap();
        let to_owner = services
            .handoff()
            .redirect_to_management_agent(&request, &return_to, &services.redirect_options(callback))
            .await
            .unwrap();
        assert!(to_owner.as_str().starts_with(AGENT));

        // Owner: decode, approve, send the grant back.
        let received = decode_from_handoff(&to_owner).unwrap();
        assert_eq!(received, request);
        let grant = services
            .approval_engine()
            .approve(OWNER, &received, None)
            .await
            .unwrap();
        let back = requestor_redirect_url(&to_owner).unwrap();
        let (_, callback) = recorder();
        let to_requestor = services
            .handoff()
            .redirect_to_requestor(&grant, &back, &services.redirect_options(callback))
            .unwrap();
        assert!(to_requestor.as_str().starts_with("https://requestor.example/redirect?"));

        // Requestor: decode and verify.
        let returned = decode_from_handoff(&to_requestor).unwrap();
        assert_eq!(returned, grant);
        assert_eq!(returned.issuer(), ISSUER);
        assert_eq!(returned.resource_owner().unwrap(), OWNER);
        assert_eq!(returned.resources().unwrap(), request.resources().unwrap());
        assert_eq!(returned.access_modes().unwrap(), request.access_modes().unwrap());
        assert!(is_grant_scope_sufficient(&returned, RESOURCE, AccessMode::Read));

        let verifier = services.verifier();
        assert!(verifier.verify_at(&returned, t0() + Duration::seconds(1)).await.valid);
        let expiry = returned.expiration_date().unwrap();
        assert_eq!(
            verifier.verify_at(&returned, expiry + Duration::seconds(1)).await.reason,
            Some(AccessError::Expired { expired_at: expiry })
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_decisions_survive_across_engine_handles() {
        let issuer = Arc::new(FakeIssuer::new());
        let services = services(issuer.clone());
        let payload = RequestBuilder::new(REQUESTOR).build_at(params(), t0()).unwrap();
        let request = services.issuer().issue(&payload).await.unwrap();
        assert_eq!(issuer.issue_count(), 1);

        let first = services.approval_engine().approve(OWNER, &request, None).await.unwrap();
        let second = services.approval_engine().approve(OWNER, &request, None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(issuer.issue_count(), 2);

        let err = services.clone().approval_engine().deny(OWNER, &request).await.unwrap_err();
        assert!(matches!(err, AccessError::UnknownRequest(ref msg) if msg.contains("approved")));
        assert_eq!(issuer.issue_count(), 2);
    }

    #[tokio::test]
    async fn test_revoked_grant_is_observed_on_next_verify() {
        let issuer = Arc::new(FakeIssuer::new());
        let services = services(issuer.clone());
        let payload = RequestBuilder::new(REQUESTOR).build_at(params(), t0()).unwrap();
        let request = services.issuer().issue(&payload).await.unwrap();
        let grant = services
            .approval_engine()
            .approve(OWNER, request, None)
            .await
            .unwrap();

        let verifier = services.verifier();
        let now = t0() + Duration::hours(1);
        assert!(verifier.verify_at(&grant, now).await.valid);

        services.revocation_engine().revoke(&grant).await.unwrap();
        let after = verifier.verify_at(&grant, now).await;
        assert!(!after.valid);
        assert_eq!(after.into_result(), Err(AccessError::Revoked));

        services.revocation_engine().revoke(&grant).await.unwrap();
        assert_eq!(verifier.verify_at(&grant, now).await.reason, Some(AccessError::Revoked));
    }

    #[tokio::test]
    async fn test_denial_exposes_no_scope() {
        let issuer = Arc::new(FakeIssuer::new());
        let services = services(issuer.clone());
        let payload = RequestBuilder::new(REQUESTOR).build_at(params(), t0()).unwrap();
        let request = services.issuer().issue(&payload).await.unwrap();

        let denial = services.approval_engine().deny(OWNER, &request).await.unwrap();
        assert_eq!(denial.kind(), CredentialKind::Denial);
        assert!(services.verifier().verify_at(&denial, t0()).await.valid);
        assert_eq!(denial.resources(), Err(AccessError::MissingField("resources")));
        assert_eq!(denial.access_modes(), Err(AccessError::MissingField("access")));
        assert!(!is_grant_scope_sufficient(&denial, RESOURCE, AccessMode::Read));
    }

    #[tokio::test]
    async fn test_canceled_request_fails_verification() {
        let issuer = Arc::new(FakeIssuer::new());
        let services = services(issuer.clone());
        let payload = RequestBuilder::new(REQUESTOR).build_at(params(), t0()).unwrap();
        let request = services.issuer().issue(&payload).await.unwrap();

        services.revocation_engine().cancel_request(&request).await.unwrap();
        let result = services.verifier().verify_at(&request, t0()).await;
        assert_eq!(result.reason, Some(AccessError::Revoked));
    }

    #[tokio::test]
    async fn test_handoff_by_reference_resolves() {
        let issuer = Arc::new(FakeIssuer::new());
        let payload = RequestBuilder::new(REQUESTOR).build_at(params(), t0()).unwrap();
        let request = issuer.issue(&payload).await.unwrap();
        let services = AccessServices::new(
            issuer.clone(),
            Arc::new(issuer.status_lists()),
            Arc::new(FakeProofVerifier::valid()),
            Arc::new(FakeResolver::with([request.clone()])),
            Arc::new(FakeDiscovery::absent()),
        );

        let (_, callback) = recorder();
        let options = services
            .redirect_options(callback)
            .fallback(Url::parse(AGENT).unwrap())
            .by_reference();
        let return_to = Url::parse("https://requestor.example/redirect").unwrap();
        let url = services
            .handoff()
            .redirect_to_management_agent(&request, &return_to, &options)
            .await
            .unwrap();

        assert_eq!(resolve_handoff(&url, services.resolver()).await.unwrap(), request);
        let grant = services
            .approval_engine()
            .approve(OWNER, request.id.as_str(), None)
            .await
            .unwrap();
        assert_eq!(grant.kind(), CredentialKind::Grant);
    }

    #[test]
    fn test_from_config_builds_http_collaborators() {
        let config = AccessConfig {
            issuer_endpoint: "https://vc.example".into(),
            verifier_endpoint: "https://vc.example/verify".into(),
            query_endpoint: Some("https://vc.example/query".into()),
            fallback_management_url: Some("https://manage.example/".into()),
            http_timeout_secs: 10,
        };
        let services = AccessServices::from_config(&config).unwrap();
        assert!(services.query().is_some());
        let options = services.redirect_options(|_| {});
        assert_eq!(
            options.fallback_management_url.as_ref().map(Url::as_str),
            Some("https://manage.example/")
        );

        let broken = AccessConfig {
            verifier_endpoint: "nope".into(),
            ..config
        };
        assert!(matches!(
            AccessServices::from_config(&broken),
            Err(AccessError::Configuration(_))
        ));
    }
}
