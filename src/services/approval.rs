// src/services/approval.rs
//! Approval Engine
//!
//! Turns a pending Access Request and the resource owner's decision into a
//! signed Access Grant or Access Denial. Each request moves at most once from
//! `Requested` to either `Approved` or `Denied`; repeating the same decision
//! returns the credential produced the first time.

use crate::constants::{CONTEXT_ACCESS_GRANT, CONTEXT_VC_W3C};
use crate::error::{AccessError, AccessResult};
use crate::models::access::{AccessModes, ResourceSet};
use crate::models::credential::{
    AccessDenialSubject, AccessGrantSubject, AccessPayload, AccessRequestSubject, Credential,
    CredentialBody, CredentialKind,
};
use crate::services::credential_issuer::Issuer;
use crate::services::resolver::CredentialResolver;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// The request being decided on: either in hand, or by id.
#[derive(Debug, Clone)]
pub enum RequestRef {
    Credential(Box<Credential>),
    Id(String),
}

impl From<Credential> for RequestRef {
    fn from(credential: Credential) -> Self {
        RequestRef::Credential(Box::new(credential))
    }
}

impl From<&Credential> for RequestRef {
    fn from(credential: &Credential) -> Self {
        RequestRef::Credential(Box::new(credential.clone()))
    }
}

impl From<&str> for RequestRef {
    fn from(id: &str) -> Self {
        RequestRef::Id(id.to_string())
    }
}

/// Narrowing applied by the owner on approval.
///
/// Every member left `None` keeps the requested value.
#[derive(Debug, Clone, Default)]
pub struct GrantOverrides {
    pub resources: Option<Vec<String>>,
    pub access: Option<AccessModes>,
    /// Must not be later than the request's own expiration.
    pub expiration_date: Option<DateTime<Utc>>,
}

/// A terminal decision on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approved(Credential),
    Denied(Credential),
}

impl Decision {
    pub fn credential(&self) -> &Credential {
        match self {
            Decision::Approved(c) | Decision::Denied(c) => c,
        }
    }
}

/// Scope the grant will carry once overrides are applied.
struct GrantScope {
    resources: ResourceSet,
    access: AccessModes,
    expiration_date: Option<DateTime<Utc>>,
}

fn narrow(
    request: &AccessRequestSubject,
    requested_expiration: Option<DateTime<Utc>>,
    overrides: GrantOverrides,
) -> AccessResult<GrantScope> {
    let resources = match overrides.resources {
        None => request.resources.clone(),
        Some(resources) => {
            let resources = ResourceSet::new(resources);
            if resources.is_empty() {
                return Err(AccessError::shape("resources", "override must not be empty"));
            }
            if let Some(extra) = resources.iter().find(|r| !request.resources.contains(r)) {
                return Err(AccessError::ScopeExceedsRequest(format!(
                    "resource {extra} was not requested"
                )));
            }
            resources
        }
    };

    let access = match overrides.access {
        None => request.access.clone(),
        Some(access) => {
            if access.is_empty() {
                return Err(AccessError::shape("access", "override must not be empty"));
            }
            if let Some(extra) = access.iter().find(|m| !request.access.contains(*m)) {
                return Err(AccessError::ScopeExceedsRequest(format!(
                    "access mode {extra} was not requested"
                )));
            }
            access
        }
    };

    let expiration_date = match (overrides.expiration_date, requested_expiration) {
        (Some(wanted), Some(limit)) if wanted > limit => {
            return Err(AccessError::ScopeExceedsRequest(format!(
                "expiration {} is later than the requested {}",
                wanted.to_rfc3339(),
                limit.to_rfc3339()
            )))
        }
        (Some(wanted), _) => Some(wanted),
        (None, requested) => requested,
    };

    Ok(GrantScope {
        resources,
        access,
        expiration_date,
    })
}

fn context() -> Vec<Value> {
    vec![
        Value::String(CONTEXT_VC_W3C.to_string()),
        Value::String(CONTEXT_ACCESS_GRANT.to_string()),
    ]
}

/// Decides Access Requests on behalf of resource owners.
///
/// Decisions are remembered for the lifetime of the engine.
pub struct ApprovalEngine {
    issuer: Arc<dyn Issuer>,
    resolver: Option<Arc<dyn CredentialResolver>>,
    decisions: Mutex<HashMap<String, Decision>>,
}

impl ApprovalEngine {
    /// Creates a new ApprovalEngine with no decisions on record
    ///
    /// # Arguments
    /// * `issuer` - Signs the grants and denials this engine produces
    ///
    /// Requests can only be passed in full until [`ApprovalEngine::with_resolver`] is called.
    pub fn new(issuer: Arc<dyn Issuer>) -> Self {
        Self {
            issuer,
            resolver: None,
            decisions: Mutex::new(HashMap::new()),
        }
    }

    /// Lets requests be referenced by id.
    pub fn with_resolver(mut self, resolver: Arc<dyn CredentialResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// The decision already taken on `request_id`, if any.
    pub fn decision(&self, request_id: &str) -> Option<Decision> {
        self.lock().get(request_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Decision>> {
        // A poisoned map only means a panic elsewhere; its entries are still whole.
        self.decisions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn load(&self, request: RequestRef) -> AccessResult<Credential> {
        let credential = match request {
            RequestRef::Credential(credential) => *credential,
            RequestRef::Id(id) => {
                let resolver = self
                    .resolver
                    .as_ref()
                    .ok_or_else(|| AccessError::UnknownRequest(id.clone()))?;
                resolver
                    .resolve(&id)
                    .await?
                    .ok_or(AccessError::UnknownRequest(id))?
            }
        };
        if credential.kind() != CredentialKind::Request {
            return Err(AccessError::InvalidCredential(format!(
                "{} is a {}, not an access request",
                credential.id,
                credential.kind()
            )));
        }
        Ok(credential)
    }

    fn previous(&self, request_id: &str, approving: bool) -> AccessResult<Option<Credential>> {
        match (self.lock().get(request_id), approving) {
            (None, _) => Ok(None),
            (Some(Decision::Approved(grant)), true) => Ok(Some(grant.clone())),
            (Some(Decision::Denied(denial)), false) => Ok(Some(denial.clone())),
            (Some(Decision::Approved(_)), false) => Err(AccessError::UnknownRequest(format!(
                "{request_id} has already been approved"
            ))),
            (Some(Decision::Denied(_)), true) => Err(AccessError::UnknownRequest(format!(
                "{request_id} has already been denied"
            ))),
        }
    }

    /// Stores `decision` unless a concurrent call got there first, returning
    /// whichever decision is now on record.
    fn record(&self, request_id: &str, decision: Decision) -> AccessResult<Credential> {
        let approving = matches!(decision, Decision::Approved(_));
        let mut decisions = self.lock();
        let stored = decisions.entry(request_id.to_string()).or_insert(decision);
        match (stored, approving) {
            (Decision::Approved(c), true) | (Decision::Denied(c), false) => Ok(c.clone()),
            _ => Err(AccessError::UnknownRequest(format!(
                "{request_id} was decided concurrently"
            ))),
        }
    }

    fn request_subject(request: &Credential) -> AccessResult<&AccessRequestSubject> {
        match &request.body {
            CredentialBody::Request(subject) => Ok(subject),
            _ => Err(AccessError::InvalidCredential(format!(
                "{} is not an access request",
                request.id
            ))),
        }
    }

    /// Approves `request` on behalf of `owner`, optionally narrowing its scope.
    ///
    /// # Errors
    /// - `UnknownRequest` if the request cannot be resolved or was denied
    /// - `ScopeExceedsRequest` if the overrides (or the issued grant) widen the request
    /// - `InvalidRequestShape` if an override is empty
    /// - `IssuerUnavailable` if signing failed; nothing is recorded then
    pub async fn approve(
        &self,
        owner: &str,
        request: impl Into<RequestRef>,
        overrides: Option<GrantOverrides>,
    ) -> AccessResult<Credential> {
        let request = self.load(request.into()).await?;
        if let Some(grant) = self.previous(&request.id, true)? {
            info!("access request {} already approved as {}", request.id, grant.id);
            return Ok(grant);
        }
        let subject = Self::request_subject(&request)?;
        if let Some(named) = subject.resource_owner.as_deref().filter(|named| *named != owner) {
            warn!("request {} names owner {} but is decided by {}", request.id, named, owner);
        }

        let scope = narrow(subject, request.expiration_date, overrides.unwrap_or_default())?;
        let payload = AccessPayload {
            context: context(),
            types: vec![CredentialKind::Grant.type_tag().to_string()],
            issuance_date: None,
            expiration_date: scope.expiration_date,
            body: CredentialBody::Grant(AccessGrantSubject {
                resource_owner: owner.to_string(),
                requestor: subject.requestor.clone(),
                access: scope.access,
                resources: scope.resources,
                purpose: subject.purpose.clone(),
                custom_fields: subject.custom_fields.clone(),
                inbox: subject.inbox.clone(),
            }),
        };

        let grant = self.issuer.issue(&payload).await?;
        match &grant.body {
            CredentialBody::Grant(issued) => {
                if !issued.resources.is_subset(&subject.resources)
                    || !issued.access.is_subset(&subject.access)
                {
                    return Err(AccessError::ScopeExceedsRequest(format!(
                        "issuer returned grant {} wider than request {}",
                        grant.id, request.id
                    )));
                }
            }
            _ => {
                return Err(AccessError::InvalidCredential(format!(
                    "issuer returned a {} instead of an access grant",
                    grant.kind()
                )))
            }
        }

        let grant = self.record(&request.id, Decision::Approved(grant))?;
        info!("access request {} approved by {}: grant {}", request.id, owner, grant.id);
        Ok(grant)
    }

    /// Denies `request` on behalf of `owner`.
    ///
    /// The denial names both parties and carries no scope.
    pub async fn deny(&self, owner: &str, request: impl Into<RequestRef>) -> AccessResult<Credential> {
        let request = self.load(request.into()).await?;
        if let Some(denial) = self.previous(&request.id, false)? {
            info!("access request {} already denied as {}", request.id, denial.id);
            return Ok(denial);
        }
        let subject = Self::request_subject(&request)?;

        let payload = AccessPayload {
            context: context(),
            types: vec![CredentialKind::Denial.type_tag().to_string()],
            issuance_date: None,
            expiration_date: None,
            body: CredentialBody::Denial(AccessDenialSubject {
                resource_owner: owner.to_string(),
                requestor: subject.requestor.clone(),
            }),
        };
        let denial = self.issuer.issue(&payload).await?;
        if denial.kind() != CredentialKind::Denial {
            return Err(AccessError::InvalidCredential(format!(
                "issuer returned a {} instead of an access denial",
                denial.kind()
            )));
        }

        let denial = self.record(&request.id, Decision::Denied(denial))?;
        info!("access request {} denied by {}", request.id, owner);
        Ok(denial)
    }
}


#[cfg(test)]
mod properties {
    use super::*;
    use crate::services::request_builder::{RequestBuilder, RequestParams};
    use crate::testing::strategies::{arb_modes, arb_request_params};
    use crate::testing::{t0, FakeIssuer, OWNER, REQUESTOR};
    use chrono::Duration;
    use proptest::prelude::*;
    use proptest::sample::subsequence;

    const UNREQUESTED: &str = "https://other.example/data.ttl";

    /// A request together with overrides that may or may not stay inside it.
    fn arb_case() -> impl Strategy<Value = (RequestParams, GrantOverrides)> {
        arb_request_params().prop_flat_map(|params| {
            let pool: Vec<String> = params
                .resources
                .iter()
                .cloned()
                .chain([UNREQUESTED.to_string()])
                .collect();
            let size = pool.len();
            let overrides = (
                proptest::option::of(subsequence(pool, 1..=size)),
                proptest::option::of(arb_modes()),
                proptest::option::of(1i64..500),
            )
                .prop_map(|(resources, access, days)| GrantOverrides {
                    resources,
                    access: access.map(AccessModes::new),
                    expiration_date: days.map(|d| t0() + Duration::days(d)),
                });
            (Just(params), overrides)
        })
    }

    proptest! {
        #[test]
        fn test_approval_never_widens_request((params, overrides) in arb_case()) {
            let issuer = Arc::new(FakeIssuer::new());
            let payload = RequestBuilder::new(REQUESTOR).build_at(params, t0()).unwrap();
            let request = tokio_test::block_on(issuer.issue(&payload)).unwrap();
            let requested_resources = request.resources().unwrap().clone();
            let requested_access = request.access_modes().unwrap().clone();

            let widens = overrides
                .resources
                .iter()
                .flatten()
                .any(|r| !requested_resources.contains(r))
                || overrides
                    .access
                    .iter()
                    .flat_map(|a| a.iter())
                    .any(|m| !requested_access.contains(m))
                || matches!(
                    (overrides.expiration_date, request.expiration_date),
                    (Some(wanted), Some(limit)) if wanted > limit
                );

            let engine = ApprovalEngine::new(issuer.clone());
            match tokio_test::block_on(engine.approve(OWNER, &request, Some(overrides))) {
                Ok(grant) => {
                    prop_assert!(!widens);
                    prop_assert!(grant.resources().unwrap().is_subset(&requested_resources));
                    prop_assert!(grant.access_modes().unwrap().is_subset(&requested_access));
                    if let Some(limit) = request.expiration_date {
                        prop_assert!(grant.expiration_date.map_or(false, |e| e <= limit));
                    }
                }
                Err(AccessError::ScopeExceedsRequest(_)) => {
                    prop_assert!(widens);
                    prop_assert_eq!(engine.decision(&request.id), None);
                }
                Err(other) => {
                    prop_assert!(false, "unexpected error {:?}", other);
                }
            }
        }
    }
}
