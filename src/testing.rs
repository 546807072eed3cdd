// src/testing.rs
//! Sample credentials and deterministic in-memory collaborators for the test suites.

use crate::constants::{CONTEXT_ACCESS_GRANT, CONTEXT_VC_W3C, CREDENTIAL_TYPE_BASE, REVOCATION_STATUS_TYPE};
use crate::error::{AccessError, AccessResult};
use crate::models::access::{
    AccessMode, AccessModes, CustomField, CustomFields, Purpose, ResourceSet,
};
use crate::models::credential::{
    AccessDenialSubject, AccessGrantSubject, AccessPayload, AccessRequestSubject, Credential,
    CredentialBody, StatusEntry,
};
use crate::services::credential_issuer::Issuer;
use crate::services::discovery::AgentDiscovery;
use crate::services::proof::{ProofVerdict, ProofVerifier};
use crate::services::resolver::CredentialResolver;
use crate::services::status_list::{StatusList, StatusListFetcher};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ISSUER: &str = "https://issuer.example";
pub const OWNER: &str = "https://owner.example/profile#me";
pub const REQUESTOR: &str = "https://requestor.example/profile#me";
pub const RESOURCE: &str = "https://pod.example/file.txt";
pub const PURPOSE: &str = "https://w3id.org/dpv#AcademicResearch";
pub const STATUS_LIST: &str = "https://issuer.example/status/1";
pub const PROJECT_FIELD: &str = "https://example.org/ns#project";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The issuance instant every sample uses.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn context() -> Vec<Value> {
    vec![json!(CONTEXT_VC_W3C), json!(CONTEXT_ACCESS_GRANT)]
}

fn status_entry(index: usize) -> StatusEntry {
    StatusEntry {
        id: format!("{STATUS_LIST}#{index}"),
        kind: REVOCATION_STATUS_TYPE.to_string(),
        status_purpose: Some("revocation".to_string()),
        status_list_index: index,
        status_list_credential: STATUS_LIST.to_string(),
    }
}

fn proof(seed: &str) -> Value {
    json!({
        "type": "Ed25519Signature2020",
        "proofPurpose": "assertionMethod",
        "verificationMethod": format!("{ISSUER}/key/1"),
        "proofValue": format!("z{seed}")
    })
}

fn custom_fields() -> CustomFields {
    CustomFields::try_from_fields([CustomField::new(PROJECT_FIELD, "pod-study")]).unwrap()
}

pub fn request_subject() -> AccessRequestSubject {
    AccessRequestSubject {
        requestor: REQUESTOR.to_string(),
        resource_owner: Some(OWNER.to_string()),
        access: AccessModes::new([AccessMode::Read]),
        resources: ResourceSet::new([RESOURCE]),
        purpose: Purpose::new([PURPOSE]),
        custom_fields: custom_fields(),
        inbox: Some("https://requestor.example/inbox/".to_string()),
    }
}

pub fn sample_request() -> Credential {
    Credential {
        context: context(),
        id: format!("{ISSUER}/vc/request-1"),
        issuer: ISSUER.to_string(),
        issuance_date: t0(),
        expiration_date: Some(t0() + Duration::days(30)),
        types: vec![CREDENTIAL_TYPE_BASE.to_string(), "SolidAccessRequest".to_string()],
        body: CredentialBody::Request(request_subject()),
        status: Some(status_entry(3)),
        proof: Some(proof("request")),
    }
}

pub fn sample_grant() -> Credential {
    let request = request_subject();
    Credential {
        context: context(),
        id: format!("{ISSUER}/vc/grant-1"),
        issuer: ISSUER.to_string(),
        issuance_date: t0(),
        expiration_date: Some(t0() + Duration::days(30)),
        types: vec![CREDENTIAL_TYPE_BASE.to_string(), "SolidAccessGrant".to_string()],
        body: CredentialBody::Grant(AccessGrantSubject {
            resource_owner: OWNER.to_string(),
            requestor: request.requestor,
            access: request.access,
            resources: request.resources,
            purpose: request.purpose,
            custom_fields: request.custom_fields,
            inbox: request.inbox,
        }),
        status: Some(status_entry(7)),
        proof: Some(proof("grant")),
    }
}

pub fn sample_denial() -> Credential {
    Credential {
        context: context(),
        id: format!("{ISSUER}/vc/denial-1"),
        issuer: ISSUER.to_string(),
        issuance_date: t0(),
        expiration_date: None,
        types: vec![CREDENTIAL_TYPE_BASE.to_string(), "SolidAccessDenial".to_string()],
        body: CredentialBody::Denial(AccessDenialSubject {
            resource_owner: OWNER.to_string(),
            requestor: REQUESTOR.to_string(),
        }),
        status: None,
        proof: Some(proof("denial")),
    }
}

pub fn sample_request_payload() -> AccessPayload {
    AccessPayload {
        context: context(),
        types: vec!["SolidAccessRequest".to_string()],
        issuance_date: None,
        expiration_date: Some(t0() + Duration::days(30)),
        body: CredentialBody::Request(request_subject()),
    }
}

/// In-memory issuer. Issued credentials get sequential ids and status indices,
/// and revocations land in a status list shared with [`FakeStatusLists`].
pub struct FakeIssuer {
    now: DateTime<Utc>,
    counter: AtomicUsize,
    revoked: Arc<Mutex<StatusList>>,
    unavailable: AtomicBool,
    widen_grants: bool,
    pub issued: Mutex<Vec<AccessPayload>>,
    pub revocations: AtomicUsize,
}

impl FakeIssuer {
    pub fn new() -> Self {
        FakeIssuer {
            now: t0(),
            counter: AtomicUsize::new(0),
            revoked: Arc::new(Mutex::new(StatusList::with_capacity(64))),
            unavailable: AtomicBool::new(false),
            widen_grants: false,
            issued: Mutex::new(Vec::new()),
            revocations: AtomicUsize::new(0),
        }
    }

    /// An issuer that slips `Write` into every grant it signs.
    pub fn widening() -> Self {
        FakeIssuer {
            widen_grants: true,
            ..FakeIssuer::new()
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn issue_count(&self) -> usize {
        self.issued.lock().unwrap().len()
    }

    pub fn status_lists(&self) -> FakeStatusLists {
        FakeStatusLists {
            list: Arc::clone(&self.revoked),
            fetches: AtomicUsize::new(0),
        }
    }

    fn check_available(&self) -> AccessResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AccessError::IssuerUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Issuer for FakeIssuer {
    async fn issue(&self, payload: &AccessPayload) -> AccessResult<Credential> {
        self.check_available()?;
        self.issued.lock().unwrap().push(payload.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;

        let mut types = vec![CREDENTIAL_TYPE_BASE.to_string()];
        types.extend(payload.types.iter().filter(|t| *t != CREDENTIAL_TYPE_BASE).cloned());

        let mut body = payload.body.clone();
        if let CredentialBody::Grant(subject) = &mut body {
            if self.widen_grants {
                subject.access = subject.access.iter().chain([AccessMode::Write]).collect();
            }
        }

        Ok(Credential {
            context: payload.context.clone(),
            id: format!("{ISSUER}/vc/{n}"),
            issuer: ISSUER.to_string(),
            issuance_date: self.now,
            expiration_date: payload.expiration_date,
            types,
            body,
            status: Some(status_entry(n)),
            proof: Some(proof(&n.to_string())),
        })
    }

    async fn revoke(&self, credential: &Credential) -> AccessResult<()> {
        self.check_available()?;
        let status = credential
            .status
            .as_ref()
            .ok_or_else(|| AccessError::InvalidCredential("no status entry".into()))?;
        self.revoked.lock().unwrap().revoke(status.status_list_index);
        self.revocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Serves the one status list at [`STATUS_LIST`].
pub struct FakeStatusLists {
    list: Arc<Mutex<StatusList>>,
    pub fetches: AtomicUsize,
}

impl FakeStatusLists {
    pub fn with_revoked(indices: &[usize]) -> Self {
        let mut list = StatusList::with_capacity(64);
        for index in indices {
            list.revoke(*index);
        }
        FakeStatusLists {
            list: Arc::new(Mutex::new(list)),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StatusListFetcher for FakeStatusLists {
    async fn fetch(&self, url: &str) -> AccessResult<StatusList> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if url != STATUS_LIST {
            return Err(AccessError::StatusListUnavailable(format!("{url}: 404")));
        }
        Ok(self.list.lock().unwrap().clone())
    }
}

/// Returns a fixed outcome for every proof.
pub struct FakeProofVerifier {
    outcome: AccessResult<ProofVerdict>,
    pub calls: AtomicUsize,
}

impl FakeProofVerifier {
    fn with(outcome: AccessResult<ProofVerdict>) -> Self {
        FakeProofVerifier {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn valid() -> Self {
        Self::with(Ok(ProofVerdict::valid()))
    }

    pub fn rejecting(reason: &str) -> Self {
        Self::with(Ok(ProofVerdict::invalid(reason)))
    }

    pub fn unreachable() -> Self {
        Self::with(Err(AccessError::VerifierUnavailable("timed out".into())))
    }
}

#[async_trait]
impl ProofVerifier for FakeProofVerifier {
    async fn verify_proof(&self, _credential: &Credential) -> AccessResult<ProofVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

#[derive(Default)]
pub struct FakeResolver {
    credentials: Mutex<HashMap<String, Credential>>,
}

impl FakeResolver {
    pub fn with(credentials: impl IntoIterator<Item = Credential>) -> Self {
        FakeResolver {
            credentials: Mutex::new(credentials.into_iter().map(|c| (c.id.clone(), c)).collect()),
        }
    }
}

#[async_trait]
impl CredentialResolver for FakeResolver {
    async fn resolve(&self, id: &str) -> AccessResult<Option<Credential>> {
        Ok(self.credentials.lock().unwrap().get(id).cloned())
    }
}

/// Advertises a fixed management agent, or none.
pub struct FakeDiscovery {
    agent: Option<Url>,
    pub lookups: Mutex<Vec<Url>>,
}

impl FakeDiscovery {
    pub fn advertising(agent: &str) -> Self {
        FakeDiscovery {
            agent: Some(Url::parse(agent).unwrap()),
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn absent() -> Self {
        FakeDiscovery {
            agent: None,
            lookups: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AgentDiscovery for FakeDiscovery {
    async fn discover(&self, target: &Url) -> AccessResult<Option<Url>> {
        self.lookups.lock().unwrap().push(target.clone());
        Ok(self.agent.clone())
    }
}

/// Generators for randomized tests.
pub mod strategies {
    use super::*;
    use crate::models::access::CustomValue;
    use crate::services::request_builder::RequestParams;
    use proptest::prelude::*;
    use proptest::sample::subsequence;

    pub const ALL_MODES: [AccessMode; 3] = [AccessMode::Read, AccessMode::Write, AccessMode::Append];

    pub fn arb_resource() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,8}(/[a-z0-9._-]{1,8}){0,2}".prop_map(|path| format!("https://pod.example/{path}"))
    }

    /// A non-empty subset of the access modes.
    pub fn arb_modes() -> impl Strategy<Value = Vec<AccessMode>> {
        subsequence(ALL_MODES.to_vec(), 1..=3)
    }

    /// Literals of every kind a custom field may carry. Floats are kept to
    /// quarters so their JSON text parses back to the same value.
    pub fn arb_custom_value() -> impl Strategy<Value = CustomValue> {
        prop_oneof![
            any::<bool>().prop_map(CustomValue::from),
            any::<i64>().prop_map(CustomValue::from),
            (-4000i32..4000).prop_filter_map("not a finite float", |q| {
                serde_json::Number::from_f64(f64::from(q) / 4.0).map(CustomValue::Number)
            }),
            "[ -~]{0,16}".prop_map(CustomValue::from),
        ]
    }

    pub fn arb_custom_fields() -> impl Strategy<Value = Vec<CustomField>> {
        proptest::collection::btree_map("[a-z]{1,6}", arb_custom_value(), 0..4).prop_map(|fields| {
            fields
                .into_iter()
                .map(|(name, value)| CustomField {
                    key: format!("https://example.org/ns#{name}"),
                    value,
                })
                .collect()
        })
    }

    /// Valid request parameters relative to [`t0`], with and without an owner.
    pub fn arb_request_params() -> impl Strategy<Value = RequestParams> {
        (
            proptest::collection::vec(arb_resource(), 1..5),
            arb_modes(),
            proptest::option::of(Just(OWNER.to_string())),
            proptest::collection::vec("[a-zA-Z]{1,10}".prop_map(|p| format!("https://w3id.org/dpv#{p}")), 0..3),
            proptest::option::of(1i64..400),
            arb_custom_fields(),
        )
            .prop_map(|(resources, access, resource_owner, purpose, days, custom_fields)| RequestParams {
                resources,
                access,
                resource_owner,
                purpose,
                expiration_date: days.map(|d| t0() + Duration::days(d)),
                custom_fields,
                inbox: None,
            })
    }
}
