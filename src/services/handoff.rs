// src/services/handoff.rs
//! Redirect handoff between requestor and resource owner.
//!
//! A credential crosses from one origin to the other inside a single query
//! parameter ([`HANDOFF_PARAM`]) of a redirect URL. The value is either the
//! whole credential as unpadded base64url JSON, or the credential id for the
//! far end to resolve. A second parameter ([`REDIRECT_URL_PARAM`]) tells the
//! management agent where to send the owner back.
//!
//! Navigation itself always goes through a caller-supplied callback.

use crate::constants::{HANDOFF_PARAM, REDIRECT_URL_PARAM};
use crate::error::{AccessError, AccessResult};
use crate::models::credential::{Credential, CredentialKind};
use crate::services::discovery::AgentDiscovery;
use crate::services::resolver::CredentialResolver;
use crate::utils::serialization::{decode_base64_json, encode_base64_json};
use log::{debug, info, warn};
use reqwest::Url;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// What travels in the handoff parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffReference {
    /// The full credential.
    Credential(Box<Credential>),
    /// Only its id; the receiver resolves it.
    Id(String),
}

impl From<Credential> for HandoffReference {
    fn from(credential: Credential) -> Self {
        HandoffReference::Credential(Box::new(credential))
    }
}

/// Places `reference` on `target`, optionally pointing back at `return_to`.
///
/// Existing query parameters of `target` are preserved.
pub fn encode_for_handoff(
    reference: &HandoffReference,
    target: &Url,
    return_to: Option<&Url>,
) -> AccessResult<Url> {
    let value = match reference {
        HandoffReference::Credential(credential) => encode_base64_json(credential.as_ref())
            .map_err(AccessError::MalformedHandoff)?,
        HandoffReference::Id(id) => id.clone(),
    };
    let mut url = target.clone();
    {
        let mut query = url.query_pairs_mut();
        query.append_pair(HANDOFF_PARAM, &value);
        if let Some(return_to) = return_to {
            query.append_pair(REDIRECT_URL_PARAM, return_to.as_str());
        }
    }
    Ok(url)
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Reads the handoff parameter of `url` without resolving ids.
///
/// # Errors
/// `MalformedHandoff` if the parameter is absent, is neither a URL nor base64
/// JSON, or does not hold a request, grant or denial.
pub fn decode_reference(url: &Url) -> AccessResult<HandoffReference> {
    let value = query_param(url, HANDOFF_PARAM)
        .ok_or_else(|| AccessError::MalformedHandoff(format!("{url} has no {HANDOFF_PARAM} parameter")))?;
    if Url::parse(&value).is_ok() {
        return Ok(HandoffReference::Id(value));
    }
    let json: Value = decode_base64_json(&value).map_err(AccessError::MalformedHandoff)?;
    Credential::from_value(json)
        .map(HandoffReference::from)
        .map_err(|e| AccessError::MalformedHandoff(format!("not an access credential: {e}")))
}

/// Decodes the full credential carried by `url`.
///
/// An id reference is reported as `MalformedHandoff`; use [`resolve_handoff`]
/// to accept both forms.
pub fn decode_from_handoff(url: &Url) -> AccessResult<Credential> {
    match decode_reference(url)? {
        HandoffReference::Credential(credential) => Ok(*credential),
        HandoffReference::Id(id) => Err(AccessError::MalformedHandoff(format!(
            "{HANDOFF_PARAM} carries the id {id}, not a credential"
        ))),
    }
}

/// Decodes `url`, dereferencing an id reference through `resolver`.
pub async fn resolve_handoff(url: &Url, resolver: &dyn CredentialResolver) -> AccessResult<Credential> {
    match decode_reference(url)? {
        HandoffReference::Credential(credential) => Ok(*credential),
        HandoffReference::Id(id) => {
            debug!("resolving handoff reference {}", id);
            resolver
                .resolve(&id)
                .await?
                .ok_or_else(|| AccessError::MalformedHandoff(format!("credential {id} does not exist")))
        }
    }
}

/// The return address the requestor placed on a management agent URL.
pub fn requestor_redirect_url(url: &Url) -> AccessResult<Url> {
    let value = query_param(url, REDIRECT_URL_PARAM).ok_or_else(|| {
        AccessError::MalformedHandoff(format!("{url} has no {REDIRECT_URL_PARAM} parameter"))
    })?;
    Url::parse(&value)
        .map_err(|e| AccessError::MalformedHandoff(format!("{REDIRECT_URL_PARAM} {value}: {e}")))
}

/// Performs the actual navigation, e.g. by setting a `Location` header.
pub type RedirectCallback = Box<dyn Fn(&Url) + Send + Sync>;

/// Per-call redirect policy.
#[derive(Default)]
pub struct RedirectOptions {
    /// Required: there is no implicit navigation.
    pub redirect_callback: Option<RedirectCallback>,
    /// Used when the owner advertises no management agent.
    pub fallback_management_url: Option<Url>,
    /// Carry only the credential id instead of the whole credential.
    pub by_reference: bool,
}

impl RedirectOptions {
    /// Options that navigate by calling `callback` with the target URL.
    pub fn with_callback(callback: impl Fn(&Url) + Send + Sync + 'static) -> Self {
        RedirectOptions {
            redirect_callback: Some(Box::new(callback)),
            ..RedirectOptions::default()
        }
    }

    /// Sets the management agent used when discovery finds none.
    pub fn fallback(mut self, url: Url) -> Self {
        self.fallback_management_url = Some(url);
        self
    }

    pub fn by_reference(mut self) -> Self {
        self.by_reference = true;
        self
    }

    fn callback(&self) -> AccessResult<&RedirectCallback> {
        self.redirect_callback
            .as_ref()
            .ok_or(AccessError::MissingRedirectCallback)
    }

    fn reference(&self, credential: &Credential) -> HandoffReference {
        if self.by_reference {
            HandoffReference::Id(credential.id.clone())
        } else {
            HandoffReference::from(credential.clone())
        }
    }
}

impl fmt::Debug for RedirectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectOptions")
            .field("redirect_callback", &self.redirect_callback.is_some())
            .field("fallback_management_url", &self.fallback_management_url)
            .field("by_reference", &self.by_reference)
            .finish()
    }
}

/// Drives both legs of the handoff.
#[derive(Clone)]
pub struct RedirectHandoff {
    discovery: Arc<dyn AgentDiscovery>,
}

impl RedirectHandoff {
    /// Creates a new RedirectHandoff
    ///
    /// # Arguments
    /// * `discovery` - Looks up the resource owner's management agent
    pub fn new(discovery: Arc<dyn AgentDiscovery>) -> Self {
        Self { discovery }
    }

    /// Finds where the owner reviews requests, falling back to
    /// `options.fallback_management_url`.
    ///
    /// Discovery runs against the owner's identifier when the request names
    /// one, and against the first resource otherwise.
    pub async fn management_agent(
        &self,
        request: &Credential,
        options: &RedirectOptions,
    ) -> AccessResult<Url> {
        let target = request
            .resource_owner()
            .ok()
            .and_then(|owner| Url::parse(owner).ok())
            .or_else(|| {
                request
                    .resources()
                    .ok()
                    .and_then(|resources| resources.first())
                    .and_then(|resource| Url::parse(resource).ok())
            });

        let discovered = match &target {
            Some(target) => match self.discovery.discover(target).await {
                Ok(found) => found,
                Err(e) => {
                    warn!("management agent discovery for {} failed: {}", target, e);
                    None
                }
            },
            None => None,
        };

        discovered
            .or_else(|| options.fallback_management_url.clone())
            .ok_or_else(|| {
                AccessError::ManagementAgentNotFound(
                    target.map_or_else(|| request.id.clone(), |t| t.to_string()),
                )
            })
    }

    /// Sends the owner to their management agent to review `request`.
    ///
    /// `return_to` is where the agent sends the decision. Returns the URL
    /// passed to the callback.
    ///
    /// # Errors
    /// - `MissingRedirectCallback` when no callback is supplied
    /// - `InvalidCredential` when `request` is not an Access Request
    /// - `ManagementAgentNotFound` when discovery fails and no fallback is set
    pub async fn redirect_to_management_agent(
        &self,
        request: &Credential,
        return_to: &Url,
        options: &RedirectOptions,
    ) -> AccessResult<Url> {
        let callback = options.callback()?;
        if request.kind() != CredentialKind::Request {
            return Err(AccessError::InvalidCredential(format!(
                "cannot hand a {} to a management agent",
                request.kind()
            )));
        }
        let agent = self.management_agent(request, options).await?;
        let url = encode_for_handoff(&options.reference(request), &agent, Some(return_to))?;
        info!("redirecting to management agent {} for {}", agent, request.id);
        callback(&url);
        Ok(url)
    }

    /// Returns the owner's decision to the requestor at `requestor_url`.
    ///
    /// # Errors
    /// - `MissingRedirectCallback` when no callback is supplied
    /// - `InvalidCredential` unless `decision` is a grant or a denial
    pub fn redirect_to_requestor(
        &self,
        decision: &Credential,
        requestor_url: &Url,
        options: &RedirectOptions,
    ) -> AccessResult<Url> {
        let callback = options.callback()?;
        if decision.kind() == CredentialKind::Request {
            return Err(AccessError::InvalidCredential(
                "an access request is not a decision".to_string(),
            ));
        }
        let url = encode_for_handoff(&options.reference(decision), requestor_url, None)?;
        info!("returning {} {} to {}", decision.kind(), decision.id, requestor_url);
        callback(&url);
        Ok(url)
    }
}
