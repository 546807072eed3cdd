// src/services/request_builder.rs
//! Access Request construction.
//!
//! [`RequestBuilder`] validates caller parameters and produces the unsigned
//! payload submitted to the issuer. Building is pure; [`RequestBuilder::issue`]
//! is the only operation that touches the network.

use crate::constants::{CONTEXT_ACCESS_GRANT, CONTEXT_VC_W3C};
use crate::error::{AccessError, AccessResult};
use crate::models::access::{AccessMode, AccessModes, CustomField, CustomFields, Purpose, ResourceSet};
use crate::models::credential::{
    AccessPayload, AccessRequestSubject, Credential, CredentialBody, CredentialKind,
};
use crate::services::credential_issuer::Issuer;
use chrono::{DateTime, Utc};
use log::info;
use reqwest::Url;
use serde_json::Value;

/// What a requestor asks for.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    /// Resources to access. Must not be empty.
    pub resources: Vec<String>,
    /// Access modes wanted. Must not be empty.
    pub access: Vec<AccessMode>,
    /// Owner of the resources, when the requestor knows it.
    pub resource_owner: Option<String>,
    pub purpose: Vec<String>,
    /// Strictly in the future when set.
    pub expiration_date: Option<DateTime<Utc>>,
    pub custom_fields: Vec<CustomField>,
    /// Where the requestor wants to be notified of the decision.
    pub inbox: Option<String>,
}

/// Builds Access Requests on behalf of one requestor.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    requestor: String,
}

fn check_uris<'a>(field: &str, values: impl IntoIterator<Item = &'a String>) -> AccessResult<()> {
    for value in values {
        if Url::parse(value).is_err() {
            return Err(AccessError::shape(
                field,
                format!("entry {value} is not a well-formed URI"),
            ));
        }
    }
    Ok(())
}

impl RequestBuilder {
    /// # Arguments
    /// * `requestor` - Identifier of the party asking for access
    pub fn new(requestor: impl Into<String>) -> Self {
        Self {
            requestor: requestor.into(),
        }
    }

    pub fn requestor(&self) -> &str {
        &self.requestor
    }

    /// Validates `params` against the current time.
    pub fn build(&self, params: RequestParams) -> AccessResult<AccessPayload> {
        self.build_at(params, Utc::now())
    }

    /// Validates `params` and assembles the unsigned request.
    ///
    /// # Errors
    /// `InvalidRequestShape` naming the first offending field:
    /// - `resources`: empty, or an entry that is not a URI
    /// - `access`: empty
    /// - `purpose`: an entry that is not a URI
    /// - `customFields`: a key that is not a URI, or a repeated key
    /// - `expirationDate`: not strictly after `now`
    pub fn build_at(&self, params: RequestParams, now: DateTime<Utc>) -> AccessResult<AccessPayload> {
        if params.resources.is_empty() {
            return Err(AccessError::shape("resources", "must not be empty"));
        }
        check_uris("resources", &params.resources)?;
        if params.access.is_empty() {
            return Err(AccessError::shape("access", "must not be empty"));
        }
        check_uris("purpose", &params.purpose)?;
        let custom_fields = CustomFields::try_from_fields(params.custom_fields)?;
        if let Some(expiration) = params.expiration_date {
            if expiration <= now {
                return Err(AccessError::shape(
                    "expirationDate",
                    format!("{} is not in the future", expiration.to_rfc3339()),
                ));
            }
        }

        Ok(AccessPayload {
            context: vec![
                Value::String(CONTEXT_VC_W3C.to_string()),
                Value::String(CONTEXT_ACCESS_GRANT.to_string()),
            ],
            types: vec![CredentialKind::Request.type_tag().to_string()],
            issuance_date: Some(now),
            expiration_date: params.expiration_date,
            body: CredentialBody::Request(AccessRequestSubject {
                requestor: self.requestor.clone(),
                resource_owner: params.resource_owner,
                access: AccessModes::new(params.access),
                resources: ResourceSet::new(params.resources),
                purpose: Purpose::new(params.purpose),
                custom_fields,
                inbox: params.inbox,
            }),
        })
    }

    /// Builds the request and has `issuer` sign it.
    ///
    /// # Errors
    /// Any validation error from [`build`](Self::build), `IssuerUnavailable`, or
    /// `InvalidCredential` when the issuer answers with something other than an
    /// Access Request.
    pub async fn issue(&self, params: RequestParams, issuer: &dyn Issuer) -> AccessResult<Credential> {
        let payload = self.build(params)?;
        let credential = issuer.issue(&payload).await?;
        if credential.kind() != CredentialKind::Request {
            return Err(AccessError::InvalidCredential(format!(
                "issuer returned a {} instead of an access request",
                credential.kind()
            )));
        }
        info!("access request {} issued for {}", credential.id, self.requestor);
        Ok(credential)
    }
}
