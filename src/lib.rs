// src/lib.rs

//! # Access Grants
//!
//! Issue, hand off, approve, revoke and verify Access Grant credentials.
//!
//! An Access Grant is a signed, revocable credential through which a resource
//! owner lets a requestor access specific resources with specific modes. This
//! crate covers the lifecycle around it:
//!
//! 1. **Request**: [`RequestBuilder`] validates what a requestor wants and has it signed
//! 2. **Handoff**: [`RedirectHandoff`] carries the request to the owner's management
//!    agent inside a redirect URL, and the decision back
//! 3. **Decision**: [`ApprovalEngine`] turns the request into a Grant or a Denial
//! 4. **Verification**: [`CredentialVerifier`] checks structure, validity period,
//!    revocation status and proof, failing closed
//! 5. **Revocation**: [`RevocationEngine`] flips the grant's status list entry
//!
//! Signing, proof checking and status list hosting are remote services reached
//! through the traits in [`services`]. [`AccessServices::from_config`] wires the
//! HTTP implementations from an [`AccessConfig`].
//!
//! The crate logs through the `log` facade and never installs a logger.

pub mod accessor;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod testing;

pub use crate::config::AccessConfig;
pub use error::{AccessError, AccessResult};
pub use models::access::{AccessMode, AccessModes, CustomField, CustomFields, CustomValue, Purpose, ResourceSet};
pub use models::credential::{AccessPayload, Credential, CredentialBody, CredentialKind, StatusEntry};
pub use services::approval::{ApprovalEngine, Decision, GrantOverrides, RequestRef};
pub use services::handoff::{
    decode_from_handoff, encode_for_handoff, requestor_redirect_url, resolve_handoff, HandoffReference,
    RedirectHandoff, RedirectOptions,
};
pub use services::request_builder::{RequestBuilder, RequestParams};
pub use services::revocation::RevocationEngine;
pub use services::verifier::{is_grant_scope_sufficient, CredentialVerifier, Verification};
pub use services::AccessServices;
