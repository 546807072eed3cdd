// src/utils/http.rs
//! Shared HTTP plumbing for the remote collaborators.

use crate::error::{AccessError, AccessResult};
use reqwest::{Client, Url};
use std::time::Duration;

/// Builds the client every collaborator shares.
///
/// A request that exceeds `timeout` fails, and each collaborator maps that
/// failure onto its own `*Unavailable` error.
pub fn build_client(timeout: Duration) -> AccessResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AccessError::Configuration(format!("cannot build HTTP client: {}", e)))
}

/// Parses an endpoint URL from configuration.
pub fn parse_url(name: &str, value: &str) -> AccessResult<Url> {
    Url::parse(value).map_err(|e| AccessError::Configuration(format!("{name} [{value}]: {e}")))
}

/// Resolves `path` below `base`, treating `base` as a directory.
///
/// `https://vc.example/api` joined with `issue` gives `https://vc.example/api/issue`.
pub fn endpoint(base: &Url, path: &str) -> AccessResult<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(path)
        .map_err(|e| AccessError::Configuration(format!("cannot join {path} onto {base}: {e}")))
}
