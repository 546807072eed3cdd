// src/services/discovery.rs
//! Management agent discovery.
//!
//! A resource owner advertises the UI they use to review access requests in
//! the `/.well-known/solid` document at the root of their storage.

use crate::constants::{PREFERRED_MANAGEMENT_UI, WELL_KNOWN_SOLID};
use crate::error::AccessResult;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

#[async_trait]
pub trait AgentDiscovery: Send + Sync {
    /// Finds the management agent advertised for `target`.
    ///
    /// `Ok(None)` when nothing is advertised.
    async fn discover(&self, target: &Url) -> AccessResult<Option<Url>>;
}

/// Reads the management agent from a well-known document.
///
/// Accepts both `"key": "<url>"` and `"key": {"@id": "<url>"}`.
pub fn management_agent_from_document(document: &Value) -> Option<Url> {
    match document.get(PREFERRED_MANAGEMENT_UI)? {
        Value::Array(items) => items.iter().find_map(agent_url),
        entry => agent_url(entry),
    }
}

fn agent_url(entry: &Value) -> Option<Url> {
    let raw = match entry {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("@id")?.as_str()?,
        _ => return None,
    };
    Url::parse(raw).ok()
}

/// Discovers the management agent over HTTP.
#[derive(Clone)]
pub struct WellKnownDiscovery {
    client: Client,
}

impl WellKnownDiscovery {
    /// Creates a new WellKnownDiscovery
    ///
    /// # Arguments
    /// * `client` - Configured HTTP client used for the `.well-known/solid` lookup
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn well_known_url(target: &Url) -> Option<Url> {
        let mut root = target.clone();
        root.set_path("/");
        root.set_query(None);
        root.set_fragment(None);
        root.join(WELL_KNOWN_SOLID).ok()
    }
}

#[async_trait]
impl AgentDiscovery for WellKnownDiscovery {
    async fn discover(&self, target: &Url) -> AccessResult<Option<Url>> {
        let Some(url) = Self::well_known_url(target) else {
            return Ok(None);
        };
        debug!("discovering management agent at {}", url);

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("well-known lookup at {} failed: {}", url, e);
                return Ok(None);
            }
        };
        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("no well-known document at {}", url);
                return Ok(None);
            }
            status if !status.is_success() => {
                warn!("well-known lookup at {} returned {}", url, status);
                return Ok(None);
            }
            _ => {}
        }
        match response.json::<Value>().await {
            Ok(document) => Ok(management_agent_from_document(&document)),
            Err(e) => {
                warn!("unreadable well-known document at {}: {}", url, e);
                Ok(None)
            }
        }
    }
}
