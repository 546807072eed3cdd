// src/services/status_list.rs
//! Revocation status lists.
//!
//! A status list is a bitstring hosted by the issuer. Bit `i` (most significant
//! bit of byte 0 being index 0) is set when the credential holding index `i`
//! has been revoked. The list is published as a credential whose subject
//! carries the base64 bitstring in `encodedList`.

use crate::error::{AccessError, AccessResult};
use crate::utils::serialization::decode_base64_any;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Url};
use serde::Deserialize;

/// A decoded revocation bitstring.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusList {
    bits: Vec<u8>,
}

impl StatusList {
    /// An all-clear list able to hold `len` entries.
    pub fn with_capacity(len: usize) -> Self {
        StatusList {
            bits: vec![0; (len + 7) / 8],
        }
    }

    pub fn from_bytes(bits: Vec<u8>) -> Self {
        StatusList { bits }
    }

    /// Decodes an `encodedList` value in either base64 alphabet.
    pub fn from_encoded(encoded: &str) -> AccessResult<Self> {
        decode_base64_any(encoded)
            .map(StatusList::from_bytes)
            .map_err(AccessError::StatusListUnavailable)
    }

    pub fn encode(&self) -> String {
        base64::encode(&self.bits)
    }

    /// Number of entries the list can address.
    pub fn len(&self) -> usize {
        self.bits.len() * 8
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// `None` when `index` lies past the end of the list.
    pub fn is_revoked(&self, index: usize) -> Option<bool> {
        let byte = self.bits.get(index / 8)?;
        Some(byte & (0x80 >> (index % 8)) != 0)
    }

    /// Sets the bit at `index`, growing the list when needed.
    pub fn revoke(&mut self, index: usize) {
        let byte = index / 8;
        if byte >= self.bits.len() {
            self.bits.resize(byte + 1, 0);
        }
        self.bits[byte] |= 0x80 >> (index % 8);
    }
}

/// Fetches the status list at a URL. Implementations must not cache.
#[async_trait]
pub trait StatusListFetcher: Send + Sync {
    /// # Errors
    /// `StatusListUnavailable` when the list cannot be obtained or decoded.
    async fn fetch(&self, url: &str) -> AccessResult<StatusList>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusListCredential {
    credential_subject: StatusListSubject,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusListSubject {
    encoded_list: String,
}

/// Dereferences status list credentials over HTTP.
#[derive(Clone)]
pub struct HttpStatusListFetcher {
    client: Client,
}

impl HttpStatusListFetcher {
    /// Creates a new HttpStatusListFetcher
    ///
    /// # Arguments
    /// * `client` - Configured HTTP client; its timeout bounds every fetch
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusListFetcher for HttpStatusListFetcher {
    async fn fetch(&self, url: &str) -> AccessResult<StatusList> {
        let unavailable = |e: String| AccessError::StatusListUnavailable(format!("{url}: {e}"));
        let target = Url::parse(url).map_err(|e| unavailable(e.to_string()))?;
        debug!("fetching status list {}", target);

        let response = self
            .client
            .get(target)
            .header("accept", "application/ld+json, application/json")
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("returned {status}")));
        }
        let list: StatusListCredential = response
            .json()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        StatusList::from_encoded(&list.credential_subject.encoded_list)
    }
}
