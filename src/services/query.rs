// src/services/query.rs
//! Listing access credentials known to the access service.
//!
//! Filters travel as query parameters; the service pages its answer and
//! advertises neighbouring pages in `Link` headers, which are read back into
//! filters so a caller can follow them with another [`CredentialQuery::query`].

use crate::error::{AccessError, AccessResult};
use crate::models::credential::{Credential, CredentialKind};
use log::debug;
use reqwest::header::LINK;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state as the access service reports it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Pending,
    Denied,
    Granted,
    Canceled,
    Expired,
    Active,
    Revoked,
}

/// Look-back window for date filters.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryWindow {
    #[serde(rename = "P1D")]
    OneDay,
    #[serde(rename = "P7D")]
    OneWeek,
    #[serde(rename = "P1M")]
    OneMonth,
    #[serde(rename = "P3M")]
    ThreeMonths,
}

/// Query filter. Unset members do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialFilter {
    pub kind: Option<CredentialKind>,
    pub status: Option<CredentialStatus>,
    pub from_agent: Option<String>,
    pub to_agent: Option<String>,
    pub resource: Option<String>,
    pub purpose: Option<String>,
    pub issued_within: Option<QueryWindow>,
    pub revoked_within: Option<QueryWindow>,
    pub page_size: Option<u32>,
    /// Opaque page token handed out by the service.
    pub page: Option<String>,
}

fn token<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        _ => String::new(),
    }
}

fn parse_token<T: DeserializeOwned>(raw: &str) -> Option<T> {
    serde_json::from_value(Value::String(raw.to_string())).ok()
}

impl CredentialFilter {
    /// Query parameters, in a stable order.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(kind) = &self.kind {
            pairs.push(("type", kind.type_tag().to_string()));
        }
        if let Some(status) = &self.status {
            pairs.push(("status", token(status)));
        }
        let agents = [
            ("fromAgent", &self.from_agent),
            ("toAgent", &self.to_agent),
            ("resource", &self.resource),
            ("purpose", &self.purpose),
        ];
        for (name, value) in agents {
            if let Some(value) = value {
                pairs.push((name, value.clone()));
            }
        }
        if let Some(window) = &self.issued_within {
            pairs.push(("issuedWithin", token(window)));
        }
        if let Some(window) = &self.revoked_within {
            pairs.push(("revokedWithin", token(window)));
        }
        if let Some(size) = self.page_size {
            pairs.push(("pageSize", size.to_string()));
        }
        if let Some(page) = &self.page {
            pairs.push(("page", page.clone()));
        }
        pairs
    }

    /// Reads a filter back from a URL, ignoring unknown or unparsable parameters.
    pub fn from_url(url: &Url) -> Self {
        let mut filter = CredentialFilter::default();
        for (key, value) in url.query_pairs() {
            let value = value.into_owned();
            match key.as_ref() {
                "type" => filter.kind = parse_token(&value),
                "status" => filter.status = parse_token(&value),
                "fromAgent" => filter.from_agent = Some(value),
                "toAgent" => filter.to_agent = Some(value),
                "resource" => filter.resource = Some(value),
                "purpose" => filter.purpose = Some(value),
                "issuedWithin" => filter.issued_within = parse_token(&value),
                "revokedWithin" => filter.revoked_within = parse_token(&value),
                "pageSize" => filter.page_size = value.parse().ok(),
                "page" => filter.page = Some(value),
                _ => {}
            }
        }
        filter
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPage {
    pub items: Vec<Credential>,
    pub first: Option<CredentialFilter>,
    pub prev: Option<CredentialFilter>,
    pub next: Option<CredentialFilter>,
    pub last: Option<CredentialFilter>,
}

/// `(target, rels)` for every link in a `Link` header value.
fn parse_link_header(header: &str) -> Vec<(String, Vec<String>)> {
    let mut links = Vec::new();
    let mut rest = header;
    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        let target = rest[start + 1..start + len].trim().to_string();
        rest = &rest[start + len + 1..];
        let params_end = rest.find('<').unwrap_or(rest.len());
        let rels = rest[..params_end]
            .split(';')
            .filter_map(|param| {
                let param = param.trim().trim_end_matches(',').trim();
                let (name, value) = param.split_once('=')?;
                (name.trim().eq_ignore_ascii_case("rel")).then(|| value.trim().trim_matches('"'))
            })
            .flat_map(|value| value.split_whitespace().map(str::to_string))
            .collect();
        rest = &rest[params_end..];
        links.push((target, rels));
    }
    links
}

fn unexpected(msg: String) -> AccessError {
    AccessError::IssuerUnavailable(format!("unexpected query response: {msg}"))
}

fn paging(base: &Url, links: &[(String, Vec<String>)]) -> AccessResult<CredentialPage> {
    let mut page = CredentialPage::default();
    for rel in ["first", "prev", "next", "last"] {
        let mut targets = links
            .iter()
            .filter(|(_, rels)| rels.iter().any(|r| r == rel))
            .map(|(target, _)| target);
        let Some(target) = targets.next() else {
            continue;
        };
        if targets.next().is_some() {
            return Err(unexpected(format!("more than one {rel} link")));
        }
        let url = base
            .join(target)
            .map_err(|e| unexpected(format!("{rel} link {target}: {e}")))?;
        let filter = Some(CredentialFilter::from_url(&url));
        match rel {
            "first" => page.first = filter,
            "prev" => page.prev = filter,
            "next" => page.next = filter,
            _ => page.last = filter,
        }
    }
    Ok(page)
}

/// Client for the access service query endpoint.
#[derive(Clone)]
pub struct CredentialQuery {
    client: Client,
    endpoint: Url,
}

impl CredentialQuery {
    /// Creates a new CredentialQuery client
    ///
    /// # Arguments
    /// * `client` - Configured HTTP client
    /// * `endpoint` - URL of the query endpoint; filters are appended as query parameters
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Runs `filter` against the query endpoint.
    ///
    /// # Errors
    /// `IssuerUnavailable` when the service fails or answers without an
    /// `items` array, or with a repeated paging link; `InvalidCredential` when
    /// an item is not an access credential.
    pub async fn query(&self, filter: &CredentialFilter) -> AccessResult<CredentialPage> {
        let mut url = self.endpoint.clone();
        {
            let pairs = filter.to_query_pairs();
            if !pairs.is_empty() {
                let mut query = url.query_pairs_mut();
                for (name, value) in pairs {
                    query.append_pair(name, &value);
                }
            }
        }
        debug!("querying credentials at {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AccessError::IssuerUnavailable(format!("{url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AccessError::IssuerUnavailable(format!(
                "{url} returned {status}: {text}"
            )));
        }

        let header = response
            .headers()
            .get_all(LINK)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        let mut page = paging(&url, &parse_link_header(&header))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| unexpected(e.to_string()))?;
        let items = body
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| unexpected(format!("no items found in {body}")))?;
        page.items = items
            .iter()
            .cloned()
            .map(Credential::from_value)
            .collect::<AccessResult<Vec<_>>>()?;
        Ok(page)
    }
}
