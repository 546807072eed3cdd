// src/config.rs
//! Configuration for the access services.
//!
//! Values are read, lowest precedence first, from:
//! - an optional `access-grants.{toml,json,yaml}` file in the working directory
//! - environment variables prefixed with `ACCESS_GRANTS_` (a `.env` file is honoured)
//!
//! ## Keys
//! - `issuer_endpoint`: base URL of the access issuer (`issue` and `status` live below it)
//! - `verifier_endpoint`: URL of the proof verification service
//! - `query_endpoint`: (Optional) URL of the credential query endpoint
//! - `fallback_management_url`: (Optional) management agent used when discovery finds none
//! - `http_timeout_secs`: (Optional) timeout for every remote call, default 30

use crate::error::AccessResult;
use crate::utils::http::parse_url;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use dotenv::dotenv;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

pub const ENV_PREFIX: &str = "ACCESS_GRANTS";
pub const CONFIG_FILE: &str = "access-grants";

fn default_timeout() -> u64 {
    30
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessConfig {
    pub issuer_endpoint: String,
    pub verifier_endpoint: String,
    #[serde(default)]
    pub query_endpoint: Option<String>,
    #[serde(default)]
    pub fallback_management_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,
}

impl AccessConfig {
    /// Loads the configuration from the optional file and the environment.
    pub fn load() -> AccessResult<Self> {
        dotenv().ok();
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name(CONFIG_FILE).required(false))
                .add_source(Environment::with_prefix(ENV_PREFIX)),
        )
    }

    /// Deserializes and validates whatever `builder` has been given.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> AccessResult<Self> {
        let config: AccessConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every endpoint is a well-formed URL.
    pub fn validate(&self) -> AccessResult<()> {
        self.issuer_url()?;
        self.verifier_url()?;
        self.query_url()?;
        self.fallback_url()?;
        Ok(())
    }

    pub fn issuer_url(&self) -> AccessResult<Url> {
        parse_url("issuer_endpoint", &self.issuer_endpoint)
    }

    pub fn verifier_url(&self) -> AccessResult<Url> {
        parse_url("verifier_endpoint", &self.verifier_endpoint)
    }

    pub fn query_url(&self) -> AccessResult<Option<Url>> {
        self.query_endpoint
            .as_deref()
            .map(|url| parse_url("query_endpoint", url))
            .transpose()
    }

    pub fn fallback_url(&self) -> AccessResult<Option<Url>> {
        self.fallback_management_url
            .as_deref()
            .map(|url| parse_url("fallback_management_url", url))
            .transpose()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
