//! Exchange Configuration
//!
//! Loads the four parameters of a Workload Identity Federation exchange from
//! a JSON file. Files produced by `gcloud iam workload-identity-pools
//! create-cred-config` carry extra fields (`type`, `credential_source`, ...);
//! those are ignored.

use crate::error::{ExchangeError, Result};
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Parameters of one token exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Workload identity pool provider resource the subject token is meant for
    pub audience: String,
    /// STS token exchange endpoint
    pub token_url: Url,
    /// IAM Credentials `generateAccessToken` endpoint of the target service account
    pub service_account_impersonation_url: Url,
    /// Type of the subject token (e.g. `urn:ietf:params:oauth:token-type:jwt`)
    pub subject_token_type: String,
}

/// On-disk shape, every field optional so a missing one maps to a config error
#[derive(Debug, Deserialize)]
struct RawConfig {
    audience: Option<String>,
    token_url: Option<String>,
    service_account_impersonation_url: Option<String>,
    subject_token_type: Option<String>,
}

impl ExchangeConfig {
    /// Build and validate a config from its parts
    pub fn new(
        audience: impl Into<String>,
        token_url: &str,
        service_account_impersonation_url: &str,
        subject_token_type: impl Into<String>,
    ) -> Result<Self> {
        RawConfig {
            audience: Some(audience.into()),
            token_url: Some(token_url.to_string()),
            service_account_impersonation_url: Some(service_account_impersonation_url.to_string()),
            subject_token_type: Some(subject_token_type.into()),
        }
        .validate()
    }

    /// Load a config file from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading exchange config from {}", path.display());

        let contents = fs::read_to_string(path).map_err(|e| {
            ExchangeError::config(format!("failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json_str(&contents).map_err(|e| match e {
            ExchangeError::Config(msg) => {
                ExchangeError::config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse a config from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|e| ExchangeError::config(format!("invalid JSON: {}", e)))?;
        raw.validate()
    }

    /// Re-check the invariants of an already built config
    ///
    /// Fields are public, so a config can be edited after loading.
    pub fn validate(&self) -> Result<()> {
        require("audience", Some(&self.audience))?;
        require("subject_token_type", Some(&self.subject_token_type))?;
        check_scheme("token_url", &self.token_url)?;
        check_scheme(
            "service_account_impersonation_url",
            &self.service_account_impersonation_url,
        )
    }
}

impl RawConfig {
    fn validate(self) -> Result<ExchangeConfig> {
        let audience = require("audience", self.audience.as_ref())?;
        let token_url = require("token_url", self.token_url.as_ref())?;
        let impersonation_url = require(
            "service_account_impersonation_url",
            self.service_account_impersonation_url.as_ref(),
        )?;
        let subject_token_type = require("subject_token_type", self.subject_token_type.as_ref())?;

        Ok(ExchangeConfig {
            audience: audience.to_string(),
            token_url: parse_url("token_url", token_url)?,
            service_account_impersonation_url: parse_url(
                "service_account_impersonation_url",
                impersonation_url,
            )?,
            subject_token_type: subject_token_type.to_string(),
        })
    }
}

// Whitespace only counts toward emptiness; the value is kept as written
fn require<'a>(field: &str, value: Option<&'a String>) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.as_str()),
        _ => Err(ExchangeError::config(format!("missing field: {}", field))),
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| ExchangeError::config(format!("invalid {} '{}': {}", field, value, e)))?;
    check_scheme(field, &url)?;
    Ok(url)
}

fn check_scheme(field: &str, url: &Url) -> Result<()> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ExchangeError::config(format!(
            "invalid {}: unsupported scheme '{}'",
            field, other
        ))),
    }
}
