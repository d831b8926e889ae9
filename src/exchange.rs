//! Workload Identity Federation Exchange
//!
//! Trades an external identity token for a service account access token in
//! two sequential calls:
//!
//! 1. `POST token_url` (STS) exchanges the subject token for a federated token
//! 2. `POST service_account_impersonation_url` (IAM Credentials) uses the
//!    federated token as a bearer credential to mint the service account token
//!
//! Nothing is cached or retried. A failure at any step ends the attempt.

use crate::config::ExchangeConfig;
use crate::error::{ExchangeError, Result};
use crate::subject::SubjectToken;
use crate::types::{
    FederatedToken, FederationRequest, FederationResponse, ImpersonatedToken,
    ImpersonationOptions, ImpersonationResponse,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("sa-token-exchange/", env!("CARGO_PKG_VERSION"));

/// Performs the federation + impersonation exchange
///
/// Holds no per-exchange state; clone it or share it across tasks freely.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http_client: Client,
    options: ImpersonationOptions,
}

impl TokenExchanger {
    /// Create an exchanger with a 30 second request timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create an exchanger whose HTTP calls time out after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self::with_client(http_client))
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(http_client: Client) -> Self {
        Self {
            http_client,
            options: ImpersonationOptions::default(),
        }
    }

    /// Override the impersonation scope, lifetime or delegates
    pub fn with_options(mut self, options: ImpersonationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ImpersonationOptions {
        &self.options
    }

    /// Exchange a subject token for a service account access token
    pub async fn exchange(
        &self,
        subject_token: &SubjectToken,
        config: &ExchangeConfig,
    ) -> Result<ImpersonatedToken> {
        config.validate()?;

        info!(
            audience = %config.audience,
            token_url = %config.token_url,
            "Exchanging subject token"
        );

        let federated = self.exchange_federated(subject_token, config).await?;
        let impersonated = self.impersonate(&federated, config).await?;

        info!(
            expire_time = impersonated.expire_time.as_deref().unwrap_or("unknown"),
            "Service account token obtained"
        );

        Ok(impersonated)
    }

    /// Same as [`exchange`](Self::exchange), returning only the token string
    pub async fn exchange_token(
        &self,
        subject_token: &SubjectToken,
        config: &ExchangeConfig,
    ) -> Result<String> {
        self.exchange(subject_token, config)
            .await
            .map(|token| token.access_token)
    }

    /// Step 1: trade the subject token for a federated token at the STS endpoint
    pub async fn exchange_federated(
        &self,
        subject_token: &SubjectToken,
        config: &ExchangeConfig,
    ) -> Result<FederatedToken> {
        let request = FederationRequest {
            audience: &config.audience,
            subject_token: subject_token.as_str(),
            subject_token_type: &config.subject_token_type,
        };

        let response = self
            .http_client
            .post(config.token_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let (status, body) = read_failure(response).await;
            warn!(status, "Token exchange rejected");
            return Err(ExchangeError::Federation { status, body });
        }

        let parsed: FederationResponse = response.json().await?;
        let access_token = non_empty(parsed.access_token)
            .ok_or_else(|| ExchangeError::missing_field("access_token"))?;

        debug!(
            token_type = parsed.token_type.as_deref().unwrap_or("unknown"),
            expires_in = parsed.expires_in,
            "Federated token obtained"
        );

        Ok(FederatedToken {
            access_token,
            token_type: parsed.token_type,
            expires_in: parsed.expires_in,
        })
    }

    /// Step 2: impersonate the service account using the federated token
    pub async fn impersonate(
        &self,
        federated: &FederatedToken,
        config: &ExchangeConfig,
    ) -> Result<ImpersonatedToken> {
        debug!(
            url = %config.service_account_impersonation_url,
            lifetime_secs = self.options.lifetime.as_secs(),
            "Impersonating service account"
        );

        let response = self
            .http_client
            .post(config.service_account_impersonation_url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", federated.access_token))
            .json(&self.options)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let (status, body) = read_failure(response).await;
            warn!(status, "Service account impersonation rejected");
            return Err(ExchangeError::Impersonation { status, body });
        }

        let parsed: ImpersonationResponse = response.json().await?;
        let access_token = non_empty(parsed.access_token)
            .ok_or_else(|| ExchangeError::missing_field("accessToken"))?;

        Ok(ImpersonatedToken {
            access_token,
            expire_time: parsed.expire_time,
            lifetime: self.options.lifetime,
        })
    }
}

/// Load the config at `config_path` and run a full exchange with defaults
pub async fn exchange_from_file(
    subject_token: &SubjectToken,
    config_path: impl AsRef<Path>,
) -> Result<ImpersonatedToken> {
    let config = ExchangeConfig::from_file(config_path)?;
    TokenExchanger::new()?.exchange(subject_token, &config).await
}

async fn read_failure(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("t".to_string())), Some("t".to_string()));
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn test_default_options() {
        let exchanger = TokenExchanger::new().unwrap();
        assert_eq!(exchanger.options(), &ImpersonationOptions::default());
        assert_eq!(exchanger.options().lifetime, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_any_request() {
        let mut config = ExchangeConfig::new(
            "aud",
            "http://127.0.0.1:9/token",
            "http://127.0.0.1:9/impersonate",
            "urn:ietf:params:oauth:token-type:jwt",
        )
        .unwrap();
        config.audience.clear();

        let subject = SubjectToken::new("abc.def.ghi").unwrap();
        let err = TokenExchanger::new()
            .unwrap()
            .exchange(&subject, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Config(_)));
    }
}
