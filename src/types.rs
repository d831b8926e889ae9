//! Wire types for the STS and IAM Credentials calls
//!
//! Request bodies are serialized exactly as the endpoints expect them;
//! response bodies keep every field optional so that a 200 without the
//! expected token surfaces as a protocol error instead of a decode error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

/// OAuth scope requested for impersonated tokens unless overridden
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Lifetime requested for impersonated tokens unless overridden
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

// ============================================================
// Federation (STS)
// ============================================================

#[derive(Debug, Serialize)]
pub(crate) struct FederationRequest<'a> {
    pub audience: &'a str,
    pub subject_token: &'a str,
    pub subject_token_type: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FederationResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
}

/// Short-lived token returned by the federation endpoint
#[derive(Clone)]
pub struct FederatedToken {
    pub access_token: String,
    /// Token type reported by the server, usually `Bearer`
    pub token_type: Option<String>,
    /// Seconds until expiry as reported by the server (not tracked)
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for FederatedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

// ============================================================
// Impersonation (IAM Credentials generateAccessToken)
// ============================================================

/// Options for the service account impersonation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpersonationOptions {
    /// Delegation chain, empty for direct impersonation
    pub delegates: Vec<String>,
    /// OAuth scopes requested for the impersonated token
    pub scope: Vec<String>,
    /// Requested token lifetime, sent as `"<seconds>s"`
    #[serde(serialize_with = "serialize_lifetime")]
    pub lifetime: Duration,
}

impl Default for ImpersonationOptions {
    fn default() -> Self {
        Self {
            delegates: Vec::new(),
            scope: vec![CLOUD_PLATFORM_SCOPE.to_string()],
            lifetime: DEFAULT_LIFETIME,
        }
    }
}

impl ImpersonationOptions {
    /// Set the requested lifetime
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Replace the requested scopes
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Add a delegate to the chain
    pub fn delegate(mut self, delegate: impl Into<String>) -> Self {
        self.delegates.push(delegate.into());
        self
    }
}

fn serialize_lifetime<S: Serializer>(lifetime: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{}s", lifetime.as_secs()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImpersonationResponse {
    pub access_token: Option<String>,
    pub expire_time: Option<String>,
}

/// Access token of the impersonated service account
#[derive(Clone)]
pub struct ImpersonatedToken {
    pub access_token: String,
    /// RFC 3339 expiry reported by the IAM Credentials API, if any
    pub expire_time: Option<String>,
    /// Lifetime that was requested for this token
    pub lifetime: Duration,
}

impl ImpersonatedToken {
    /// Parsed expiry timestamp, when the server returned a valid one
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expire_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

impl std::fmt::Debug for ImpersonatedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImpersonatedToken")
            .field("access_token", &"<redacted>")
            .field("expire_time", &self.expire_time)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_impersonation_body() {
        let body = serde_json::to_value(ImpersonationOptions::default()).unwrap();
        assert_eq!(
            body,
            json!({
                "delegates": [],
                "scope": ["https://www.googleapis.com/auth/cloud-platform"],
                "lifetime": "3600s"
            })
        );
    }

    #[test]
    fn test_custom_impersonation_body() {
        let options = ImpersonationOptions::default()
            .lifetime(Duration::from_secs(900))
            .scopes(["https://www.googleapis.com/auth/devstorage.read_only"])
            .delegate("projects/-/serviceAccounts/relay@proj.iam.gserviceaccount.com");

        let body = serde_json::to_value(&options).unwrap();
        assert_eq!(body["lifetime"], "900s");
        assert_eq!(
            body["scope"],
            json!(["https://www.googleapis.com/auth/devstorage.read_only"])
        );
        assert_eq!(body["delegates"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_federation_request_body() {
        let request = FederationRequest {
            audience: "aud",
            subject_token: "abc.def.ghi",
            subject_token_type: "urn:ietf:params:oauth:token-type:jwt",
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "audience": "aud",
                "subject_token": "abc.def.ghi",
                "subject_token_type": "urn:ietf:params:oauth:token-type:jwt"
            })
        );
    }

    #[test]
    fn test_impersonation_response_camel_case() {
        let response: ImpersonationResponse = serde_json::from_str(
            r#"{"accessToken":"sa-123","expireTime":"2026-10-16T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(response.access_token.as_deref(), Some("sa-123"));

        let token = ImpersonatedToken {
            access_token: "sa-123".to_string(),
            expire_time: response.expire_time,
            lifetime: DEFAULT_LIFETIME,
        };
        let expires_at = token.expires_at().unwrap();
        assert_eq!(expires_at.to_rfc3339(), "2026-10-16T12:00:00+00:00");
        assert!(!format!("{:?}", token).contains("sa-123"));
    }

    #[test]
    fn test_unparseable_expire_time() {
        let token = ImpersonatedToken {
            access_token: "t".to_string(),
            expire_time: Some("tomorrow".to_string()),
            lifetime: DEFAULT_LIFETIME,
        };
        assert!(token.expires_at().is_none());
    }
}
