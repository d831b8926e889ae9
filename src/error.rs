//! Exchange Errors
//!
//! Every failure of an exchange attempt is terminal and reported as one of
//! these variants, so callers can tell configuration mistakes apart from
//! network trouble and from misbehaving endpoints.

use thiserror::Error;

/// Errors that can occur while exchanging a subject token
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Missing or malformed configuration (or subject token)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-level failure on either HTTP call
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Token endpoint answered with a non-200 status
    #[error("Token exchange failed ({status}): {body}")]
    Federation { status: u16, body: String },

    /// A 200 response did not carry the expected field
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Impersonation endpoint answered with a non-200 status
    #[error("Service account impersonation failed ({status}): {body}")]
    Impersonation { status: u16, body: String },
}

impl ExchangeError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ExchangeError::Config(msg.into())
    }

    pub(crate) fn missing_field(field: &str) -> Self {
        ExchangeError::Protocol(format!("missing {}", field))
    }

    /// HTTP status carried by endpoint rejections
    pub fn status(&self) -> Option<u16> {
        match self {
            ExchangeError::Federation { status, .. }
            | ExchangeError::Impersonation { status, .. } => Some(*status),
            ExchangeError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T, E = ExchangeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExchangeError::Federation {
            status: 403,
            body: "denied".to_string(),
        };
        assert_eq!(err.to_string(), "Token exchange failed (403): denied");

        let err = ExchangeError::missing_field("access_token");
        assert_eq!(err.to_string(), "Protocol error: missing access_token");
    }

    #[test]
    fn test_error_status() {
        let err = ExchangeError::Impersonation {
            status: 401,
            body: String::new(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(ExchangeError::config("x").status(), None);
    }
}
