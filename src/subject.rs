//! Subject Tokens
//!
//! The externally issued identity token handed to the STS endpoint. It is
//! either passed in directly or read from a file, such as a Kubernetes
//! projected ServiceAccount token.

use crate::error::{ExchangeError, Result};
use std::fmt;
use std::fs;
use std::path::Path;

/// Opaque external identity token
#[derive(Clone, PartialEq, Eq)]
pub struct SubjectToken(String);

impl SubjectToken {
    /// Wrap a token string, rejecting empty input
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ExchangeError::config("subject token is empty"));
        }
        Ok(Self(token))
    }

    /// Read a token from a file, trimming surrounding whitespace
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ExchangeError::config(format!(
                "failed to read subject token from {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::new(contents.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Never print the token itself
impl fmt::Debug for SubjectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubjectToken(<{} bytes>)", self.0.len())
    }
}

impl TryFrom<&str> for SubjectToken {
    type Error = ExchangeError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for SubjectToken {
    type Error = ExchangeError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(SubjectToken::new(""), Err(ExchangeError::Config(_))));
        assert!(matches!(SubjectToken::new(" \n"), Err(ExchangeError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = SubjectToken::new("abc.def.ghi").unwrap();
        let debug = format!("{:?}", token);
        assert!(!debug.contains("abc"));
        assert_eq!(debug, "SubjectToken(<11 bytes>)");
    }

    #[test]
    fn test_from_file_trims_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "abc.def.ghi").unwrap();

        let token = SubjectToken::from_file(file.path()).unwrap();
        assert_eq!(token.as_str(), "abc.def.ghi");
    }

    #[test]
    fn test_from_missing_file() {
        let err = SubjectToken::from_file("/nonexistent/token").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/token"));
    }
}
