//! Service Account Token Exchange
//!
//! Trades an external identity token (GitHub Actions OIDC, Kubernetes
//! ServiceAccount token, ...) for a GCP service account access token using
//! Workload Identity Federation. No long-lived keys are involved.
//!
//! ## Binaries
//!
//! - `exchange-token`: Run one exchange from a config file and print the token
//!
//! ## Example
//!
//! ```ignore
//! use sa_token_exchange::{ExchangeConfig, SubjectToken, TokenExchanger};
//!
//! let config = ExchangeConfig::from_file("wif.json")?;
//! let subject = SubjectToken::from_file("/var/run/secrets/tokens/gcp")?;
//!
//! let token = TokenExchanger::new()?.exchange(&subject, &config).await?;
//! println!("{}", token.access_token);
//! ```

pub mod config;
pub mod error;
pub mod exchange;
pub mod subject;
pub mod types;

pub use config::ExchangeConfig;
pub use error::ExchangeError;
pub use exchange::{exchange_from_file, TokenExchanger};
pub use subject::SubjectToken;
pub use types::{FederatedToken, ImpersonatedToken, ImpersonationOptions};
