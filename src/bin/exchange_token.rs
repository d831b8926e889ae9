//! Service Account Token Exchange CLI
//!
//! Exchanges an external identity token for a GCP service account access
//! token via Workload Identity Federation.
//!
//! ## Usage
//! ```bash
//! # With command line arguments
//! exchange-token \
//!   --config ./wif.json \
//!   --subject-token-path /var/run/secrets/tokens/gcp
//!
//! # With environment variables
//! EXCHANGE_CONFIG=./wif.json \
//! SUBJECT_TOKEN=$ID_TOKEN \
//! exchange-token --format json
//! ```

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use sa_token_exchange::types::CLOUD_PLATFORM_SCOPE;
use sa_token_exchange::{
    ExchangeConfig, ImpersonatedToken, ImpersonationOptions, SubjectToken, TokenExchanger,
};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Service Account Token Exchange
#[derive(Parser, Debug)]
#[command(name = "exchange-token")]
#[command(about = "Exchange an identity token for a GCP service account access token")]
#[command(version)]
#[command(group(ArgGroup::new("subject").required(true).args(["subject_token", "subject_token_path"])))]
struct Args {
    /// Path to the JSON exchange config
    #[arg(long, env = "EXCHANGE_CONFIG")]
    config: PathBuf,

    /// External identity token to exchange
    #[arg(long, env = "SUBJECT_TOKEN", hide_env_values = true)]
    subject_token: Option<String>,

    /// File containing the external identity token
    #[arg(long, env = "SUBJECT_TOKEN_PATH")]
    subject_token_path: Option<PathBuf>,

    /// Output file path (optional, prints to stdout if not specified)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Token)]
    format: Format,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: u64,

    /// Requested lifetime of the service account token in seconds
    #[arg(long, default_value = "3600", value_parser = clap::value_parser!(u64).range(1..))]
    lifetime_secs: u64,

    /// OAuth scope to request (repeatable)
    #[arg(long = "scope", default_value = CLOUD_PLATFORM_SCOPE)]
    scopes: Vec<String>,

    /// Delegate service account in the impersonation chain (repeatable)
    #[arg(long = "delegate")]
    delegates: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    json_logs: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Token,
    Json,
}

#[derive(Serialize)]
struct TokenOutput {
    access_token: String,
    expire_time: Option<String>,
    lifetime_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only the token
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_target(false);
    if args.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = ExchangeConfig::from_file(&args.config)?;

    let subject = match (&args.subject_token, &args.subject_token_path) {
        (Some(token), _) => SubjectToken::new(token.as_str())?,
        (None, Some(path)) => SubjectToken::from_file(path)?,
        (None, None) => anyhow::bail!("either --subject-token or --subject-token-path is required"),
    };

    let options = impersonation_options(&args);

    let exchanger = TokenExchanger::with_timeout(Duration::from_secs(args.timeout_secs))?
        .with_options(options);

    let token = match exchanger.exchange(&subject, &config).await {
        Ok(token) => token,
        Err(e) => {
            error!(status = e.status(), "Token exchange failed: {}", e);
            return Err(e.into());
        }
    };

    let output = render_output(args.format, &token)?;

    if let Some(output_path) = args.output {
        write_token_file(&output_path, &output)?;
        info!("Token saved to {}", output_path.display());
    } else {
        println!("{}", output);
        info!("Token generated successfully");
    }

    Ok(())
}

fn impersonation_options(args: &Args) -> ImpersonationOptions {
    ImpersonationOptions {
        delegates: args.delegates.clone(),
        scope: args.scopes.clone(),
        lifetime: Duration::from_secs(args.lifetime_secs),
    }
}

fn render_output(format: Format, token: &ImpersonatedToken) -> Result<String> {
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(&TokenOutput {
            access_token: token.access_token.clone(),
            // Keep the server's value when it is not RFC 3339
            expire_time: token
                .expires_at()
                .map(|t| t.to_rfc3339())
                .or_else(|| token.expire_time.clone()),
            lifetime_secs: token.lifetime.as_secs(),
        })?,
        Format::Token => token.access_token.clone(),
    })
}

/// Write the token to `path`, readable by the owner only
///
/// Permissions are restricted before any byte of the token is written,
/// including when the file already exists.
fn write_token_file(path: &Path, contents: &str) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict permissions on {}", path.display()))?;
    }

    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write token to {}", path.display()))
}
