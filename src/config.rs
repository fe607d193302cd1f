use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Confirm, Input, Password};
use std::io::Write;
use std::path::PathBuf;
use url::Url;

use crate::auth::Credentials;
use crate::http_client::{ClientOptions, DEFAULT_API_URL, DEFAULT_IDENTITY_URL};

/// Xero Gateway - OAuth2 bridge for manual journals and chart of accounts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8000")]
    pub port: u16,

    /// Proxy API key for client authentication
    #[arg(short = 'k', long, env = "PROXY_API_KEY")]
    pub api_key: Option<String>,

    /// Xero app client id
    #[arg(long, env = "XERO_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Xero app client secret
    #[arg(long, env = "XERO_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Redirect URI registered for the Xero app
    #[arg(long, env = "XERO_REDIRECT_URI", default_value = "http://localhost:8000/callback")]
    pub redirect_uri: String,

    /// Path to the SQLite token database
    #[arg(short = 'd', long, env = "XERO_TOKEN_DB")]
    pub token_db: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "60")]
    pub http_timeout: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Authentication
    pub proxy_api_key: String,

    // Xero app
    pub xero_client_id: String,
    pub xero_client_secret: String,
    pub xero_redirect_uri: String,
    pub xero_state: Option<String>,
    pub xero_identity_url: String,
    pub xero_api_url: String,

    // Token persistence
    pub token_db_file: PathBuf,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();

        let config = Config {
            server_host: args.host,
            server_port: args.port,

            proxy_api_key: args
                .api_key
                .context("PROXY_API_KEY is required (use -k or set PROXY_API_KEY env var)")?,

            xero_client_id: args
                .client_id
                .context("XERO_CLIENT_ID is required (use --client-id or set XERO_CLIENT_ID)")?,

            xero_client_secret: args.client_secret.context(
                "XERO_CLIENT_SECRET is required (use --client-secret or set XERO_CLIENT_SECRET)",
            )?,

            xero_redirect_uri: args.redirect_uri,

            xero_state: std::env::var("XERO_STATE").ok().filter(|s| !s.is_empty()),

            xero_identity_url: std::env::var("XERO_IDENTITY_URL")
                .unwrap_or_else(|_| DEFAULT_IDENTITY_URL.to_string()),

            xero_api_url: std::env::var("XERO_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),

            token_db_file: match args.token_db {
                Some(path) => expand_tilde(&path),
                None => default_token_db()?,
            },

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.xero_client_id.trim().is_empty() {
            anyhow::bail!("XERO_CLIENT_ID cannot be empty");
        }
        if self.xero_client_secret.is_empty() {
            anyhow::bail!("XERO_CLIENT_SECRET cannot be empty");
        }

        Url::parse(&self.xero_redirect_uri)
            .with_context(|| format!("XERO_REDIRECT_URI is not a valid URL: {}", self.xero_redirect_uri))?;
        Url::parse(&self.xero_identity_url)
            .with_context(|| format!("XERO_IDENTITY_URL is not a valid URL: {}", self.xero_identity_url))?;
        Url::parse(&self.xero_api_url)
            .with_context(|| format!("XERO_API_URL is not a valid URL: {}", self.xero_api_url))?;

        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        let creds = Credentials::new(
            self.xero_client_id.clone(),
            self.xero_client_secret.clone(),
            self.xero_redirect_uri.clone(),
        );
        match self.xero_state {
            Some(ref state) => creds.with_state(state.clone()),
            None => creds,
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            identity_url: self.xero_identity_url.clone(),
            api_url: self.xero_api_url.clone(),
            connect_timeout: self.http_connect_timeout,
            request_timeout: self.http_request_timeout,
        }
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// ~/.xero-gateway/tokens.sqlite3
fn default_token_db() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home.join(".xero-gateway").join("tokens.sqlite3"))
}


// === Interactive Setup ===

/// Check if interactive setup is needed (no .env file and missing required values)
pub fn needs_interactive_setup() -> bool {
    let env_file_exists = std::path::Path::new(".env").exists();

    let has_proxy_key = std::env::var("PROXY_API_KEY").is_ok();
    let has_client_id = std::env::var("XERO_CLIENT_ID").is_ok();
    let has_client_secret = std::env::var("XERO_CLIENT_SECRET").is_ok();

    !env_file_exists && (!has_proxy_key || !has_client_id || !has_client_secret)
}

/// Configuration collected from interactive setup
#[derive(Debug, Clone)]
pub struct InteractiveConfig {
    pub proxy_api_key: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub server_port: String,
}

/// Run interactive setup to collect required configuration
pub fn run_interactive_setup() -> Result<InteractiveConfig> {
    println!();
    println!("Xero Gateway - First Time Setup");
    println!();
    println!("No configuration found. Create an app at https://developer.xero.com/app/manage");
    println!("and have its client id and secret ready.");
    println!();

    let proxy_api_key: String = Password::new()
        .with_prompt("Enter a password to protect your gateway (PROXY_API_KEY)")
        .interact()
        .context("Failed to read PROXY_API_KEY")?;

    if proxy_api_key.is_empty() {
        anyhow::bail!("PROXY_API_KEY cannot be empty");
    }

    let client_id: String = Input::new()
        .with_prompt("Xero client id (XERO_CLIENT_ID)")
        .interact_text()
        .context("Failed to read XERO_CLIENT_ID")?;

    let client_secret: String = Password::new()
        .with_prompt("Xero client secret (XERO_CLIENT_SECRET)")
        .interact()
        .context("Failed to read XERO_CLIENT_SECRET")?;

    let server_port: String = Input::new()
        .with_prompt("Server port")
        .default("8000".to_string())
        .interact_text()
        .context("Failed to read server port")?;

    let redirect_uri: String = Input::new()
        .with_prompt("Redirect URI registered for the app (XERO_REDIRECT_URI)")
        .default(format!("http://localhost:{}/callback", server_port))
        .interact_text()
        .context("Failed to read XERO_REDIRECT_URI")?;

    Url::parse(&redirect_uri)
        .with_context(|| format!("Redirect URI is not a valid URL: {}", redirect_uri))?;

    let config = InteractiveConfig {
        proxy_api_key,
        client_id,
        client_secret,
        redirect_uri,
        server_port,
    };

    println!();
    let save_to_env = Confirm::new()
        .with_prompt("Save configuration to .env file?")
        .default(true)
        .interact()
        .context("Failed to read save confirmation")?;

    if save_to_env {
        save_env_file(&config)?;
        println!();
        println!("Configuration saved to .env file");
    }

    println!();
    println!("Setup complete! Starting gateway...");
    println!();

    Ok(config)
}

/// Save configuration to .env file
fn save_env_file(config: &InteractiveConfig) -> Result<()> {
    let env_content = format!(
        r#"# Xero Gateway Configuration
# Generated by interactive setup

# Password to protect the gateway (required)
PROXY_API_KEY={}

# Xero app credentials (required)
XERO_CLIENT_ID={}
XERO_CLIENT_SECRET={}
XERO_REDIRECT_URI={}

# Server settings
SERVER_HOST=0.0.0.0
SERVER_PORT={}

# Logging (trace, debug, info, warn, error)
LOG_LEVEL=info
"#,
        config.proxy_api_key,
        config.client_id,
        config.client_secret,
        config.redirect_uri,
        config.server_port,
    );

    let mut file = std::fs::File::create(".env").context("Failed to create .env file")?;
    file.write_all(env_content.as_bytes())
        .context("Failed to write .env file")?;

    Ok(())
}
