// Authentication types

use chrono::{Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Result, XeroError};

/// OAuth scopes requested from Xero. Not configurable by callers.
pub const SCOPES: [&str; 3] = [
    "accounting.settings",
    "accounting.transactions",
    "offline_access",
];

/// Static application credentials registered with Xero
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,

    /// Opaque value round-tripped through the consent screen
    pub state: Option<String>,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            state: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .field("state", &self.state)
            .finish()
    }
}

/// OAuth token pair with its metadata
///
/// Unknown fields are kept in `extra` so a token document loaded from
/// external persistence is written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,

    /// Expiry as unix timestamp (seconds)
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<i64>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub token_type: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id_token: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub scope: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Optional metadata of an unexpected type is dropped instead of
// rejecting the whole document.

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

impl TokenSet {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: None,
            token_type: None,
            id_token: None,
            scope: None,
            extra: Map::new(),
        }
    }

    /// Parse and validate a raw token document
    pub fn from_value(value: Value) -> Result<Self> {
        let token: TokenSet = serde_json::from_value(value)
            .map_err(|e| XeroError::InvalidToken(e.to_string()))?;
        token.validate()?;
        Ok(token)
    }

    /// Both access_token and refresh_token must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(XeroError::InvalidToken(
                "access_token is missing or empty".to_string(),
            ));
        }
        if self.refresh_token.is_empty() {
            return Err(XeroError::InvalidToken(
                "refresh_token is missing or empty".to_string(),
            ));
        }
        Ok(())
    }

    /// A token without expiry information is treated as still valid
    pub fn expired(&self) -> bool {
        match self.expires_at {
            None => false,
            Some(exp) => Utc::now().timestamp() >= exp,
        }
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Convert into a token set, keeping `previous_refresh` when the
    /// response does not rotate the refresh token
    pub fn into_token_set(self, previous_refresh: Option<&str>) -> Result<TokenSet> {
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh.map(str::to_string))
            .unwrap_or_default();

        let token = TokenSet {
            access_token: self.access_token,
            refresh_token,
            expires_at: self
                .expires_in
                .map(|secs| (Utc::now() + Duration::seconds(secs)).timestamp()),
            token_type: self.token_type,
            id_token: self.id_token,
            scope: self.scope,
            extra: Map::new(),
        };
        token.validate()?;
        Ok(token)
    }
}

/// Subset of the OpenID provider configuration document
#[derive(Debug, Clone, Deserialize)]
pub struct AuthEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}
