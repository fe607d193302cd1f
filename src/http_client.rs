use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

use crate::auth::{self, AuthEndpoints, Credentials, TokenSet};
use crate::error::{Result, XeroError};
use crate::models::account::AccountsResponse;
use crate::models::journal::ManualJournals;
use crate::models::tenant::Tenant;

pub const DEFAULT_IDENTITY_URL: &str = "https://identity.xero.com";
pub const DEFAULT_API_URL: &str = "https://api.xero.com";

/// Connection settings for the Xero endpoints
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base of the OpenID discovery document
    pub identity_url: String,

    /// Base for /connections and /api.xro/2.0
    pub api_url: String,

    /// Connect timeout in seconds
    pub connect_timeout: u64,

    /// Request timeout in seconds
    pub request_timeout: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            connect_timeout: 30,
            request_timeout: 60,
        }
    }
}

/// Authorized Xero API client
///
/// Owns the token set and tenant list used for every accounting call.
/// Endpoints are discovered once by [`XeroClient::initialize`].
pub struct XeroClient {
    client: Client,
    credentials: Credentials,
    scopes: Vec<String>,
    options: ClientOptions,
    endpoints: Option<AuthEndpoints>,
    token_set: Option<TokenSet>,
    tenants: Vec<Tenant>,
}

impl XeroClient {
    pub fn new(credentials: Credentials, scopes: &[&str], options: ClientOptions) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(options.connect_timeout))
            .timeout(Duration::from_secs(options.request_timeout))
            .build()?;

        Ok(Self {
            client,
            credentials,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            options,
            endpoints: None,
            token_set: None,
            tenants: Vec::new(),
        })
    }

    /// Fetch the OpenID configuration to learn the authorize and token endpoints
    pub async fn initialize(&mut self) -> Result<()> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            self.options.identity_url.trim_end_matches('/')
        );
        tracing::debug!("Discovering OpenID configuration: {}", url);

        let response = send(self.client.get(&url)).await?;
        let endpoints: AuthEndpoints = response.json().await?;

        tracing::info!(
            authorization_endpoint = %endpoints.authorization_endpoint,
            token_endpoint = %endpoints.token_endpoint,
            "Xero client initialized"
        );

        self.endpoints = Some(endpoints);
        Ok(())
    }

    fn endpoints(&self) -> Result<&AuthEndpoints> {
        self.endpoints.as_ref().ok_or(XeroError::ClientNotInitialized)
    }

    pub fn build_consent_url(&self) -> Result<String> {
        let endpoints = self.endpoints()?;
        auth::build_consent_url(
            &endpoints.authorization_endpoint,
            &self.credentials,
            &self.scopes,
        )
    }

    pub fn set_token_set(&mut self, token_set: TokenSet) {
        self.token_set = Some(token_set);
    }

    pub fn read_token_set(&self) -> Option<&TokenSet> {
        self.token_set.as_ref()
    }

    pub fn tenants(&self) -> &[Tenant] {
        &self.tenants
    }

    /// Tenant id of the first connected organisation
    pub fn first_tenant_id(&self) -> Result<&str> {
        self.tenants
            .first()
            .map(|t| t.tenant_id.as_str())
            .ok_or(XeroError::NoTenants)
    }

    /// Run the refresh_token grant with the held refresh token
    pub async fn refresh_token(&mut self) -> Result<&TokenSet> {
        let endpoints = self.endpoints()?;
        let current = self
            .token_set
            .as_ref()
            .ok_or_else(|| XeroError::InvalidToken("no token set to refresh".to_string()))?;

        let refreshed = auth::refresh_grant(
            &self.client,
            &endpoints.token_endpoint,
            &self.credentials,
            &current.refresh_token,
        )
        .await?;

        Ok(self.token_set.insert(refreshed))
    }

    /// Complete the authorization-code flow from the redirect URL
    pub async fn api_callback(&mut self, request_url: &str) -> Result<&TokenSet> {
        let endpoints = self.endpoints()?;
        let params = auth::parse_callback(
            request_url,
            &self.credentials.redirect_uri,
            self.credentials.state.as_deref(),
        )?;

        let token = auth::exchange_code(
            &self.client,
            &endpoints.token_endpoint,
            &self.credentials,
            &params.code,
        )
        .await?;

        Ok(self.token_set.insert(token))
    }

    /// Reload the organisations this token is connected to
    pub async fn update_tenants(&mut self) -> Result<&[Tenant]> {
        let url = format!("{}/connections", self.api_base());
        let request = self
            .client
            .get(&url)
            .bearer_auth(self.bearer()?)
            .header("Accept", "application/json");

        let tenants: Vec<Tenant> = send(request).await?.json().await?;
        tracing::info!("Resolved {} connected tenant(s)", tenants.len());

        self.tenants = tenants;
        Ok(&self.tenants)
    }

    /// PUT /ManualJournals for a tenant
    pub async fn create_manual_journals(
        &self,
        tenant_id: &str,
        journals: &ManualJournals,
    ) -> Result<Value> {
        let url = format!("{}/api.xro/2.0/ManualJournals", self.api_base());
        let request = self
            .accounting_request(self.client.put(&url), tenant_id)?
            .json(journals);

        Ok(send(request).await?.json().await?)
    }

    /// GET /Accounts for a tenant
    pub async fn get_accounts(&self, tenant_id: &str) -> Result<AccountsResponse> {
        let url = format!("{}/api.xro/2.0/Accounts", self.api_base());
        let request = self.accounting_request(self.client.get(&url), tenant_id)?;

        Ok(send(request).await?.json().await?)
    }

    fn accounting_request(&self, builder: RequestBuilder, tenant_id: &str) -> Result<RequestBuilder> {
        Ok(builder
            .bearer_auth(self.bearer()?)
            .header("xero-tenant-id", tenant_id)
            .header("Accept", "application/json"))
    }

    fn bearer(&self) -> Result<&str> {
        self.token_set
            .as_ref()
            .map(|t| t.access_token.as_str())
            .ok_or_else(|| XeroError::InvalidToken("no access token set".to_string()))
    }

    fn api_base(&self) -> &str {
        self.options.api_url.trim_end_matches('/')
    }
}

/// Send a request once, turning non-success statuses into [`XeroError::Api`]
pub async fn send(request: RequestBuilder) -> Result<Response> {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            let error_kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connection_failed"
            } else if e.is_request() {
                "request_error"
            } else if e.is_body() {
                "body_error"
            } else if e.is_decode() {
                "decode_error"
            } else {
                "unknown"
            };

            tracing::warn!(
                error_kind = error_kind,
                error = %e,
                url = ?e.url().map(|u| u.as_str()),
                "HTTP request error"
            );
            return Err(e.into());
        }
    };

    let status = response.status();
    let url = response.url().clone();
    tracing::debug!(status = %status, url = %url, "Received HTTP response");

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(
        status = status.as_u16(),
        url = %url,
        response_body = %body,
        "HTTP request failed with error response"
    );

    Err(XeroError::Api {
        status: status.as_u16(),
        message: status.canonical_reason().unwrap_or("Unknown").to_string(),
        body,
    })
}
