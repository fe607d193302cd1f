// Xero adapter
// Holds the token pair, refreshes it when expired and wraps the accounting calls

use crate::auth::{Credentials, TokenSet, SCOPES};
use crate::error::{Result, XeroError};
use crate::http_client::{ClientOptions, XeroClient};
use crate::models::{
    AccountSummary, JournalFailure, JournalRequest, JournalSuccess, ManualJournals, Tenant,
};

/// Authentication and data-access wrapper around the Xero API
///
/// `init_client` must complete before any other operation except
/// `refresh_token` without a held token. The adapter is not synchronized;
/// share it behind a mutex when several tasks use it.
pub struct XeroAdapter {
    credentials: Credentials,
    options: ClientOptions,
    token: Option<TokenSet>,
    client: Option<XeroClient>,
}

impl XeroAdapter {
    /// Create an adapter against the public Xero endpoints
    pub fn new(credentials: Credentials, token: Option<TokenSet>) -> Result<Self> {
        Self::with_options(credentials, token, ClientOptions::default())
    }

    pub fn with_options(
        credentials: Credentials,
        token: Option<TokenSet>,
        options: ClientOptions,
    ) -> Result<Self> {
        if let Some(ref token) = token {
            token.validate()?;
        }

        Ok(Self {
            credentials,
            options,
            token,
            client: None,
        })
    }

    /// Currently held token pair (updated by refresh and callback)
    pub fn token_set(&self) -> Option<&TokenSet> {
        self.token.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    /// Tenants resolved by the last refresh or callback
    pub fn tenants(&self) -> &[Tenant] {
        self.client.as_ref().map(XeroClient::tenants).unwrap_or(&[])
    }

    /// Build the underlying client, discover endpoints and try a refresh
    pub async fn init_client(&mut self) -> Result<()> {
        let mut client = XeroClient::new(self.credentials.clone(), &SCOPES, self.options.clone())?;
        client.initialize().await?;
        self.client = Some(client);

        if let Err(e) = self.refresh_token().await {
            tracing::warn!("Initial token refresh failed: {}", e);
        }

        Ok(())
    }

    pub fn consent_url(&self) -> Result<String> {
        self.client()?.build_consent_url()
    }

    /// Refresh the held token if it has expired, then re-resolve tenants.
    /// No-op without a held token.
    pub async fn refresh_token(&mut self) -> Result<()> {
        let Some(token) = self.token.clone() else {
            tracing::debug!("No token held, skipping refresh");
            return Ok(());
        };

        let client = self.client.as_mut().ok_or(XeroError::ClientNotInitialized)?;
        client.set_token_set(token);

        if client.read_token_set().is_some_and(TokenSet::expired) {
            tracing::debug!("Access token expired, refreshing...");
            client.refresh_token().await?;
            self.token = client.read_token_set().cloned();
        }

        client.update_tenants().await?;
        Ok(())
    }

    /// Complete the consent flow and hand the new token pair back for persistence
    pub async fn process_callback(&mut self, request_url: &str) -> Result<TokenSet> {
        let client = self.client.as_mut().ok_or(XeroError::ClientNotInitialized)?;

        let token = client.api_callback(request_url).await?.clone();
        client.update_tenants().await?;

        self.token = Some(token.clone());
        Ok(token)
    }

    /// Submit one manual journal for the first tenant
    ///
    /// Every failure is reported as a [`JournalFailure`]; remote rejections
    /// carry the remote status code and reason phrase.
    pub async fn create_journal(
        &self,
        data: &JournalRequest,
    ) -> std::result::Result<JournalSuccess, JournalFailure> {
        let journals = ManualJournals {
            manual_journals: vec![data.to_manual_journal()],
        };

        let submit = async {
            let client = self.client()?;
            let tenant_id = client.first_tenant_id()?;
            client.create_manual_journals(tenant_id, &journals).await
        };

        match submit.await {
            Ok(_) => {
                tracing::info!(
                    lines = data.journal_lines.len(),
                    "Manual journal created"
                );
                Ok(JournalSuccess::created())
            }
            Err(e) => {
                tracing::warn!("Manual journal rejected: {}", e);
                Err(JournalFailure::from(e))
            }
        }
    }

    /// Chart of accounts for the first tenant
    ///
    /// A missing and an empty account list both yield `NoAccountsFound`.
    pub async fn get_accounts(&self) -> Result<Vec<AccountSummary>> {
        let client = self.client()?;
        let tenant_id = client.first_tenant_id()?;
        let response = client.get_accounts(tenant_id).await?;

        match response.accounts {
            Some(accounts) if !accounts.is_empty() => Ok(accounts
                .into_iter()
                .map(AccountSummary::from_record)
                .collect()),
            _ => Err(XeroError::NoAccountsFound),
        }
    }

    fn client(&self) -> Result<&XeroClient> {
        self.client.as_ref().ok_or(XeroError::ClientNotInitialized)
    }
}
