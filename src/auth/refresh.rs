// Token endpoint grants: refresh_token and authorization_code

use reqwest::Client;

use super::types::{Credentials, TokenResponse, TokenSet};
use crate::error::{Result, XeroError};
use crate::http_client::send;

/// Exchange a refresh token for a new token pair
pub async fn refresh_grant(
    client: &Client,
    token_endpoint: &str,
    creds: &Credentials,
    refresh_token: &str,
) -> Result<TokenSet> {
    tracing::info!("Refreshing Xero token...");

    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];

    let data = post_token_form(client, token_endpoint, creds, &form, "refresh").await?;
    let token = data.into_token_set(Some(refresh_token))?;

    tracing::info!(
        expires_at = ?token.expires_at,
        "Token refreshed via Xero identity"
    );

    Ok(token)
}

/// Exchange an authorization code for the first token pair
pub async fn exchange_code(
    client: &Client,
    token_endpoint: &str,
    creds: &Credentials,
    code: &str,
) -> Result<TokenSet> {
    tracing::info!("Exchanging authorization code for tokens...");

    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", creds.redirect_uri.as_str()),
    ];

    let data = post_token_form(client, token_endpoint, creds, &form, "authorization_code").await?;
    let token = data.into_token_set(None)?;

    tracing::info!(
        expires_at = ?token.expires_at,
        "Authorization code exchanged"
    );

    Ok(token)
}

async fn post_token_form(
    client: &Client,
    token_endpoint: &str,
    creds: &Credentials,
    form: &[(&str, &str)],
    grant: &str,
) -> Result<TokenResponse> {
    tracing::debug!(
        "Token request: url={}, grant={}, client_id={}...",
        token_endpoint,
        grant,
        client_id_prefix(&creds.client_id)
    );

    // Xero expects client_secret_basic authentication
    let request = client
        .post(token_endpoint)
        .basic_auth(&creds.client_id, Some(&creds.client_secret))
        .header("Accept", "application/json")
        .form(form);

    let response = match send(request).await {
        Ok(response) => response,
        Err(XeroError::Api {
            status,
            message,
            body,
        }) => {
            // Surface the OAuth error details when the identity server sends them
            if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(&body) {
                if let Some(error_code) = error_json.get("error").and_then(|v| v.as_str()) {
                    tracing::error!(
                        "Token {} grant failed: error={}, description={}",
                        grant,
                        error_code,
                        error_json
                            .get("error_description")
                            .and_then(|v| v.as_str())
                            .unwrap_or("-")
                    );
                }
            }
            return Err(XeroError::Api {
                status,
                message,
                body,
            });
        }
        Err(e) => return Err(e),
    };

    Ok(response.json::<TokenResponse>().await?)
}

/// First eight characters of the client id, for logs
fn client_id_prefix(client_id: &str) -> String {
    client_id.chars().take(8).collect()
}
