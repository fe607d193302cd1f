// Consent URL construction and callback parsing

use std::collections::HashMap;
use url::Url;

use super::types::Credentials;
use crate::error::{Result, XeroError};

/// Parameters extracted from the authorization redirect
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackParams {
    pub code: String,
    pub state: Option<String>,
}

/// Build the authorization URL that starts the consent flow
pub fn build_consent_url(
    authorization_endpoint: &str,
    creds: &Credentials,
    scopes: &[String],
) -> Result<String> {
    let mut url = Url::parse(authorization_endpoint)?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("response_type", "code");
        query.append_pair("client_id", &creds.client_id);
        query.append_pair("redirect_uri", &creds.redirect_uri);
        query.append_pair("scope", &scopes.join(" "));
        if let Some(ref state) = creds.state {
            query.append_pair("state", state);
        }
    }

    Ok(url.to_string())
}

/// Parse the callback URL received on the redirect URI
///
/// Accepts either an absolute URL or a path with query string, which is
/// resolved against the registered redirect URI.
pub fn parse_callback(
    request_url: &str,
    redirect_uri: &str,
    expected_state: Option<&str>,
) -> Result<CallbackParams> {
    let url = match Url::parse(request_url) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(redirect_uri)?.join(request_url)?,
        Err(e) => return Err(e.into()),
    };

    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .map(|d| format!(": {}", d))
            .unwrap_or_default();
        return Err(XeroError::Callback(format!(
            "authorization server returned {}{}",
            error, description
        )));
    }

    let state = params.get("state").cloned();
    if let Some(expected) = expected_state {
        if state.as_deref() != Some(expected) {
            return Err(XeroError::Callback(format!(
                "state mismatch (expected {}, received {})",
                expected,
                state.as_deref().unwrap_or("none")
            )));
        }
    }

    let code = params
        .get("code")
        .filter(|c| !c.is_empty())
        .cloned()
        .ok_or_else(|| XeroError::Callback("callback URL has no code parameter".to_string()))?;

    Ok(CallbackParams { code, state })
}
