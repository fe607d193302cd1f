// Authentication module
// OAuth2 consent flow, token grants and token persistence

mod consent;
mod refresh;
mod store;
mod types;

pub use consent::{build_consent_url, parse_callback, CallbackParams};
pub use refresh::{exchange_code, refresh_grant};
pub use store::TokenStore;
pub use types::{AuthEndpoints, Credentials, TokenResponse, TokenSet, SCOPES};
